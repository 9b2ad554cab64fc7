// CLI module - command-line argument parsing and config handlers
//
// Subcommands:
// - check: parse a response envelope and describe how it would be handled
// - upload: run the upload workflow against an in-memory page
// - config --show / --path / --reset: configuration management

use clap::{Args, Parser, Subcommand};
use fraghand::config::{Config, VERSION};
use std::io::Write;
use std::path::PathBuf;

/// fraghand - drive server-rendered fragment components from the terminal
#[derive(Parser)]
#[command(name = "fraghand")]
#[command(version = VERSION)]
#[command(about = "Check response envelopes and run fragment components without a browser", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a response envelope and show what handling it would do
    Check {
        /// Envelope file, or - for stdin
        #[arg(default_value = "-")]
        source: String,
    },

    /// Run the upload workflow: pick files, upload, apply the server's answer
    Upload(UploadArgs),

    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Component options as rendered by the server (JSON)
    #[arg(long)]
    pub options: PathBuf,

    /// Body the server answers the upload with
    #[arg(long)]
    pub response: PathBuf,

    /// Upload form markup; generated from the options when omitted
    #[arg(long)]
    pub markup: Option<PathBuf>,

    /// Value to pick in the revision selector before uploading
    #[arg(long)]
    pub revision: Option<String>,

    /// Value to pick in the genre selector before uploading
    #[arg(long)]
    pub genre: Option<String>,

    /// File names to add to the queue, in order
    #[arg(long = "file")]
    pub files: Vec<String>,
}

/// Parse the command line. Config commands are handled here; anything else
/// is returned for the caller to run.
pub fn handle_cli() -> Option<Commands> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show, reset, path } => {
            if path {
                handle_config_path();
            } else if show {
                handle_config_show();
            } else if reset {
                handle_config_reset();
            } else {
                println!("Usage: fraghand config [--show|--reset|--path]");
                println!();
                println!("Options:");
                println!("  --show    Display effective configuration");
                println!("  --reset   Reset config file to defaults");
                println!("  --path    Show config file path");
            }
            None
        }
        other => Some(other),
    }
}

fn handle_config_path() {
    match Config::config_path() {
        Some(path) => println!("{}", path.display()),
        None => {
            eprintln!("Error: Could not determine config path");
            std::process::exit(1);
        }
    }
}

fn handle_config_show() {
    let config = Config::from_env();

    println!("# Effective configuration (env > file > defaults)");
    println!();
    println!("default_region = {:?}", config.default_region);
    println!();
    println!("[logging]");
    println!("level = {:?}", config.logging.level);
    println!("file_enabled = {}", config.logging.file_enabled);
    println!("file_dir = {:?}", config.logging.file_dir.display().to_string());
    println!("file_rotation = {:?}", config.logging.file_rotation.as_str());
    println!("file_prefix = {:?}", config.logging.file_prefix);

    println!();
    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("# Source: {}", path.display());
        } else {
            println!("# Source: defaults (no config file)");
        }
    }
}

fn handle_config_reset() {
    let Some(path) = Config::config_path() else {
        eprintln!("Error: Could not determine config path");
        std::process::exit(1);
    };

    if path.exists() {
        eprint!("Config file exists at {}. Overwrite? [y/N] ", path.display());
        let _ = std::io::stderr().flush();

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input).is_err()
            || !input.trim().eq_ignore_ascii_case("y")
        {
            println!("Aborted.");
            return;
        }
    }

    if let Err(e) = Config::default().save() {
        eprintln!("Error writing config: {}", e);
        std::process::exit(1);
    }

    println!("Config reset to defaults: {}", path.display());
}
