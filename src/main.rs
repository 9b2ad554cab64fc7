// fraghand - developer harness for server-rendered fragment components
//
// Runs the library's components against in-memory collaborators so envelope
// bodies and component options can be checked without a browser:
// - check: what handling a response envelope would do
// - upload: a full upload workflow cycle
// - config: configuration management

mod cli;
mod harness;

use anyhow::Result;
use cli::Commands;
use fraghand::config::Config;
use fraghand::logging::{self, LogBuffer};

fn main() -> Result<()> {
    // Config commands are handled inside the CLI layer
    let Some(command) = cli::handle_cli() else {
        return Ok(());
    };

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();
    let config = Config::from_env();

    // Keep what components log during the run so reports can show it
    let captured = LogBuffer::new();
    let _file_guard = logging::init(&config.logging, Some(captured.clone()));
    tracing::debug!(?config, "configuration loaded");

    match command {
        Commands::Check { source } => harness::check(&source, &config),
        Commands::Upload(args) => harness::upload(args, &captured),
        Commands::Config { .. } => Ok(()),
    }
}
