//! `[logging]` section: level, optional JSON file output and its rotation

use serde::Deserialize;
use std::path::PathBuf;

/// When the JSON log file starts a new file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    /// One file for the whole run
    Never,
}

impl LogRotation {
    const NAMES: [(&'static str, LogRotation); 3] = [
        ("hourly", LogRotation::Hourly),
        ("daily", LogRotation::Daily),
        ("never", LogRotation::Never),
    ];

    /// Case-insensitive; anything unrecognised rotates daily
    pub fn parse(s: &str) -> Self {
        Self::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s.trim()))
            .map_or(Self::default(), |(_, rotation)| *rotation)
    }

    pub fn as_str(&self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(_, rotation)| rotation == self)
            .map_or("daily", |(name, _)| *name)
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter for the crate's own events (`RUST_LOG` overrides it)
    pub level: String,
    pub file_enabled: bool,
    pub file_dir: PathBuf,
    pub file_rotation: LogRotation,
    /// File names look like `<prefix>.<date>`
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file_enabled: false,
            file_dir: "./logs".into(),
            file_rotation: LogRotation::default(),
            file_prefix: "fraghand".into(),
        }
    }
}

/// `[logging]` as written in the config file; every key optional
#[derive(Debug, Deserialize, Default)]
pub struct FileLogging {
    pub level: Option<String>,
    pub file_enabled: Option<bool>,
    pub file_dir: Option<String>,
    pub file_rotation: Option<String>,
    pub file_prefix: Option<String>,
}

impl LoggingConfig {
    /// Defaults overlaid with whatever the file sets
    pub fn from_file(file: Option<FileLogging>) -> Self {
        let mut config = Self::default();
        let Some(file) = file else {
            return config;
        };

        if let Some(level) = file.level {
            config.level = level;
        }
        if let Some(enabled) = file.file_enabled {
            config.file_enabled = enabled;
        }
        if let Some(dir) = file.file_dir {
            config.file_dir = dir.into();
        }
        if let Some(rotation) = file.file_rotation.as_deref() {
            config.file_rotation = LogRotation::parse(rotation);
        }
        if let Some(prefix) = file.file_prefix {
            config.file_prefix = prefix;
        }
        config
    }
}
