//! Pin-Harvest: incremental exporter for board/pin collections
//!
//! This crate walks a paginated pin collection backwards from a starting
//! cursor, saves every pin's asset under a folder named after its board and
//! embeds the pin's source link into the saved image.

pub mod config;
pub mod crawler;
pub mod export;
pub mod logging;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Pin-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Unable to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to append to skip log {path}: {source}")]
    SkipLog {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing required value: {0}")]
    MissingValue(&'static str),
}

/// Result type alias for Pin-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_harvest, CrawlStats, CrawlTask, PinRecord, Session, TaskOutcome};
pub use export::{AssetMaterializer, MaterializeOutcome, MetadataTagger};
