//! Configuration module for Pin-Harvest
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file. Command-line flags are layered on top by the binary.
//!
//! # Example
//!
//! ```no_run
//! use pin_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Pages hold {} pins", config.crawl.page_limit);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlConfig, ExportConfig, LoggingConfig, SessionConfig, TaggerConfig,
    DEFAULT_CDN_BASE, DEFAULT_PAGE_LIMIT,
};

// Re-export parser functions
pub use parser::{load_config, parse_config};
pub use validation::validate;
