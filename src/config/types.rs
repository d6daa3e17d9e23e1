use crate::crawler::Session;
use crate::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Number of pins requested per page
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Host serving pin assets by key
pub const DEFAULT_CDN_BASE: &str = "http://img.hb.aicdn.com/";

/// Main configuration structure for Pin-Harvest
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub crawl: CrawlConfig,
    pub export: ExportConfig,
    pub tagger: TaggerConfig,
    pub logging: LoggingConfig,
}

/// Credentials for the collection service
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Page the service redirects to after logging in
    #[serde(rename = "base-url")]
    pub base_url: Option<String>,

    /// Raw `Cookie` header value, sent as-is
    pub cookie: Option<String>,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Id of the newest pin, or the last id seen when resuming by hand
    #[serde(rename = "start-id")]
    pub start_id: Option<u64>,

    /// Pins per page
    #[serde(rename = "page-limit")]
    pub page_limit: u32,

    /// Pause before a failed page is queued again (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Whole-request timeout for page requests (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_id: None,
            page_limit: DEFAULT_PAGE_LIMIT,
            retry_delay_ms: 0,
            request_timeout_secs: 120,
        }
    }
}

/// Output locations for assets and the skip log
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Root directory; boards become subdirectories
    pub directory: PathBuf,

    /// Base URL that asset keys are appended to
    #[serde(rename = "cdn-base")]
    pub cdn_base: String,

    /// Append-only list of pins whose tagging failed
    #[serde(rename = "skip-log")]
    pub skip_log: PathBuf,

    /// Longest silence from the CDN before a download is abandoned
    /// (seconds). Downloads have no overall deadline.
    #[serde(rename = "stall-timeout-secs")]
    pub stall_timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("exports"),
            cdn_base: DEFAULT_CDN_BASE.to_string(),
            skip_log: PathBuf::from("skipped.log"),
            stall_timeout_secs: 60,
        }
    }
}

/// External metadata tool
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaggerConfig {
    /// Path to the exiftool executable
    pub program: PathBuf,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("./exiftool.exe"),
        }
    }
}

/// Level-routed JSON log files
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Receives INFO events
    #[serde(rename = "info-log")]
    pub info_log: Option<PathBuf>,

    /// Receives WARN and ERROR events
    #[serde(rename = "error-log")]
    pub error_log: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            info_log: Some(PathBuf::from("info.log")),
            error_log: Some(PathBuf::from("error.log")),
        }
    }
}

impl Config {
    /// Builds the immutable session from the configured credentials
    pub fn session(&self) -> ConfigResult<Session> {
        let base_url = self
            .session
            .base_url
            .clone()
            .ok_or(ConfigError::MissingValue("session.base-url"))?;
        let cookie = self
            .session
            .cookie
            .clone()
            .ok_or(ConfigError::MissingValue("session.cookie"))?;
        Ok(Session::new(base_url, cookie))
    }

    /// Returns the configured start cursor
    pub fn start_id(&self) -> ConfigResult<u64> {
        self.crawl
            .start_id
            .ok_or(ConfigError::MissingValue("crawl.start-id"))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.crawl.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.crawl.request_timeout_secs)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.export.stall_timeout_secs)
    }
}
