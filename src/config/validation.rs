use crate::config::types::{Config, CrawlConfig, ExportConfig, SessionConfig, TaggerConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// Call this once every source (file, flags, prompts) has been merged.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_session_config(&config.session)?;
    validate_crawl_config(&config.crawl)?;
    validate_export_config(&config.export)?;
    validate_tagger_config(&config.tagger)?;
    Ok(())
}

/// Validates session credentials
///
/// The cookie is forwarded verbatim, so only its presence is checked.
fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    let base_url = config
        .base_url
        .as_deref()
        .ok_or(ConfigError::MissingValue("session.base-url"))?;
    validate_http_url("base-url", base_url)?;

    match config.cookie.as_deref() {
        None => Err(ConfigError::MissingValue("session.cookie")),
        Some(cookie) if cookie.trim().is_empty() => Err(ConfigError::Validation(
            "cookie cannot be empty".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    match config.start_id {
        None => return Err(ConfigError::MissingValue("crawl.start-id")),
        Some(0) => {
            return Err(ConfigError::Validation(
                "start-id must be a pin id greater than 0".to_string(),
            ))
        }
        Some(_) => {}
    }

    if config.page_limit < 1 || config.page_limit > 100 {
        return Err(ConfigError::Validation(format!(
            "page-limit must be between 1 and 100, got {}",
            config.page_limit
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output locations
fn validate_export_config(config: &ExportConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "export directory cannot be empty".to_string(),
        ));
    }

    if config.skip_log.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "skip-log cannot be empty".to_string(),
        ));
    }

    if config.stall_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "stall-timeout-secs must be >= 1".to_string(),
        ));
    }

    validate_http_url("cdn-base", &config.cdn_base)
}

fn validate_tagger_config(config: &TaggerConfig) -> Result<(), ConfigError> {
    if config.program.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "tagger program cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Checks that a URL parses and uses http or https
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}
