//! HTTP fetcher for pin pages
//!
//! This module handles all requests against the collection service:
//! - Building the page and asset HTTP clients
//! - Building page URLs from a cursor
//! - Sending the authenticated page request
//! - Classifying the response as success or retryable failure

use reqwest::header::{ACCEPT, COOKIE};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::time::Duration;

/// Credentials and target of the collection service
///
/// Supplied once at startup and never changed afterwards.
#[derive(Clone)]
pub struct Session {
    base_url: String,
    cookie: String,
}

impl Session {
    pub fn new(base_url: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            cookie: cookie.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }
}

// Keeps the cookie out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("cookie", &"<redacted>")
            .finish()
    }
}

/// Result of a page fetch
#[derive(Debug)]
pub enum FetchResult {
    /// 2xx response; body is ready for decoding
    Success {
        /// HTTP status code
        status_code: u16,
        /// Raw response body
        body: String,
    },

    /// Anything else. The caller must reschedule the same cursor and must
    /// not decode.
    Retryable {
        /// HTTP status code, absent for transport errors
        status_code: Option<u16>,
        /// Error description
        error: String,
    },
}

/// Classification of an HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx
    Success,
    /// 429 or 5xx
    Throttled,
    /// Any other non-2xx status. Still retried: the service is not trusted
    /// to use 4xx for permanent failures.
    Rejected,
}

/// Classifies a page response status, checked in order: 429/5xx, other
/// non-2xx, success
pub fn classify_status(status: StatusCode) -> StatusClass {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StatusClass::Throttled
    } else if !status.is_success() {
        StatusClass::Rejected
    } else {
        StatusClass::Success
    }
}

/// Builds the URL of the page holding pins older than `cursor_id`
///
/// # Example
///
/// ```
/// use pin_harvest::crawler::page_url;
///
/// let url = page_url("http://login.meiwu.co/abcd123", 2241192993, 20);
/// assert_eq!(
///     url,
///     "http://login.meiwu.co/abcd123/pins/?max=2241192993&limit=20&wfl=1"
/// );
/// ```
pub fn page_url(base_url: &str, cursor_id: u64, limit: u32) -> String {
    format!(
        "{}/pins/?max={}&limit={}&wfl=1",
        base_url.trim_end_matches('/'),
        cursor_id,
        limit
    )
}

fn user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Builds the HTTP client for page requests
///
/// # Arguments
///
/// * `timeout` - Whole-request timeout, body included
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Builds the HTTP client for asset downloads
///
/// Only connecting is bounded here. Assets can be arbitrarily large, so a
/// whole-request timeout would fail every attempt on a slow link; stalls
/// are caught per read by the downloader instead.
pub fn build_asset_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent())
        .connect_timeout(Duration::from_secs(10))
        .build()
}

/// Authenticated client for pin pages
#[derive(Debug, Clone)]
pub struct PageClient {
    client: Client,
    session: Session,
    page_limit: u32,
}

impl PageClient {
    pub fn new(client: Client, session: Session, page_limit: u32) -> Self {
        Self {
            client,
            session,
            page_limit,
        }
    }

    /// Fetches the page of pins older than `cursor_id`
    ///
    /// # Classification
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | Request build / network error | Retryable |
    /// | HTTP 429 or 5xx | Retryable |
    /// | Other non-2xx | Retryable |
    /// | Body read error | Retryable |
    /// | 2xx | Success |
    pub async fn fetch_page(&self, cursor_id: u64) -> FetchResult {
        let url = page_url(self.session.base_url(), cursor_id, self.page_limit);

        let response = match self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .header("X-Request", "JSON")
            .header("X-Requested-With", "XMLHttpRequest")
            .header(COOKIE, self.session.cookie())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(url = %url, "page request failed: {}", e);
                return FetchResult::Retryable {
                    status_code: None,
                    error: e.to_string(),
                };
            }
        };

        let status = response.status();
        match classify_status(status) {
            StatusClass::Throttled => {
                tracing::warn!(url = %url, status = %status, "service unavailable");
                return FetchResult::Retryable {
                    status_code: Some(status.as_u16()),
                    error: format!("HTTP {}", status),
                };
            }
            StatusClass::Rejected => {
                tracing::error!(url = %url, status = %status, "request failed");
                return FetchResult::Retryable {
                    status_code: Some(status.as_u16()),
                    error: format!("HTTP {}", status),
                };
            }
            StatusClass::Success => {}
        }

        match response.text().await {
            Ok(body) => FetchResult::Success {
                status_code: status.as_u16(),
                body,
            },
            Err(e) => {
                tracing::error!(url = %url, status = %status, "failed to read page body: {}", e);
                FetchResult::Retryable {
                    status_code: Some(status.as_u16()),
                    error: e.to_string(),
                }
            }
        }
    }
}
