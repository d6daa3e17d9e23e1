//! Asset materializer
//!
//! Persists a single pin: derives its destination, makes sure the board
//! directory exists, streams the asset from the CDN to disk and embeds the
//! pin's source link. Files are always overwritten, never skipped.

use crate::crawler::PinRecord;
use crate::export::paths::{asset_url, destination_path};
use crate::export::skip_log::SkipLog;
use crate::export::tagger::MetadataTagger;
use crate::HarvestError;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Errors that make a single download fail
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request for {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("No data from {url} for {}s", .after.as_secs())]
    Stalled { url: String, after: Duration },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Outcome of persisting one pin
#[derive(Debug)]
pub enum MaterializeOutcome {
    /// Asset written and tagged
    Persisted { path: PathBuf },

    /// Asset could not be downloaded; the pin must be attempted again
    DownloadFailed { error: String },

    /// Asset written but tagging failed; recorded in the skip log
    TagSkipped { path: PathBuf, error: String },
}

/// Writes pins to `{export_dir}/{board}/{pin_id}.{ext}`
pub struct AssetMaterializer {
    client: Client,
    cdn_base: String,
    export_dir: PathBuf,
    tagger: Arc<dyn MetadataTagger>,
    skip_log: SkipLog,
    stall_timeout: Duration,
}

/// Longest wait for the next piece of an asset response
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(60);

impl AssetMaterializer {
    pub fn new(
        client: Client,
        cdn_base: impl Into<String>,
        export_dir: impl Into<PathBuf>,
        tagger: Arc<dyn MetadataTagger>,
        skip_log: SkipLog,
    ) -> Self {
        Self {
            client,
            cdn_base: cdn_base.into(),
            export_dir: export_dir.into(),
            tagger,
            skip_log,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }

    /// Gives up on a download when the CDN sends nothing for `timeout`
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn skip_log(&self) -> &SkipLog {
        &self.skip_log
    }

    /// Persists one pin
    ///
    /// # Returns
    ///
    /// * `Ok(MaterializeOutcome)` - The pin was handled; see the variant
    /// * `Err(HarvestError::CreateDir)` - The board directory could not be
    ///   created
    /// * `Err(HarvestError::SkipLog)` - A tagging failure could not be
    ///   recorded
    pub async fn materialize(&self, pin: &PinRecord) -> Result<MaterializeOutcome, HarvestError> {
        let path = destination_path(&self.export_dir, &pin.board_title, pin.pin_id, &pin.mime_type);
        let file_name = path.display().to_string();

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|source| {
                tracing::error!(file_name = %file_name, "unable to create dir {:?}: {}", dir, source);
                HarvestError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                }
            })?;
        }

        let img_url = asset_url(&self.cdn_base, &pin.key);
        tracing::info!(
            file_name = %file_name,
            img_url = %img_url,
            "downloading {}",
            pin.pin_id
        );

        match download_to_file(&self.client, &img_url, &path, self.stall_timeout).await {
            Ok(bytes) => {
                tracing::debug!(file_name = %file_name, "wrote {} bytes", bytes);
            }
            Err(e) => {
                tracing::error!(file_name = %file_name, img_url = %img_url, "{}", e);
                return Ok(MaterializeOutcome::DownloadFailed {
                    error: e.to_string(),
                });
            }
        }

        match self.tagger.embed_comment(&path, &pin.link).await {
            Ok(()) => Ok(MaterializeOutcome::Persisted { path }),
            Err(e) => {
                tracing::error!(
                    file_name = %file_name,
                    pin_id = pin.pin_id,
                    "run command error: {}",
                    e
                );
                self.skip_log
                    .record(pin.pin_id)
                    .await
                    .map_err(|source| {
                        tracing::error!("unable to record skipped pin {}: {}", pin.pin_id, source);
                        HarvestError::SkipLog {
                            path: self.skip_log.path().to_path_buf(),
                            source,
                        }
                    })?;
                Ok(MaterializeOutcome::TagSkipped {
                    path,
                    error: e.to_string(),
                })
            }
        }
    }
}

/// Streams `url` into `path`, truncating any existing file
///
/// Chunks go straight to disk so large assets are never held in memory.
/// There is no overall deadline; the download fails only when the response
/// headers or the next chunk take longer than `stall_timeout`.
pub async fn download_to_file(
    client: &Client,
    url: &str,
    path: &Path,
    stall_timeout: Duration,
) -> Result<u64, DownloadError> {
    let stalled = || DownloadError::Stalled {
        url: url.to_string(),
        after: stall_timeout,
    };

    let response = tokio::time::timeout(stall_timeout, client.get(url).send())
        .await
        .map_err(|_| stalled())?
        .map_err(|source| DownloadError::Http {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let write_error = |source: std::io::Error| DownloadError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::create(path).await.map_err(write_error)?;
    let mut bytes_written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = tokio::time::timeout(stall_timeout, stream.next())
        .await
        .map_err(|_| stalled())?
    {
        let chunk = chunk.map_err(|source| DownloadError::Http {
            url: url.to_string(),
            source,
        })?;
        file.write_all(&chunk).await.map_err(write_error)?;
        bytes_written += chunk.len() as u64;
    }
    file.flush().await.map_err(write_error)?;

    Ok(bytes_written)
}
