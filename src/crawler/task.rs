//! Page-fetch tasks and their dispatch
//!
//! A task is a plain value naming the cursor to fetch. [`PageTaskRunner`]
//! turns one task into a [`TaskOutcome`]; the controller decides nothing
//! beyond queueing whatever follow-up the outcome names.
//!
//! ```text
//! Issued ─┬─ Success ── per-pin loop ─┬─ all saved ──────── Advanced(last id)
//!         │                           ├─ download failed ── Resume(last saved id)
//!         │                           └─ filesystem fatal ─ Abandoned
//!         ├─ Success, zero pins ───────────────────────── Exhausted
//!         ├─ Retryable ────────────────────────────────── Retry(same cursor)
//!         └─ DecodeError ──────────────────────────────── Abandoned
//! ```

use crate::crawler::controller::TaskHandler;
use crate::crawler::decoder::decode_page;
use crate::crawler::fetcher::{FetchResult, PageClient};
use crate::export::{AssetMaterializer, MaterializeOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A deferred page fetch for pins older than `cursor_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrawlTask {
    pub cursor_id: u64,
}

impl CrawlTask {
    pub fn new(cursor_id: u64) -> Self {
        Self { cursor_id }
    }
}

/// Pins handled on a page before the task ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageProgress {
    /// Downloaded and tagged
    pub persisted: usize,
    /// Downloaded, tagging failed
    pub skipped: usize,
}

/// Result of one task attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Every pin on the page was saved; continue below the last one
    Advanced {
        next_cursor: u64,
        progress: PageProgress,
    },

    /// Page request failed before decoding; fetch the same cursor again
    Retry { cursor: u64, reason: String },

    /// A download failed mid-page; resume after the last saved pin, or at
    /// the original cursor when none was saved
    Resume {
        cursor: u64,
        progress: PageProgress,
        reason: String,
    },

    /// The page held no pins: end of the collection
    Exhausted,

    /// Decode or filesystem failure; nothing is rescheduled
    Abandoned {
        reason: String,
        progress: PageProgress,
    },
}

impl TaskOutcome {
    /// The task to queue next, if any
    pub fn follow_up(&self) -> Option<CrawlTask> {
        match self {
            Self::Advanced { next_cursor, .. } => Some(CrawlTask::new(*next_cursor)),
            Self::Retry { cursor, .. } | Self::Resume { cursor, .. } => {
                Some(CrawlTask::new(*cursor))
            }
            Self::Exhausted | Self::Abandoned { .. } => None,
        }
    }

    /// True when the follow-up repeats work after a failure
    pub fn is_reschedule(&self) -> bool {
        matches!(self, Self::Retry { .. } | Self::Resume { .. })
    }

    pub fn progress(&self) -> PageProgress {
        match self {
            Self::Advanced { progress, .. }
            | Self::Resume { progress, .. }
            | Self::Abandoned { progress, .. } => *progress,
            Self::Retry { .. } | Self::Exhausted => PageProgress::default(),
        }
    }
}

/// Fetches a page, decodes it and materializes its pins in order
pub struct PageTaskRunner {
    pages: PageClient,
    materializer: AssetMaterializer,
}

impl PageTaskRunner {
    pub fn new(pages: PageClient, materializer: AssetMaterializer) -> Self {
        Self {
            pages,
            materializer,
        }
    }

    pub fn materializer(&self) -> &AssetMaterializer {
        &self.materializer
    }
}

#[async_trait]
impl TaskHandler for PageTaskRunner {
    async fn run_task(&self, task: CrawlTask) -> TaskOutcome {
        let body = match self.pages.fetch_page(task.cursor_id).await {
            FetchResult::Success { body, .. } => body,
            FetchResult::Retryable { status_code, error } => {
                tracing::warn!(status = ?status_code, "re-enqueuing...");
                return TaskOutcome::Retry {
                    cursor: task.cursor_id,
                    reason: error,
                };
            }
        };

        let pins = match decode_page(&body) {
            Ok(pins) => pins,
            Err(e) => {
                tracing::error!("abandoning page: {}", e);
                return TaskOutcome::Abandoned {
                    reason: e.to_string(),
                    progress: PageProgress::default(),
                };
            }
        };

        if pins.is_empty() {
            tracing::info!("no pins left below cursor {}", task.cursor_id);
            return TaskOutcome::Exhausted;
        }

        let mut last_id = task.cursor_id;
        let mut progress = PageProgress::default();

        for pin in &pins {
            match self.materializer.materialize(pin).await {
                Ok(MaterializeOutcome::Persisted { .. }) => progress.persisted += 1,
                Ok(MaterializeOutcome::TagSkipped { .. }) => progress.skipped += 1,
                Ok(MaterializeOutcome::DownloadFailed { error }) => {
                    tracing::warn!(pin_id = pin.pin_id, "re-enqueuing from {}...", last_id);
                    return TaskOutcome::Resume {
                        cursor: last_id,
                        progress,
                        reason: error,
                    };
                }
                Err(e) => {
                    tracing::error!(pin_id = pin.pin_id, "abandoning page: {}", e);
                    return TaskOutcome::Abandoned {
                        reason: e.to_string(),
                        progress,
                    };
                }
            }
            last_id = pin.pin_id;
        }

        TaskOutcome::Advanced {
            next_cursor: last_id,
            progress,
        }
    }
}
