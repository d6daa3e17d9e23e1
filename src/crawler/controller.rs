//! Crawl controller - FIFO task queue
//!
//! The controller pops one task at a time, hands it to a [`TaskHandler`] and
//! queues whatever follow-up the outcome names. It never deduplicates,
//! reorders, or runs tasks concurrently; the crawl ends when the queue is
//! empty.
//!
//! Retries are unbounded. A page that keeps failing is fetched forever
//! until the process is killed.

use crate::crawler::task::{CrawlTask, TaskOutcome};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::Instrument;

/// Runs one task to completion
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run_task(&self, task: CrawlTask) -> TaskOutcome;
}

/// Counters collected while the queue drains
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub tasks_run: u64,
    /// Pages whose pins were all saved
    pub pages_completed: u64,
    /// Page fetches rescheduled before decoding
    pub retries: u64,
    /// Pages rescheduled after a failed download
    pub resumes: u64,
    pub pins_persisted: u64,
    pub pins_skipped: u64,
    /// Attempts dropped without a follow-up
    pub abandoned: u64,
    /// An empty page was reached
    pub reached_end: bool,
}

impl CrawlStats {
    fn record(&mut self, outcome: &TaskOutcome) {
        self.tasks_run += 1;
        let progress = outcome.progress();
        self.pins_persisted += progress.persisted as u64;
        self.pins_skipped += progress.skipped as u64;

        match outcome {
            TaskOutcome::Advanced { .. } => self.pages_completed += 1,
            TaskOutcome::Retry { .. } => self.retries += 1,
            TaskOutcome::Resume { .. } => self.resumes += 1,
            TaskOutcome::Exhausted => self.reached_end = true,
            TaskOutcome::Abandoned { .. } => self.abandoned += 1,
        }
    }
}

/// Single-threaded FIFO crawl queue
#[derive(Debug, Default)]
pub struct Controller {
    queue: VecDeque<CrawlTask>,
    counter: u64,
    retry_delay: Duration,
    stats: CrawlStats,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits `delay` before queueing a rescheduled task. Zero keeps the
    /// immediate requeue.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Appends a task to the tail of the queue
    pub fn enqueue(&mut self, task: CrawlTask) {
        self.queue.push_back(task);
    }

    /// Tasks waiting to run, head first
    pub fn pending(&self) -> impl Iterator<Item = &CrawlTask> {
        self.queue.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of tasks started so far
    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    /// Runs the head task and queues its follow-up
    ///
    /// Returns `None` when the queue was already empty.
    pub async fn step<H>(&mut self, handler: &H) -> Option<TaskOutcome>
    where
        H: TaskHandler + ?Sized,
    {
        let task = self.queue.pop_front()?;
        self.counter += 1;
        tracing::info!("task #{}", self.counter);

        let span = tracing::info_span!("task", number = self.counter, cursor = task.cursor_id);
        let outcome = handler.run_task(task).instrument(span).await;
        self.stats.record(&outcome);

        if let Some(next) = outcome.follow_up() {
            if outcome.is_reschedule() && !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }
            self.enqueue(next);
        }

        Some(outcome)
    }

    /// Runs tasks until the queue is empty
    pub async fn run<H>(&mut self, handler: &H) -> CrawlStats
    where
        H: TaskHandler + ?Sized,
    {
        while self.step(handler).await.is_some() {}

        tracing::info!(
            tasks = self.stats.tasks_run,
            persisted = self.stats.pins_persisted,
            skipped = self.stats.pins_skipped,
            retries = self.stats.retries + self.stats.resumes,
            "Done!"
        );
        self.stats.clone()
    }
}
