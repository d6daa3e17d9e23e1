//! Crawler module for walking the pin collection
//!
//! This module contains the core crawling logic, including:
//! - Authenticated page fetching and response classification
//! - Page decoding into pin records
//! - Per-page task dispatch with cursor advancement
//! - The FIFO controller that drives tasks until the queue is empty

mod controller;
mod decoder;
mod fetcher;
mod task;

pub use controller::{Controller, CrawlStats, TaskHandler};
pub use decoder::{decode_page, DecodeError, PinRecord};
pub use fetcher::{
    build_asset_client, build_http_client, classify_status, page_url, FetchResult, PageClient, Session, StatusClass,
};
pub use task::{CrawlTask, PageProgress, PageTaskRunner, TaskOutcome};

use crate::config::Config;
use crate::export::{AssetMaterializer, ExifTool, SkipLog};
use crate::HarvestError;
use std::sync::Arc;

/// Runs a complete harvest
///
/// This is the main entry point for a crawl. It will:
/// 1. Build the session and HTTP clients
/// 2. Wire the page client, materializer and exiftool tagger
/// 3. Queue the first task at the configured start id
/// 4. Run the controller until the queue is empty
///
/// # Arguments
///
/// * `config` - A validated configuration
///
/// # Returns
///
/// * `Ok(CrawlStats)` - Counters collected while the queue drained
/// * `Err(HarvestError)` - The crawl could not be set up
///
/// # Example
///
/// ```no_run
/// use pin_harvest::config::{load_config, validate};
/// use pin_harvest::crawler::run_harvest;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// validate(&config)?;
/// let stats = run_harvest(config).await?;
/// println!("{} pins saved", stats.pins_persisted);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(config: Config) -> Result<CrawlStats, HarvestError> {
    let start_id = config.start_id()?;
    let runner = build_runner(&config)?;

    let mut controller = Controller::new().with_retry_delay(config.retry_delay());
    controller.enqueue(CrawlTask::new(start_id));

    tracing::info!("Starting harvest below pin {}", start_id);
    Ok(controller.run(&runner).await)
}

/// Wires the page client, materializer and exiftool tagger from `config`
///
/// Pages and assets get separate clients: only pages carry the
/// whole-request timeout, assets are bounded by the stall timeout.
pub fn build_runner(config: &Config) -> Result<PageTaskRunner, HarvestError> {
    let session = config.session()?;
    let pages = PageClient::new(
        build_http_client(config.request_timeout())?,
        session,
        config.crawl.page_limit,
    );
    let materializer = AssetMaterializer::new(
        build_asset_client()?,
        config.export.cdn_base.clone(),
        config.export.directory.clone(),
        Arc::new(ExifTool::new(config.tagger.program.clone())),
        SkipLog::new(config.export.skip_log.clone()),
    )
    .with_stall_timeout(config.stall_timeout());
    Ok(PageTaskRunner::new(pages, materializer))
}
