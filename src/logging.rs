//! Logging setup
//!
//! Human-readable events go to stderr, filtered by verbosity. When log files
//! are configured, events are also written as JSON lines: INFO events to the
//! info log, WARN and ERROR events to the error log.

use crate::config::LoggingConfig;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::{Level, Metadata, Subscriber};
use tracing_subscriber::filter::{filter_fn, EnvFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

/// Console filter for the given verbosity
pub fn console_filter(verbose: u8, quiet: bool) -> EnvFilter {
    if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pin_harvest=info,warn"),
            1 => EnvFilter::new("pin_harvest=debug,info"),
            2 => EnvFilter::new("pin_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    }
}

/// Accepts events routed to the info log. Spans pass so events keep their
/// task context.
pub fn is_info_event(meta: &Metadata<'_>) -> bool {
    meta.is_span() || *meta.level() == Level::INFO
}

/// Accepts events routed to the error log
pub fn is_error_event(meta: &Metadata<'_>) -> bool {
    meta.is_span() || *meta.level() == Level::WARN || *meta.level() == Level::ERROR
}

fn open_log(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// JSON-lines layer appending to `path`, keeping only what `keep` accepts
fn json_file_layer<S>(
    path: &Path,
    keep: fn(&Metadata<'_>) -> bool,
) -> std::io::Result<impl Layer<S>>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    Ok(fmt::layer()
        .json()
        .with_writer(Mutex::new(open_log(path)?))
        .with_filter(filter_fn(keep)))
}

/// Installs the global subscriber
///
/// # Errors
///
/// Returns an IO error when a log file cannot be opened.
pub fn init_logging(config: &LoggingConfig, verbose: u8, quiet: bool) -> std::io::Result<()> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_filter(console_filter(verbose, quiet));

    let info_file = config
        .info_log
        .as_deref()
        .map(|path| json_file_layer(path, is_info_event))
        .transpose()?;

    let error_file = config
        .error_log
        .as_deref()
        .map(|path| json_file_layer(path, is_error_event))
        .transpose()?;

    tracing_subscriber::registry()
        .with(console)
        .with(info_file)
        .with(error_file)
        .init();

    Ok(())
}
