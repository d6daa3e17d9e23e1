//! Pin-Harvest main entry point
//!
//! This is the command-line interface for the Pin-Harvest exporter.

use anyhow::Context;
use clap::Parser;
use pin_harvest::config::{load_config, validate, Config};
use pin_harvest::crawler::run_harvest;
use pin_harvest::logging::init_logging;
use std::io::Write;
use std::path::PathBuf;

/// Pin-Harvest: export a pin collection to disk
///
/// Walks your pins from the newest id backwards, saves each asset under a
/// folder named after its board and writes the pin's source link into the
/// image comment. To resume an interrupted run, pass the last id you saw.
#[derive(Parser, Debug)]
#[command(name = "pin-harvest")]
#[command(version)]
#[command(about = "Export a pin collection to disk", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// The url you are redirected to after logging in
    #[arg(long)]
    url: Option<String>,

    /// The id of your newest pin, or the pin to resume from
    #[arg(long)]
    id: Option<u64>,

    /// The cookie of your request
    #[arg(long)]
    cookie: Option<String>,

    /// Directory assets are exported to
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Path to the exiftool executable
    #[arg(long, value_name = "PROGRAM")]
    exiftool: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    apply_overrides(&mut config, &cli);
    prompt_missing(&mut config)?;

    init_logging(&config.logging, cli.verbose, cli.quiet)
        .context("Failed to open log files")?;

    if let Err(e) = validate(&config) {
        tracing::error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    match run_harvest(config).await {
        Ok(stats) => {
            tracing::info!(
                "Harvest finished: {} saved, {} untagged (see skip log), {} rescheduled, {} abandoned",
                stats.pins_persisted,
                stats.pins_skipped,
                stats.retries + stats.resumes,
                stats.abandoned
            );
            if !stats.reached_end {
                tracing::warn!("Stopped before the end of the collection; rerun with the last saved id");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}

/// Command-line values win over the configuration file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.url {
        config.session.base_url = Some(url.clone());
    }
    if let Some(cookie) = &cli.cookie {
        config.session.cookie = Some(cookie.clone());
    }
    if let Some(id) = cli.id {
        config.crawl.start_id = Some(id);
    }
    if let Some(output) = &cli.output {
        config.export.directory = output.clone();
    }
    if let Some(program) = &cli.exiftool {
        config.tagger.program = program.clone();
    }
}

/// Asks on the terminal for session values still missing
fn prompt_missing(config: &mut Config) -> anyhow::Result<()> {
    if config.session.base_url.is_none() {
        let url = prompt(
            "Paste the url of the first page after logging in, like http://login.meiwu.co/abcd123: ",
        )?;
        config.session.base_url = Some(url);
    }

    if config.session.cookie.is_none() {
        let cookie = prompt(
            "Paste the Cookie header of your browser session, like referer=http%3A%2F%2Fhuaban.com%2F; sid=abcd123: ",
        )?;
        config.session.cookie = Some(cookie);
    }

    if config.crawl.start_id.is_none() {
        let input = prompt(
            "Paste the id of your newest pin, or the id to resume from, like 2241192993: ",
        )?;
        let id = input
            .parse()
            .with_context(|| format!("cannot parse pin id {:?}", input))?;
        config.crawl.start_id = Some(id);
    }

    Ok(())
}

fn prompt(message: &str) -> anyhow::Result<String> {
    print!("{}", message);
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read stdin")?;
    Ok(line.trim().to_string())
}
