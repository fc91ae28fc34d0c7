use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::Level;

use crate::config::{
    OutputFormat, ScrapeConfig, DEFAULT_BASE_URL, DEFAULT_CONTAINER_SELECTOR,
    DEFAULT_LISTING_URL, DEFAULT_TIMEOUT_SECS,
};
use crate::download::HttpFetcher;
use crate::error::Error;
use crate::persist::{ensure_destination, persister_for};
use crate::pipeline;

/// CLI for plaza-traffic: download the published plaza traffic files and save them as one table.
#[derive(Parser, Debug)]
#[clap(
    name = "plaza-traffic",
    version,
    about = "Download bridge and tunnel plaza traffic files and save them as one Parquet table"
)]
pub struct Cli {
    /// Directory to write the dataset into (defaults to the current directory)
    pub output_dir: Option<PathBuf>,

    /// Page listing the data files
    #[clap(long, default_value = DEFAULT_LISTING_URL)]
    pub listing_url: String,

    /// Prefix for relative data file links
    #[clap(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// CSS selector of the element holding the data file links
    #[clap(long = "container", default_value = DEFAULT_CONTAINER_SELECTOR)]
    pub container_selector: String,

    /// Per-request timeout in seconds
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Output file format
    #[clap(long, value_enum, default_value_t = OutputFormat::Parquet)]
    pub format: OutputFormat,

    /// Print the run report as JSON on stdout
    #[clap(long)]
    pub report_json: bool,

    /// Log more (-v info, -vv debug)
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn scrape_config(&self) -> ScrapeConfig {
        ScrapeConfig {
            listing_url: self.listing_url.clone(),
            base_url: self.base_url.clone(),
            container_selector: self.container_selector.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            output_dir: self.output_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
            format: self.format,
        }
    }
}

/// Installs the stderr log subscriber. Warnings (skipped files) are always shown.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.scrape_config();
    config.trace_loaded();

    // Check the destination up front so a bad path costs no downloads.
    ensure_destination(&config.output_dir).context("cannot write output")?;
    let fetcher = HttpFetcher::new(config.timeout)?;

    let persister = persister_for(config.format);

    println!("Downloading...");
    // skipped files are reported by the warnings the pipeline logs
    let report = pipeline::run(&config, &fetcher, persister.as_ref(), |path| {
        println!("Saving to {}", path.display());
    })
    .await
    .map_err(|e| match e {
        Error::Discovery(_) => anyhow::Error::new(e).context("cannot list data files"),
        Error::Persistence(_) => anyhow::Error::new(e).context("cannot write output"),
    })?;

    if cli.report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.output.is_none() {
        println!(
            "Nothing saved: no rows in {} files ({} skipped)",
            report.links,
            report.skipped.len()
        );
    } else {
        println!(
            "Saved {} rows from {} of {} files ({} skipped)",
            report.rows,
            report.payloads,
            report.links,
            report.skipped.len()
        );
    }
    Ok(())
}
