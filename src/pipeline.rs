//! High-level pipeline: discover → fetch → flatten → assemble → persist.
//!
//! # Responsibilities
//! - Fail fast on the listing page: without links there is nothing to do.
//! - Keep going past individual data files that cannot be fetched or parsed; each one
//!   is recorded in the [`ScrapeReport`] instead of aborting the run.
//! - Persist exactly once, at the end, after the full dataset is in memory. A run that
//!   collected no columns writes nothing.
//!
//! # Navigation
//! - [`collect`] runs everything up to (not including) persistence.
//! - [`run`] is [`collect`] followed by the [`Persister`].

use std::path::{Path, PathBuf};

use futures::StreamExt;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::ScrapeConfig;
use crate::contract::{Fetcher, Persister, SkippedItem};
use crate::download::{discover_links, fetch_payloads};
use crate::error::Result;
use crate::preprocess;
use crate::table::{Dataset, TableAssembler};

/// What happened during a run.
#[derive(Debug, Default, Serialize)]
pub struct ScrapeReport {
    /// Links found on the listing page
    pub links: usize,
    /// Data files that were fetched and flattened
    pub payloads: usize,
    pub rows: usize,
    pub columns: Vec<String>,
    pub skipped: Vec<SkippedItem>,
    /// Written file; `None` until persisted
    pub output: Option<PathBuf>,
}

/// Dataset plus report, before persistence.
#[derive(Debug)]
pub struct Collected {
    pub dataset: Dataset,
    pub report: ScrapeReport,
}

/// Discovers, fetches and flattens every data file and assembles the dataset.
///
/// Only a discovery failure is returned as an error.
pub async fn collect<F>(config: &ScrapeConfig, fetcher: &F) -> Result<Collected>
where
    F: Fetcher + ?Sized,
{
    info!("[SCRAPE] Starting collection");
    let links = discover_links(fetcher, config).await.map_err(|e| {
        error!(error = %e, "[SCRAPE][ERROR] Link discovery failed");
        e
    })?;

    let mut report = ScrapeReport {
        links: links.len(),
        ..ScrapeReport::default()
    };
    let mut assembler = TableAssembler::new();

    let mut payloads = std::pin::pin!(fetch_payloads(fetcher, &config.base_url, links));
    while let Some(outcome) = payloads.next().await {
        let payload = match outcome {
            Ok(payload) => payload,
            Err(skipped) => {
                report.skipped.push(skipped);
                continue;
            }
        };
        match preprocess::flatten_or_skip(&payload.link, &payload.body) {
            Ok(rows) => {
                info!(link = %payload.link, rows = rows.len(), "[SCRAPE] Flattened data file");
                assembler.push_rows(rows);
                report.payloads += 1;
            }
            Err(skipped) => report.skipped.push(skipped),
        }
    }

    let dataset = assembler.finish();
    report.rows = dataset.row_count();
    report.columns = dataset.column_names().into_iter().map(String::from).collect();
    info!(
        rows = report.rows,
        payloads = report.payloads,
        skipped = report.skipped.len(),
        "[SCRAPE] Collection complete"
    );
    Ok(Collected { dataset, report })
}

/// Full run: [`collect`], then write the dataset into `config.output_dir`.
///
/// `on_save` is called with the target path right before the persister runs. A
/// dataset without columns is not persisted: the report's `output` stays `None`.
pub async fn run<F, P, S>(
    config: &ScrapeConfig,
    fetcher: &F,
    persister: &P,
    on_save: S,
) -> Result<ScrapeReport>
where
    F: Fetcher + ?Sized,
    P: Persister + ?Sized,
    S: FnOnce(&Path),
{
    let Collected { dataset, mut report } = collect(config, fetcher).await?;
    if dataset.columns().is_empty() {
        warn!(
            links = report.links,
            skipped = report.skipped.len(),
            "[SCRAPE] No rows collected, nothing to save"
        );
        return Ok(report);
    }

    on_save(&config.output_dir.join(persister.file_name()));
    let path = persister
        .persist(&dataset, &config.output_dir)
        .map_err(|e| {
            error!(error = %e, "[SCRAPE][ERROR] Persisting dataset failed");
            e
        })?;
    report.output = Some(path);
    Ok(report)
}
