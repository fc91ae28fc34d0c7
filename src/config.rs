// plaza-traffic/src/config.rs

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Page that lists the published plaza traffic files.
pub const DEFAULT_LISTING_URL: &str = "http://web.mta.info/developers/data/bandt/trafficdata.html";
/// Prefix that turns a link from the listing page into a data file URL.
pub const DEFAULT_BASE_URL: &str = "http://web.mta.info/developers/data/bandt/";
/// Element on the listing page holding the data file links.
pub const DEFAULT_CONTAINER_SELECTOR: &str = "div.span-39.last";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// File name (without extension) of the persisted dataset.
pub const OUTPUT_BASE_NAME: &str = "plaza_traffic";

/// Output encoding of the persisted dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Apache Parquet (columnar, typed)
    #[default]
    Parquet,
    /// Comma separated text with a header row
    Csv,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Parquet => "parquet",
            OutputFormat::Csv => "csv",
        }
    }

    /// Fixed file name for this format, e.g. `plaza_traffic.parquet`.
    pub fn file_name(self) -> String {
        format!("{}.{}", OUTPUT_BASE_NAME, self.extension())
    }
}

/// Everything a run needs to know; passed explicitly into each component.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeConfig {
    pub listing_url: String,
    pub base_url: String,
    pub container_selector: String,
    pub timeout: Duration,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            container_selector: DEFAULT_CONTAINER_SELECTOR.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            output_dir: PathBuf::from("."),
            format: OutputFormat::default(),
        }
    }
}

impl ScrapeConfig {
    pub fn trace_loaded(&self) {
        info!(
            listing_url = %self.listing_url,
            base_url = %self.base_url,
            output_dir = %self.output_dir.display(),
            format = ?self.format,
            timeout_secs = self.timeout.as_secs(),
            "Loaded ScrapeConfig"
        );
        debug!(?self, "ScrapeConfig loaded (full debug)");
    }
}
