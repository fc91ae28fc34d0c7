//! # contract: seams between the pipeline stages
//!
//! This module defines the two traits the pipeline is generic over and the plain data
//! types that travel between stages.
//!
//! - [`Fetcher`] retrieves a document's text by URL. The real implementation is
//!   [`HttpFetcher`](crate::download::HttpFetcher); tests use [`MockFetcher`].
//! - [`Persister`] writes a finished [`Dataset`] into a destination directory. Real
//!   implementations live in [`persist`](crate::persist); tests use [`MockPersister`].
//!
//! Both traits are annotated for `mockall`. With the `test-export-mocks` feature
//! (enabled by default) the generated mocks are public so integration tests can use them.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::error::{FetchError, MarkupError, PersistenceError};
use crate::table::Dataset;

/// One fetched, structurally valid data file.
#[derive(Debug, Clone)]
pub struct Payload {
    /// Link as it appeared on the listing page
    pub link: String,
    /// Absolute URL the body was fetched from
    pub url: String,
    pub body: String,
}

/// Why a data file contributed no rows.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    InvalidMarkup(#[from] MarkupError),
}

/// A link that was skipped, kept for the run report.
#[derive(Debug, Serialize)]
pub struct SkippedItem {
    pub link: String,
    #[serde(serialize_with = "serialize_display")]
    pub reason: SkipReason,
}

fn serialize_display<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Display,
{
    serializer.collect_str(value)
}

/// Retrieves the text body of a document.
///
/// Implementors must treat non-success HTTP statuses as errors.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Writes an assembled dataset to a file inside `dir` and returns the file's path.
///
/// Must either write the complete file or leave nothing behind, and must replace
/// an existing file of the same name.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Persister: Send + Sync {
    /// Name of the file this persister writes inside the destination directory.
    fn file_name(&self) -> String;

    fn persist(&self, dataset: &Dataset, dir: &Path) -> Result<PathBuf, PersistenceError>;
}
