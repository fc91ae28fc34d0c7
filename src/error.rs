//! Error types for plaza-traffic
//!
//! Errors fall into two tiers:
//! - Fatal errors ([`DiscoveryError`], [`PersistenceError`]) abort the run and are
//!   wrapped by the crate-level [`Error`].
//! - Per-item errors ([`FetchError`], [`MarkupError`]) cause a single data file to be
//!   skipped; they end up in the run report as a [`SkipReason`](crate::contract::SkipReason).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fatal pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors that stop a run
#[derive(Debug, Error)]
pub enum Error {
    /// The listing page could not be read or no longer has the link container
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The dataset could not be written
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Failure to retrieve a single document over HTTP
#[derive(Debug, Error)]
pub enum FetchError {
    /// A link could not be turned into an absolute URL
    #[error("cannot resolve link '{link}': {reason}")]
    InvalidUrl {
        /// The link as found on the listing page
        link: String,
        /// Why resolution failed
        reason: String,
    },

    /// Connection, timeout or body decoding failure
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The HTTP client itself could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Failure to enumerate data files from the listing page
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The listing page could not be fetched
    #[error("failed to fetch listing page {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    /// The listing page no longer contains the link container
    #[error("listing page {url} has no element matching '{selector}'")]
    ContainerNotFound { url: String, selector: String },

    /// A configured CSS selector does not parse
    #[error("invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// A data file that is not well-formed day/record markup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    /// Low-level syntax error reported by the XML reader
    #[error("malformed XML at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    /// Attribute list could not be read
    #[error("bad attribute on <{element}>: {message}")]
    Attribute { element: String, message: String },

    /// Element or attribute name that is not a valid XML name
    #[error("invalid name '{name}' at byte {position}")]
    InvalidName { name: String, position: u64 },

    /// Document contains no element at all
    #[error("document has no root element")]
    NoRootElement,

    /// A second top-level element follows the root
    #[error("unexpected second root element <{element}>")]
    MultipleRoots { element: String },

    /// Character data outside the root element
    #[error("text outside the root element at byte {position}")]
    TextOutsideRoot { position: u64 },

    /// Input ended while elements were still open
    #[error("document ends inside <{element}>")]
    Unclosed { element: String },
}

/// Failure to write (or read back) the dataset file
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Destination directory is missing
    #[error("destination directory {} does not exist", .path.display())]
    MissingDirectory { path: PathBuf },

    /// Destination exists but is a file
    #[error("destination {} is not a directory", .path.display())]
    NotADirectory { path: PathBuf },

    /// Creating, writing or renaming the output failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Parquet encoding or decoding failed
    #[error("parquet error on {}: {source}", .path.display())]
    Parquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },

    /// Building or reading an Arrow record batch failed
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    /// CSV encoding failed
    #[error("CSV error on {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Parquet cannot store a table without columns
    #[error("cannot write {}: dataset has no columns", .path.display())]
    NoColumns { path: PathBuf },

    /// A file read back contains a column type the dataset cannot hold
    #[error("column '{column}' has unsupported type {data_type}")]
    UnsupportedColumn { column: String, data_type: String },
}
