#![doc = "plaza-traffic: scrape published plaza traffic counts into one columnar table."]

//! The crate is a one-shot batch pipeline:
//!
//! 1. [`download::discover_links`] reads the listing page and finds the data file links.
//! 2. [`download::fetch_payloads`] fetches and validates each file, skipping bad ones.
//! 3. [`preprocess::flatten`] turns each file's day groups and child records into rows.
//! 4. [`table::assemble`] aligns all rows into a typed [`table::Dataset`].
//! 5. A [`contract::Persister`] writes the dataset once, at the end.
//!
//! [`pipeline::run`] wires these together; [`cli::run`] is the binary's entry point.

pub mod cli;
pub mod config;
pub mod contract;
pub mod download;
pub mod error;
pub mod persist;
pub mod pipeline;
pub mod preprocess;
pub mod table;

pub use error::{Error, Result};
