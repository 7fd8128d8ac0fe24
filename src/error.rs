// src/error.rs
//! Error taxonomy of the ingestion pipeline.
//!
//! Each error is scoped to the unit it belongs to (source, record, posting,
//! run) so a failure in one unit never aborts its siblings.

use std::time::Duration;

use thiserror::Error;

/// A source could not produce its records for this run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {status}")]
    Status { status: u16 },

    #[error("could not parse feed: {0}")]
    Parse(String),

    #[error("rate limited by upstream")]
    RateLimited,

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
}

/// A raw record carried too little data to derive a stable key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("record from {source_name} has neither url nor title")]
    MissingUrlAndTitle { source_name: String },
}

/// A single notification could not be delivered.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("transport failed: {0}")]
    Transport(String),

    #[error("endpoint rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("notifier is not configured: {0}")]
    NotConfigured(String),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// The seen-set could not be read or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("seen store io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("seen store data is corrupt: {0}")]
    Corrupt(String),

    #[error("seen store backend unavailable: {0}")]
    Unavailable(String),
}
