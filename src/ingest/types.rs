// src/ingest/types.rs
use chrono::{DateTime, Utc};

use crate::error::FetchError;

/// A listing as a job board hands it over, before normalization.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RawRecord {
    pub title: Option<String>,
    pub company: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub posted_at: Option<String>, // raw date string, source-specific format
    pub location: Option<String>,
}

/// Canonical internship listing. Lives for one pipeline pass only.
#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
pub struct Posting {
    pub identity_key: String,
    pub title: String,
    pub company: String,
    pub url: Option<String>,
    pub source_name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub discovered_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync {
    /// All records the source currently lists.
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError>;
    fn name(&self) -> &str;
}
