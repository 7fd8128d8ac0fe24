// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod runner;
pub mod store;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::error::{DeliveryError, FetchError, NormalizationError, PersistenceError};
pub use crate::ingest::normalize::{normalize_url, Normalizer, TrackingParams};
pub use crate::ingest::types::{Posting, RawRecord, SourceFetcher};
pub use crate::ingest::{AggregateResult, Aggregator};
pub use crate::notify::Notifier;
pub use crate::runner::{run_once, RunSettings, RunSummary};
pub use crate::store::{SeenBackend, SeenStore};
