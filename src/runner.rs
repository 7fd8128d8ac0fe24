// src/runner.rs
//! One pipeline pass: load → aggregate → notify/stage → commit.

use std::time::Duration;

use metrics::{counter, gauge};

use crate::error::{DeliveryError, PersistenceError};
use crate::ingest::normalize::Normalizer;
use crate::ingest::types::SourceFetcher;
use crate::ingest::{ensure_metrics_described, Aggregator};
use crate::notify::Notifier;
use crate::store::SeenStore;

#[derive(Debug, Clone)]
pub struct RunSettings {
    aggregator: Aggregator,
    idle_summary: bool,
}

impl RunSettings {
    /// `timeout` bounds every fetch and every notify call. A notifier that
    /// retries internally gets at least its own `delivery_budget`.
    pub fn new(normalizer: Normalizer, timeout: Duration) -> Self {
        Self {
            aggregator: Aggregator::new(normalizer, timeout),
            idle_summary: false,
        }
    }

    pub fn with_idle_summary(mut self, enabled: bool) -> Self {
        self.idle_summary = enabled;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.aggregator.timeout()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub records: usize,
    pub new_postings: usize,
    pub notified: usize,
    pub delivery_failures: usize,
    pub skipped_records: usize,
    pub duplicates: usize,
    pub failed_sources: Vec<String>,
    /// Keys persisted by this run's commit.
    pub committed: usize,
    /// Set when the final commit failed; the run's deliveries were not recorded.
    pub commit_error: Option<String>,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.failed_sources.is_empty() && self.delivery_failures == 0 && self.commit_error.is_none()
    }
}

/// Run one pass.
///
/// Returns `Err` only when the seen store cannot be loaded; in that case
/// nothing is fetched or sent. A key is staged only after its posting was
/// delivered, so failed deliveries come back on the next run.
pub async fn run_once(
    fetchers: &[Box<dyn SourceFetcher>],
    seen: &mut SeenStore,
    notifier: &dyn Notifier,
    settings: &RunSettings,
) -> Result<RunSummary, PersistenceError> {
    ensure_metrics_described();

    if let Err(e) = seen.load().await {
        tracing::error!(target: "runner", error = %e, "seen store load failed, aborting run");
        return Err(e);
    }

    let agg = settings.aggregator.run(fetchers, seen).await;
    let mut summary = RunSummary {
        records: agg.records_total,
        new_postings: agg.new_postings.len(),
        skipped_records: agg.skipped_records,
        duplicates: agg.duplicates,
        failed_sources: agg
            .failed_sources()
            .into_iter()
            .map(str::to_string)
            .collect(),
        ..Default::default()
    };

    let timeout = delivery_bound(settings.timeout(), notifier);
    for posting in &agg.new_postings {
        let res = match tokio::time::timeout(timeout, notifier.notify(posting)).await {
            Ok(r) => r,
            Err(_) => Err(DeliveryError::Timeout(timeout)),
        };
        match res {
            Ok(()) => {
                seen.stage(posting.identity_key.clone());
                summary.notified += 1;
                counter!("finder_notified_total", "notifier" => notifier.name()).increment(1);
            }
            Err(e) => {
                summary.delivery_failures += 1;
                counter!("finder_delivery_errors_total", "notifier" => notifier.name())
                    .increment(1);
                tracing::warn!(
                    target: "runner",
                    key = %posting.identity_key,
                    notifier = notifier.name(),
                    error = %e,
                    "delivery failed, will retry next run"
                );
            }
        }
    }

    if agg.new_postings.is_empty() && settings.idle_summary {
        let res = match tokio::time::timeout(timeout, notifier.notify_idle()).await {
            Ok(r) => r,
            Err(_) => Err(DeliveryError::Timeout(timeout)),
        };
        if let Err(e) = res {
            tracing::warn!(target: "runner", error = %e, "idle summary not delivered");
        }
    }

    if seen.staged_len() > 0 {
        match seen.commit().await {
            Ok(n) => summary.committed = n,
            Err(e) => {
                counter!("finder_commit_failures_total").increment(1);
                summary.commit_error = Some(e.to_string());
            }
        }
    }

    gauge!("finder_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

    tracing::info!(
        target: "runner",
        records = summary.records,
        new = summary.new_postings,
        notified = summary.notified,
        delivery_failures = summary.delivery_failures,
        failed_sources = summary.failed_sources.len(),
        committed = summary.committed,
        "run finished"
    );

    Ok(summary)
}

/// Outer bound for one delivery: the run timeout, widened to the notifier's
/// own retry budget so a transport is never cancelled between attempts.
fn delivery_bound(run_timeout: Duration, notifier: &dyn Notifier) -> Duration {
    notifier
        .delivery_budget()
        .map_or(run_timeout, |budget| budget.max(run_timeout))
}
