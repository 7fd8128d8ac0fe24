// src/ingest/mod.rs
pub mod normalize;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::error::FetchError;
use crate::ingest::normalize::Normalizer;
use crate::ingest::types::{Posting, RawRecord, SourceFetcher};
use crate::store::SeenStore;

/// One-time metrics registration (so series show up in the exposition).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("finder_records_total", "Raw records returned by fetchers.");
        describe_counter!(
            "finder_skipped_total",
            "Records dropped because no stable key could be derived."
        );
        describe_counter!(
            "finder_duplicates_total",
            "Postings suppressed as already seen or repeated within a run."
        );
        describe_counter!("finder_new_total", "Net-new postings found.");
        describe_counter!(
            "finder_fetch_errors_total",
            "Fetcher failures, including timeouts."
        );
        describe_counter!("finder_notified_total", "Postings delivered.");
        describe_counter!("finder_delivery_errors_total", "Failed deliveries.");
        describe_counter!(
            "finder_commit_failures_total",
            "Seen-store commits that failed after delivery."
        );
        describe_counter!("finder_scheduled_runs_total", "Passes started by the scheduler.");
        describe_histogram!("finder_fetch_ms", "Fetcher wall time in milliseconds.");
        describe_gauge!("finder_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

/// Outcome of one aggregation pass.
#[derive(Debug, Default)]
pub struct AggregateResult {
    /// Fetcher order, then yield order.
    pub new_postings: Vec<Posting>,
    /// One entry per failed source, in fetcher order.
    pub errors_per_source: Vec<(String, FetchError)>,
    pub records_total: usize,
    pub skipped_records: usize,
    pub duplicates: usize,
}

impl AggregateResult {
    pub fn failed_sources(&self) -> Vec<&str> {
        self.errors_per_source
            .iter()
            .map(|(s, _)| s.as_str())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    normalizer: Normalizer,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(normalizer: Normalizer, timeout: Duration) -> Self {
        Self {
            normalizer,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fan out to every fetcher, normalize, and keep postings that are neither
    /// in `seen` nor already produced earlier in this pass. Never stages.
    pub async fn run(
        &self,
        fetchers: &[Box<dyn SourceFetcher>],
        seen: &SeenStore,
    ) -> AggregateResult {
        ensure_metrics_described();

        // Polled together; a failure or timeout in one bucket leaves the others intact.
        let buckets = join_all(
            fetchers
                .iter()
                .map(|f| fetch_bucket(f.as_ref(), self.timeout)),
        )
        .await;

        let now = chrono::Utc::now();
        let mut out = AggregateResult::default();
        let mut in_run: HashSet<String> = HashSet::new();

        for (fetcher, bucket) in fetchers.iter().zip(buckets) {
            let source = fetcher.name();
            let records = match bucket {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(target: "ingest", error = %e, source, "fetcher failed");
                    counter!("finder_fetch_errors_total", "source" => source.to_string())
                        .increment(1);
                    out.errors_per_source.push((source.to_string(), e));
                    continue;
                }
            };

            out.records_total += records.len();
            counter!("finder_records_total", "source" => source.to_string())
                .increment(records.len() as u64);

            let mut fresh = 0usize;
            for raw in &records {
                let posting = match self.normalizer.normalize(raw, source, now) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::debug!(target: "ingest", error = %e, "record skipped");
                        out.skipped_records += 1;
                        continue;
                    }
                };

                if seen.contains(&posting.identity_key)
                    || !in_run.insert(posting.identity_key.clone())
                {
                    out.duplicates += 1;
                    continue;
                }
                fresh += 1;
                out.new_postings.push(posting);
            }

            tracing::info!(
                target: "ingest",
                source,
                records = records.len(),
                new = fresh,
                "source processed"
            );
        }

        counter!("finder_skipped_total").increment(out.skipped_records as u64);
        counter!("finder_duplicates_total").increment(out.duplicates as u64);
        counter!("finder_new_total").increment(out.new_postings.len() as u64);

        out
    }
}

async fn fetch_bucket(
    fetcher: &dyn SourceFetcher,
    timeout: Duration,
) -> Result<Vec<RawRecord>, FetchError> {
    let t0 = Instant::now();
    let res = match tokio::time::timeout(timeout, fetcher.fetch()).await {
        Ok(r) => r,
        Err(_) => Err(FetchError::Timeout(timeout)),
    };
    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("finder_fetch_ms", "source" => fetcher.name().to_string()).record(ms);
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::providers::StaticFetcher;
    use crate::store::MemoryBackend;

    fn raw(title: &str, url: &str) -> RawRecord {
        RawRecord {
            title: Some(title.into()),
            company: Some("Acme".into()),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    fn aggregator() -> Aggregator {
        Aggregator::new(
            Normalizer::from_param_names(&["utm_*"]),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn same_fetcher_repeating_a_url_yields_one_posting() {
        let fetchers: Vec<Box<dyn SourceFetcher>> = vec![Box::new(StaticFetcher::new(
            "Board",
            vec![
                raw("A", "https://acme.com/1"),
                raw("A again", "https://acme.com/1?utm_campaign=z"),
                raw("B", "https://acme.com/2"),
            ],
        ))];
        let mut store = SeenStore::new(MemoryBackend::new());
        store.load().await.unwrap();

        let res = aggregator().run(&fetchers, &store).await;
        assert_eq!(res.new_postings.len(), 2);
        assert_eq!(res.new_postings[0].title, "A");
        assert_eq!(res.duplicates, 1);
        assert_eq!(res.records_total, 3);
    }

    #[tokio::test]
    async fn records_without_url_and_title_are_skipped() {
        let fetchers: Vec<Box<dyn SourceFetcher>> = vec![Box::new(StaticFetcher::new(
            "Board",
            vec![
                RawRecord {
                    company: Some("Acme".into()),
                    ..Default::default()
                },
                raw("A", "https://acme.com/1"),
            ],
        ))];
        let mut store = SeenStore::new(MemoryBackend::new());
        store.load().await.unwrap();

        let res = aggregator().run(&fetchers, &store).await;
        assert_eq!(res.new_postings.len(), 1);
        assert_eq!(res.skipped_records, 1);
    }
}
