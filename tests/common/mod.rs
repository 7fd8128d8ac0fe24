// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use internship_finder::ingest::providers::StaticFetcher;
use internship_finder::{
    DeliveryError, FetchError, Normalizer, Notifier, Posting, RawRecord, RunSettings,
    SourceFetcher,
};
use parking_lot::Mutex;

pub fn raw(title: &str, company: &str, url: &str) -> RawRecord {
    RawRecord {
        title: Some(title.to_string()),
        company: Some(company.to_string()),
        url: Some(url.to_string()),
        ..Default::default()
    }
}

pub fn fixed(name: &str, records: Vec<RawRecord>) -> Box<dyn SourceFetcher> {
    Box::new(StaticFetcher::new(name, records))
}

pub fn settings() -> RunSettings {
    RunSettings::new(
        Normalizer::from_param_names(&["utm_*", "ref", "fbclid"]),
        Duration::from_secs(2),
    )
}

/// Always fails with an upstream status.
pub struct FailingFetcher(pub &'static str);

#[async_trait::async_trait]
impl SourceFetcher for FailingFetcher {
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        Err(FetchError::Status { status: 503 })
    }

    fn name(&self) -> &str {
        self.0
    }
}

/// Sleeps before answering; pair with a short timeout.
pub struct SlowFetcher {
    pub name: &'static str,
    pub delay: Duration,
    pub records: Vec<RawRecord>,
}

#[async_trait::async_trait]
impl SourceFetcher for SlowFetcher {
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.records.clone())
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Records every delivered posting; keys in `failing` are rejected.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Posting>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    idle_calls: Arc<Mutex<usize>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, key: &str) {
        self.failing.lock().insert(key.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
    }

    pub fn sent_keys(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|p| p.identity_key.clone())
            .collect()
    }

    pub fn sent(&self) -> Vec<Posting> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    pub fn idle_calls(&self) -> usize {
        *self.idle_calls.lock()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, posting: &Posting) -> Result<(), DeliveryError> {
        if self.failing.lock().contains(&posting.identity_key) {
            return Err(DeliveryError::Rejected {
                status: 500,
                body: "boom".into(),
            });
        }
        self.sent.lock().push(posting.clone());
        Ok(())
    }

    async fn notify_idle(&self) -> Result<(), DeliveryError> {
        *self.idle_calls.lock() += 1;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Sleeps `delay` before delivering the keys in `slow`; others go through at once.
/// `budget` is reported as the transport's own retry budget.
#[derive(Clone, Default)]
pub struct SlowNotifier {
    pub delay: Duration,
    pub slow: HashSet<String>,
    pub slow_idle: bool,
    pub budget: Option<Duration>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl SlowNotifier {
    pub fn new(delay: Duration, slow: &[&str]) -> Self {
        Self {
            delay,
            slow: slow.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn sent_keys(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for SlowNotifier {
    async fn notify(&self, posting: &Posting) -> Result<(), DeliveryError> {
        if self.slow.contains(&posting.identity_key) {
            tokio::time::sleep(self.delay).await;
        }
        self.sent.lock().push(posting.identity_key.clone());
        Ok(())
    }

    async fn notify_idle(&self) -> Result<(), DeliveryError> {
        if self.slow_idle {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }

    fn delivery_budget(&self) -> Option<Duration> {
        self.budget
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}
