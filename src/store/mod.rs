// src/store/mod.rs
//! Persisted set of identity keys that were already notified.
//!
//! Lifecycle per run: `load` once, `contains` while aggregating, `stage` after
//! each confirmed delivery, `commit` once at the end. Staged keys stay
//! invisible to `contains` until the commit succeeds; a failed commit drops
//! them so the next run re-offers those postings.

pub mod file;
pub mod memory;

use std::collections::HashSet;

use crate::error::PersistenceError;

pub use file::JsonFileBackend;
pub use memory::MemoryBackend;

#[async_trait::async_trait]
pub trait SeenBackend: Send + Sync {
    /// `Ok(None)` means nothing has been persisted yet.
    async fn load_keys(&self) -> Result<Option<HashSet<String>>, PersistenceError>;

    /// Replace the persisted set in a single atomic step.
    async fn store_keys(&self, keys: &HashSet<String>) -> Result<(), PersistenceError>;

    fn describe(&self) -> String;
}

pub struct SeenStore {
    backend: Box<dyn SeenBackend>,
    seen: HashSet<String>,
    staged: HashSet<String>,
}

impl SeenStore {
    pub fn new<B: SeenBackend + 'static>(backend: B) -> Self {
        Self::with_backend(Box::new(backend))
    }

    pub fn with_backend(backend: Box<dyn SeenBackend>) -> Self {
        Self {
            backend,
            seen: HashSet::new(),
            staged: HashSet::new(),
        }
    }

    /// Read the persisted keys. A cold start yields an empty set.
    pub async fn load(&mut self) -> Result<&HashSet<String>, PersistenceError> {
        match self.backend.load_keys().await? {
            Some(keys) => {
                tracing::info!(target: "store", backend = %self.backend.describe(), keys = keys.len(), "seen keys loaded");
                self.seen = keys;
            }
            None => {
                tracing::info!(target: "store", backend = %self.backend.describe(), "no persisted seen keys, cold start");
                self.seen.clear();
            }
        }
        self.staged.clear();
        Ok(&self.seen)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn stage(&mut self, key: impl Into<String>) {
        self.staged.insert(key.into());
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Persist loaded ∪ staged. Returns how many keys were new.
    ///
    /// Staged keys are consumed either way: on error they are dropped, not
    /// retried, and the caller must treat this run's deliveries as unrecorded.
    pub async fn commit(&mut self) -> Result<usize, PersistenceError> {
        let staged = std::mem::take(&mut self.staged);
        let fresh: Vec<String> = staged
            .into_iter()
            .filter(|k| !self.seen.contains(k))
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let mut merged = self.seen.clone();
        merged.extend(fresh.iter().cloned());

        match self.backend.store_keys(&merged).await {
            Ok(()) => {
                self.seen = merged;
                tracing::info!(target: "store", added = fresh.len(), total = self.seen.len(), "seen keys committed");
                Ok(fresh.len())
            }
            Err(e) => {
                tracing::error!(
                    target: "store",
                    error = %e,
                    dropped = fresh.len(),
                    "commit failed; delivered postings will be notified again next run"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn staged_keys_are_invisible_until_commit() {
        let mut store = SeenStore::new(MemoryBackend::new());
        store.load().await.unwrap();

        store.stage("https://acme.com/jobs/1");
        assert!(!store.contains("https://acme.com/jobs/1"));
        assert_eq!(store.staged_len(), 1);

        assert_eq!(store.commit().await.unwrap(), 1);
        assert!(store.contains("https://acme.com/jobs/1"));
        assert_eq!(store.staged_len(), 0);
    }

    #[tokio::test]
    async fn failed_commit_drops_staged_keys() {
        let backend = MemoryBackend::new();
        let mut store = SeenStore::new(backend.clone());
        store.load().await.unwrap();

        backend.set_fail_stores(true);
        store.stage("k1");
        assert!(store.commit().await.is_err());
        assert!(!store.contains("k1"));
        assert_eq!(store.staged_len(), 0);
        assert!(backend.snapshot().is_none());
    }

    #[tokio::test]
    async fn commit_without_new_keys_skips_the_write() {
        let backend = MemoryBackend::with_keys(["k1"]);
        let mut store = SeenStore::new(backend.clone());
        store.load().await.unwrap();

        store.stage("k1");
        assert_eq!(store.commit().await.unwrap(), 0);
        assert_eq!(backend.store_calls(), 0);
    }
}
