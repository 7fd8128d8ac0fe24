// src/store/memory.rs
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::SeenBackend;
use crate::error::PersistenceError;

/// In-process backend. Clones share state, so a caller can keep a handle
/// after moving one into a [`super::SeenStore`]. Failures can be injected.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    keys: Mutex<Option<HashSet<String>>>,
    fail_loads: AtomicBool,
    fail_stores: AtomicBool,
    store_calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::default();
        *backend.inner.keys.lock().expect("memory backend mutex poisoned") =
            Some(keys.into_iter().map(Into::into).collect());
        backend
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.inner.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_stores(&self, fail: bool) {
        self.inner.fail_stores.store(fail, Ordering::SeqCst);
    }

    /// Currently persisted keys; `None` if nothing was ever stored.
    pub fn snapshot(&self) -> Option<HashSet<String>> {
        self.inner
            .keys
            .lock()
            .expect("memory backend mutex poisoned")
            .clone()
    }

    pub fn store_calls(&self) -> usize {
        self.inner.store_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SeenBackend for MemoryBackend {
    async fn load_keys(&self) -> Result<Option<HashSet<String>>, PersistenceError> {
        if self.inner.fail_loads.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory backend load failure".into()));
        }
        Ok(self.snapshot())
    }

    async fn store_keys(&self, keys: &HashSet<String>) -> Result<(), PersistenceError> {
        self.inner.store_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_stores.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory backend store failure".into()));
        }
        *self.inner.keys.lock().expect("memory backend mutex poisoned") = Some(keys.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
