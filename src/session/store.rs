use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::errors::{AppError, AppResult};

/// Key/value backend holding session state.
///
/// Implementations must make `take` atomic: two concurrent calls for the same
/// key may not both observe the value.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> AppResult<()>;

    /// Overwrites `key` only if it still exists. Returns whether anything was written.
    async fn replace(&self, key: &str, value: String, ttl: Duration) -> AppResult<bool>;

    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Read and delete in one step.
    async fn take(&self, key: &str) -> AppResult<Option<String>>;

    async fn delete(&self, key: &str) -> AppResult<()>;

    async fn ping(&self) -> AppResult<()>;
}

/// In-process backend for tests and single-instance development.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, (String, Instant)>) -> T) -> AppResult<T> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::store_unavailable("memory session store lock poisoned"))?;
        let now = Instant::now();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        Ok(f(&mut entries))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> AppResult<()> {
        let expires_at = Instant::now() + ttl;
        self.with_entries(|entries| {
            entries.insert(key.to_string(), (value, expires_at));
        })
    }

    async fn replace(&self, key: &str, value: String, ttl: Duration) -> AppResult<bool> {
        let expires_at = Instant::now() + ttl;
        self.with_entries(|entries| match entries.get_mut(key) {
            Some(entry) => {
                *entry = (value, expires_at);
                true
            }
            None => false,
        })
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.with_entries(|entries| entries.get(key).map(|(value, _)| value.clone()))
    }

    async fn take(&self, key: &str) -> AppResult<Option<String>> {
        self.with_entries(|entries| entries.remove(key).map(|(value, _)| value))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }

    async fn ping(&self) -> AppResult<()> {
        self.with_entries(|_| ())
    }
}
