use super::clock::{Clock, SystemClock};
use crate::errors::ProviderError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dyn_clone::DynClone;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A key-value store with per-key expiry.
///
/// Expired keys must behave exactly like absent ones. There is no atomic append:
/// callers read, modify and write back whole values.
#[async_trait]
pub trait KeyValueStore: Send + Sync + Debug + DynClone {
    async fn get(&self, key: &str) -> Result<Option<String>, ProviderError>;

    /// Stores `value` under `key`, replacing any previous value and resetting its expiry.
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration)
        -> Result<(), ProviderError>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), ProviderError>;

    /// Returns the remaining time to live of `key`, or `None` if it is absent or expired.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, ProviderError>;
}

dyn_clone::clone_trait_object!(KeyValueStore);

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// A process-local store. Clones share the same map.
#[derive(Debug, Clone)]
pub struct InMemoryKvStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Reads a live entry, evicting it if it has expired.
    async fn live_entry(&self, key: &str) -> Option<Entry> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        let mut entries = self.entries.write().await;
        // A writer may have refreshed the key between the two locks.
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ProviderError> {
        Ok(self.live_entry(key).await.map(|e| e.value))
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), ProviderError> {
        let expires_at = self.clock.now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ProviderError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, ProviderError> {
        let now = self.clock.now();
        Ok(self.live_entry(key).await.map(|e| e.expires_at - now))
    }
}
