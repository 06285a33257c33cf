//! # SQLite Key-Value Store
//!
//! A [`KeyValueStore`] backed by a single `kv_store` table. Expiry is stored as Unix
//! milliseconds; expired rows read as absent and are removed on access.

use super::sql;
use crate::{
    context::{Clock, KeyValueStore, SystemClock},
    errors::ProviderError,
};
use async_trait::async_trait;
use chrono::Duration;
use std::fmt::{self, Debug};
use std::sync::Arc;
use tracing::debug;
use turso::{params, Connection, Database, Value as TursoValue};

#[derive(Clone)]
pub struct SqliteKvStore {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl SqliteKvStore {
    /// Opens (or creates) the store at `db_path` and ensures its table exists.
    pub async fn open(db_path: &str) -> Result<Self, ProviderError> {
        let db = turso::Builder::new_local(db_path)
            .build()
            .await
            .map_err(|e| ProviderError::StorageConnection(e.to_string()))?;
        let store = Self::from_database(db);
        store.initialize_schema().await?;
        Ok(store)
    }

    /// Wraps an existing database. Call [`Self::initialize_schema`] before use.
    pub fn from_database(db: Database) -> Self {
        Self {
            db,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Ensures that the store's table exists.
    /// This function is idempotent and safe to call on every application startup.
    pub async fn initialize_schema(&self) -> Result<(), ProviderError> {
        let conn = self.connect()?;
        for statement in sql::ALL_TABLE_CREATION_SQL {
            conn.execute(statement, ())
                .await
                .map_err(|e| ProviderError::StorageOperationFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn connect(&self) -> Result<Connection, ProviderError> {
        self.db
            .connect()
            .map_err(|e| ProviderError::StorageConnection(e.to_string()))
    }

    /// Returns the value and its expiry (Unix millis) if the key is live.
    async fn live_row(&self, key: &str) -> Result<Option<(String, i64)>, ProviderError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(sql::KV_GET, params![key.to_string()])
            .await
            .map_err(|e| ProviderError::StorageOperationFailed(e.to_string()))?;

        let row = match rows
            .next()
            .await
            .map_err(|e| ProviderError::StorageOperationFailed(e.to_string()))?
        {
            Some(row) => row,
            None => return Ok(None),
        };

        let value = match row.get_value(0) {
            Ok(TursoValue::Text(value)) => value,
            _ => {
                return Err(ProviderError::StorageOperationFailed(format!(
                    "kv_store value for '{key}' is not text"
                )))
            }
        };
        let expires_at = match row.get_value(1) {
            Ok(TursoValue::Integer(millis)) => millis,
            _ => 0,
        };
        drop(rows);

        let now = self.clock.now().timestamp_millis();
        if expires_at <= now {
            debug!(key = %key, "Evicting expired kv_store entry.");
            conn.execute(sql::KV_EVICT_EXPIRED, params![key.to_string(), now])
                .await
                .map_err(|e| ProviderError::StorageOperationFailed(e.to_string()))?;
            return Ok(None);
        }
        Ok(Some((value, expires_at)))
    }
}

impl Debug for SqliteKvStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteKvStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ProviderError> {
        Ok(self.live_row(key).await?.map(|(value, _)| value))
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), ProviderError> {
        let expires_at = (self.clock.now() + ttl).timestamp_millis();
        let conn = self.connect()?;
        conn.execute(sql::KV_UPSERT, params![key.to_string(), value, expires_at])
            .await
            .map_err(|e| ProviderError::StorageOperationFailed(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ProviderError> {
        let conn = self.connect()?;
        conn.execute(sql::KV_DELETE, params![key.to_string()])
            .await
            .map_err(|e| ProviderError::StorageOperationFailed(e.to_string()))?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, ProviderError> {
        let now = self.clock.now().timestamp_millis();
        Ok(self
            .live_row(key)
            .await?
            .map(|(_, expires_at)| Duration::milliseconds(expires_at - now)))
    }
}
