//! # Conversation Contexts
//!
//! This module owns the per-conversation history that feeds follow-up questions.
//! A [`ConversationContext`] lives in an external [`KeyValueStore`] as a single JSON
//! record under `context:<id>`. Every write resets its expiry to the full TTL, so a
//! conversation stays alive for as long as it keeps being used.
//!
//! Appends are read-modify-write on the whole record. Two writers racing on the same
//! context resolve as last-write-wins.

pub mod clock;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{InMemoryKvStore, KeyValueStore};

use crate::errors::{PipelineError, ProviderError};
use crate::providers::db::QueryRows;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// The default sliding expiry of a conversation.
pub const DEFAULT_CONTEXT_TTL_SECS: u64 = 24 * 60 * 60;

const KEY_PREFIX: &str = "context:";

/// What is remembered about a query's outcome. Never holds row data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub row_count: usize,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ResultSummary {
    pub fn from_rows(rows: &QueryRows) -> Self {
        Self {
            row_count: rows.rows.len(),
            columns: rows.columns.clone(),
            note: None,
        }
    }

    pub fn failure(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::default()
        }
    }
}

/// One question/answer cycle. `sql` is only set for statements that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub sql: Option<String>,
    pub result_summary: ResultSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub id: String,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ConversationContext {
    /// The last `limit` messages, oldest first.
    pub fn recent(&self, limit: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }
}

/// The adapter between the pipeline and the key-value store holding contexts.
#[derive(Debug, Clone)]
pub struct ContextManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ContextManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            ttl: ttl_from_secs(DEFAULT_CONTEXT_TTL_SECS),
        }
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl = ttl_from_secs(ttl_secs);
        self
    }

    /// Uses `clock` for message and context timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Creates an empty context and returns its id.
    pub async fn create(
        &self,
        tenant_id: &str,
        metadata: HashMap<String, Value>,
    ) -> Result<String, PipelineError> {
        let now = self.clock.now();
        let context = ConversationContext {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            metadata,
        };
        self.save(&context).await?;
        info!(context_id = %context.id, tenant_id = %tenant_id, "[context] created");
        Ok(context.id)
    }

    pub async fn get(&self, context_id: &str) -> Result<ConversationContext, PipelineError> {
        let raw = self
            .store
            .get(&key(context_id))
            .await
            .map_err(PipelineError::ContextStore)?
            .ok_or_else(|| PipelineError::ContextNotFound(context_id.to_string()))?;

        serde_json::from_str(&raw)
            .map_err(|e| PipelineError::ContextStore(ProviderError::JsonSerialization(e)))
    }

    /// Appends one message and slides the expiry forward to the full TTL.
    pub async fn append(
        &self,
        context_id: &str,
        question: &str,
        sql: Option<&str>,
        result_summary: ResultSummary,
    ) -> Result<(), PipelineError> {
        let mut context = self.get(context_id).await?;
        let now = self.clock.now();
        context.messages.push(Message {
            timestamp: now,
            question: question.to_string(),
            sql: sql.map(str::to_string),
            result_summary,
        });
        context.updated_at = now;
        self.save(&context).await?;
        debug!(
            context_id = %context_id,
            messages = context.messages.len(),
            "[context] appended message"
        );
        Ok(())
    }

    /// Deletes a context. Deleting an unknown id succeeds.
    pub async fn delete(&self, context_id: &str) -> Result<(), PipelineError> {
        self.store
            .delete(&key(context_id))
            .await
            .map_err(PipelineError::ContextStore)?;
        info!(context_id = %context_id, "[context] deleted");
        Ok(())
    }

    /// The remaining lifetime of a context, `None` once it is gone.
    pub async fn remaining_ttl(&self, context_id: &str) -> Result<Option<Duration>, PipelineError> {
        self.store
            .ttl(&key(context_id))
            .await
            .map_err(PipelineError::ContextStore)
    }

    async fn save(&self, context: &ConversationContext) -> Result<(), PipelineError> {
        let value = serde_json::to_string(context)
            .map_err(|e| PipelineError::ContextStore(ProviderError::JsonSerialization(e)))?;
        self.store
            .set_with_ttl(&key(&context.id), value, self.ttl)
            .await
            .map_err(PipelineError::ContextStore)
    }
}

fn key(context_id: &str) -> String {
    format!("{KEY_PREFIX}{context_id}")
}

fn ttl_from_secs(secs: u64) -> Duration {
    // Ten years is far beyond any sensible conversation lifetime.
    const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;
    Duration::seconds(secs.min(MAX_TTL_SECS) as i64)
}
