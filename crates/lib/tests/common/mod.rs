#![allow(dead_code)]
//! # Common Test Utilities
//!
//! This module provides shared utilities for testing, such as mock collaborators
//! and a sample schema, to ensure tests are isolated and repeatable.

use async_trait::async_trait;
use dotenvy::dotenv;
use nlsql::schema::{ColumnSchema, ForeignKey, IndexSchema, SchemaModel, TableSchema};
use nlsql::{
    AiProvider, ModelRequest, ProviderError, QueryExecutor, QueryRows, SchemaProvider,
    ValidatedSql,
};
use serde_json::json;
use std::sync::{Arc, Once, RwLock};

static INIT: Once = Once::new();

/// Initializes the tracing subscriber and loads .env for tests.
pub fn setup_tracing() {
    INIT.call_once(|| {
        dotenv().ok();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

// --- Mock AI Provider ---

/// Returns scripted responses in order and records every request it receives.
#[derive(Clone, Debug)]
pub struct MockAiProvider {
    pub call_history: Arc<RwLock<Vec<ModelRequest>>>,
    pub responses: Arc<RwLock<Vec<Result<String, String>>>>,
}

impl MockAiProvider {
    pub fn new(responses: Vec<&str>) -> Self {
        Self::scripted(responses.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    /// `Err` entries are surfaced as provider API errors.
    pub fn scripted(responses: Vec<Result<String, String>>) -> Self {
        Self {
            call_history: Arc::new(RwLock::new(Vec::new())),
            responses: Arc::new(RwLock::new(responses.into_iter().rev().collect())),
        }
    }

    pub fn calls(&self) -> Vec<ModelRequest> {
        self.call_history.read().unwrap().clone()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(&self, request: &ModelRequest) -> Result<String, ProviderError> {
        self.call_history.write().unwrap().push(request.clone());

        match self.responses.write().unwrap().pop() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ProviderError::AiApi(message)),
            None => Ok("Default mock response".to_string()),
        }
    }
}

// --- Mock Schema Provider ---

#[derive(Clone, Debug)]
pub struct MockSchemaProvider {
    pub schema: Option<SchemaModel>,
}

impl MockSchemaProvider {
    pub fn new(schema: SchemaModel) -> Self {
        Self {
            schema: Some(schema),
        }
    }

    /// A provider whose introspection always fails.
    pub fn failing() -> Self {
        Self { schema: None }
    }
}

#[async_trait]
impl SchemaProvider for MockSchemaProvider {
    fn name(&self) -> &str {
        "MockDB"
    }

    async fn introspect(&self) -> Result<SchemaModel, ProviderError> {
        self.schema
            .clone()
            .ok_or_else(|| ProviderError::StorageConnection("database is offline".to_string()))
    }
}

// --- Mock Query Executor ---

/// Returns fixed rows (or fails) and records every statement it is asked to run.
#[derive(Clone, Debug)]
pub struct MockExecutor {
    pub executed: Arc<RwLock<Vec<String>>>,
    pub result: Result<QueryRows, String>,
}

impl MockExecutor {
    pub fn returning(rows: QueryRows) -> Self {
        Self {
            executed: Arc::new(RwLock::new(Vec::new())),
            result: Ok(rows),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            executed: Arc::new(RwLock::new(Vec::new())),
            result: Err(message.to_string()),
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.read().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn execute(&self, sql: &ValidatedSql) -> Result<QueryRows, ProviderError> {
        self.executed.write().unwrap().push(sql.as_str().to_string());
        self.result
            .clone()
            .map_err(ProviderError::StorageOperationFailed)
    }
}

// --- Fixtures ---

/// A two-table sales schema with keys and an index.
pub fn sample_schema() -> SchemaModel {
    let mut customers = TableSchema::new(
        "customers",
        vec![
            ColumnSchema::new("id", "INTEGER").not_null(),
            ColumnSchema::new("name", "TEXT").not_null(),
            ColumnSchema::new("region", "TEXT"),
        ],
    );
    customers.primary_key = vec!["id".to_string()];

    let mut orders = TableSchema::new(
        "orders",
        vec![
            ColumnSchema::new("id", "INTEGER").not_null(),
            ColumnSchema::new("customer_id", "INTEGER").not_null(),
            ColumnSchema::new("order_date", "TEXT").not_null(),
            ColumnSchema::new("amount", "REAL").with_default("0"),
        ],
    );
    orders.primary_key = vec!["id".to_string()];
    orders.foreign_keys = vec![ForeignKey {
        columns: vec!["customer_id".to_string()],
        referenced_table: "customers".to_string(),
        referenced_columns: vec!["id".to_string()],
    }];
    orders.indexes = vec![IndexSchema {
        name: "idx_orders_date".to_string(),
        columns: vec!["order_date".to_string()],
        unique: false,
    }];

    SchemaModel::new(vec![customers, orders])
}

/// Rows shaped like a per-region revenue query.
pub fn sample_rows() -> QueryRows {
    QueryRows::new(
        vec!["region".to_string(), "total".to_string()],
        vec![
            vec![json!("north"), json!(120.5)],
            vec![json!("south"), json!(80)],
        ],
    )
}
