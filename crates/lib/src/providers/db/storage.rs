use crate::errors::ProviderError;
use crate::schema::SchemaModel;
use crate::security::ValidatedSql;
use async_trait::async_trait;
use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;

/// A trait for reading live schema metadata from a database.
///
/// Implementations must not cache: the pipeline calls this on every request so that
/// the model always sees the current schema.
#[async_trait]
pub trait SchemaProvider: Send + Sync + DynClone + Debug {
    /// Returns the name of the backend (e.g., "SQLite").
    fn name(&self) -> &str;

    /// Reads every user table with its columns, keys and indexes.
    async fn introspect(&self) -> Result<SchemaModel, ProviderError>;
}

dyn_clone::clone_trait_object!(SchemaProvider);

/// A trait for executing statements that passed the security policy.
///
/// Taking a [`ValidatedSql`] rather than a string makes it impossible to execute
/// unchecked model output.
#[async_trait]
pub trait QueryExecutor: Send + Sync + DynClone + Debug {
    async fn execute(&self, sql: &ValidatedSql) -> Result<QueryRows, ProviderError>;
}

dyn_clone::clone_trait_object!(QueryExecutor);

/// Ordered rows of named columns, as returned by a [`QueryExecutor`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Converts each row to a `{column: value}` JSON object.
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let record: Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect();
                Value::Object(record)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_records_pairs_columns_with_values() {
        let rows = QueryRows::new(
            vec!["region".to_string(), "total".to_string()],
            vec![
                vec![json!("north"), json!(10)],
                vec![json!("south"), json!(null)],
            ],
        );
        assert_eq!(
            rows.to_records(),
            vec![
                json!({"region": "north", "total": 10}),
                json!({"region": "south", "total": null}),
            ]
        );
    }
}
