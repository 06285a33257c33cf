//! # SQLite Provider Tests
//!
//! This file contains tests for the `SqliteProvider` as a schema source and as a query
//! executor. Each test uses an in-memory database to keep it fast and isolated.

mod common;

use crate::common::setup_tracing;
use nlsql::providers::db::sqlite::SqliteProvider;
use nlsql::schema::{encode, ColumnSchema};
use nlsql::{QueryExecutor, SchemaProvider, SecurityValidator};
use serde_json::json;

const SETUP_SQL: &str = "
    CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, country TEXT DEFAULT 'JP');
    CREATE TABLE orders (order_id INTEGER NOT NULL, user_id INTEGER NOT NULL, amount REAL, PRIMARY KEY (order_id));
    INSERT INTO users (id, name, country) VALUES (1, 'Alice', 'JP');
    INSERT INTO users (id, name, country) VALUES (2, 'Bob', 'TH');
    INSERT INTO orders (order_id, user_id, amount) VALUES (10, 1, 25.5);
    INSERT INTO orders (order_id, user_id, amount) VALUES (11, 1, 14.5);
    INSERT INTO orders (order_id, user_id, amount) VALUES (12, 2, 8.0);
";

async fn provider() -> SqliteProvider {
    setup_tracing();
    let provider = SqliteProvider::new(":memory:")
        .await
        .expect("Failed to create SqliteProvider");
    provider
        .initialize_with_data(SETUP_SQL)
        .await
        .expect("Failed to initialize database with test data");
    provider
}

#[tokio::test]
async fn test_introspects_tables_in_name_order() {
    let provider = provider().await;

    let schema = provider.introspect().await.expect("introspection failed");

    let names: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["orders", "users"]);
    assert_eq!(provider.name(), "SQLite");
}

#[tokio::test]
async fn test_introspects_columns_and_primary_key() {
    let provider = provider().await;

    let schema = provider.introspect().await.unwrap();
    let users = schema.table("users").expect("users table is present");

    assert_eq!(users.primary_key, vec!["id"]);
    assert_eq!(users.columns.len(), 3);
    assert_eq!(users.columns[0], ColumnSchema::new("id", "INTEGER"));
    assert_eq!(users.columns[1], ColumnSchema::new("name", "TEXT").not_null());
    assert_eq!(users.columns[2].name, "country");
    assert_eq!(users.columns[2].default.as_deref(), Some("'JP'"));

    let orders = schema.table("orders").unwrap();
    assert_eq!(orders.primary_key, vec!["order_id"]);
    assert!(!orders.columns[1].nullable);
}

#[tokio::test]
async fn test_encoded_schema_mentions_every_table() {
    let provider = provider().await;

    let schema = provider.introspect().await.unwrap();
    let text = encode(&schema, 512);

    assert!(text.starts_with("TABLE: orders"));
    assert!(text.contains("TABLE: users"));
    assert!(text.contains("  - name (TEXT) NOT NULL"));
}

#[tokio::test]
async fn test_executes_validated_query() {
    let provider = provider().await;
    let sql = SecurityValidator::default()
        .validate("SELECT u.name, SUM(o.amount) AS total FROM users u JOIN orders o ON o.user_id = u.id GROUP BY u.name ORDER BY u.name")
        .expect("query should pass validation");

    let rows = provider.execute(&sql).await.expect("Failed to execute query");

    assert_eq!(rows.columns, vec!["name", "total"]);
    assert_eq!(
        rows.to_records(),
        vec![
            json!({"name": "Alice", "total": 40.0}),
            json!({"name": "Bob", "total": 8.0}),
        ]
    );
}

#[tokio::test]
async fn test_empty_result_keeps_columns() {
    let provider = provider().await;
    let sql = SecurityValidator::default()
        .validate("SELECT id, name FROM users WHERE id > 100")
        .unwrap();

    let rows = provider.execute(&sql).await.unwrap();

    assert!(rows.is_empty());
    assert_eq!(rows.columns, vec!["id", "name"]);
}

#[tokio::test]
async fn test_execution_error_is_surfaced() {
    let provider = provider().await;
    let sql = SecurityValidator::default()
        .validate("SELECT missing_column FROM users")
        .unwrap();

    assert!(provider.execute(&sql).await.is_err());
}

/// Verifies that each in-memory provider instance is isolated from the others.
#[tokio::test]
async fn test_sqlite_in_memory_is_isolated() {
    let provider1 = provider().await;
    let provider2 = SqliteProvider::new(":memory:")
        .await
        .expect("Failed to create provider 2");

    assert_eq!(provider1.introspect().await.unwrap().tables.len(), 2);
    assert!(provider2.introspect().await.unwrap().is_empty());
}
