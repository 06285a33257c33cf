//! # Conversation Context Tests
//!
//! These tests run the `ContextManager` against both reference key-value stores with a
//! manual clock, covering sliding expiry, idempotent deletion and not-found handling.

mod common;

use crate::common::setup_tracing;
use chrono::Duration;
use nlsql::context::{
    ContextManager, InMemoryKvStore, KeyValueStore, ManualClock, ResultSummary,
};
use nlsql::providers::db::sqlite::SqliteKvStore;
use nlsql::ErrorKind;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

const TTL_SECS: u64 = 60 * 60;

async fn stores(clock: &ManualClock) -> Vec<Arc<dyn KeyValueStore>> {
    let sqlite = SqliteKvStore::open(":memory:")
        .await
        .expect("Failed to open SQLite kv store")
        .with_clock(Arc::new(clock.clone()));
    vec![
        Arc::new(InMemoryKvStore::with_clock(Arc::new(clock.clone()))),
        Arc::new(sqlite),
    ]
}

fn manager(store: Arc<dyn KeyValueStore>, clock: &ManualClock) -> ContextManager {
    ContextManager::new(store)
        .with_ttl_secs(TTL_SECS)
        .with_clock(Arc::new(clock.clone()))
}

#[tokio::test]
async fn test_create_and_get() {
    setup_tracing();
    let clock = ManualClock::default();
    for store in stores(&clock).await {
        let contexts = manager(store, &clock);
        let metadata = HashMap::from([("source".to_string(), json!("cli"))]);

        let id = contexts.create("tenant-a", metadata.clone()).await.unwrap();
        let context = contexts.get(&id).await.unwrap();

        assert_eq!(context.id, id);
        assert_eq!(context.tenant_id, "tenant-a");
        assert_eq!(context.metadata, metadata);
        assert!(context.messages.is_empty());
        assert_eq!(context.created_at, clock_now(&clock));
    }
}

#[tokio::test]
async fn test_ids_are_unique() {
    let clock = ManualClock::default();
    let contexts = manager(Arc::new(InMemoryKvStore::with_clock(Arc::new(clock.clone()))), &clock);
    let a = contexts.create("t", HashMap::new()).await.unwrap();
    let b = contexts.create("t", HashMap::new()).await.unwrap();
    assert_ne!(a, b);
}

#[tokio::test]
async fn test_append_slides_expiry_forward() {
    setup_tracing();
    let clock = ManualClock::default();
    for store in stores(&clock).await {
        let contexts = manager(store, &clock);
        let id = contexts.create("tenant-a", HashMap::new()).await.unwrap();

        clock.advance(Duration::minutes(50));
        let remaining = contexts.remaining_ttl(&id).await.unwrap().unwrap();
        assert_eq!(remaining, Duration::minutes(10));

        contexts
            .append(&id, "How many orders?", Some("SELECT COUNT(*) FROM orders"), ResultSummary::default())
            .await
            .unwrap();
        let remaining = contexts.remaining_ttl(&id).await.unwrap().unwrap();
        assert_eq!(remaining, Duration::seconds(TTL_SECS as i64));

        // Without the append the context would be gone by now.
        clock.advance(Duration::minutes(30));
        let context = contexts.get(&id).await.unwrap();
        assert_eq!(context.messages.len(), 1);
        assert_eq!(context.updated_at, clock_now(&clock) - Duration::minutes(30));
    }
}

#[tokio::test]
async fn test_expired_context_is_not_found() {
    setup_tracing();
    let clock = ManualClock::default();
    for store in stores(&clock).await {
        let contexts = manager(store, &clock);
        let id = contexts.create("tenant-a", HashMap::new()).await.unwrap();

        clock.advance(Duration::seconds(TTL_SECS as i64 + 1));

        let err = contexts.get(&id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContextNotFound);
        assert_eq!(contexts.remaining_ttl(&id).await.unwrap(), None);

        let err = contexts
            .append(&id, "late question", None, ResultSummary::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContextNotFound);
    }
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    setup_tracing();
    let clock = ManualClock::default();
    for store in stores(&clock).await {
        let contexts = manager(store, &clock);
        let id = contexts.create("tenant-a", HashMap::new()).await.unwrap();

        contexts.delete(&id).await.unwrap();
        contexts.delete(&id).await.unwrap();
        contexts.delete("never-existed").await.unwrap();

        let err = contexts.get(&id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContextNotFound);
    }
}

/// Verifies that racing appends on one context never fail; the record is last-write-wins.
#[tokio::test]
async fn test_concurrent_appends_do_not_fail() {
    setup_tracing();
    let clock = ManualClock::default();
    for store in stores(&clock).await {
        let contexts = manager(store, &clock);
        let id = contexts.create("tenant-a", HashMap::new()).await.unwrap();

        let (a, b) = tokio::join!(
            contexts.append(&id, "first", Some("SELECT 1"), ResultSummary::default()),
            contexts.append(&id, "second", Some("SELECT 2"), ResultSummary::default()),
        );
        a.unwrap();
        b.unwrap();

        let context = contexts.get(&id).await.unwrap();
        assert!(!context.messages.is_empty() && context.messages.len() <= 2);
    }
}

#[tokio::test]
async fn test_messages_keep_order_and_recent_window() {
    let clock = ManualClock::default();
    let contexts = manager(Arc::new(InMemoryKvStore::with_clock(Arc::new(clock.clone()))), &clock);
    let id = contexts.create("tenant-a", HashMap::new()).await.unwrap();

    for i in 0..7 {
        contexts
            .append(&id, &format!("question {i}"), None, ResultSummary::failure("extraction failed"))
            .await
            .unwrap();
    }

    let context = contexts.get(&id).await.unwrap();
    let recent: Vec<&str> = context
        .recent(5)
        .iter()
        .map(|m| m.question.as_str())
        .collect();
    assert_eq!(
        recent,
        vec!["question 2", "question 3", "question 4", "question 5", "question 6"]
    );
    assert_eq!(
        context.messages[0].result_summary.note.as_deref(),
        Some("extraction failed")
    );
}

fn clock_now(clock: &ManualClock) -> chrono::DateTime<chrono::Utc> {
    use nlsql::context::Clock;
    clock.now()
}
