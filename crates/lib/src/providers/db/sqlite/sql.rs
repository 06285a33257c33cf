//! # SQLite Specific SQL Queries
//!
//! This module centralizes SQL query strings for the SQLite provider.
//! This makes the core logic cleaner and isolates database-specific syntax.

/// Lists user tables in a stable (alphabetical) order.
pub const LIST_TABLES: &str =
    "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name;";

/// Columns: cid, name, type, notnull, dflt_value, pk
pub fn table_info(table_name: &str) -> String {
    format!("PRAGMA table_info({});", pragma_argument(table_name))
}

/// Columns: id, seq, table, from, to, on_update, on_delete, match
pub fn foreign_key_list(table_name: &str) -> String {
    format!("PRAGMA foreign_key_list({});", pragma_argument(table_name))
}

/// Columns: seq, name, unique, origin, partial
pub fn index_list(table_name: &str) -> String {
    format!("PRAGMA index_list({});", pragma_argument(table_name))
}

/// Columns: seqno, cid, name
pub fn index_info(index_name: &str) -> String {
    format!("PRAGMA index_info({});", pragma_argument(index_name))
}

/// Plain identifiers are passed through; anything else is quoted.
fn pragma_argument(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        quote_identifier(name)
    }
}

/// Wraps a name in double quotes, doubling any embedded quote.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// --- Conversation context key-value store ---

pub const CREATE_KV_STORE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);";

pub const KV_GET: &str = "SELECT value, expires_at FROM kv_store WHERE key = ?1;";

pub const KV_DELETE: &str = "DELETE FROM kv_store WHERE key = ?1;";

/// Removes `key` only while it is still expired at `?2`, so a concurrent refresh survives.
pub const KV_EVICT_EXPIRED: &str = "DELETE FROM kv_store WHERE key = ?1 AND expires_at <= ?2;";

pub const KV_UPSERT: &str = "INSERT INTO kv_store (key, value, expires_at) VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at;";

/// All statements needed to prepare a database for use as a context store.
pub const ALL_TABLE_CREATION_SQL: &[&str] = &[CREATE_KV_STORE_TABLE];
