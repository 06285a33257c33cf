use crate::{
    errors::ProviderError,
    providers::db::storage::{QueryExecutor, QueryRows, SchemaProvider},
    schema::{ColumnSchema, ForeignKey, IndexSchema, SchemaModel, TableSchema},
    security::ValidatedSql,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use tracing::{debug, info, warn};
use turso::{Connection, Database, Value as TursoValue};

pub mod kv;
pub mod sql;

pub use kv::SqliteKvStore;

/// A provider for interacting with a local SQLite database using Turso.
///
/// This provider holds a `Database` instance, which manages a connection pool.
/// When cloned, it shares the same underlying database, allowing for concurrent and
/// shared access to the same database file or in-memory instance.
#[derive(Clone)]
pub struct SqliteProvider {
    /// The Turso database instance. It's cloneable and thread-safe.
    pub db: Database,
}

impl SqliteProvider {
    /// Creates a new `SqliteProvider` from a file path or in-memory.
    ///
    /// # Arguments
    ///
    /// * `db_path`: The path to the SQLite database file. Use ":memory:" for a unique,
    ///   isolated in-memory database. To share an in-memory database across multiple
    ///   `SqliteProvider` instances (e.g., in tests), create one provider and
    ///   then `.clone()` it.
    pub async fn new(db_path: &str) -> Result<Self, ProviderError> {
        let db = turso::Builder::new_local(db_path)
            .build()
            .await
            .map_err(|e| ProviderError::StorageConnection(e.to_string()))?;
        Ok(Self { db })
    }

    /// A helper for tests to pre-populate data by executing multiple SQL statements.
    pub async fn initialize_with_data(&self, init_sql: &str) -> Result<(), ProviderError> {
        let conn = self.connect()?;
        for statement in init_sql.split(';').filter(|s| !s.trim().is_empty()) {
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

    async fn list_tables(&self, conn: &Connection) -> Result<Vec<String>, ProviderError> {
        let rows = query_all(conn, sql::LIST_TABLES, 1).await?;
        Ok(rows.iter().filter_map(|row| text_at(row, 0)).collect())
    }

    async fn read_table(
        &self,
        conn: &Connection,
        table_name: &str,
    ) -> Result<TableSchema, ProviderError> {
        let mut columns = Vec::new();
        let mut pk_positions: Vec<(i64, String)> = Vec::new();

        for row in query_all(conn, &sql::table_info(table_name), 6).await? {
            let Some(name) = text_at(&row, 1) else {
                continue;
            };
            let data_type = text_at(&row, 2).unwrap_or_default();
            let not_null = int_at(&row, 3).unwrap_or(0) != 0;
            let pk_position = int_at(&row, 5).unwrap_or(0);
            if pk_position > 0 {
                pk_positions.push((pk_position, name.clone()));
            }
            columns.push(ColumnSchema {
                name,
                data_type,
                nullable: !not_null,
                default: display_at(&row, 4),
            });
        }
        pk_positions.sort();

        let mut table = TableSchema::new(table_name, columns);
        table.primary_key = pk_positions.into_iter().map(|(_, name)| name).collect();
        table.foreign_keys = self.read_foreign_keys(conn, table_name).await;
        table.indexes = self.read_indexes(conn, table_name).await;
        Ok(table)
    }

    /// Foreign keys are best-effort: not every engine build supports the pragma.
    async fn read_foreign_keys(&self, conn: &Connection, table_name: &str) -> Vec<ForeignKey> {
        let rows = match query_all(conn, &sql::foreign_key_list(table_name), 5).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(table_name = %table_name, "Could not read foreign keys: {e}");
                return Vec::new();
            }
        };

        // Composite keys span several rows sharing the same id.
        let mut grouped: BTreeMap<i64, ForeignKey> = BTreeMap::new();
        for row in rows {
            let id = int_at(&row, 0).unwrap_or(0);
            let (Some(referenced_table), Some(from)) = (text_at(&row, 2), text_at(&row, 3)) else {
                continue;
            };
            let fk = grouped.entry(id).or_insert_with(|| ForeignKey {
                columns: Vec::new(),
                referenced_table,
                referenced_columns: Vec::new(),
            });
            fk.columns.push(from);
            if let Some(to) = text_at(&row, 4) {
                fk.referenced_columns.push(to);
            }
        }
        grouped.into_values().collect()
    }

    async fn read_indexes(&self, conn: &Connection, table_name: &str) -> Vec<IndexSchema> {
        let rows = match query_all(conn, &sql::index_list(table_name), 3).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(table_name = %table_name, "Could not read indexes: {e}");
                return Vec::new();
            }
        };

        let mut indexes = Vec::new();
        for row in rows {
            let Some(name) = text_at(&row, 1) else {
                continue;
            };
            let unique = int_at(&row, 2).unwrap_or(0) != 0;
            let columns = match query_all(conn, &sql::index_info(&name), 3).await {
                Ok(info) => info.iter().filter_map(|r| text_at(r, 2)).collect(),
                Err(e) => {
                    warn!(index = %name, "Could not read index columns: {e}");
                    Vec::new()
                }
            };
            indexes.push(IndexSchema {
                name,
                columns,
                unique,
            });
        }
        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        indexes
    }
}

impl Debug for SqliteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteProvider").finish_non_exhaustive()
    }
}

impl AsRef<Database> for SqliteProvider {
    fn as_ref(&self) -> &Database {
        &self.db
    }
}

/// Runs a query and collects the first `width` values of every row.
///
/// Missing trailing values read as NULL, since pragma output varies across engine builds.
async fn query_all(
    conn: &Connection,
    query: &str,
    width: usize,
) -> Result<Vec<Vec<TursoValue>>, ProviderError> {
    let mut rows = conn
        .query(query, ())
        .await
        .map_err(|e| ProviderError::StorageOperationFailed(e.to_string()))?;

    let mut out = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| ProviderError::StorageOperationFailed(e.to_string()))?
    {
        let values = (0..width)
            .map(|i| row.get_value(i).unwrap_or(TursoValue::Null))
            .collect();
        out.push(values);
    }
    Ok(out)
}

fn text_at(row: &[TursoValue], i: usize) -> Option<String> {
    match row.get(i)? {
        TursoValue::Text(s) => Some(s.clone()),
        _ => None,
    }
}

fn int_at(row: &[TursoValue], i: usize) -> Option<i64> {
    match row.get(i)? {
        TursoValue::Integer(n) => Some(*n),
        _ => None,
    }
}

/// Renders a non-null value as text (used for column defaults).
fn display_at(row: &[TursoValue], i: usize) -> Option<String> {
    match row.get(i)? {
        TursoValue::Null => None,
        TursoValue::Integer(n) => Some(n.to_string()),
        TursoValue::Real(f) => Some(f.to_string()),
        TursoValue::Text(s) => Some(s.clone()),
        TursoValue::Blob(_) => Some("<blob>".to_string()),
    }
}

/// Converts a Turso value to a serde_json::Value.
fn turso_value_to_json(v: TursoValue) -> Value {
    match v {
        TursoValue::Null => Value::Null,
        TursoValue::Integer(i) => Value::Number(i.into()),
        TursoValue::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        TursoValue::Text(s) => Value::String(s),
        TursoValue::Blob(_) => Value::String("<blob>".to_string()),
    }
}

#[async_trait]
impl SchemaProvider for SqliteProvider {
    fn name(&self) -> &str {
        "SQLite"
    }

    async fn introspect(&self) -> Result<SchemaModel, ProviderError> {
        let conn = self.connect()?;
        let mut tables = Vec::new();
        for table_name in self.list_tables(&conn).await? {
            tables.push(self.read_table(&conn, &table_name).await?);
        }
        info!("Introspected SQLite schema with {} tables.", tables.len());
        Ok(SchemaModel::new(tables))
    }
}

#[async_trait]
impl QueryExecutor for SqliteProvider {
    /// Executes a validated statement and returns its rows in order.
    async fn execute(&self, sql: &ValidatedSql) -> Result<QueryRows, ProviderError> {
        debug!(query = %sql.as_str(), "--> Executing SQLite query");
        let conn = self.connect()?;

        let mut stmt = conn
            .prepare(sql.as_str())
            .await
            .map_err(|e| ProviderError::StorageOperationFailed(e.to_string()))?;

        let columns: Vec<String> = stmt
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let mut rows = stmt
            .query(())
            .await
            .map_err(|e| ProviderError::StorageOperationFailed(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| ProviderError::StorageOperationFailed(e.to_string()))?
        {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let value = row
                    .get_value(i)
                    .map_err(|e| ProviderError::StorageOperationFailed(e.to_string()))?;
                values.push(turso_value_to_json(value));
            }
            out.push(values);
        }

        Ok(QueryRows::new(columns, out))
    }
}
