pub mod sqlite;
pub mod storage;

pub use storage::{QueryExecutor, QueryRows, SchemaProvider};
