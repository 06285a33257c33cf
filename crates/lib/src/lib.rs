//! # Natural Language to SQL
//!
//! This crate turns a natural-language question, the conversation so far and the live
//! database schema into a validated, read-only SQL statement. Alongside the result rows
//! it suggests how they should be charted, inferred from the question and the
//! statement's structure before the query runs.
//!
//! The entry point is [`QueryPipeline`]. Its external collaborators (the model client,
//! the schema source, the SQL engine and the conversation store) are traits, with
//! reference implementations under [`providers`] and [`context`].

pub mod context;
pub mod errors;
pub mod extractor;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod schema;
pub mod security;
mod sql_text;
pub mod types;
pub mod visualization;

pub use context::{ContextManager, ConversationContext, KeyValueStore, Message, ResultSummary};
pub use errors::{BuildError, ErrorBody, ErrorKind, PipelineError, ProviderError};
pub use pipeline::{QueryPipeline, QueryPipelineBuilder};
pub use prompts::{ModelRequest, PromptAssembler};
pub use providers::ai::AiProvider;
pub use providers::db::{QueryExecutor, QueryRows, SchemaProvider};
pub use providers::factory::create_ai_provider;
pub use schema::{SchemaEncoder, SchemaModel};
pub use security::{SecurityPolicy, SecurityValidator, ValidatedSql};
pub use types::{PipelineSettings, ProviderConfig, QueryRequest, QueryResponse};
pub use visualization::{VisualizationAnalyzer, VisualizationOptions, VisualizationSpec};
