use crate::extractor::ExtractionError;
use crate::security::SecurityError;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by external collaborators: AI providers, schema/SQL backends and
/// key-value stores.
///
/// These never reach the caller directly. The pipeline wraps each one into the
/// [`PipelineError`] variant of the stage that failed.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Failed to send request to AI provider: {0}")]
    AiRequest(reqwest::Error),
    #[error("Failed to deserialize AI provider response: {0}")]
    AiDeserialization(reqwest::Error),
    #[error("AI provider returned an error: {0}")]
    AiApi(String),
    #[error("Unsupported AI provider: {0}")]
    UnsupportedProvider(String),
    #[error("Storage connection error: {0}")]
    StorageConnection(String),
    #[error("Storage operation failed: {0}")]
    StorageOperationFailed(String),
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// The error taxonomy of the query pipeline.
///
/// Each stage fails fast and reports exactly one of these kinds, so that callers can
/// tell "the model produced unusable text" apart from "a statement was blocked" and
/// "a safe statement failed at execution".
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Schema introspection failed: {0}")]
    Schema(#[source] ProviderError),
    #[error("Conversation context '{0}' not found")]
    ContextNotFound(String),
    #[error("Context store failure: {0}")]
    ContextStore(#[source] ProviderError),
    #[error("Model generation failed: {0}")]
    Generation(#[source] ProviderError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error("Query execution failed: {0}")]
    Execution(#[source] ProviderError),
}

/// A serializable discriminant of [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SchemaError,
    ContextNotFound,
    ContextStoreError,
    GenerationError,
    ExtractionError,
    SecurityError,
    ExecutionError,
}

/// The structured error returned at the pipeline boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Schema(_) => ErrorKind::SchemaError,
            PipelineError::ContextNotFound(_) => ErrorKind::ContextNotFound,
            PipelineError::ContextStore(_) => ErrorKind::ContextStoreError,
            PipelineError::Generation(_) => ErrorKind::GenerationError,
            PipelineError::Extraction(_) => ErrorKind::ExtractionError,
            PipelineError::Security(_) => ErrorKind::SecurityError,
            PipelineError::Execution(_) => ErrorKind::ExecutionError,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Raised when a [`crate::QueryPipeline`] is built without one of its collaborators.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuildError {
    #[error("AI provider is missing")]
    MissingAiProvider,
    #[error("Schema provider is missing")]
    MissingSchemaProvider,
    #[error("Query executor is missing")]
    MissingExecutor,
    #[error("Context manager is missing")]
    MissingContextManager,
}
