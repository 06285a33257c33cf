use crate::context::DEFAULT_CONTEXT_TTL_SECS;
use crate::schema::{CostModel, EncoderOptions};
use crate::security::SecurityPolicy;
use crate::visualization::VisualizationOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Tunables of the query pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Cost budget of the encoded schema, in units of `cost_model`.
    pub schema_budget: usize,
    pub cost_model: CostModel,
    pub include_keys: bool,
    pub include_indexes: bool,
    /// How many recent messages are offered to the model.
    pub history_limit: usize,
    pub context_ttl_secs: u64,
    /// Appends failed extraction/validation/execution cycles to the conversation.
    pub record_failed_questions: bool,
    pub system_prompt: Option<String>,
    pub security: SecurityPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            schema_budget: 512,
            cost_model: CostModel::default(),
            include_keys: true,
            include_indexes: true,
            history_limit: 5,
            context_ttl_secs: DEFAULT_CONTEXT_TTL_SECS,
            record_failed_questions: true,
            system_prompt: None,
            security: SecurityPolicy::default(),
        }
    }
}

impl PipelineSettings {
    pub fn encoder_options(&self) -> EncoderOptions {
        EncoderOptions {
            cost_model: self.cost_model,
            include_keys: self.include_keys,
            include_indexes: self.include_indexes,
        }
    }
}

/// Connection details for an AI provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// `gemini` or `local`.
    pub provider: String,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub model_name: Option<String>,
}

/// One question submitted to the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    /// Continues an existing conversation; a new one is started when absent.
    #[serde(default)]
    pub context_id: Option<String>,
    pub tenant_id: String,
    /// Stored on a newly created context. Ignored for existing ones.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            tenant_id: tenant_id.into(),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }
}

/// The successful outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub sql_text: String,
    /// Result rows as `{column: value}` records, in result order.
    pub result_rows: Vec<Value>,
    pub visualization_options: VisualizationOptions,
    pub context_id: String,
}
