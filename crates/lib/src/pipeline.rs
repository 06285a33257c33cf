//! # The Query Pipeline
//!
//! [`QueryPipeline`] turns one question into a validated statement, its result rows and
//! a set of chart suggestions:
//!
//! context fetch → schema introspection and encoding → prompt assembly → model call →
//! SQL extraction → security validation → execution → visualization inference →
//! context append.
//!
//! Every collaborator is injected through [`QueryPipelineBuilder`], so tests can swap
//! any of them for a double. Each stage fails fast with exactly one [`PipelineError`]
//! kind and nothing is retried.

use crate::{
    context::{ContextManager, ConversationContext, KeyValueStore, ResultSummary},
    errors::{BuildError, PipelineError},
    extractor,
    prompts::PromptAssembler,
    providers::{
        ai::AiProvider,
        db::{QueryExecutor, SchemaProvider},
    },
    schema::SchemaEncoder,
    security::{SecurityValidator, ValidatedSql},
    types::{PipelineSettings, QueryRequest, QueryResponse},
    visualization::{SelectParser, VisualizationAnalyzer},
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct QueryPipeline {
    ai_provider: Arc<dyn AiProvider>,
    schema_provider: Arc<dyn SchemaProvider>,
    executor: Arc<dyn QueryExecutor>,
    contexts: ContextManager,
    encoder: SchemaEncoder,
    assembler: PromptAssembler,
    validator: SecurityValidator,
    analyzer: VisualizationAnalyzer,
    settings: PipelineSettings,
}

impl QueryPipeline {
    pub fn builder() -> QueryPipelineBuilder {
        QueryPipelineBuilder::new()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// The context adapter, for callers that inspect or delete conversations.
    pub fn contexts(&self) -> &ContextManager {
        &self.contexts
    }

    /// Runs one question through every stage.
    pub async fn run(&self, request: QueryRequest) -> Result<QueryResponse, PipelineError> {
        info!(tenant_id = %request.tenant_id, "[pipeline] received question: {:?}", request.question);

        let context = self.resolve_context(&request).await?;
        let question = request.question.trim();

        let schema = self
            .schema_provider
            .introspect()
            .await
            .map_err(|e| {
                error!("[pipeline] schema introspection failed: {e}");
                PipelineError::Schema(e)
            })?;
        let schema_text = self.encoder.encode(&schema, self.settings.schema_budget);
        info!(
            tables = schema.tables.len(),
            "[pipeline] introspected schema from {}",
            self.schema_provider.name()
        );

        let history = context.recent(self.settings.history_limit);
        let model_request = self.assembler.assemble(&schema_text, history, question);
        debug!(system = %model_request.system, user = %model_request.user_prompt(), "--> Sending prompts to AI Provider");

        let raw = self.ai_provider.generate(&model_request).await.map_err(|e| {
            error!("[pipeline] model generation failed: {e}");
            PipelineError::Generation(e)
        })?;
        debug!("<-- Response from AI: {}", raw);

        let candidate = match extractor::extract(&raw) {
            Ok(candidate) => candidate,
            Err(e) => {
                error!("[pipeline] no SQL in model output");
                let err = PipelineError::from(e);
                self.record_failure(&context.id, question, None, &err).await;
                return Err(err);
            }
        };

        let validated = match self.validator.validate(&candidate) {
            Ok(validated) => validated,
            Err(e) => {
                error!(rule = %e.rule, "[pipeline] statement blocked");
                let err = PipelineError::from(e);
                self.record_failure(&context.id, question, None, &err).await;
                return Err(err);
            }
        };

        let rows = match self.executor.execute(&validated).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("[pipeline] execution failed: {e}");
                let err = PipelineError::Execution(e);
                self.record_failure(&context.id, question, Some(&validated), &err)
                    .await;
                return Err(err);
            }
        };
        info!(rows = rows.rows.len(), "[pipeline] query executed");

        let visualization_options = self.analyzer.analyze(question, &validated);

        self.contexts
            .append(
                &context.id,
                question,
                Some(validated.as_str()),
                ResultSummary::from_rows(&rows),
            )
            .await?;

        Ok(QueryResponse {
            sql_text: validated.into_string(),
            result_rows: rows.to_records(),
            visualization_options,
            context_id: context.id,
        })
    }

    async fn resolve_context(
        &self,
        request: &QueryRequest,
    ) -> Result<ConversationContext, PipelineError> {
        match &request.context_id {
            Some(context_id) => self.contexts.get(context_id).await,
            None => {
                let context_id = self
                    .contexts
                    .create(&request.tenant_id, request.metadata.clone())
                    .await?;
                self.contexts.get(&context_id).await
            }
        }
    }

    /// Appends a failed cycle to the conversation. Never masks `err`.
    async fn record_failure(
        &self,
        context_id: &str,
        question: &str,
        sql: Option<&ValidatedSql>,
        err: &PipelineError,
    ) {
        if !self.settings.record_failed_questions {
            return;
        }
        let note = match err {
            PipelineError::Extraction(e) => format!("extraction failed: {e}"),
            PipelineError::Security(e) => format!("blocked by security policy: {e}"),
            other => format!("execution failed: {other}"),
        };
        if let Err(e) = self
            .contexts
            .append(
                context_id,
                question,
                sql.map(ValidatedSql::as_str),
                ResultSummary::failure(note),
            )
            .await
        {
            warn!(context_id = %context_id, "[pipeline] could not record failed question: {e}");
        }
    }
}

/// A builder for [`QueryPipeline`].
#[derive(Default)]
pub struct QueryPipelineBuilder {
    ai_provider: Option<Arc<dyn AiProvider>>,
    schema_provider: Option<Arc<dyn SchemaProvider>>,
    executor: Option<Arc<dyn QueryExecutor>>,
    context_manager: Option<ContextManager>,
    context_store: Option<Arc<dyn KeyValueStore>>,
    select_parser: Option<Arc<dyn SelectParser>>,
    settings: PipelineSettings,
}

impl QueryPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ai_provider(mut self, provider: Arc<dyn AiProvider>) -> Self {
        self.ai_provider = Some(provider);
        self
    }

    pub fn schema_provider(mut self, provider: Arc<dyn SchemaProvider>) -> Self {
        self.schema_provider = Some(provider);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Uses a fully configured context adapter. Takes precedence over
    /// [`Self::context_store`].
    pub fn context_manager(mut self, manager: ContextManager) -> Self {
        self.context_manager = Some(manager);
        self
    }

    /// Keeps conversations in `store`, expiring after `settings.context_ttl_secs`.
    pub fn context_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.context_store = Some(store);
        self
    }

    /// Replaces the heuristic statement parser used for axis inference.
    pub fn select_parser(mut self, parser: Arc<dyn SelectParser>) -> Self {
        self.select_parser = Some(parser);
        self
    }

    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Result<QueryPipeline, BuildError> {
        let settings = self.settings;
        let ai_provider = self.ai_provider.ok_or(BuildError::MissingAiProvider)?;
        let schema_provider = self
            .schema_provider
            .ok_or(BuildError::MissingSchemaProvider)?;
        let executor = self.executor.ok_or(BuildError::MissingExecutor)?;
        let contexts = match (self.context_manager, self.context_store) {
            (Some(manager), _) => manager,
            (None, Some(store)) => {
                ContextManager::new(store).with_ttl_secs(settings.context_ttl_secs)
            }
            (None, None) => return Err(BuildError::MissingContextManager),
        };
        let analyzer = self
            .select_parser
            .map(VisualizationAnalyzer::new)
            .unwrap_or_default();

        Ok(QueryPipeline {
            ai_provider,
            schema_provider,
            executor,
            contexts,
            encoder: SchemaEncoder::new(settings.encoder_options()),
            assembler: PromptAssembler::new(settings.system_prompt.clone()),
            validator: SecurityValidator::new(settings.security),
            analyzer,
            settings,
        })
    }
}
