//! # Default Prompt Templates
//!
//! The default text used by the [`super::PromptAssembler`]. The system prompt can be
//! replaced through `PipelineSettings::system_prompt`.

/// The default system prompt for SQL generation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a SQL expert. Write one read-only SQL query that answers the user's question using only the tables and columns in the provided schema. Never modify data or schema. Respond with the SQL query only, without explanations or prose.";

/// The closing instruction appended to every user prompt.
pub const SINGLE_STATEMENT_INSTRUCTION: &str = "Return exactly one SELECT statement in a ```sql fenced block. Do not include comments or multiple statements.";

/// Rendered in place of the history section when there is no prior conversation.
pub const EMPTY_HISTORY: &str = "None";

/// The user prompt layout.
///
/// Placeholders: `{schema}`, `{history}`, `{question}`, `{instruction}`
pub const USER_PROMPT_TEMPLATE: &str = r#"# Schema
{schema}

# Conversation history
{history}

# Question
{question}

{instruction}"#;
