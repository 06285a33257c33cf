use super::core::{
    DEFAULT_SYSTEM_PROMPT, EMPTY_HISTORY, SINGLE_STATEMENT_INSTRUCTION, USER_PROMPT_TEMPLATE,
};
use crate::context::Message;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(schema|history|question|instruction)\}").expect("placeholder pattern is valid")
});

/// Everything the model client needs for one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRequest {
    pub system: String,
    pub schema_text: String,
    /// Deduplicated history lines joined by newlines. Empty for a new conversation.
    pub history_text: String,
    pub question: String,
}

impl ModelRequest {
    /// Renders the single user message sent alongside [`ModelRequest::system`].
    pub fn user_prompt(&self) -> String {
        let history = if self.history_text.is_empty() {
            EMPTY_HISTORY
        } else {
            self.history_text.as_str()
        };
        // One pass over the template, so inserted text is never substituted again.
        PLACEHOLDER
            .replace_all(USER_PROMPT_TEMPLATE, |caps: &regex::Captures| {
                match &caps[1] {
                    "schema" => self.schema_text.as_str(),
                    "history" => history,
                    "question" => self.question.as_str(),
                    _ => SINGLE_STATEMENT_INSTRUCTION,
                }
                .to_string()
            })
            .into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    system_prompt: String,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PromptAssembler {
    pub fn new(system_prompt: Option<String>) -> Self {
        Self {
            system_prompt: system_prompt.unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    /// Builds the request for `question`. `history` is expected oldest first.
    pub fn assemble(&self, schema_text: &str, history: &[Message], question: &str) -> ModelRequest {
        let lines: Vec<String> = history.iter().map(history_line).collect();
        ModelRequest {
            system: self.system_prompt.clone(),
            schema_text: schema_text.to_string(),
            history_text: dedup_history(lines).join("\n"),
            question: question.trim().to_string(),
        }
    }
}

/// `Q: <question>`, followed by ` => <sql>` when the message carries SQL.
pub fn history_line(message: &Message) -> String {
    match &message.sql {
        Some(sql) => format!("Q: {} => {}", message.question, sql),
        None => format!("Q: {}", message.question),
    }
}

/// Drops repeated lines, keeping each one's last occurrence.
pub fn dedup_history(lines: Vec<String>) -> Vec<String> {
    let mut kept: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines.into_iter().rev() {
        if !kept.contains(&line) {
            kept.push(line);
        }
    }
    kept.reverse();
    kept
}
