//! # AI Provider Factory
//!
//! Builds the configured [`AiProvider`] so that the cli and the tests wire model
//! clients the same way.

use crate::{
    errors::ProviderError,
    providers::ai::{AiProvider, GeminiProvider, LocalAiProvider},
    types::ProviderConfig,
};
use tracing::info;

/// The Gemini model used when a `gemini` provider names none.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Creates an AI provider from its configuration.
///
/// - `gemini` requires `api_key`. Without an `api_url`, the public endpoint of
///   `model_name` (or [`DEFAULT_GEMINI_MODEL`]) is used.
/// - `local` requires `api_url`; `api_key` and `model_name` are optional.
pub fn create_ai_provider(config: &ProviderConfig) -> Result<Box<dyn AiProvider>, ProviderError> {
    match config.provider.as_str() {
        "gemini" => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ProviderError::Other("api_key must be set for the gemini provider".to_string())
            })?;
            let api_url = config.api_url.clone().unwrap_or_else(|| {
                let model = config
                    .model_name
                    .as_deref()
                    .unwrap_or(DEFAULT_GEMINI_MODEL);
                format!(
                    "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent"
                )
            });
            info!("Configuring Gemini provider with URL: {}", api_url);
            Ok(Box::new(GeminiProvider::new(api_url, api_key)?))
        }
        "local" => {
            let api_url = config.api_url.clone().ok_or_else(|| {
                ProviderError::Other("api_url must be set for the local provider".to_string())
            })?;
            info!("Configuring Local AI provider with URL: {}", api_url);
            Ok(Box::new(LocalAiProvider::new(
                api_url,
                config.api_key.clone(),
                config.model_name.clone(),
            )?))
        }
        other => Err(ProviderError::UnsupportedProvider(other.to_string())),
    }
}
