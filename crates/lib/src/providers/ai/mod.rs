pub mod gemini;
pub mod local;

use crate::{errors::ProviderError, prompts::ModelRequest};
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;

pub use gemini::GeminiProvider;
pub use local::LocalAiProvider;

/// A trait for interacting with a generative text model.
///
/// Implementations receive the assembled [`ModelRequest`] and return the model's raw,
/// untrusted text. Extracting and validating SQL from it is the caller's job.
#[async_trait]
pub trait AiProvider: Send + Sync + Debug + DynClone {
    async fn generate(&self, request: &ModelRequest) -> Result<String, ProviderError>;
}

dyn_clone::clone_trait_object!(AiProvider);
