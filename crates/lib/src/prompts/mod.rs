//! # Prompt Assembly
//!
//! Templates live in [`core`]; [`assembler`] turns a question, its conversation history
//! and the encoded schema into a [`ModelRequest`].

pub mod assembler;
pub mod core;

pub use assembler::{dedup_history, history_line, ModelRequest, PromptAssembler};
