//! LLM integration for mail-classify.
//!
//! The dispatcher only sees the [`CompletionTransport`] trait: one prompt in,
//! the model's raw text out, or a typed [`LlmError`] saying why not. The
//! production implementation talks to Gemini's `generateContent` endpoint;
//! tests substitute scripted fakes.

pub mod gemini;
pub(crate) mod retry;

pub use gemini::GeminiTransport;

use async_trait::async_trait;

use crate::error::LlmError;

/// A single-shot text completion against a remote model.
///
/// Implementations perform exactly one network call per `generate` and never
/// retry internally; attempt accounting belongs to the request executor.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Send `prompt` and return the generated text.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}
