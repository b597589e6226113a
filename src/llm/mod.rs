//! LLM transport abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities; clone them freely.
//! A provider does exactly one round-trip per call: no retries, no history
//! management. Timeouts and cancellation are applied by the caller.

pub mod providers;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    /// Transport failure: connect, TLS, HTTP client timeout.
    #[error("network error: {0}")]
    Network(String),
    /// The response body could not be understood.
    #[error("parse error: {0}")]
    Parse(String),
    /// The remote side answered with an error (HTTP status, quota, API error).
    #[error("remote error: {0}")]
    Remote(String),
}

// ── Messages ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// One role-tagged entry of the message list sent to a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: PromptRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: PromptRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: PromptRole::Assistant, content: content.into() }
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new `complete` arm.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
    Scripted(providers::scripted::ScriptedProvider),
}

impl LlmProvider {
    /// Send the full message list and return the model's text reply.
    pub async fn complete(&self, messages: &[PromptMessage]) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(messages).await,
            LlmProvider::OpenAiCompatible(p) => p.complete(messages).await,
            LlmProvider::Scripted(p) => p.complete(messages).await,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Dummy(_) => "dummy",
            LlmProvider::OpenAiCompatible(_) => "openai",
            LlmProvider::Scripted(_) => "scripted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&PromptMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[tokio::test]
    async fn enum_dispatches_to_variant() {
        let p = LlmProvider::Dummy(providers::dummy::DummyProvider);
        let out = p.complete(&[PromptMessage::user("ping")]).await.unwrap();
        assert_eq!(out, "[echo] ping");
        assert_eq!(p.name(), "dummy");
    }
}
