//! Dummy LLM provider. Echoes the last user message back prefixed with
//! `[echo]`. Lets the whole pipeline run without an API key.

use crate::llm::{PromptMessage, PromptRole, ProviderError};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, messages: &[PromptMessage]) -> Result<String, ProviderError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == PromptRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(format!("[echo] {last_user}"))
    }
}
