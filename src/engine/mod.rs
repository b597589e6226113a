//! AI response engine.
//!
//! Turns one visitor utterance plus conversation history into a
//! [`ChatResponse`]: keyword sentiment, knowledge retrieval, prompt assembly,
//! a single provider call and the handover heuristic. The engine never
//! retries; failures surface as [`EngineError`] and the message pipeline
//! decides what the visitor sees.

pub mod prompt;
pub mod sentiment;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::knowledge::KnowledgeIndex;
use crate::llm::{LlmProvider, PromptMessage, ProviderError};

pub use sentiment::Sentiment;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("ai engine error: {0}")]
    Provider(#[from] ProviderError),

    #[error("ai engine error: no reply within {0:?}")]
    Timeout(Duration),

    #[error("ai engine error: cancelled")]
    Cancelled,
}

/// Reply handed back to the visitor channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub confidence: f64,
    pub suggest_handover: bool,
    pub sentiment: Sentiment,
}

impl ChatResponse {
    /// Empty reply: a human is handling the conversation.
    pub fn silent() -> Self {
        Self {
            reply: String::new(),
            confidence: 0.0,
            suggest_handover: false,
            sentiment: Sentiment::Neutral,
        }
    }
}

pub struct ChatEngine {
    provider: LlmProvider,
    knowledge: KnowledgeIndex,
    config: EngineConfig,
}

impl ChatEngine {
    pub fn new(provider: LlmProvider, knowledge: KnowledgeIndex, config: EngineConfig) -> Self {
        Self { provider, knowledge, config }
    }

    pub async fn process_message(
        &self,
        text: &str,
        history: &[PromptMessage],
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, EngineError> {
        let sentiment = sentiment::classify(text, &self.config.phrases);
        let relevant = self.knowledge.find_relevant(text);
        let system = prompt::build_system_prompt(&self.config.system_prompt, &relevant);
        let messages = prompt::assemble(system, history, self.config.history_window, text);

        debug!(
            provider = self.provider.name(),
            %sentiment,
            knowledge = relevant.len(),
            messages = messages.len(),
            "engine: calling provider"
        );

        let timeout = self.config.timeout;
        let reply = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                warn!("engine: provider call cancelled");
                return Err(EngineError::Cancelled);
            }

            result = tokio::time::timeout(timeout, self.provider.complete(&messages)) => match result {
                Ok(Ok(reply)) => reply,
                Ok(Err(e)) => {
                    warn!(error = %e, "engine: provider call failed");
                    return Err(e.into());
                }
                Err(_) => {
                    warn!(?timeout, "engine: provider call timed out");
                    return Err(EngineError::Timeout(timeout));
                }
            },
        };

        let suggest_handover = self.should_suggest_handover(sentiment, text, &reply);
        debug!(suggest_handover, reply_len = reply.len(), "engine: reply ready");

        Ok(ChatResponse {
            reply,
            confidence: self.config.confidence,
            suggest_handover,
            sentiment,
        })
    }

    fn should_suggest_handover(&self, sentiment: Sentiment, text: &str, reply: &str) -> bool {
        let phrases = &self.config.phrases;
        sentiment == Sentiment::Frustrated
            || sentiment::contains_any(&text.to_lowercase(), &phrases.human_request)
            || sentiment::contains_any(&reply.to_lowercase(), &phrases.uncertainty)
    }
}
