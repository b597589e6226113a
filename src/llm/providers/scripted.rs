//! Scripted LLM provider. Replays a queue of canned outcomes.
//!
//! Each call records the message list it received and pops the next
//! scripted result; an exhausted script answers with a network error.
//! An optional delay simulates a slow remote for timeout and cancellation
//! paths. Clones share the same script.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::llm::{PromptMessage, ProviderError};

#[derive(Debug, Default)]
struct Script {
    outcomes: VecDeque<Result<String, ProviderError>>,
    requests: Vec<Vec<PromptMessage>>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(outcomes: impl IntoIterator<Item = Result<String, ProviderError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                outcomes: outcomes.into_iter().collect(),
                requests: Vec::new(),
            })),
            delay: None,
        }
    }

    /// Every call sleeps `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Append one more outcome to the script.
    pub fn push(&self, outcome: Result<String, ProviderError>) {
        self.lock().outcomes.push_back(outcome);
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.lock().requests.len()
    }

    /// Message lists received so far, oldest first.
    pub fn requests(&self) -> Vec<Vec<PromptMessage>> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        // A panicking test thread must not take the script down with it.
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn complete(&self, messages: &[PromptMessage]) -> Result<String, ProviderError> {
        self.lock().requests.push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.lock()
            .outcomes
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Network("script exhausted".into())))
    }
}
