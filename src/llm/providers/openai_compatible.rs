//! OpenAI-compatible chat completion provider (`/v1/chat/completions`).
//!
//! Works against OpenAI, Groq and local OpenAI-compatible servers. All wire
//! types are private to this module. Errors are classified into
//! [`ProviderError::Network`] (transport), [`ProviderError::Parse`]
//! (unreadable body) and [`ProviderError::Remote`] (HTTP or API error).

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::llm::{PromptMessage, ProviderError};

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions`.
///
/// Constructed once at startup, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// `api_key`, when present, is sent as `Authorization: Bearer <key>`.
    pub fn new(
        api_base_url: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
        timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_base_url, model, temperature, max_tokens, api_key })
    }

    /// One chat-completion round-trip with the full message list.
    pub async fn complete(&self, messages: &[PromptMessage]) -> Result<String, ProviderError> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(
            model = %self.model,
            messages = messages.len(),
            "sending LLM request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full LLM request payload");
        }

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, timeout = e.is_timeout(), "LLM HTTP request failed (transport)");
            ProviderError::Network(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(env) => format!("HTTP {status}: {}", env.error.message),
                Err(_) => format!("HTTP {status}: {body}"),
            };
            error!(%status, %message, "LLM request returned HTTP error");
            return Err(ProviderError::Remote(message));
        }

        parse_completion(&body)
    }
}

/// Extract the first choice's text from a successful response body.
fn parse_completion(body: &str) -> Result<String, ProviderError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        error!(error = %e, "failed to deserialize LLM response");
        ProviderError::Parse(format!("failed to parse response body: {e}"))
    })?;

    // Some gateways answer 200 with an error object.
    if let Some(err) = parsed.error {
        return Err(ProviderError::Remote(err.message));
    }

    debug!(choices = parsed.choices.len(), "received LLM response");

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::Parse("empty or missing content in response".into()))
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::PromptRole;

    #[test]
    fn request_serializes_roles_and_limits() {
        let msgs = [PromptMessage::system("s"), PromptMessage::user("u")];
        let req = ChatCompletionRequest { model: "m", messages: &msgs, max_tokens: 500, temperature: 0.7 };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["model"], "m");
        assert_eq!(v["max_tokens"], 500);
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["content"], "u");
    }

    #[test]
    fn parses_first_choice() {
        let body = r#"{"id":"x","choices":[{"message":{"role":"assistant","content":"  Halo!  "},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Halo!");
    }

    #[test]
    fn error_object_is_remote_error() {
        let body = r#"{"error":{"message":"rate limit","type":"quota"}}"#;
        match parse_completion(body) {
            Err(ProviderError::Remote(m)) => assert_eq!(m, "rate limit"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn empty_choices_is_parse_error() {
        assert!(matches!(parse_completion(r#"{"choices":[]}"#), Err(ProviderError::Parse(_))));
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(parse_completion("<html>"), Err(ProviderError::Parse(_))));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let p = OpenAiCompatibleProvider::new(
            "http://127.0.0.1:1/v1/chat/completions".into(),
            "m".into(),
            0.0,
            10,
            1,
            None,
        )
        .unwrap();
        let err = p.complete(&[PromptMessage { role: PromptRole::User, content: "hi".into() }]).await;
        assert!(matches!(err, Err(ProviderError::Network(_))));
    }
}
