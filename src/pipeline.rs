//! Per-turn message pipeline.
//!
//! Runs after the transport has saved the visitor's message: load session and
//! history, ask the engine, fall back to canned replies on engine failure,
//! record the bot reply and the new sentiment. The visitor never sees an
//! engine error; after enough consecutive failures they are offered a human.

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::engine::{ChatEngine, ChatResponse, Sentiment};
use crate::llm::PromptMessage;
use crate::session::{ChatMessage, Sender, SessionError, SessionStatus, SessionStore};

pub const REPLY_OFFER_HANDOVER: &str = "Maaf, saya mengalami kesulitan. Mau saya hubungkan dengan admin kami?";
pub const REPLY_RETRY: &str = "Maaf, ada sedikit gangguan. Bisa ulangi pertanyaan Anda?";

/// Canned reply after an engine failure. `failed_attempts` already counts
/// the failure being answered.
pub fn escalation_reply(failed_attempts: u32, escalate_after: u32) -> (&'static str, bool) {
    if failed_attempts >= escalate_after {
        (REPLY_OFFER_HANDOVER, true)
    } else {
        (REPLY_RETRY, false)
    }
}

/// Role-tagged history: system notices dropped, bot and agent lines become
/// the assistant side.
pub fn to_history(messages: &[ChatMessage]) -> Vec<PromptMessage> {
    messages
        .iter()
        .filter_map(|m| match m.sender {
            Sender::System => None,
            Sender::Visitor => Some(PromptMessage::user(m.content.clone())),
            Sender::Bot | Sender::Admin => Some(PromptMessage::assistant(m.content.clone())),
        })
        .collect()
}

pub struct MessagePipeline {
    sessions: Arc<SessionStore>,
    engine: Arc<ChatEngine>,
    config: PipelineConfig,
}

impl MessagePipeline {
    pub fn new(sessions: Arc<SessionStore>, engine: Arc<ChatEngine>, config: PipelineConfig) -> Self {
        Self { sessions, engine, config }
    }

    /// Produce the bot's answer to `text`. Only storage errors on the initial
    /// reads are returned; every later failure is absorbed.
    pub async fn process(
        &self,
        session_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, SessionError> {
        let session = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        if session.status == SessionStatus::Live {
            debug!(session_id, "pipeline: live session, bot stays quiet");
            return Ok(ChatResponse::silent());
        }

        let messages = self.sessions.get_messages(session_id, self.config.history_limit).await?;
        let history = to_history(&messages);

        let response = match self.engine.process_message(text, &history, cancel).await {
            Ok(response) => {
                if session.failed_attempts > 0 {
                    self.persist(session_id, json!({ "failedAttempts": 0 }), "reset failure counter").await;
                }
                response
            }
            Err(e) => {
                let failed_attempts = session.failed_attempts.saturating_add(1);
                self.persist(session_id, json!({ "failedAttempts": failed_attempts }), "record failure").await;

                let (reply, suggest_handover) = escalation_reply(failed_attempts, self.config.escalate_after_failures);
                info!(session_id, failed_attempts, suggest_handover, error = %e, "pipeline: engine failed, sending canned reply");
                ChatResponse {
                    reply: reply.to_string(),
                    confidence: 0.0,
                    suggest_handover,
                    sentiment: Sentiment::Neutral,
                }
            }
        };

        let bot_message = ChatMessage::new(session_id, Sender::Bot, response.reply.clone());
        if let Err(e) = self.sessions.save_message(bot_message).await {
            warn!(session_id, error = %e, "pipeline: failed to save bot message");
        }

        self.persist(session_id, json!({ "sentiment": response.sentiment }), "update sentiment").await;

        Ok(response)
    }

    async fn persist(&self, session_id: &str, fields: serde_json::Value, what: &'static str) {
        if let Err(e) = self.sessions.update_fields(session_id, fields).await {
            warn!(session_id, error = %e, "pipeline: failed to {what}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, StoreConfig};
    use crate::docstore::MemoryDocumentStore;
    use crate::knowledge::KnowledgeIndex;
    use crate::llm::providers::scripted::ScriptedProvider;
    use crate::llm::{LlmProvider, PromptRole, ProviderError};
    use crate::presence::PresenceRegistry;
    use crate::session::VisitorInfo;

    struct Fixture {
        sessions: Arc<SessionStore>,
        script: ScriptedProvider,
        pipeline: MessagePipeline,
    }

    fn fixture() -> Fixture {
        let sessions = Arc::new(SessionStore::new(
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(PresenceRegistry::default()),
            &StoreConfig::default(),
        ));
        let script = ScriptedProvider::default();
        let engine = Arc::new(ChatEngine::new(
            LlmProvider::Scripted(script.clone()),
            KnowledgeIndex::default(),
            EngineConfig::default(),
        ));
        let pipeline = MessagePipeline::new(Arc::clone(&sessions), engine, PipelineConfig::default());
        Fixture { sessions, script, pipeline }
    }

    async fn visitor_turn(f: &Fixture, session_id: &str, text: &str) -> ChatResponse {
        f.sessions
            .save_message(ChatMessage::new(session_id, Sender::Visitor, text))
            .await
            .unwrap();
        f.pipeline.process(session_id, text, &CancellationToken::new()).await.unwrap()
    }

    #[test]
    fn escalation_thresholds() {
        assert_eq!(escalation_reply(1, 2), (REPLY_RETRY, false));
        assert_eq!(escalation_reply(2, 2), (REPLY_OFFER_HANDOVER, true));
        assert_eq!(escalation_reply(5, 2), (REPLY_OFFER_HANDOVER, true));
        assert_eq!(escalation_reply(1, 1), (REPLY_OFFER_HANDOVER, true));
    }

    #[test]
    fn history_mapping() {
        let msgs = vec![
            ChatMessage::new("s", Sender::Visitor, "a"),
            ChatMessage::new("s", Sender::System, "notice"),
            ChatMessage::new("s", Sender::Bot, "b"),
            ChatMessage::new("s", Sender::Admin, "c"),
        ];
        let h = to_history(&msgs);
        let roles: Vec<_> = h.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![PromptRole::User, PromptRole::Assistant, PromptRole::Assistant]);
    }

    #[tokio::test]
    async fn successful_turn_saves_reply_and_sentiment() {
        let f = fixture();
        let s = f.sessions.create_session(VisitorInfo::new("v1", "Ani")).await.unwrap();
        f.script.push(Ok("Sama-sama!".into()));

        let resp = visitor_turn(&f, &s.id, "terima kasih").await;
        assert_eq!(resp.reply, "Sama-sama!");
        assert_eq!(resp.sentiment, Sentiment::Positive);

        let got = f.sessions.get_session(&s.id).await.unwrap().unwrap();
        assert_eq!(got.sentiment, Sentiment::Positive);
        let msgs = f.sessions.get_messages(&s.id, 10).await.unwrap();
        assert_eq!(msgs.last().map(|m| (m.sender, m.content.as_str())), Some((Sender::Bot, "Sama-sama!")));
    }

    #[tokio::test]
    async fn visitor_message_in_history_sent_to_engine() {
        let f = fixture();
        let s = f.sessions.create_session(VisitorInfo::new("v1", "Ani")).await.unwrap();
        f.script.push(Ok("first".into()));
        f.script.push(Ok("second".into()));

        visitor_turn(&f, &s.id, "satu").await;
        visitor_turn(&f, &s.id, "dua").await;

        let requests = f.script.requests();
        let second = &requests[1];
        let contents: Vec<_> = second[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["satu", "first", "dua", "dua"]);
    }

    #[tokio::test]
    async fn live_session_is_silent() {
        let f = fixture();
        let s = f.sessions.create_session(VisitorInfo::new("v1", "Ani")).await.unwrap();
        f.sessions.claim_session(&s.id, "a1", "Budi").await.unwrap();
        f.script.push(Ok("should not be used".into()));

        let resp = visitor_turn(&f, &s.id, "halo?").await;
        assert_eq!(resp.reply, "");
        assert!(!resp.suggest_handover);
        assert_eq!(f.script.calls(), 0);
    }

    #[tokio::test]
    async fn two_failures_offer_handover() {
        let f = fixture();
        let s = f.sessions.create_session(VisitorInfo::new("v1", "Ani")).await.unwrap();
        f.script.push(Err(ProviderError::Network("down".into())));
        f.script.push(Err(ProviderError::Parse("garbage".into())));

        let first = visitor_turn(&f, &s.id, "halo").await;
        assert_eq!(first.reply, REPLY_RETRY);
        assert!(!first.suggest_handover);

        let second = visitor_turn(&f, &s.id, "halo lagi").await;
        assert_eq!(second.reply, REPLY_OFFER_HANDOVER);
        assert!(second.suggest_handover);

        let got = f.sessions.get_session(&s.id).await.unwrap().unwrap();
        assert_eq!(got.failed_attempts, 2);
    }

    #[tokio::test]
    async fn success_resets_failure_streak() {
        let f = fixture();
        let s = f.sessions.create_session(VisitorInfo::new("v1", "Ani")).await.unwrap();
        f.script.push(Err(ProviderError::Remote("quota".into())));
        f.script.push(Ok("ok".into()));
        f.script.push(Err(ProviderError::Remote("quota".into())));

        visitor_turn(&f, &s.id, "a").await;
        visitor_turn(&f, &s.id, "b").await;
        assert_eq!(f.sessions.get_session(&s.id).await.unwrap().unwrap().failed_attempts, 0);

        let third = visitor_turn(&f, &s.id, "c").await;
        assert!(!third.suggest_handover);
    }

    #[tokio::test]
    async fn cancelled_turn_is_a_failure() {
        let f = fixture();
        let s = f.sessions.create_session(VisitorInfo::new("v1", "Ani")).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let resp = f.pipeline.process(&s.id, "halo", &cancel).await.unwrap();
        assert_eq!(resp.reply, REPLY_RETRY);
        assert_eq!(f.sessions.get_session(&s.id).await.unwrap().unwrap().failed_attempts, 1);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let f = fixture();
        let err = f.pipeline.process("nope", "halo", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }
}
