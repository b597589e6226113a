//! Session store: lifecycle operations over the document store.
//!
//! Every operation is a plain read-then-write against the backing
//! [`DocumentStore`]; nothing here serialises concurrent writers, so two
//! writers racing on the same session resolve last-write-wins. Callers that
//! only touch a couple of fields should prefer [`SessionStore::update_fields`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use super::summary;
use super::{ChatMessage, ChatSession, Sender, SessionError, SessionStatus, VisitorInfo};
use crate::config::StoreConfig;
use crate::docstore::{self, Direction, Document, DocumentStore, Query, StoreError};
use crate::engine::Sentiment;
use crate::presence::PresenceRegistry;

/// Messages considered by [`SessionStore::summarize`].
const SUMMARY_SOURCE_LIMIT: usize = 50;

const MSG_HANDOVER_REQUESTED: &str = "Pengunjung meminta untuk dihubungkan dengan admin.";
const MSG_RETURNED_TO_BOT: &str = "Sesi telah dikembalikan ke AI. Silakan lanjutkan percakapan Anda.";

pub struct SessionStore {
    store: Arc<dyn DocumentStore>,
    presence: Arc<PresenceRegistry>,
    sessions: String,
    messages: String,
}

impl SessionStore {
    pub fn new(store: Arc<dyn DocumentStore>, presence: Arc<PresenceRegistry>, config: &StoreConfig) -> Self {
        Self {
            store,
            presence,
            sessions: config.sessions_collection.clone(),
            messages: config.messages_collection.clone(),
        }
    }

    pub fn presence(&self) -> &Arc<PresenceRegistry> {
        &self.presence
    }

    // ── Sessions ──────────────────────────────────────────────────────────────

    pub async fn create_session(&self, visitor: VisitorInfo) -> Result<ChatSession, SessionError> {
        let mut session = ChatSession::new(visitor, Utc::now());
        let data = docstore::encode(&session)?;
        let collection = self.sessions.clone();
        session.id = docstore::blocking(&self.store, "create_session", move |s| s.insert(&collection, data)).await?;

        info!(session_id = %session.id, visitor_id = %session.visitor.visitor_id, "session created");
        Ok(session)
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<ChatSession>, SessionError> {
        let collection = self.sessions.clone();
        let key = id.to_string();
        let doc = docstore::blocking(&self.store, "get_session", move |s| s.get(&collection, &key)).await?;
        Ok(doc.as_ref().map(decode_session).transpose()?)
    }

    /// Most recently created session of `visitor_id` that is not closed.
    pub async fn get_active_session_for_visitor(&self, visitor_id: &str) -> Result<Option<ChatSession>, SessionError> {
        let query = Query::new()
            .where_eq("visitorId", visitor_id)
            .where_in("status", SessionStatus::ACTIVE.map(|s| s.as_str()))
            .order_by("createdAt", Direction::Desc)
            .limit(1);
        let docs = self.query_sessions("get_active_session_for_visitor", query).await?;
        Ok(docs.first().map(decode_session).transpose()?)
    }

    /// Replace the whole session document.
    pub async fn update_session(&self, session: &ChatSession) -> Result<(), SessionError> {
        let data = docstore::encode(session)?;
        let collection = self.sessions.clone();
        let id = session.id.clone();
        docstore::blocking(&self.store, "update_session", move |s| s.set(&collection, &id, data)).await?;
        Ok(())
    }

    /// Merge a JSON object of camelCase fields into the session document.
    pub async fn update_fields(&self, id: &str, fields: Value) -> Result<(), SessionError> {
        let Value::Object(fields) = fields else {
            return Err(StoreError::Malformed {
                id: id.to_string(),
                reason: "partial update must be a JSON object".into(),
            }
            .into());
        };
        self.merge_fields(id, fields).await
    }

    async fn merge_fields(&self, id: &str, fields: Map<String, Value>) -> Result<(), SessionError> {
        let collection = self.sessions.clone();
        let key = id.to_string();
        match docstore::blocking(&self.store, "update_fields", move |s| s.update(&collection, &key, fields)).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound { .. }) => Err(SessionError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Sessions waiting for or talking to an agent, oldest first.
    pub async fn list_queued_and_live(&self) -> Result<Vec<ChatSession>, SessionError> {
        let query = Query::new()
            .where_in("status", [SessionStatus::Queued.as_str(), SessionStatus::Live.as_str()])
            .order_by("createdAt", Direction::Asc);
        let docs = self.query_sessions("list_queued_and_live", query).await?;
        Ok(decode_all(&docs, decode_session))
    }

    // ── Messages ──────────────────────────────────────────────────────────────

    /// Store `message`, then move the session's `lastMessageAt` forward.
    /// Only the insert can fail the call.
    pub async fn save_message(&self, mut message: ChatMessage) -> Result<ChatMessage, SessionError> {
        let data = docstore::encode(&message)?;
        let collection = self.messages.clone();
        message.id = docstore::blocking(&self.store, "save_message", move |s| s.insert(&collection, data)).await?;

        let touch = json!({ "lastMessageAt": message.timestamp });
        if let Err(e) = self.update_fields(&message.session_id, touch).await {
            warn!(session_id = %message.session_id, error = %e, "failed to update session lastMessageAt");
        }

        debug!(session_id = %message.session_id, message_id = %message.id, sender = ?message.sender, "message saved");
        Ok(message)
    }

    /// The `limit` most recent messages of a session, oldest first.
    pub async fn get_messages(&self, session_id: &str, limit: usize) -> Result<Vec<ChatMessage>, SessionError> {
        let query = Query::new()
            .where_eq("sessionId", session_id)
            .order_by("timestamp", Direction::Desc)
            .limit(limit);
        let collection = self.messages.clone();
        let docs = docstore::blocking(&self.store, "get_messages", move |s| s.query(&collection, &query)).await?;

        let mut messages = decode_all(&docs, decode_message);
        messages.reverse();
        Ok(messages)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Queue the session for an agent. Returns whether any agent is online
    /// right now, so the caller can warn the visitor about the wait.
    pub async fn request_handover(&self, id: &str) -> Result<bool, SessionError> {
        let mut session = self.require_session(id).await?;
        if session.status != SessionStatus::Queued {
            session.transition_to(SessionStatus::Queued, Utc::now())?;
            self.update_session(&session).await?;
            self.append_system_message(id, MSG_HANDOVER_REQUESTED).await;
            info!(session_id = %id, "handover requested");
        }
        Ok(self.presence.is_anyone_online().await)
    }

    /// Assign the session to an agent. Claiming a live session transfers it.
    pub async fn claim_session(&self, id: &str, agent_id: &str, agent_name: &str) -> Result<(), SessionError> {
        let mut session = self.require_session(id).await?;
        session.transition_to(SessionStatus::Live, Utc::now())?;
        session.assigned_admin = Some(agent_id.to_string());
        self.update_session(&session).await?;

        self.append_system_message(id, &format!("{agent_name} telah bergabung ke chat.")).await;
        info!(session_id = %id, agent_id, "session claimed");
        Ok(())
    }

    /// Closing an already closed session succeeds without writing.
    pub async fn close_session(&self, id: &str) -> Result<(), SessionError> {
        let mut session = self.require_session(id).await?;
        if session.status == SessionStatus::Closed {
            debug!(session_id = %id, "close: already closed");
            return Ok(());
        }
        session.transition_to(SessionStatus::Closed, Utc::now())?;
        self.update_session(&session).await?;
        info!(session_id = %id, "session closed");
        Ok(())
    }

    pub async fn return_to_bot(&self, id: &str) -> Result<(), SessionError> {
        let mut session = self.require_session(id).await?;
        session.transition_to(SessionStatus::Bot, Utc::now())?;
        self.update_session(&session).await?;

        self.append_system_message(id, MSG_RETURNED_TO_BOT).await;
        info!(session_id = %id, "session returned to bot");
        Ok(())
    }

    /// Plain-text digest of the recent conversation for the agent taking over.
    pub async fn summarize(&self, id: &str) -> Result<String, SessionError> {
        let messages = self.get_messages(id, SUMMARY_SOURCE_LIMIT).await?;
        let session = if messages.is_empty() { None } else { self.get_session(id).await? };
        Ok(summary::format_summary(session.as_ref(), &messages))
    }

    /// Close every active session whose last message is older than `cutoff`.
    /// Sessions that fail to close are logged and left for the next sweep.
    /// Returns the number closed.
    pub async fn close_inactive(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> Result<usize, SessionError> {
        let query = Query::new()
            .where_in("status", SessionStatus::ACTIVE.map(|s| s.as_str()))
            .where_lt("lastMessageAt", cutoff.to_rfc3339());
        let docs = self.query_sessions("close_inactive", query).await?;

        let minutes = ((now - cutoff).num_seconds().max(0) + 59) / 60;
        let notice = format!("Sesi chat telah berakhir otomatis karena tidak ada aktivitas selama {minutes} menit.");

        let mut closed = 0;
        for doc in &docs {
            let mut session = match decode_session(doc) {
                Ok(s) => s,
                Err(e) => {
                    warn!(session_id = %doc.id, error = %e, "inactive sweep: skipping unreadable session");
                    continue;
                }
            };
            if let Err(e) = session.transition_to(SessionStatus::Closed, now) {
                warn!(session_id = %session.id, error = %e, "inactive sweep: cannot close session");
                continue;
            }
            session.sentiment = Sentiment::Timeout;
            if let Err(e) = self.update_session(&session).await {
                warn!(session_id = %session.id, error = %e, "inactive sweep: failed to close session");
                continue;
            }

            self.append_system_message(&session.id, &notice).await;
            debug!(session_id = %session.id, "inactive session closed");
            closed += 1;
        }
        Ok(closed)
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    async fn require_session(&self, id: &str) -> Result<ChatSession, SessionError> {
        self.get_session(id)
            .await?
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    async fn query_sessions(&self, op: &'static str, query: Query) -> Result<Vec<Document>, SessionError> {
        let collection = self.sessions.clone();
        Ok(docstore::blocking(&self.store, op, move |s| s.query(&collection, &query)).await?)
    }

    /// Status notices follow a committed transition; losing one is logged.
    async fn append_system_message(&self, session_id: &str, content: &str) {
        let message = ChatMessage::new(session_id, Sender::System, content);
        if let Err(e) = self.save_message(message).await {
            warn!(session_id, error = %e, "failed to save system message");
        }
    }
}

fn decode_session(doc: &Document) -> Result<ChatSession, StoreError> {
    let mut session: ChatSession = doc.decode()?;
    session.id = doc.id.clone();
    Ok(session)
}

fn decode_message(doc: &Document) -> Result<ChatMessage, StoreError> {
    let mut message: ChatMessage = doc.decode()?;
    message.id = doc.id.clone();
    Ok(message)
}

/// Decode each document, dropping (and logging) the ones that do not parse.
fn decode_all<T>(docs: &[Document], decode: fn(&Document) -> Result<T, StoreError>) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match decode(doc) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(document_id = %doc.id, error = %e, "skipping malformed document");
                None
            }
        })
        .collect()
}
