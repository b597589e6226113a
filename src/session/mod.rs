//! Chat sessions, their messages and the status state machine.
//!
//! ```text
//!            ┌──────────────┐
//!            ▼              │ return_to_bot
//!   bot ──► queued ──► live ┤
//!    │        │         │   │
//!    └────────┴────┬────┘   │
//!                  ▼        │
//!               closed ◄────┘ (terminal)
//! ```
//!
//! Documents are stored with camelCase field names. The document id is not
//! part of the body; it is filled in from the store on read.

pub mod store;
pub mod summary;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::docstore::StoreError;
use crate::engine::Sentiment;

pub use store::SessionStore;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition { from: SessionStatus, to: SessionStatus },
}

// ── Status ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Bot,
    Queued,
    Live,
    Closed,
}

impl SessionStatus {
    /// Statuses a visitor can still be talking in.
    pub const ACTIVE: [SessionStatus; 3] = [SessionStatus::Bot, SessionStatus::Queued, SessionStatus::Live];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Bot => "bot",
            SessionStatus::Queued => "queued",
            SessionStatus::Live => "live",
            SessionStatus::Closed => "closed",
        }
    }

    pub fn is_active(&self) -> bool {
        *self != SessionStatus::Closed
    }

    /// `closed` is terminal and a live session cannot fall back into the queue.
    /// Self-transitions are allowed for the active states (`live → live` is a
    /// transfer to another agent).
    pub fn can_transition_to(&self, to: SessionStatus) -> bool {
        !matches!(
            (self, to),
            (SessionStatus::Closed, _) | (SessionStatus::Live, SessionStatus::Queued)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Visitor,
    Bot,
    Admin,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(skip)]
    pub id: String,
    pub session_id: String,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// New unsaved message stamped with the current time.
    pub fn new(session_id: impl Into<String>, sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            session_id: session_id.into(),
            sender,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Who the visitor says they are, captured on first contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorInfo {
    pub visitor_id: String,
    #[serde(default)]
    pub visitor_name: String,
    #[serde(default)]
    pub visitor_email: String,
    #[serde(default)]
    pub visitor_phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl VisitorInfo {
    pub fn new(visitor_id: impl Into<String>, visitor_name: impl Into<String>) -> Self {
        Self {
            visitor_id: visitor_id.into(),
            visitor_name: visitor_name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    #[serde(skip)]
    pub id: String,
    #[serde(flatten)]
    pub visitor: VisitorInfo,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_admin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default)]
    pub failed_attempts: u32,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl ChatSession {
    /// A fresh `bot` session; the id is assigned when it is stored.
    pub fn new(visitor: VisitorInfo, now: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            visitor,
            status: SessionStatus::Bot,
            assigned_admin: None,
            ai_summary: None,
            sentiment: Sentiment::Neutral,
            failed_attempts: 0,
            last_message_at: now,
            created_at: now,
            closed_at: None,
        }
    }

    /// Move to `to`, keeping the derived fields consistent:
    /// only `live` keeps an assigned agent, only `closed` has `closed_at`,
    /// and entering `bot` clears the failure counter.
    pub fn transition_to(&mut self, to: SessionStatus, now: DateTime<Utc>) -> Result<(), SessionError> {
        if !self.status.can_transition_to(to) {
            return Err(SessionError::InvalidTransition { from: self.status, to });
        }

        self.status = to;
        if to != SessionStatus::Live {
            self.assigned_admin = None;
        }
        self.closed_at = (to == SessionStatus::Closed).then_some(now);
        if to == SessionStatus::Bot {
            self.failed_attempts = 0;
        }
        Ok(())
    }
}
