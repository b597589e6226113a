//! Wiring: builds the shared services once and hands them to transports.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{Config, ReaperConfig};
use crate::docstore::{self, DocumentStore};
use crate::engine::{ChatEngine, ChatResponse};
use crate::error::AppError;
use crate::knowledge::KnowledgeIndex;
use crate::llm::{LlmProvider, providers};
use crate::pipeline::MessagePipeline;
use crate::presence::PresenceRegistry;
use crate::reaper::{InactivityReaper, ReaperHandle};
use crate::session::{ChatMessage, ChatSession, Sender, SessionError, SessionStore, VisitorInfo};
use crate::settings::SettingsRepository;

/// Everything a visitor channel or agent dashboard talks to.
pub struct LiveChat {
    pub sessions: Arc<SessionStore>,
    pub presence: Arc<PresenceRegistry>,
    pub pipeline: Arc<MessagePipeline>,
    pub settings: Arc<SettingsRepository>,
    reaper: ReaperConfig,
}

impl LiveChat {
    /// Open the configured store, provider and knowledge file.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let store = docstore::open(&config.store, &config.work_dir)?;
        let provider = providers::build(&config.llm, config.llm_api_key.clone())?;
        let knowledge = match &config.engine.knowledge_file {
            Some(path) => KnowledgeIndex::load(path)?,
            None => KnowledgeIndex::default(),
        };
        Ok(Self::new(store, provider, knowledge, config))
    }

    pub fn new(store: Arc<dyn DocumentStore>, provider: LlmProvider, knowledge: KnowledgeIndex, config: &Config) -> Self {
        info!(
            provider = provider.name(),
            knowledge_items = knowledge.len(),
            store = store.backend(),
            "live chat core ready"
        );

        let presence = Arc::new(PresenceRegistry::new(config.presence.max_chats));
        let sessions = Arc::new(SessionStore::new(Arc::clone(&store), Arc::clone(&presence), &config.store));
        let engine = Arc::new(ChatEngine::new(provider, knowledge, config.engine.clone()));
        let pipeline = Arc::new(MessagePipeline::new(
            Arc::clone(&sessions),
            engine,
            config.pipeline.clone(),
        ));
        let settings = Arc::new(SettingsRepository::new(store, &config.store));

        Self {
            sessions,
            presence,
            pipeline,
            settings,
            reaper: config.reaper.clone(),
        }
    }

    /// Spawn the inactivity reaper; `None` when disabled in config.
    pub fn start_reaper(&self, shutdown: &CancellationToken) -> Option<ReaperHandle> {
        if !self.reaper.enabled {
            info!("reaper disabled");
            return None;
        }
        Some(InactivityReaper::new(Arc::clone(&self.sessions), &self.reaper).spawn(shutdown))
    }

    /// The visitor's open session, or a new one.
    pub async fn open_session(&self, visitor: VisitorInfo) -> Result<ChatSession, SessionError> {
        match self.sessions.get_active_session_for_visitor(&visitor.visitor_id).await? {
            Some(existing) => Ok(existing),
            None => self.sessions.create_session(visitor).await,
        }
    }

    /// Save the visitor's message, then run the pipeline. The message is
    /// stored before any engine work starts.
    pub async fn handle_visitor_message(
        &self,
        session_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, SessionError> {
        self.sessions
            .save_message(ChatMessage::new(session_id, Sender::Visitor, text))
            .await?;
        self.pipeline.process(session_id, text, cancel).await
    }
}
