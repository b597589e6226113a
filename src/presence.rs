//! Agent presence registry.
//!
//! In-process directory of human agents and their availability. Reads share
//! the lock; `report_status` takes it exclusively. Nothing here is persisted,
//! so a multi-instance deployment sees only its own agents.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceState {
    Online,
    Away,
    Offline,
}

impl PresenceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceState::Online => "online",
            PresenceState::Away => "away",
            PresenceState::Offline => "offline",
        }
    }
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresenceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(PresenceState::Online),
            "away" => Ok(PresenceState::Away),
            "offline" => Ok(PresenceState::Offline),
            other => Err(format!("unknown presence state: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub agent_id: String,
    pub agent_name: String,
    pub state: PresenceState,
    pub active_chats: u32,
    pub max_chats: u32,
    pub last_seen: DateTime<Utc>,
}

pub struct PresenceRegistry {
    agents: RwLock<HashMap<String, AgentStatus>>,
    max_chats: u32,
}

impl PresenceRegistry {
    /// `max_chats` is the capacity given to newly registered agents.
    pub fn new(max_chats: u32) -> Self {
        Self { agents: RwLock::new(HashMap::new()), max_chats }
    }

    /// `Offline` removes the agent; any other state upserts it. Existing
    /// entries keep their name and chat counters.
    pub async fn report_status(&self, agent_id: &str, agent_name: &str, state: PresenceState) {
        let now = Utc::now();
        let mut agents = self.agents.write().await;

        if state == PresenceState::Offline {
            if agents.remove(agent_id).is_some() {
                info!(agent_id, "agent went offline");
            }
            return;
        }

        match agents.get_mut(agent_id) {
            Some(existing) => {
                existing.state = state;
                existing.last_seen = now;
                debug!(agent_id, %state, "agent presence refreshed");
            }
            None => {
                agents.insert(
                    agent_id.to_string(),
                    AgentStatus {
                        agent_id: agent_id.to_string(),
                        agent_name: agent_name.to_string(),
                        state,
                        active_chats: 0,
                        max_chats: self.max_chats,
                        last_seen: now,
                    },
                );
                info!(agent_id, agent_name, %state, "agent registered");
            }
        }
    }

    pub async fn is_anyone_online(&self) -> bool {
        self.agents
            .read()
            .await
            .values()
            .any(|a| a.state == PresenceState::Online)
    }

    /// Snapshot of online agents, ordered by agent id.
    pub async fn list_online(&self) -> Vec<AgentStatus> {
        let mut online: Vec<AgentStatus> = self
            .agents
            .read()
            .await
            .values()
            .filter(|a| a.state == PresenceState::Online)
            .cloned()
            .collect();
        online.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        online
    }

    pub async fn get(&self, agent_id: &str) -> Option<AgentStatus> {
        self.agents.read().await.get(agent_id).cloned()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new(crate::config::PresenceConfig::default().max_chats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn offline_for_unknown_agent_is_noop() {
        let reg = PresenceRegistry::default();
        reg.report_status("a1", "Ani", PresenceState::Offline).await;
        assert!(!reg.is_anyone_online().await);
        assert!(reg.list_online().await.is_empty());
    }

    #[tokio::test]
    async fn online_then_offline_leaves_nobody() {
        let reg = PresenceRegistry::default();
        reg.report_status("a1", "Ani", PresenceState::Online).await;
        assert!(reg.is_anyone_online().await);
        reg.report_status("a1", "Ani", PresenceState::Offline).await;
        assert!(!reg.is_anyone_online().await);
        assert!(reg.get("a1").await.is_none());
    }

    #[tokio::test]
    async fn away_is_registered_but_not_online() {
        let reg = PresenceRegistry::default();
        reg.report_status("a1", "Ani", PresenceState::Away).await;
        assert!(!reg.is_anyone_online().await);
        assert_eq!(reg.get("a1").await.unwrap().state, PresenceState::Away);
    }

    #[tokio::test]
    async fn new_entries_take_configured_capacity() {
        let reg = PresenceRegistry::new(3);
        reg.report_status("a1", "Ani", PresenceState::Online).await;
        let a = reg.get("a1").await.unwrap();
        assert_eq!(a.max_chats, 3);
        assert_eq!(a.active_chats, 0);
    }

    #[tokio::test]
    async fn update_refreshes_state_keeps_name() {
        let reg = PresenceRegistry::default();
        reg.report_status("a1", "Ani", PresenceState::Away).await;
        let before = reg.get("a1").await.unwrap().last_seen;
        reg.report_status("a1", "Renamed", PresenceState::Online).await;
        let a = reg.get("a1").await.unwrap();
        assert_eq!(a.state, PresenceState::Online);
        assert_eq!(a.agent_name, "Ani");
        assert!(a.last_seen >= before);
    }

    #[tokio::test]
    async fn list_online_is_sorted_snapshot() {
        let reg = PresenceRegistry::default();
        reg.report_status("b", "Budi", PresenceState::Online).await;
        reg.report_status("a", "Ani", PresenceState::Online).await;
        reg.report_status("c", "Citra", PresenceState::Away).await;

        let mut snapshot = reg.list_online().await;
        let ids: Vec<_> = snapshot.iter().map(|a| a.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        snapshot[0].state = PresenceState::Offline;
        assert_eq!(reg.get("a").await.unwrap().state, PresenceState::Online);
    }

    #[tokio::test]
    async fn concurrent_reports() {
        let reg = Arc::new(PresenceRegistry::default());
        let mut handles = Vec::new();
        for i in 0..16 {
            let reg = Arc::clone(&reg);
            handles.push(tokio::spawn(async move {
                reg.report_status(&format!("agent-{i:02}"), "x", PresenceState::Online).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(reg.list_online().await.len(), 16);
    }

    #[test]
    fn parses_states() {
        assert_eq!("Online".parse::<PresenceState>().unwrap(), PresenceState::Online);
        assert_eq!(" away ".parse::<PresenceState>().unwrap(), PresenceState::Away);
        assert!("busy".parse::<PresenceState>().is_err());
    }
}
