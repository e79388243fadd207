use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::config::SessionConfig;
use super::session::{RecordingSession, SessionKey};
use super::stats::ActiveRecording;
use crate::error::{RecorderError, RecorderResult};

/// Authoritative map of live sessions, at most one per voice channel
pub struct SessionRegistry {
    config: SessionConfig,
    /// Active sessions (guild/channel → session)
    sessions: RwLock<HashMap<SessionKey, Arc<RecordingSession>>>,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create an idle session for `key`, or fail with `AlreadyActive` if one exists
    pub async fn get_or_create(&self, key: SessionKey) -> RecorderResult<Arc<RecordingSession>> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&key) {
            return Err(RecorderError::AlreadyActive(key));
        }

        let session = Arc::new(RecordingSession::new(key, &self.config));
        sessions.insert(key, session.clone());
        debug!("Registered session {} for {}", session.id(), key);
        Ok(session)
    }

    pub async fn get(&self, key: SessionKey) -> Option<Arc<RecordingSession>> {
        self.sessions.read().await.get(&key).cloned()
    }

    /// Remove the entry for `key`; no-op if absent
    pub async fn remove(&self, key: SessionKey) -> Option<Arc<RecordingSession>> {
        let removed = self.sessions.write().await.remove(&key);
        if removed.is_some() {
            info!("Removed session for {}", key);
        }
        removed
    }

    /// Remove the entry for `key` only if it is still generation `id`
    pub async fn remove_if_current(&self, key: SessionKey, id: Uuid) -> Option<Arc<RecordingSession>> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&key) {
            Some(session) if session.id() == id => sessions.remove(&key),
            _ => None,
        }
    }

    /// Snapshot of recordings in `guild_id`, oldest first
    pub async fn list_active(&self, guild_id: u64) -> Vec<ActiveRecording> {
        let sessions = self.sessions.read().await;
        let mut active: Vec<ActiveRecording> = sessions
            .values()
            .filter(|session| session.key().guild_id == guild_id)
            .filter_map(|session| {
                session.started_at().map(|started_at| ActiveRecording {
                    channel_id: session.key().channel_id,
                    started_at,
                    duration_secs: session.elapsed().as_secs_f64(),
                })
            })
            .collect();
        active.sort_by_key(|recording| (recording.started_at, recording.channel_id));
        active
    }

    /// Sessions in `guild_id`, oldest first
    pub async fn sessions_in_guild(&self, guild_id: u64) -> Vec<Arc<RecordingSession>> {
        let sessions = self.sessions.read().await;
        let mut found: Vec<Arc<RecordingSession>> = sessions
            .values()
            .filter(|session| session.key().guild_id == guild_id)
            .cloned()
            .collect();
        found.sort_by_key(|session| (session.started_at(), session.key().channel_id));
        found
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
