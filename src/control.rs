//! Core operations behind the command surface
//!
//! Each command (start, stop, leave, status, transcribe, list, delete) maps
//! to one method on [`RecorderService`]. Errors come back typed; rendering
//! them for users is the caller's job.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{DisconnectPolicy, VoiceConfig};
use crate::error::{RecorderError, RecorderResult};
use crate::session::{
    format_hms, ActiveRecording, RecordingSession, SessionKey, SessionRegistry, SessionState,
};
use crate::storage::{StorageLayout, StoredRecording};
use crate::transcription::{BackendKind, TranscriptOutcome, TranscriptionWorker};
use crate::transport::{VoiceConnection, VoiceConnector};

/// Longest message part the chat surface accepts
pub const CHAT_CHUNK_LEN: usize = 1900;

#[derive(Debug, Clone, Serialize)]
pub struct StartedRecording {
    pub guild_id: u64,
    pub channel_id: u64,
    pub session_id: uuid::Uuid,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedRecording {
    pub name: String,
    pub channel_id: u64,
    pub path: PathBuf,
    pub size_bytes: usize,
    pub duration_secs: f64,
    /// `HH:MM:SS`
    pub duration: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaveSummary {
    pub guild_id: u64,
    /// Recordings discarded without saving
    pub discarded: usize,
}

/// Voice presence change reported by the voice gateway
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceEvent {
    pub guild_id: u64,
    pub channel_id: u64,
    pub joined: bool,
}

pub struct RecorderService {
    registry: SessionRegistry,
    connector: Arc<dyn VoiceConnector>,
    storage: StorageLayout,
    worker: TranscriptionWorker,
    voice: VoiceConfig,
}

impl RecorderService {
    pub fn new(
        registry: SessionRegistry,
        connector: Arc<dyn VoiceConnector>,
        storage: StorageLayout,
        worker: TranscriptionWorker,
        voice: VoiceConfig,
    ) -> Self {
        Self {
            registry,
            connector,
            storage,
            worker,
            voice,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn storage(&self) -> &StorageLayout {
        &self.storage
    }

    /// Join `key`'s voice channel and start recording it
    pub async fn start_recording(self: &Arc<Self>, key: SessionKey) -> RecorderResult<StartedRecording> {
        let session = self.registry.get_or_create(key).await?;

        info!("Starting recording for {}", key);

        let timeout = self.voice.connect_timeout();
        let connection = match tokio::time::timeout(timeout, self.connector.connect(key)).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                error!("Failed to connect to voice channel {}: {}", key, e);
                self.registry.remove_if_current(key, session.id()).await;
                return Err(e);
            }
            Err(_) => {
                warn!(
                    "Connecting to {} timed out after {}s",
                    key,
                    timeout.as_secs()
                );
                self.registry.remove_if_current(key, session.id()).await;
                return Err(RecorderError::ConnectTimeout {
                    channel_id: key.channel_id,
                    timeout,
                });
            }
        };

        if let Err(e) = session.start(connection.clone()) {
            error!("Failed to start recording on {}: {}", key, e);
            self.registry.remove_if_current(key, session.id()).await;
            if self.registry.sessions_in_guild(key.guild_id).await.is_empty() {
                connection.disconnect().await;
            }
            return Err(e);
        }

        self.arm_watchdog(&session);

        let started_at = session.started_at().unwrap_or_else(Utc::now);
        info!("Recording started successfully for {}", key);

        Ok(StartedRecording {
            guild_id: key.guild_id,
            channel_id: key.channel_id,
            session_id: session.id(),
            started_at,
        })
    }

    /// Stop and save a recording in `guild_id`.
    ///
    /// `channel_id` selects the session; without it (or when that channel is
    /// not recording, e.g. still connecting) the oldest recording session in
    /// the guild is stopped.
    pub async fn stop_recording(
        &self,
        guild_id: u64,
        channel_id: Option<u64>,
        name: Option<String>,
    ) -> RecorderResult<SavedRecording> {
        let sessions = self.registry.sessions_in_guild(guild_id).await;
        let recording: Vec<&Arc<RecordingSession>> = sessions
            .iter()
            .filter(|s| s.state() == SessionState::Recording)
            .collect();
        let session = channel_id
            .and_then(|channel| recording.iter().find(|s| s.key().channel_id == channel))
            .or_else(|| recording.first())
            .map(|s| Arc::clone(s))
            .ok_or(RecorderError::NotRecording { guild_id })?;

        self.stop_session(&session, name).await
    }

    async fn stop_session(
        &self,
        session: &Arc<RecordingSession>,
        name: Option<String>,
    ) -> RecorderResult<SavedRecording> {
        let key = session.key();
        let stopped = session.stop().await;

        if session.state().is_terminal() {
            self.registry.remove_if_current(key, session.id()).await;
            self.release_connection(session).await;
        }

        let stopped = stopped?;

        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_recording_name(key));
        let date = stopped.started_at.with_timezone(&Local).date_naive();

        let path = self.storage.save_recording(&stopped.bytes, &name, date).await?;

        info!(
            "Recording on {} saved as {} in {}",
            key,
            name,
            path.display()
        );

        Ok(SavedRecording {
            name,
            channel_id: key.channel_id,
            path,
            size_bytes: stopped.bytes.len(),
            duration_secs: stopped.duration.as_secs_f64(),
            duration: format_hms(stopped.duration),
        })
    }

    /// Discard every recording in the guild and leave voice
    pub async fn leave_channel(&self, guild_id: u64) -> RecorderResult<LeaveSummary> {
        let sessions = self.registry.sessions_in_guild(guild_id).await;
        let mut discarded = 0;
        let mut connections = self.connector.guild_connections(guild_id);

        for session in &sessions {
            if session.force_stop() {
                discarded += 1;
            }
            self.registry.remove_if_current(session.key(), session.id()).await;
            if let Some(connection) = session.connection() {
                connections.push(connection);
            }
        }

        disconnect_all(connections).await;

        info!(
            "Left voice in guild {} ({} recordings discarded)",
            guild_id, discarded
        );
        Ok(LeaveSummary {
            guild_id,
            discarded,
        })
    }

    pub async fn status(&self, guild_id: u64) -> Vec<ActiveRecording> {
        self.registry.list_active(guild_id).await
    }

    /// Transcribe the most recent recording matching `name`
    pub async fn transcribe(
        &self,
        name: &str,
        backend: Option<BackendKind>,
    ) -> RecorderResult<TranscriptOutcome> {
        let recording = self.storage.find_recording(name).await?;
        let kind = backend.unwrap_or_else(|| self.worker.default_backend());

        info!(
            "Transcribing recording {} with {}",
            recording.name, kind
        );

        Ok(self.worker.transcribe(&recording.path, kind).await?)
    }

    pub async fn list_recordings(&self) -> RecorderResult<Vec<StoredRecording>> {
        self.storage
            .list_recordings()
            .await
            .map_err(|e| RecorderError::storage(self.storage.recordings_root(), e))
    }

    pub async fn delete_recording(&self, name: &str) -> RecorderResult<StoredRecording> {
        self.storage.delete_recording(name).await
    }

    /// Auto-record a channel when someone joins it
    pub async fn on_voice_presence(
        self: &Arc<Self>,
        event: PresenceEvent,
    ) -> RecorderResult<Option<StartedRecording>> {
        if !event.joined || !self.voice.auto_record_on_join {
            return Ok(None);
        }

        let key = SessionKey::new(event.guild_id, event.channel_id);
        match self.start_recording(key).await {
            Ok(started) => Ok(Some(started)),
            Err(RecorderError::AlreadyActive(_)) => {
                info!("Already recording {}; not starting another", key);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Leave voice after a stop, as the disconnect policy dictates.
    ///
    /// Once the guild has no session left, every connection the connector
    /// holds there is closed, including ones left open by earlier stops.
    async fn release_connection(&self, session: &RecordingSession) {
        let guild_id = session.key().guild_id;
        let idle = self.registry.sessions_in_guild(guild_id).await.is_empty();

        let mut connections = Vec::new();
        if idle {
            connections.extend(self.connector.guild_connections(guild_id));
        }
        if idle || self.voice.disconnect_policy == DisconnectPolicy::Always {
            connections.extend(session.connection());
        }

        disconnect_all(connections).await;
    }

    /// Stop and save the session once it exceeds the configured maximum
    fn arm_watchdog(self: &Arc<Self>, session: &Arc<RecordingSession>) {
        let max = self.registry.config().max_duration;
        if max.is_zero() {
            return;
        }

        let service = Arc::downgrade(self);
        let key = session.key();
        let id = session.id();

        tokio::spawn(async move {
            tokio::time::sleep(max).await;
            let Some(service) = service.upgrade() else {
                return;
            };
            let Some(session) = service.registry.get(key).await else {
                return;
            };
            if session.id() != id || session.state() != SessionState::Recording {
                return;
            }

            warn!(
                "Recording on {} reached the {} limit; stopping",
                key,
                format_hms(max)
            );
            match service.stop_session(&session, None).await {
                Ok(saved) => info!("Auto-stopped recording saved to {}", saved.path.display()),
                Err(e) => error!("Auto-stop of {} failed: {}", key, e),
            }
        });
    }
}

/// Disconnect every connection that is still up; repeats are skipped
async fn disconnect_all(connections: Vec<Arc<dyn VoiceConnection>>) {
    for connection in connections {
        if connection.is_connected() {
            connection.disconnect().await;
        }
    }
}

/// Name used when a stop request carries none
pub fn default_recording_name(key: SessionKey) -> String {
    format!(
        "recording_{}_{}_{}",
        key.guild_id,
        key.channel_id,
        Utc::now().timestamp()
    )
}

/// Split `text` into parts of at most `max` characters
pub fn split_for_chat(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Human-readable status lines, one per active recording
pub fn render_status(active: &[ActiveRecording]) -> String {
    if active.is_empty() {
        return "No active recordings in this server.".to_string();
    }

    let mut message = String::from("Active recordings:\n");
    for recording in active {
        message.push_str(&format!(
            "- channel {}: {}\n",
            recording.channel_id,
            format_hms(recording.elapsed())
        ));
    }
    message
}
