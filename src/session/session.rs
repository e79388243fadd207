use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::SessionConfig;
use crate::audio::{AudioBuffer, AudioFormat, AudioFrame};
use crate::error::{RecorderError, RecorderResult};
use crate::transport::VoiceConnection;

/// Identity of a recording: one voice channel within one guild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub guild_id: u64,
    pub channel_id: u64,
}

impl SessionKey {
    pub fn new(guild_id: u64, channel_id: u64) -> Self {
        Self {
            guild_id,
            channel_id,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.guild_id, self.channel_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Recording,
    Stopping,
    Finalized,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Finalized | SessionState::Failed)
    }
}

/// Audio handed back by a successful stop
#[derive(Debug)]
pub struct StoppedRecording {
    /// Complete WAV file image
    pub bytes: Vec<u8>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

struct SessionInner {
    state: SessionState,
    started_at: Option<DateTime<Utc>>,
    started: Option<Instant>,
    buffer: Option<AudioBuffer>,
    connection: Option<Arc<dyn VoiceConnection>>,
    dropped_frames: u64,
    rejected_frames: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intake {
    /// Called by the owner of the session
    Direct,
    /// Delivered through the transport subscription
    Queued,
}

/// Upper bound on waiting for queued frames during stop
const PUMP_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// One recording attempt bound to a single voice channel.
///
/// Lifecycle: `Idle -> Recording -> Stopping -> Finalized | Failed`. A session
/// is never restarted; a new recording needs a new session.
pub struct RecordingSession {
    key: SessionKey,
    id: Uuid,
    format: AudioFormat,
    inner: Mutex<SessionInner>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl RecordingSession {
    pub fn new(key: SessionKey, config: &SessionConfig) -> Self {
        Self {
            key,
            id: Uuid::new_v4(),
            format: config.format(),
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                started_at: None,
                started: None,
                buffer: None,
                connection: None,
                dropped_frames: 0,
                rejected_frames: 0,
            }),
            pump: Mutex::new(None),
        }
    }

    pub fn key(&self) -> SessionKey {
        self.key
    }

    /// Generation id; distinguishes successive sessions on the same channel
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.inner
            .lock()
            .started
            .map(|started| started.elapsed())
            .unwrap_or_default()
    }

    pub fn connection(&self) -> Option<Arc<dyn VoiceConnection>> {
        self.inner.lock().connection.clone()
    }

    /// PCM bytes buffered so far
    pub fn payload_len(&self) -> usize {
        self.inner
            .lock()
            .buffer
            .as_ref()
            .map(AudioBuffer::payload_len)
            .unwrap_or(0)
    }

    /// Frames rejected because the session was not recording
    pub fn dropped_frames(&self) -> u64 {
        self.inner.lock().dropped_frames
    }

    /// Frames rejected because their format could not be converted
    pub fn rejected_frames(&self) -> u64 {
        self.inner.lock().rejected_frames
    }

    /// Open a fresh buffer, subscribe to the connection's frames and begin recording.
    ///
    /// Must be called from within a tokio runtime. If subscribing fails the
    /// session stays `Idle`.
    pub fn start(self: &Arc<Self>, connection: Arc<dyn VoiceConnection>) -> RecorderResult<()> {
        let mut frames = {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Idle {
                return Err(RecorderError::InvalidState {
                    operation: "start",
                    state: inner.state,
                });
            }

            let frames = connection.subscribe()?;

            inner.buffer = Some(AudioBuffer::opened(self.format));
            inner.started_at = Some(Utc::now());
            inner.started = Some(Instant::now());
            inner.connection = Some(connection);
            inner.state = SessionState::Recording;
            frames
        };

        info!(
            "Recording started on {} ({}Hz, {} channels)",
            self.key, self.format.sample_rate, self.format.channels
        );

        let session = Arc::downgrade(self);
        let pump = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                let Some(session) = session.upgrade() else {
                    break;
                };
                session.append(frame, Intake::Queued);
            }
            debug!("Frame pump finished");
        });
        *self.pump.lock() = Some(pump);

        Ok(())
    }

    /// Append a frame to the buffer. Returns `false` if the frame was dropped
    /// because the session is not recording or its format cannot be converted.
    pub fn feed(&self, frame: AudioFrame) -> bool {
        self.append(frame, Intake::Direct)
    }

    fn append(&self, frame: AudioFrame, intake: Intake) -> bool {
        let source = frame.format();
        let Some(frame) = frame.conform_to(self.format) else {
            let mut inner = self.inner.lock();
            inner.rejected_frames += 1;
            warn!(
                "Rejecting frame for {} in unsupported format {}Hz/{}ch",
                self.key, source.sample_rate, source.channels
            );
            return false;
        };

        let mut inner = self.inner.lock();
        let accepting = match inner.state {
            SessionState::Recording => true,
            // frames the transport queued before unsubscribe still belong to the recording
            SessionState::Stopping => intake == Intake::Queued,
            _ => false,
        };
        if !accepting {
            inner.dropped_frames += 1;
            debug!(
                "Dropping frame for {} in state {:?} ({} samples)",
                self.key,
                inner.state,
                frame.samples.len()
            );
            return false;
        }

        match inner.buffer.as_mut() {
            Some(buffer) => buffer.append_samples(&frame.samples),
            None => false,
        }
    }

    /// Stop recording and return the finalized audio.
    ///
    /// The state flips to `Stopping` first, so a direct [`feed`](Self::feed)
    /// racing the stop is rejected. Frames the transport had already queued
    /// are drained into the buffer after unsubscribing. Every path ends in
    /// `Finalized` or `Failed`; an empty buffer yields `NoAudioCaptured`.
    pub async fn stop(&self) -> RecorderResult<StoppedRecording> {
        let connection = {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Recording {
                return Err(RecorderError::InvalidState {
                    operation: "stop",
                    state: inner.state,
                });
            }
            inner.state = SessionState::Stopping;
            inner.connection.clone()
        };

        info!("Stopping recording on {}", self.key);
        if let Some(connection) = connection {
            connection.unsubscribe();
        }
        self.drain_pump().await;

        let mut inner = self.inner.lock();
        let Some(mut buffer) = inner.buffer.take() else {
            inner.state = SessionState::Failed;
            warn!("Session {} lost its buffer before stop", self.key);
            return Err(RecorderError::InvalidState {
                operation: "finalize",
                state: SessionState::Failed,
            });
        };

        let audio = buffer.finalize();
        let duration = inner.started.map(|s| s.elapsed()).unwrap_or_default();
        let started_at = inner.started_at.unwrap_or_else(Utc::now);
        inner.state = SessionState::Finalized;

        if inner.dropped_frames > 0 || inner.rejected_frames > 0 {
            debug!(
                "Session {} dropped {} late and {} malformed frames",
                self.key, inner.dropped_frames, inner.rejected_frames
            );
        }

        match audio {
            Some(bytes) => {
                info!(
                    "Recording on {} finalized: {} bytes over {:.1}s",
                    self.key,
                    bytes.len(),
                    duration.as_secs_f64()
                );
                Ok(StoppedRecording {
                    bytes,
                    started_at,
                    duration,
                })
            }
            None => {
                warn!("Recording on {} captured no audio", self.key);
                Err(RecorderError::NoAudioCaptured)
            }
        }
    }

    /// Wait for the pump to empty the closed subscription queue
    async fn drain_pump(&self) {
        let Some(mut pump) = self.pump.lock().take() else {
            return;
        };
        if tokio::time::timeout(PUMP_DRAIN_TIMEOUT, &mut pump).await.is_err() {
            warn!(
                "Frame queue for {} still open after {}s; discarding the rest",
                self.key,
                PUMP_DRAIN_TIMEOUT.as_secs()
            );
            pump.abort();
        }
    }

    /// Discard everything and finish without output. Safe to call repeatedly;
    /// returns `true` only for the call that actually terminated the session.
    pub fn force_stop(&self) -> bool {
        let connection = {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Finalized | SessionState::Failed | SessionState::Stopping => {
                    return false;
                }
                SessionState::Idle | SessionState::Recording => {}
            }
            inner.state = SessionState::Finalized;
            inner.buffer.take();
            inner.connection.clone()
        };

        info!("Force-stopped recording on {} without saving", self.key);
        self.detach(connection);
        true
    }

    fn detach(&self, connection: Option<Arc<dyn VoiceConnection>>) {
        if let Some(connection) = connection {
            connection.unsubscribe();
        }
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}

impl fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSession")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
