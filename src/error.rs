use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::session::{SessionKey, SessionState};

pub type RecorderResult<T> = Result<T, RecorderError>;

/// Failures surfaced by session control, storage and the voice transport.
///
/// Every variant is recoverable at the control surface; none of them leaves
/// a session stuck in `Stopping`.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("voice transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("timed out after {}s connecting to voice channel {channel_id}", .timeout.as_secs())]
    ConnectTimeout { channel_id: u64, timeout: Duration },

    #[error("already recording in channel {} of guild {}", .0.channel_id, .0.guild_id)]
    AlreadyActive(SessionKey),

    #[error("no active recordings in guild {guild_id}")]
    NotRecording { guild_id: u64 },

    #[error("cannot {operation} a session in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("no audio was captured; nothing to save")]
    NoAudioCaptured,

    #[error("no recording matches `{0}`")]
    RecordingNotFound(String),

    #[error("failed to write `{path}`: {source}")]
    StorageWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
}

impl RecorderError {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StorageWriteFailure {
            path: path.into(),
            source,
        }
    }
}

/// Job-level transcription failures. Per-segment misses never reach this type.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("transcription backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("transcription request failed: {0}")]
    BackendRequestFailure(String),

    #[error("unreadable recording `{path}`: {reason}")]
    InvalidAudio { path: PathBuf, reason: String },

    #[error("failed to persist transcript `{path}`: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transcription task aborted: {0}")]
    Aborted(String),
}

/// Outcome of recognising a single audio window.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("no speech recognised in segment")]
    NoSpeech,

    #[error("recognition request failed: {0}")]
    Request(String),
}
