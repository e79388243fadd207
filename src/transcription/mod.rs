//! Speech-to-text for finished recordings
//!
//! Backends implement [`TranscriptionBackend`] and are selected by
//! [`BackendKind`]:
//! - `local-engine`: fixed-length windows sent one by one to an on-device
//!   recognizer; misses become [`INAUDIBLE_MARKER`]
//! - `cloud-engine`: the whole file submitted as one long-running request

mod cloud;
mod local;
mod worker;

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TranscriptionError;

pub use cloud::{
    CloudEngineBackend, GoogleSpeechClient, LongRunningRecognizer, OperationStatus,
    RecognitionResult,
};
pub use local::{LocalEngineBackend, SegmentRecognizer, WhisperServerRecognizer};
pub use worker::{TranscriptOutcome, TranscriptionWorker};

/// Inserted in place of a window the local engine could not recognise
pub const INAUDIBLE_MARKER: &str = "[inaudible]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    LocalEngine,
    CloudEngine,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::LocalEngine => f.write_str("local-engine"),
            BackendKind::CloudEngine => f.write_str("cloud-engine"),
        }
    }
}

/// Text produced by a backend for one recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    /// Number of recognition units (windows or cloud results)
    pub segments: usize,
    /// Windows replaced by the inaudible marker
    pub inaudible_segments: usize,
}

/// Transcription backend trait
#[async_trait::async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Transcribe the finished recording at `path`
    async fn transcribe(&self, path: &Path) -> Result<Transcript, TranscriptionError>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub backend: BackendKind,
    /// Window length for the local engine, in seconds
    pub segment_secs: u64,
    pub local: LocalEngineConfig,
    pub cloud: CloudEngineConfig,
}

impl TranscriptionConfig {
    pub fn segment_duration(&self) -> Duration {
        Duration::from_secs(self.segment_secs.max(1))
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::LocalEngine,
            segment_secs: 30,
            local: LocalEngineConfig::default(),
            cloud: CloudEngineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalEngineConfig {
    /// whisper.cpp-compatible inference endpoint
    pub endpoint: String,
    pub language: String,
    pub request_timeout_secs: u64,
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/inference".to_string(),
            language: "auto".to_string(),
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudEngineConfig {
    pub endpoint: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub language_code: String,
    pub poll_interval_ms: u64,
    pub max_wait_secs: u64,
}

impl Default for CloudEngineConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://speech.googleapis.com/v1".to_string(),
            api_key_env: "GOOGLE_SPEECH_API_KEY".to_string(),
            language_code: "es-ES".to_string(),
            poll_interval_ms: 2000,
            max_wait_secs: 3600,
        }
    }
}

/// Build the backend for `kind` from configuration.
///
/// Fails with `BackendUnavailable` before any work starts when the backend
/// is not configured (e.g. no cloud credentials).
pub fn create_backend(
    kind: BackendKind,
    config: &TranscriptionConfig,
) -> Result<Arc<dyn TranscriptionBackend>, TranscriptionError> {
    match kind {
        BackendKind::LocalEngine => {
            let recognizer = WhisperServerRecognizer::new(&config.local)?;
            Ok(Arc::new(LocalEngineBackend::new(
                recognizer,
                config.segment_duration(),
            )))
        }
        BackendKind::CloudEngine => {
            let api_key = std::env::var(&config.cloud.api_key_env)
                .ok()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    TranscriptionError::BackendUnavailable(format!(
                        "cloud credentials missing: {} is not set",
                        config.cloud.api_key_env
                    ))
                })?;
            let client = GoogleSpeechClient::new(&config.cloud, api_key)?;
            Ok(Arc::new(CloudEngineBackend::new(
                client,
                Duration::from_millis(config.cloud.poll_interval_ms.max(1)),
                Duration::from_secs(config.cloud.max_wait_secs),
            )))
        }
    }
}
