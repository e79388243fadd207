use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{LocalEngineConfig, Transcript, TranscriptionBackend, INAUDIBLE_MARKER};
use crate::audio::{AudioFile, AudioFormat};
use crate::error::{RecognitionError, TranscriptionError};

/// Recognises one short window of audio
#[async_trait::async_trait]
pub trait SegmentRecognizer: Send + Sync {
    /// `wav` is a complete WAV image of the window
    async fn recognize(&self, wav: Vec<u8>, format: AudioFormat) -> Result<String, RecognitionError>;

    fn name(&self) -> &str;
}

/// Windowed transcription with per-window failure isolation
pub struct LocalEngineBackend<R> {
    recognizer: R,
    segment: Duration,
}

impl<R: SegmentRecognizer> LocalEngineBackend<R> {
    pub fn new(recognizer: R, segment: Duration) -> Self {
        Self {
            recognizer,
            segment,
        }
    }

    /// Transcribe already-decoded audio
    pub async fn transcribe_audio(&self, audio: &AudioFile) -> Transcript {
        let format = audio.format();
        let mut parts = Vec::new();
        let mut inaudible = 0;

        for (index, window) in audio.windows(self.segment).enumerate() {
            let Some(wav) = audio.encode_window(window) else {
                continue;
            };

            match self.recognizer.recognize(wav, format).await {
                Ok(text) if !text.trim().is_empty() => {
                    debug!("Segment {} recognised ({} chars)", index, text.len());
                    parts.push(text.trim().to_string());
                }
                Ok(_) | Err(RecognitionError::NoSpeech) => {
                    debug!("Segment {} inaudible", index);
                    inaudible += 1;
                    parts.push(INAUDIBLE_MARKER.to_string());
                }
                Err(RecognitionError::Request(e)) => {
                    warn!("Segment {} recognition failed: {}", index, e);
                    inaudible += 1;
                    parts.push(INAUDIBLE_MARKER.to_string());
                }
            }
        }

        Transcript {
            text: parts.join(" "),
            segments: parts.len(),
            inaudible_segments: inaudible,
        }
    }
}

#[async_trait::async_trait]
impl<R: SegmentRecognizer> TranscriptionBackend for LocalEngineBackend<R> {
    async fn transcribe(&self, path: &Path) -> Result<Transcript, TranscriptionError> {
        let path_buf = path.to_path_buf();
        let audio = tokio::task::spawn_blocking(move || AudioFile::open(path_buf))
            .await
            .map_err(|e| TranscriptionError::Aborted(e.to_string()))??;

        info!(
            "Local transcription of {} in {}s windows via {}",
            audio.path,
            self.segment.as_secs(),
            self.recognizer.name()
        );

        let transcript = self.transcribe_audio(&audio).await;

        info!(
            "Local transcription complete: {} segments, {} inaudible",
            transcript.segments, transcript.inaudible_segments
        );
        Ok(transcript)
    }

    fn name(&self) -> &str {
        "local-engine"
    }
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    text: String,
}

/// Client for a whisper.cpp-style `/inference` server running on this host
pub struct WhisperServerRecognizer {
    http: reqwest::Client,
    endpoint: String,
    language: String,
}

impl WhisperServerRecognizer {
    pub fn new(config: &LocalEngineConfig) -> Result<Self, TranscriptionError> {
        if config.endpoint.trim().is_empty() {
            return Err(TranscriptionError::BackendUnavailable(
                "local engine endpoint is not configured".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| TranscriptionError::BackendUnavailable(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            language: config.language.clone(),
        })
    }
}

#[async_trait::async_trait]
impl SegmentRecognizer for WhisperServerRecognizer {
    async fn recognize(&self, wav: Vec<u8>, _format: AudioFormat) -> Result<String, RecognitionError> {
        let part = Part::bytes(wav)
            .file_name("segment.wav")
            .mime_str("audio/wav")
            .map_err(|e| RecognitionError::Request(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("response_format", "json")
            .text("language", self.language.clone());

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RecognitionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecognitionError::Request(format!(
                "inference server returned {status}"
            )));
        }

        let body: InferenceResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::Request(e.to_string()))?;

        let text = body.text.trim();
        if text.is_empty() {
            return Err(RecognitionError::NoSpeech);
        }
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "whisper-server"
    }
}
