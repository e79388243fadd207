use std::path::Path;
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use super::{CloudEngineConfig, Transcript, TranscriptionBackend};
use crate::audio::{AudioFile, AudioFormat};
use crate::error::TranscriptionError;

/// One recognition result: alternatives ordered best first
#[derive(Debug, Clone, Default)]
pub struct RecognitionResult {
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum OperationStatus {
    Pending,
    Done(Vec<RecognitionResult>),
}

/// Managed recognition service that processes a whole file asynchronously
#[async_trait::async_trait]
pub trait LongRunningRecognizer: Send + Sync {
    /// Submit the complete file; returns the operation name to poll
    async fn submit(&self, wav: Vec<u8>, format: AudioFormat) -> Result<String, TranscriptionError>;

    async fn poll(&self, operation: &str) -> Result<OperationStatus, TranscriptionError>;

    fn name(&self) -> &str;
}

/// Whole-file transcription; any service error fails the job
pub struct CloudEngineBackend<C> {
    client: C,
    poll_interval: Duration,
    max_wait: Duration,
}

impl<C: LongRunningRecognizer> CloudEngineBackend<C> {
    pub fn new(client: C, poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            client,
            poll_interval,
            max_wait,
        }
    }

    async fn await_operation(&self, operation: &str) -> Result<Vec<RecognitionResult>, TranscriptionError> {
        let deadline = Instant::now() + self.max_wait;
        loop {
            match self.client.poll(operation).await? {
                OperationStatus::Done(results) => return Ok(results),
                OperationStatus::Pending => {
                    if Instant::now() >= deadline {
                        return Err(TranscriptionError::BackendRequestFailure(format!(
                            "operation {} not finished after {}s",
                            operation,
                            self.max_wait.as_secs()
                        )));
                    }
                    debug!("Operation {} pending", operation);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl<C: LongRunningRecognizer> TranscriptionBackend for CloudEngineBackend<C> {
    async fn transcribe(&self, path: &Path) -> Result<Transcript, TranscriptionError> {
        let path_buf = path.to_path_buf();
        let (format, duration_seconds) =
            tokio::task::spawn_blocking(move || AudioFile::inspect(path_buf))
                .await
                .map_err(|e| TranscriptionError::Aborted(e.to_string()))??;

        let wav = tokio::fs::read(path)
            .await
            .map_err(|e| TranscriptionError::InvalidAudio {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        info!(
            "Submitting {} ({:.1}s) to {}",
            path.display(),
            duration_seconds,
            self.client.name()
        );

        let operation = self.client.submit(wav, format).await?;
        let results = self.await_operation(&operation).await?;

        let parts: Vec<String> = results
            .iter()
            .filter_map(|result| result.alternatives.first())
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .collect();

        info!("Cloud transcription complete: {} results", parts.len());

        Ok(Transcript {
            text: parts.join(" "),
            segments: parts.len(),
            inaudible_segments: 0,
        })
    }

    fn name(&self) -> &str {
        "cloud-engine"
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig<'a> {
    encoding: &'static str,
    sample_rate_hertz: u32,
    audio_channel_count: u16,
    language_code: &'a str,
    enable_automatic_punctuation: bool,
}

#[derive(Debug, Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Debug, Serialize)]
struct LongRunningRequest<'a> {
    config: RecognitionConfig<'a>,
    audio: RecognitionAudio,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<RecognizeResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<SpeechResult>,
}

#[derive(Debug, Deserialize)]
struct SpeechResult {
    #[serde(default)]
    alternatives: Vec<SpeechAlternative>,
}

#[derive(Debug, Deserialize)]
struct SpeechAlternative {
    #[serde(default)]
    transcript: String,
}

/// Google Cloud Speech-to-Text v1 REST client
pub struct GoogleSpeechClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    language_code: String,
}

impl GoogleSpeechClient {
    pub fn new(config: &CloudEngineConfig, api_key: String) -> Result<Self, TranscriptionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| TranscriptionError::BackendUnavailable(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            language_code: config.language_code.clone(),
        })
    }

    async fn read_operation(response: reqwest::Response) -> Result<OperationResponse, TranscriptionError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::BackendRequestFailure(format!(
                "speech service returned {status}: {}",
                body.trim()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| TranscriptionError::BackendRequestFailure(e.to_string()))
    }
}

#[async_trait::async_trait]
impl LongRunningRecognizer for GoogleSpeechClient {
    async fn submit(&self, wav: Vec<u8>, format: AudioFormat) -> Result<String, TranscriptionError> {
        let request = LongRunningRequest {
            config: RecognitionConfig {
                encoding: "LINEAR16",
                sample_rate_hertz: format.sample_rate,
                audio_channel_count: format.channels,
                language_code: &self.language_code,
                enable_automatic_punctuation: true,
            },
            audio: RecognitionAudio {
                content: base64::engine::general_purpose::STANDARD.encode(wav),
            },
        };

        let response = self
            .http
            .post(format!("{}/speech:longrunningrecognize", self.endpoint))
            .query(&[("key", &self.api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| TranscriptionError::BackendRequestFailure(e.to_string()))?;

        let operation = Self::read_operation(response).await?;
        info!("Started recognition operation {}", operation.name);
        Ok(operation.name)
    }

    async fn poll(&self, operation: &str) -> Result<OperationStatus, TranscriptionError> {
        let response = self
            .http
            .get(format!("{}/operations/{}", self.endpoint, operation))
            .query(&[("key", &self.api_key)])
            .send()
            .await
            .map_err(|e| TranscriptionError::BackendRequestFailure(e.to_string()))?;

        let operation = Self::read_operation(response).await?;
        if let Some(error) = operation.error {
            return Err(TranscriptionError::BackendRequestFailure(format!(
                "operation failed ({}): {}",
                error.code, error.message
            )));
        }
        if !operation.done {
            return Ok(OperationStatus::Pending);
        }

        let results = operation
            .response
            .unwrap_or_default()
            .results
            .into_iter()
            .map(|result| RecognitionResult {
                alternatives: result
                    .alternatives
                    .into_iter()
                    .map(|alt| alt.transcript)
                    .collect(),
            })
            .collect();
        Ok(OperationStatus::Done(results))
    }

    fn name(&self) -> &str {
        "google-speech"
    }
}
