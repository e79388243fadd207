use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{create_backend, BackendKind, TranscriptionBackend, TranscriptionConfig};
use crate::error::TranscriptionError;
use crate::storage::StorageLayout;

/// Result of one completed transcription job
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptOutcome {
    pub recording: PathBuf,
    pub transcript_path: PathBuf,
    pub backend: String,
    pub text: String,
    pub segments: usize,
    pub inaudible_segments: usize,
}

/// Runs transcription jobs on their own tasks, away from session control.
///
/// Jobs are not retried and cannot be cancelled once spawned.
#[derive(Clone)]
pub struct TranscriptionWorker {
    storage: StorageLayout,
    config: TranscriptionConfig,
    backends: HashMap<BackendKind, Arc<dyn TranscriptionBackend>>,
}

impl TranscriptionWorker {
    pub fn new(storage: StorageLayout, config: TranscriptionConfig) -> Self {
        Self {
            storage,
            config,
            backends: HashMap::new(),
        }
    }

    /// Use `backend` for `kind` instead of building one from configuration
    pub fn with_backend(mut self, kind: BackendKind, backend: Arc<dyn TranscriptionBackend>) -> Self {
        self.backends.insert(kind, backend);
        self
    }

    pub fn default_backend(&self) -> BackendKind {
        self.config.backend
    }

    fn backend(&self, kind: BackendKind) -> Result<Arc<dyn TranscriptionBackend>, TranscriptionError> {
        match self.backends.get(&kind) {
            Some(backend) => Ok(backend.clone()),
            None => create_backend(kind, &self.config),
        }
    }

    /// Start a job for `recording` on a new task
    pub fn spawn(
        &self,
        recording: PathBuf,
        kind: BackendKind,
    ) -> JoinHandle<Result<TranscriptOutcome, TranscriptionError>> {
        let backend = self.backend(kind);
        let storage = self.storage.clone();

        tokio::spawn(async move {
            let backend = backend?;
            let result = run_job(backend.as_ref(), &storage, &recording).await;
            if let Err(e) = &result {
                error!("Transcription of {} failed: {}", recording.display(), e);
            }
            result
        })
    }

    /// Spawn a job and wait for it
    pub async fn transcribe(
        &self,
        recording: &Path,
        kind: BackendKind,
    ) -> Result<TranscriptOutcome, TranscriptionError> {
        self.spawn(recording.to_path_buf(), kind)
            .await
            .map_err(|e| TranscriptionError::Aborted(e.to_string()))?
    }
}

async fn run_job(
    backend: &dyn TranscriptionBackend,
    storage: &StorageLayout,
    recording: &Path,
) -> Result<TranscriptOutcome, TranscriptionError> {
    info!(
        "Transcribing {} with {}",
        recording.display(),
        backend.name()
    );

    let transcript = backend.transcribe(recording).await?;

    let transcript_path = storage
        .save_transcript(recording, &transcript.text)
        .await
        .map_err(|source| TranscriptionError::Storage {
            path: storage.transcript_path(recording),
            source,
        })?;

    Ok(TranscriptOutcome {
        recording: recording.to_path_buf(),
        transcript_path,
        backend: backend.name().to_string(),
        text: transcript.text,
        segments: transcript.segments,
        inaudible_segments: transcript.inaudible_segments,
    })
}
