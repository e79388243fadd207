use super::state::AppState;
use crate::audio::{AudioFormat, AudioFrame};
use crate::control::{
    render_status, split_for_chat, LeaveSummary, PresenceEvent, SavedRecording, StartedRecording,
    CHAT_CHUNK_LEN,
};
use crate::error::{RecorderError, TranscriptionError};
use crate::session::{ActiveRecording, SessionKey};
use crate::storage::StoredRecording;
use crate::transcription::{BackendKind, TranscriptOutcome};
use crate::transport::Delivery;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StopRecordingRequest {
    /// Name to save the recording under
    pub name: Option<String>,

    /// Channel to stop; defaults to the oldest active recording in the guild
    pub channel_id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub status: String,
    pub message: String,
    pub recording: StartedRecording,
}

#[derive(Debug, Serialize)]
pub struct StopRecordingResponse {
    pub status: String,
    pub message: String,
    pub recording: SavedRecording,
}

#[derive(Debug, Serialize)]
pub struct LeaveResponse {
    pub message: String,
    pub summary: LeaveSummary,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub message: String,
    pub recordings: Vec<ActiveRecording>,
}

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    pub name: String,
    pub backend: Option<BackendKind>,
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub message: String,
    /// Transcript split into chat-sized parts
    pub parts: Vec<String>,
    pub outcome: TranscriptOutcome,
}

#[derive(Debug, Serialize)]
pub struct RecordingListResponse {
    pub recordings: Vec<StoredRecording>,
}

#[derive(Debug, Deserialize)]
pub struct FrameParams {
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_status(e: &RecorderError) -> StatusCode {
    match e {
        RecorderError::TransportUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        RecorderError::ConnectTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        RecorderError::AlreadyActive(_) | RecorderError::InvalidState { .. } => {
            StatusCode::CONFLICT
        }
        RecorderError::NotRecording { .. } | RecorderError::RecordingNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        RecorderError::NoAudioCaptured => StatusCode::UNPROCESSABLE_ENTITY,
        RecorderError::StorageWriteFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        RecorderError::Transcription(e) => match e {
            TranscriptionError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            TranscriptionError::BackendRequestFailure(_) => StatusCode::BAD_GATEWAY,
            TranscriptionError::InvalidAudio { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            TranscriptionError::Storage { .. } | TranscriptionError::Aborted(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
    }
}

fn error_response(e: RecorderError) -> Response {
    let status = error_status(&e);
    if status.is_server_error() {
        error!("{}", e);
    } else {
        warn!("{}", e);
    }
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /guilds/:guild_id/channels/:channel_id/record/start
/// Join the voice channel and start recording it
pub async fn start_recording(
    State(state): State<AppState>,
    Path((guild_id, channel_id)): Path<(u64, u64)>,
) -> Response {
    let key = SessionKey::new(guild_id, channel_id);

    match state.service.start_recording(key).await {
        Ok(recording) => (
            StatusCode::OK,
            Json(StartRecordingResponse {
                status: "recording".to_string(),
                message: format!(
                    "Recording started in channel {}. Stop it to save.",
                    channel_id
                ),
                recording,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /guilds/:guild_id/record/stop
/// Stop a recording and save it
pub async fn stop_recording(
    State(state): State<AppState>,
    Path(guild_id): Path<u64>,
    body: Option<Json<StopRecordingRequest>>,
) -> Response {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    match state
        .service
        .stop_recording(guild_id, req.channel_id, req.name)
        .await
    {
        Ok(recording) => (
            StatusCode::OK,
            Json(StopRecordingResponse {
                status: "saved".to_string(),
                message: format!(
                    "Recording saved as `{}` ({}). Transcribe it with its name.",
                    recording.name, recording.duration
                ),
                recording,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /guilds/:guild_id/leave
/// Discard active recordings and leave voice
pub async fn leave_channel(State(state): State<AppState>, Path(guild_id): Path<u64>) -> Response {
    match state.service.leave_channel(guild_id).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(LeaveResponse {
                message: "Disconnected from the voice channel.".to_string(),
                summary,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /guilds/:guild_id/status
pub async fn recording_status(
    State(state): State<AppState>,
    Path(guild_id): Path<u64>,
) -> Response {
    let recordings = state.service.status(guild_id).await;
    (
        StatusCode::OK,
        Json(StatusResponse {
            message: render_status(&recordings),
            recordings,
        }),
    )
        .into_response()
}

/// POST /recordings/transcribe
/// Transcribe the most recent recording matching a name
pub async fn transcribe(
    State(state): State<AppState>,
    Json(req): Json<TranscribeRequest>,
) -> Response {
    if req.name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "a recording name is required".to_string(),
            }),
        )
            .into_response();
    }

    match state.service.transcribe(req.name.trim(), req.backend).await {
        Ok(outcome) => {
            info!("Transcription completed for {}", outcome.recording.display());
            (
                StatusCode::OK,
                Json(TranscribeResponse {
                    message: format!(
                        "Transcription completed for {}",
                        outcome
                            .recording
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default()
                    ),
                    parts: split_for_chat(&outcome.text, CHAT_CHUNK_LEN),
                    outcome,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /recordings
pub async fn list_recordings(State(state): State<AppState>) -> Response {
    match state.service.list_recordings().await {
        Ok(recordings) => (StatusCode::OK, Json(RecordingListResponse { recordings })).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /recordings/:name
pub async fn delete_recording(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    match state.service.delete_recording(&name).await {
        Ok(recording) => (StatusCode::OK, Json(recording)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /voice/presence
/// A user joined or left a voice channel
pub async fn voice_presence(
    State(state): State<AppState>,
    Json(event): Json<PresenceEvent>,
) -> Response {
    match state.service.on_voice_presence(event).await {
        Ok(Some(recording)) => (StatusCode::OK, Json(recording)).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /voice/:guild_id/:channel_id/frames
/// Raw little-endian PCM from the voice bridge
pub async fn push_frames(
    State(state): State<AppState>,
    Path((guild_id, channel_id)): Path<(u64, u64)>,
    Query(params): Query<FrameParams>,
    body: Bytes,
) -> StatusCode {
    let default_format = state.service.registry().config().format();
    let format = AudioFormat::new(
        params.sample_rate.unwrap_or(default_format.sample_rate),
        params.channels.unwrap_or(default_format.channels),
    );

    if !format.is_supported() {
        warn!(
            "Rejecting frames for {}/{} in unsupported format {}Hz/{}ch",
            guild_id, channel_id, format.sample_rate, format.channels
        );
        return StatusCode::BAD_REQUEST;
    }

    let frame = AudioFrame::from_le_bytes(&body, format);
    match state
        .relay
        .deliver(SessionKey::new(guild_id, channel_id), frame)
    {
        Delivery::Delivered => StatusCode::ACCEPTED,
        Delivery::NotConnected => StatusCode::NOT_FOUND,
        Delivery::NoSubscriber => StatusCode::CONFLICT,
        Delivery::Dropped => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
