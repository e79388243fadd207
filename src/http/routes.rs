use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording control
        .route(
            "/guilds/:guild_id/channels/:channel_id/record/start",
            post(handlers::start_recording),
        )
        .route("/guilds/:guild_id/record/stop", post(handlers::stop_recording))
        .route("/guilds/:guild_id/leave", post(handlers::leave_channel))
        .route("/guilds/:guild_id/status", get(handlers::recording_status))
        // Stored recordings
        .route("/recordings", get(handlers::list_recordings))
        .route("/recordings/transcribe", post(handlers::transcribe))
        .route("/recordings/:name", delete(handlers::delete_recording))
        // Voice bridge intake
        .route("/voice/presence", post(handlers::voice_presence))
        .route(
            "/voice/:guild_id/:channel_id/frames",
            post(handlers::push_frames),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
