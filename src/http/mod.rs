//! HTTP control surface
//!
//! Renders the recorder's command set as a REST API:
//! - POST /guilds/:guild/channels/:channel/record/start - Start recording a channel
//! - POST /guilds/:guild/record/stop - Stop and save (optional name/channel)
//! - POST /guilds/:guild/leave - Discard recordings and leave voice
//! - GET /guilds/:guild/status - Active recordings
//! - POST /recordings/transcribe - Transcribe a stored recording
//! - GET /recordings, DELETE /recordings/:name - Stored recordings
//! - POST /voice/presence, POST /voice/:guild/:channel/frames - Voice bridge intake
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
