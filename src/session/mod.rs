//! Recording session management
//!
//! This module provides the `RecordingSession` state machine and the
//! `SessionRegistry` that owns every live session:
//! - Per-channel buffering of decoded voice frames
//! - Start/stop/force-stop against a voice connection
//! - At-most-one session per (guild, channel)
//! - Point-in-time status snapshots

mod config;
mod registry;
mod session;
mod stats;

pub use config::SessionConfig;
pub use registry::SessionRegistry;
pub use session::{RecordingSession, SessionKey, SessionState, StoppedRecording};
pub use stats::{format_hms, ActiveRecording};
