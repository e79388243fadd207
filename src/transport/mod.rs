//! Voice transport capability
//!
//! The recorder never speaks the voice protocol itself. It asks a
//! [`VoiceConnector`] for a [`VoiceConnection`] to a channel and subscribes to
//! that connection's decoded frames. Frames are handed over on a bounded
//! channel whose sending side must never block.

mod relay;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::audio::AudioFrame;
use crate::error::RecorderResult;
use crate::session::SessionKey;

pub use relay::{Delivery, RelayConnection, RelayTransport};

/// Opens voice connections
#[async_trait::async_trait]
pub trait VoiceConnector: Send + Sync {
    /// Join the voice channel identified by `key`
    async fn connect(&self, key: SessionKey) -> RecorderResult<Arc<dyn VoiceConnection>>;

    /// Every connection this connector holds in `guild_id`, live or not
    fn guild_connections(&self, guild_id: u64) -> Vec<Arc<dyn VoiceConnection>>;

    /// Get connector name for logging
    fn name(&self) -> &str;
}

/// A live connection to one voice channel
#[async_trait::async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Start receiving decoded audio frames.
    ///
    /// Fails with `TransportUnavailable` if the connection is not connected.
    fn subscribe(&self) -> RecorderResult<mpsc::Receiver<AudioFrame>>;

    /// Stop delivering frames; the receiver returned by `subscribe` drains and closes
    fn unsubscribe(&self);

    /// Leave the voice channel
    async fn disconnect(&self);

    /// Check if the connection is still up
    fn is_connected(&self) -> bool;

    fn key(&self) -> SessionKey;
}
