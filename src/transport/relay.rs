use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use super::{VoiceConnection, VoiceConnector};
use crate::audio::AudioFrame;
use crate::error::{RecorderError, RecorderResult};
use crate::session::SessionKey;

/// Result of pushing one frame into the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// No connection to that channel
    NotConnected,
    /// Connected but nobody is subscribed
    NoSubscriber,
    /// Subscriber queue full; frame dropped
    Dropped,
}

/// Transport fed by an external voice bridge.
///
/// The bridge owns the real voice socket and pushes decoded PCM for the
/// channels it has joined via [`RelayTransport::deliver`].
pub struct RelayTransport {
    connections: Mutex<HashMap<SessionKey, Arc<RelayConnection>>>,
    queue_capacity: usize,
}

impl RelayTransport {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Hand a frame to the subscriber of `key` without blocking
    pub fn deliver(&self, key: SessionKey, frame: AudioFrame) -> Delivery {
        let connection = self.connections.lock().get(&key).cloned();
        match connection {
            Some(connection) if connection.is_connected() => connection.push(frame),
            _ => Delivery::NotConnected,
        }
    }
}

#[async_trait::async_trait]
impl VoiceConnector for RelayTransport {
    async fn connect(&self, key: SessionKey) -> RecorderResult<Arc<dyn VoiceConnection>> {
        let mut connections = self.connections.lock();

        if let Some(existing) = connections.get(&key) {
            if existing.is_connected() {
                debug!(
                    "Reusing relay connection for guild {} channel {}",
                    key.guild_id, key.channel_id
                );
                return Ok(existing.clone());
            }
        }

        let connection = Arc::new(RelayConnection::new(key, self.queue_capacity));
        connections.insert(key, connection.clone());
        info!(
            "Relay connected to guild {} channel {}",
            key.guild_id, key.channel_id
        );
        Ok(connection)
    }

    fn guild_connections(&self, guild_id: u64) -> Vec<Arc<dyn VoiceConnection>> {
        let mut connections = self.connections.lock();
        connections.retain(|_, connection| connection.is_connected());
        connections
            .iter()
            .filter(|(key, _)| key.guild_id == guild_id)
            .map(|(_, connection)| connection.clone() as Arc<dyn VoiceConnection>)
            .collect()
    }

    fn name(&self) -> &str {
        "relay"
    }
}

pub struct RelayConnection {
    key: SessionKey,
    connected: AtomicBool,
    sender: Mutex<Option<mpsc::Sender<AudioFrame>>>,
    queue_capacity: usize,
}

impl RelayConnection {
    fn new(key: SessionKey, queue_capacity: usize) -> Self {
        Self {
            key,
            connected: AtomicBool::new(true),
            sender: Mutex::new(None),
            queue_capacity,
        }
    }

    fn push(&self, frame: AudioFrame) -> Delivery {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Delivery::NoSubscriber;
        };

        match sender.try_send(frame) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Frame queue full for channel {}, dropping frame",
                    self.key.channel_id
                );
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => Delivery::NoSubscriber,
        }
    }
}

#[async_trait::async_trait]
impl VoiceConnection for RelayConnection {
    fn subscribe(&self) -> RecorderResult<mpsc::Receiver<AudioFrame>> {
        if !self.is_connected() {
            return Err(RecorderError::TransportUnavailable(format!(
                "not connected to channel {}",
                self.key.channel_id
            )));
        }

        let (tx, rx) = mpsc::channel(self.queue_capacity);
        *self.sender.lock() = Some(tx);
        Ok(rx)
    }

    fn unsubscribe(&self) {
        self.sender.lock().take();
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.unsubscribe();
            info!(
                "Relay disconnected from guild {} channel {}",
                self.key.guild_id, self.key.channel_id
            );
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn key(&self) -> SessionKey {
        self.key
    }
}
