// Shared test doubles: an in-memory voice transport.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use channel_scribe::audio::AudioFrame;
use channel_scribe::error::{RecorderError, RecorderResult};
use channel_scribe::session::SessionKey;
use channel_scribe::transport::{VoiceConnection, VoiceConnector};
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub struct MockConnection {
    key: SessionKey,
    connected: AtomicBool,
    fail_subscribe: bool,
    sender: Mutex<Option<mpsc::Sender<AudioFrame>>>,
    pub unsubscribes: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl MockConnection {
    pub fn new(key: SessionKey) -> Arc<Self> {
        Arc::new(Self::build(key, false))
    }

    pub fn unavailable(key: SessionKey) -> Arc<Self> {
        Arc::new(Self::build(key, true))
    }

    fn build(key: SessionKey, fail_subscribe: bool) -> Self {
        Self {
            key,
            connected: AtomicBool::new(true),
            fail_subscribe,
            sender: Mutex::new(None),
            unsubscribes: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Push a frame the way a transport callback would
    pub fn push(&self, frame: AudioFrame) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.try_send(frame).is_ok(),
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.sender.lock().is_some()
    }
}

#[async_trait::async_trait]
impl VoiceConnection for MockConnection {
    fn subscribe(&self) -> RecorderResult<mpsc::Receiver<AudioFrame>> {
        if self.fail_subscribe || !self.is_connected() {
            return Err(RecorderError::TransportUnavailable(
                "mock connection is down".to_string(),
            ));
        }
        let (tx, rx) = mpsc::channel(64);
        *self.sender.lock() = Some(tx);
        Ok(rx)
    }

    fn unsubscribe(&self) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.sender.lock().take();
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.sender.lock().take();
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn key(&self) -> SessionKey {
        self.key
    }
}

/// Connector handing out [`MockConnection`]s, optionally slowly or not at all
pub struct MockConnector {
    pub delay: Option<Duration>,
    pub refuse: bool,
    pub connections: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            delay: None,
            refuse: false,
            connections: Mutex::new(Vec::new()),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new()
        }
    }

    pub fn last(&self) -> Option<Arc<MockConnection>> {
        self.connections.lock().last().cloned()
    }
}

#[async_trait::async_trait]
impl VoiceConnector for MockConnector {
    async fn connect(&self, key: SessionKey) -> RecorderResult<Arc<dyn VoiceConnection>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.refuse {
            return Err(RecorderError::TransportUnavailable(
                "voice gateway refused the connection".to_string(),
            ));
        }
        let connection = MockConnection::new(key);
        self.connections.lock().push(connection.clone());
        Ok(connection)
    }

    fn guild_connections(&self, guild_id: u64) -> Vec<Arc<dyn VoiceConnection>> {
        self.connections
            .lock()
            .iter()
            .filter(|c| c.key.guild_id == guild_id)
            .map(|c| c.clone() as Arc<dyn VoiceConnection>)
            .collect()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
