use crate::control::RecorderService;
use crate::transport::RelayTransport;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Session control, storage and transcription
    pub service: Arc<RecorderService>,

    /// Frame intake for the voice bridge
    pub relay: Arc<RelayTransport>,
}

impl AppState {
    pub fn new(service: Arc<RecorderService>, relay: Arc<RelayTransport>) -> Self {
        Self { service, relay }
    }
}
