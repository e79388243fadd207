pub mod audio;
pub mod config;
pub mod control;
pub mod error;
pub mod http;
pub mod session;
pub mod storage;
pub mod transcription;
pub mod transport;

pub use audio::{AudioBuffer, AudioFile, AudioFormat, AudioFrame};
pub use config::Config;
pub use control::{RecorderService, SavedRecording, StartedRecording};
pub use error::{RecognitionError, RecorderError, TranscriptionError};
pub use http::{create_router, AppState};
pub use session::{RecordingSession, SessionConfig, SessionKey, SessionRegistry, SessionState};
pub use storage::StorageLayout;
pub use transcription::{BackendKind, TranscriptionBackend, TranscriptionWorker};
pub use transport::{RelayTransport, VoiceConnection, VoiceConnector};
