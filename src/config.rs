use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::Deserialize;

use crate::audio::AudioFormat;
use crate::session::SessionConfig;
use crate::storage::StorageLayout;
use crate::transcription::TranscriptionConfig;

/// Environment variables override file values, e.g. `CHANNEL_SCRIBE__AUDIO__SAMPLE_RATE`
pub const ENV_PREFIX: &str = "CHANNEL_SCRIBE";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_max_recording_secs")]
    pub max_recording_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub recordings_path: String,
    pub transcripts_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisconnectPolicy {
    /// Leave the voice channel after every stop
    Always,
    /// Leave only when the guild has no other active recording
    WhenIdle,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub connect_timeout_secs: u64,
    pub frame_queue_capacity: usize,
    pub auto_record_on_join: bool,
    pub disconnect_policy: DisconnectPolicy,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 20,
            frame_queue_capacity: 256,
            auto_record_on_join: true,
            disconnect_policy: DisconnectPolicy::WhenIdle,
        }
    }
}

impl VoiceConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_format() -> String {
    "wav".to_string()
}

fn default_max_recording_secs() -> u64 {
    3 * 3600
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 || self.audio.sample_rate > AudioFormat::MAX_SAMPLE_RATE {
            bail!(
                "audio.sample_rate must be between 1 and {}, got {}",
                AudioFormat::MAX_SAMPLE_RATE,
                self.audio.sample_rate
            );
        }
        if !matches!(self.audio.channels, 1 | 2) {
            bail!(
                "audio.channels must be 1 or 2, got {}",
                self.audio.channels
            );
        }
        if !self.audio.format.eq_ignore_ascii_case("wav") {
            bail!(
                "audio.format `{}` is not supported; only wav is",
                self.audio.format
            );
        }
        if self.voice.frame_queue_capacity == 0 {
            bail!("voice.frame_queue_capacity must be positive");
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            max_duration: Duration::from_secs(self.audio.max_recording_secs),
        }
    }

    pub fn storage_layout(&self) -> StorageLayout {
        StorageLayout::new(
            PathBuf::from(&self.storage.recordings_path),
            PathBuf::from(&self.storage.transcripts_path),
        )
    }
}
