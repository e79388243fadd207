use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::AudioFormat;

/// Configuration shared by every recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sample rate of the recorded file; mismatched frames are resampled
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Sessions running longer than this are stopped and saved automatically
    pub max_duration: Duration,
}

impl SessionConfig {
    pub fn format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,                        // voice gateway rate
            channels: 2,                               // Stereo
            max_duration: Duration::from_secs(3 * 3600), // 3 hours
        }
    }
}
