use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Point-in-time view of one recording, used for status reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRecording {
    /// Voice channel being recorded
    pub channel_id: u64,

    /// When the recording started
    pub started_at: DateTime<Utc>,

    /// Elapsed time in seconds at snapshot time
    pub duration_secs: f64,
}

impl ActiveRecording {
    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs.max(0.0))
    }
}

/// Render a duration as `HH:MM:SS`
pub fn format_hms(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, remainder) = (total / 3600, total % 3600);
    let (minutes, seconds) = (remainder / 60, remainder % 60);
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
