use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use hound::WavReader;
use tracing::info;

use super::buffer::{AudioBuffer, AudioFormat};
use crate::error::TranscriptionError;

/// A finished recording loaded back from disk
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TranscriptionError> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let invalid = |reason: String| TranscriptionError::InvalidAudio {
            path: path.to_path_buf(),
            reason,
        };

        let reader = open_pcm16(path)?;
        let spec = reader.spec();

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid(e.to_string()))?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Read only the header: format and duration, without decoding samples
    pub fn inspect(path: impl AsRef<Path>) -> Result<(AudioFormat, f64), TranscriptionError> {
        let reader = open_pcm16(path.as_ref())?;
        let spec = reader.spec();
        let duration_seconds = reader.duration() as f64 / spec.sample_rate.max(1) as f64;
        Ok((AudioFormat::new(spec.sample_rate, spec.channels), duration_seconds))
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels)
    }

    /// Split into consecutive windows of `window` audio each; the last may be shorter
    pub fn windows(&self, window: Duration) -> impl Iterator<Item = &[i16]> {
        let per_window = (self.sample_rate as f64 * window.as_secs_f64()) as usize
            * self.channels.max(1) as usize;
        self.samples.chunks(per_window.max(self.channels.max(1) as usize))
    }

    /// Encode a window of samples as a standalone WAV image
    pub fn encode_window(&self, samples: &[i16]) -> Option<Vec<u8>> {
        let mut buffer = AudioBuffer::opened(self.format());
        buffer.append_samples(samples);
        buffer.finalize()
    }
}

fn open_pcm16(path: &Path) -> Result<WavReader<BufReader<File>>, TranscriptionError> {
    let invalid = |reason: String| TranscriptionError::InvalidAudio {
        path: path.to_path_buf(),
        reason,
    };

    let reader = WavReader::open(path).map_err(|e| invalid(e.to_string()))?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(invalid(format!(
            "expected 16-bit PCM, got {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }
    Ok(reader)
}
