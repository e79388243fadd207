use super::buffer::AudioFormat;

/// Decoded voice audio pushed by the transport (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, format: AudioFormat) -> Self {
        Self {
            samples,
            sample_rate: format.sample_rate,
            channels: format.channels,
        }
    }

    /// Build a frame from little-endian PCM bytes. A trailing odd byte is ignored.
    pub fn from_le_bytes(pcm: &[u8], format: AudioFormat) -> Self {
        let samples = pcm
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(samples, format)
    }

    /// `duration` of silence in the given format
    pub fn silence(format: AudioFormat, duration: std::time::Duration) -> Self {
        let count = (format.sample_rate as f64 * duration.as_secs_f64()) as usize
            * format.channels as usize;
        Self::new(vec![0; count], format)
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels)
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Convert to `target`, resampling and remixing channels as needed.
    ///
    /// Returns `None` when either format is outside what a recording can hold
    /// (see [`AudioFormat::is_supported`]). A trailing partial sample frame is
    /// dropped so the result is always aligned to whole frames.
    pub fn conform_to(self, target: AudioFormat) -> Option<AudioFrame> {
        if !self.format().is_supported() || !target.is_supported() {
            return None;
        }

        let mut frame = self;
        let whole = frame.samples.len() - frame.samples.len() % frame.channels as usize;
        frame.samples.truncate(whole);

        if frame.sample_rate != target.sample_rate {
            frame = resample(frame, target.sample_rate);
        }

        if frame.channels != target.channels {
            frame = match (frame.channels, target.channels) {
                (2, 1) => stereo_to_mono(frame),
                _ => mono_to_stereo(frame),
            };
        }

        Some(frame)
    }
}

/// Nearest-sample resampling; integer ratios degrade to plain decimation
fn resample(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if frame.sample_rate == target_rate || frame.sample_rate == 0 || target_rate == 0 {
        return frame;
    }

    let channels = frame.channels.max(1) as usize;
    let in_frames = frame.samples.len() / channels;
    let out_frames =
        (in_frames as u64 * target_rate as u64 / frame.sample_rate as u64) as usize;

    let mut samples = Vec::with_capacity(out_frames * channels);
    for i in 0..out_frames {
        let src = (i as u64 * frame.sample_rate as u64 / target_rate as u64) as usize;
        let src = src.min(in_frames.saturating_sub(1));
        samples.extend_from_slice(&frame.samples[src * channels..(src + 1) * channels]);
    }

    AudioFrame {
        samples,
        sample_rate: target_rate,
        channels: frame.channels,
    }
}

/// Average left and right into a single channel
fn stereo_to_mono(frame: AudioFrame) -> AudioFrame {
    let mono_samples = frame
        .samples
        .chunks_exact(2)
        .map(|pair| ((pair[0] as i32 + pair[1] as i32) / 2) as i16)
        .collect();

    AudioFrame {
        samples: mono_samples,
        sample_rate: frame.sample_rate,
        channels: 1,
    }
}

fn mono_to_stereo(frame: AudioFrame) -> AudioFrame {
    let stereo_samples = frame.samples.iter().flat_map(|&s| [s, s]).collect();

    AudioFrame {
        samples: stereo_samples,
        sample_rate: frame.sample_rate,
        channels: 2,
    }
}
