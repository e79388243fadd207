use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Length of the canonical PCM WAV header emitted by [`AudioBuffer`].
pub const WAV_HEADER_LEN: usize = 44;

/// Bytes per sample; recordings are always 16-bit PCM.
pub const SAMPLE_WIDTH: u16 = 2;

const RIFF_SIZE_OFFSET: usize = 4;
const DATA_SIZE_OFFSET: usize = 40;

/// PCM layout shared by a buffer and every frame appended to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Highest sample rate accepted from a transport
    pub const MAX_SAMPLE_RATE: u32 = 192_000;

    /// Mono or stereo at a non-zero rate up to [`MAX_SAMPLE_RATE`](Self::MAX_SAMPLE_RATE)
    pub fn is_supported(&self) -> bool {
        matches!(self.channels, 1 | 2)
            && self.sample_rate > 0
            && self.sample_rate <= Self::MAX_SAMPLE_RATE
    }

    pub fn block_align(&self) -> u16 {
        self.channels * SAMPLE_WIDTH
    }

    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// Playback length of `payload_len` bytes in this format
    pub fn duration_of(&self, payload_len: usize) -> Duration {
        let bps = self.bytes_per_second();
        if bps == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(payload_len as f64 / bps as f64)
    }
}

/// In-memory WAV accumulator.
///
/// `open` emits a provisional header with zeroed size fields, `append` copies
/// raw little-endian PCM after it, and `finalize` patches both size fields
/// once the payload length is known. Appending never touches I/O, so it is
/// safe to drive from the frame delivery path.
#[derive(Debug)]
pub struct AudioBuffer {
    format: AudioFormat,
    bytes: Vec<u8>,
    header_written: bool,
    finalized: bool,
}

impl AudioBuffer {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            bytes: Vec::new(),
            header_written: false,
            finalized: false,
        }
    }

    /// Create a buffer that is already open for appends
    pub fn opened(format: AudioFormat) -> Self {
        let mut buffer = Self::new(format);
        buffer.open();
        buffer
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Reset the buffer and write the provisional header
    pub fn open(&mut self) {
        self.bytes.clear();
        self.bytes.reserve(WAV_HEADER_LEN + self.format.bytes_per_second() as usize);
        write_header(&mut self.bytes, self.format);
        self.header_written = true;
        self.finalized = false;
    }

    pub fn is_open(&self) -> bool {
        self.header_written && !self.finalized
    }

    /// Number of PCM bytes appended since `open`
    pub fn payload_len(&self) -> usize {
        if self.header_written {
            self.bytes.len().saturating_sub(WAV_HEADER_LEN)
        } else {
            0
        }
    }

    pub fn duration(&self) -> Duration {
        self.format.duration_of(self.payload_len())
    }

    /// Append raw PCM. Returns `false` when the buffer was never opened.
    ///
    /// # Panics
    ///
    /// Panics if called after [`finalize`](Self::finalize).
    pub fn append(&mut self, pcm: &[u8]) -> bool {
        assert!(!self.finalized, "append called on a finalized AudioBuffer");
        if !self.header_written {
            return false;
        }
        self.bytes.extend_from_slice(pcm);
        true
    }

    /// Append interleaved 16-bit samples
    pub fn append_samples(&mut self, samples: &[i16]) -> bool {
        assert!(!self.finalized, "append called on a finalized AudioBuffer");
        if !self.header_written {
            return false;
        }
        self.bytes.reserve(samples.len() * SAMPLE_WIDTH as usize);
        for sample in samples {
            self.bytes.extend_from_slice(&sample.to_le_bytes());
        }
        true
    }

    /// Patch the header size fields and hand back the complete file image.
    ///
    /// Returns `None` when no payload was ever appended, so callers can tell
    /// "nothing captured" apart from a saved recording. The buffer is closed
    /// to further appends either way.
    pub fn finalize(&mut self) -> Option<Vec<u8>> {
        if self.finalized {
            return None;
        }
        self.finalized = true;

        if !self.header_written || self.payload_len() == 0 {
            self.bytes = Vec::new();
            return None;
        }

        let mut bytes = std::mem::take(&mut self.bytes);
        let total = bytes.len();
        patch_u32(&mut bytes, RIFF_SIZE_OFFSET, (total - 8) as u32);
        patch_u32(&mut bytes, DATA_SIZE_OFFSET, (total - WAV_HEADER_LEN) as u32);
        Some(bytes)
    }
}

fn write_header(out: &mut Vec<u8>, format: AudioFormat) {
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&format.channels.to_le_bytes());
    out.extend_from_slice(&format.sample_rate.to_le_bytes());
    out.extend_from_slice(&format.bytes_per_second().to_le_bytes());
    out.extend_from_slice(&format.block_align().to_le_bytes());
    out.extend_from_slice(&(SAMPLE_WIDTH * 8).to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&0u32.to_le_bytes());
    debug_assert_eq!(out.len(), WAV_HEADER_LEN);
}

fn patch_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
