pub mod buffer;
pub mod file;
pub mod frame;

pub use buffer::{AudioBuffer, AudioFormat, SAMPLE_WIDTH, WAV_HEADER_LEN};
pub use file::AudioFile;
pub use frame::AudioFrame;
