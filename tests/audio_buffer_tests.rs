// WAV accumulation and frame normalisation

use channel_scribe::audio::{AudioBuffer, AudioFormat, AudioFrame, WAV_HEADER_LEN};
use std::time::Duration;

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[test]
fn test_header_tracks_every_append_sequence() {
    let format = AudioFormat::new(48000, 2);
    let sequences: [&[usize]; 5] = [&[4], &[4, 8, 12], &[3840; 10], &[2, 0, 6], &[1, 1, 1, 1]];

    for chunks in sequences {
        let mut buffer = AudioBuffer::opened(format);
        let mut expected = Vec::new();
        for (i, &len) in chunks.iter().enumerate() {
            let pcm: Vec<u8> = (0..len).map(|b| (b + i) as u8).collect();
            assert!(buffer.append(&pcm));
            expected.extend_from_slice(&pcm);
        }

        let bytes = buffer.finalize().expect("payload was appended");
        let total = bytes.len();

        assert_eq!(total, WAV_HEADER_LEN + expected.len());
        assert_eq!(u32_at(&bytes, 4) as usize, total - 8);
        assert_eq!(u32_at(&bytes, 40) as usize, total - WAV_HEADER_LEN);
        assert_eq!(&bytes[WAV_HEADER_LEN..], expected.as_slice());
    }
}

#[test]
fn test_header_describes_format() {
    let format = AudioFormat::new(44100, 1);
    let mut buffer = AudioBuffer::opened(format);
    buffer.append_samples(&[1, -1, 2, -2]);
    let bytes = buffer.finalize().unwrap();

    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(&bytes[12..16], b"fmt ");
    assert_eq!(u16_at(&bytes, 20), 1);
    assert_eq!(u16_at(&bytes, 22), 1);
    assert_eq!(u32_at(&bytes, 24), 44100);
    assert_eq!(u32_at(&bytes, 28), 44100 * 2);
    assert_eq!(u16_at(&bytes, 32), 2);
    assert_eq!(u16_at(&bytes, 34), 16);
    assert_eq!(&bytes[36..40], b"data");
    assert_eq!(&bytes[44..], &[1, 0, 0xff, 0xff, 2, 0, 0xfe, 0xff]);
}

#[test]
fn test_zero_appends_signal_empty() {
    let mut buffer = AudioBuffer::opened(AudioFormat::new(48000, 2));
    assert!(buffer.finalize().is_none());

    let mut empty_chunks = AudioBuffer::opened(AudioFormat::new(48000, 2));
    empty_chunks.append(&[]);
    assert!(empty_chunks.finalize().is_none());
}

#[test]
fn test_buffer_duration() {
    let format = AudioFormat::new(48000, 2);
    let mut buffer = AudioBuffer::opened(format);
    buffer.append_samples(&AudioFrame::silence(format, Duration::from_secs(2)).samples);

    assert_eq!(buffer.payload_len(), 2 * 48000 * 2 * 2);
    assert_eq!(buffer.duration(), Duration::from_secs(2));
}

#[test]
fn test_frame_downmix_and_resample() {
    let source = AudioFormat::new(96000, 2);
    let frame = AudioFrame::new(vec![100, 300, -100, -300, 50, 50, 7, 9], source);

    let converted = frame.conform_to(AudioFormat::new(48000, 1)).unwrap();

    assert_eq!(converted.sample_rate, 48000);
    assert_eq!(converted.channels, 1);
    assert_eq!(converted.samples, vec![200, 50]);
}

#[test]
fn test_frame_upmix() {
    let frame = AudioFrame::new(vec![5, -5], AudioFormat::new(48000, 1));
    let converted = frame.conform_to(AudioFormat::new(48000, 2)).unwrap();

    assert_eq!(converted.channels, 2);
    assert_eq!(converted.samples, vec![5, 5, -5, -5]);
}

#[test]
fn test_frame_bytes_round_trip() {
    let format = AudioFormat::new(16000, 1);
    let frame = AudioFrame::new(vec![0, 1, -1, i16::MAX, i16::MIN], format);

    let mut bytes = frame.to_le_bytes();
    bytes.push(0xAA);
    let parsed = AudioFrame::from_le_bytes(&bytes, format);

    assert_eq!(parsed.samples, frame.samples);
    assert_eq!(parsed.format(), format);
}

#[test]
fn test_unsupported_frame_formats_are_refused() {
    let stereo = AudioFormat::new(48000, 2);

    let three_channels = AudioFrame::new(vec![1, 2, 3], AudioFormat::new(48000, 3));
    assert!(three_channels.conform_to(stereo).is_none());

    let no_rate = AudioFrame::new(vec![1, 2], AudioFormat::new(0, 2));
    assert!(no_rate.conform_to(stereo).is_none());

    let silent_channels = AudioFrame::new(vec![1, 2], AudioFormat::new(48000, 0));
    assert!(silent_channels.conform_to(stereo).is_none());

    assert!(!AudioFormat::new(AudioFormat::MAX_SAMPLE_RATE + 1, 1).is_supported());
}

#[test]
fn test_partial_trailing_frame_is_trimmed() {
    let stereo = AudioFormat::new(48000, 2);

    let odd = AudioFrame::new(vec![1, 2, 3, 4, 5], stereo);
    let converted = odd.conform_to(stereo).unwrap();
    assert_eq!(converted.samples, vec![1, 2, 3, 4]);

    let downmixed = AudioFrame::new(vec![10, 20, 30], stereo)
        .conform_to(AudioFormat::new(48000, 1))
        .unwrap();
    assert_eq!(downmixed.samples, vec![15]);
}
