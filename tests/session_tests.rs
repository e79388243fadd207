// Recording session lifecycle tests
//
// Sessions are driven against an in-memory connection so every frame that
// reaches the buffer is accounted for.

mod helpers;

use channel_scribe::audio::{AudioFormat, AudioFrame, WAV_HEADER_LEN};
use channel_scribe::error::RecorderError;
use channel_scribe::session::{RecordingSession, SessionConfig, SessionKey, SessionState};
use helpers::{eventually, MockConnection};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::time::Duration;

fn config(format: AudioFormat) -> SessionConfig {
    SessionConfig {
        sample_rate: format.sample_rate,
        channels: format.channels,
        max_duration: Duration::from_secs(3600),
    }
}

fn started_session(format: AudioFormat) -> (Arc<RecordingSession>, Arc<MockConnection>) {
    let key = SessionKey::new(1, 10);
    let session = Arc::new(RecordingSession::new(key, &config(format)));
    let connection = MockConnection::new(key);
    session
        .start(connection.clone())
        .expect("session should start");
    (session, connection)
}

#[tokio::test]
async fn test_start_feed_stop_produces_wav() {
    let format = AudioFormat::new(48000, 2);
    let (session, connection) = started_session(format);
    assert_eq!(session.state(), SessionState::Recording);
    assert!(session.started_at().is_some());

    for _ in 0..3 {
        assert!(session.feed(AudioFrame::silence(format, Duration::from_secs(1))));
    }

    let stopped = session.stop().await.expect("audio was captured");

    assert_eq!(stopped.bytes.len(), WAV_HEADER_LEN + 3 * 48000 * 2 * 2);
    assert_eq!(session.state(), SessionState::Finalized);
    assert_eq!(connection.unsubscribes.load(Ordering::SeqCst), 1);
    assert!(!connection.is_subscribed());
}

#[tokio::test]
async fn test_start_without_transport_stays_idle() {
    let key = SessionKey::new(1, 10);
    let session = Arc::new(RecordingSession::new(key, &SessionConfig::default()));

    let result = session.start(MockConnection::unavailable(key));

    assert!(matches!(result, Err(RecorderError::TransportUnavailable(_))));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.started_at().is_none());
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let (session, _connection) = started_session(AudioFormat::new(16000, 1));
    let again = session.start(MockConnection::new(session.key()));

    assert!(matches!(
        again,
        Err(RecorderError::InvalidState {
            operation: "start",
            state: SessionState::Recording
        })
    ));
}

#[tokio::test]
async fn test_stop_without_start_is_invalid() {
    let session = RecordingSession::new(SessionKey::new(1, 10), &SessionConfig::default());

    let result = session.stop().await;

    assert!(matches!(
        result,
        Err(RecorderError::InvalidState {
            operation: "stop",
            state: SessionState::Idle
        })
    ));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_stop_with_no_audio_reports_empty() {
    let (session, _connection) = started_session(AudioFormat::new(48000, 2));

    let result = session.stop().await;

    assert!(matches!(result, Err(RecorderError::NoAudioCaptured)));
    assert_eq!(session.state(), SessionState::Finalized);
}

#[tokio::test]
async fn test_frames_after_stop_are_dropped() {
    let format = AudioFormat::new(16000, 1);
    let (session, _connection) = started_session(format);
    let frame = AudioFrame::silence(format, Duration::from_millis(20));

    assert!(session.feed(frame.clone()));
    let stopped = session.stop().await.unwrap();

    assert!(!session.feed(frame.clone()));
    assert!(!session.feed(frame));
    assert_eq!(session.dropped_frames(), 2);
    assert_eq!(stopped.bytes.len(), WAV_HEADER_LEN + 320 * 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_feed_racing_stop_is_all_or_nothing() {
    let format = AudioFormat::new(8000, 1);
    let frame = AudioFrame::silence(format, Duration::from_millis(100));
    let frame_bytes = frame.samples.len() * 2;
    let runtime = tokio::runtime::Handle::current();

    for _ in 0..50 {
        let (session, _connection) = started_session(format);
        assert!(session.feed(frame.clone()));

        let barrier = Arc::new(Barrier::new(2));
        let feeder = {
            let session = session.clone();
            let barrier = barrier.clone();
            let frame = frame.clone();
            std::thread::spawn(move || {
                barrier.wait();
                session.feed(frame)
            })
        };
        let stopper = {
            let session = session.clone();
            let barrier = barrier.clone();
            let runtime = runtime.clone();
            std::thread::spawn(move || {
                barrier.wait();
                runtime.block_on(session.stop())
            })
        };

        let fed = feeder.join().unwrap();
        let stopped = stopper.join().unwrap().expect("first frame was captured");

        let frames_kept = if fed { 2 } else { 1 };
        assert_eq!(stopped.bytes.len(), WAV_HEADER_LEN + frames_kept * frame_bytes);
        assert_eq!(session.dropped_frames(), if fed { 0 } else { 1 });
        assert!(!session.feed(frame.clone()));
    }
}

#[tokio::test]
async fn test_force_stop_is_idempotent() {
    let format = AudioFormat::new(48000, 2);
    let (session, connection) = started_session(format);
    session.feed(AudioFrame::silence(format, Duration::from_millis(200)));

    assert!(session.force_stop());
    assert!(!session.force_stop());
    assert!(!session.force_stop());

    assert_eq!(session.state(), SessionState::Finalized);
    assert_eq!(session.payload_len(), 0);
    assert_eq!(connection.unsubscribes.load(Ordering::SeqCst), 1);
    assert!(matches!(
        session.stop().await,
        Err(RecorderError::InvalidState { operation: "stop", .. })
    ));
}

#[tokio::test]
async fn test_force_stop_idle_session() {
    let session = RecordingSession::new(SessionKey::new(2, 20), &SessionConfig::default());

    assert!(session.force_stop());
    assert!(!session.force_stop());
    assert_eq!(session.state(), SessionState::Finalized);
}

#[tokio::test]
async fn test_stop_keeps_frames_already_queued() {
    let format = AudioFormat::new(16000, 1);
    let (session, connection) = started_session(format);

    for _ in 0..3 {
        assert!(connection.push(AudioFrame::silence(format, Duration::from_secs(1))));
    }

    let stopped = session.stop().await.expect("queued audio is kept");

    assert_eq!(stopped.bytes.len(), WAV_HEADER_LEN + 3 * 16000 * 2);
    assert_eq!(session.dropped_frames(), 0);
    assert!(!connection.push(AudioFrame::silence(format, Duration::from_millis(20))));
}

#[tokio::test]
async fn test_subscribed_frames_reach_buffer_while_recording() {
    let format = AudioFormat::new(16000, 1);
    let (session, connection) = started_session(format);
    let frame = AudioFrame::silence(format, Duration::from_millis(20));

    for _ in 0..5 {
        assert!(connection.push(frame.clone()));
    }

    let expected = 5 * frame.samples.len() * 2;
    assert!(eventually(|| session.payload_len() == expected).await);
    assert_eq!(session.state(), SessionState::Recording);
}

#[tokio::test]
async fn test_unconvertible_frames_are_rejected() {
    let format = AudioFormat::new(48000, 2);
    let (session, _connection) = started_session(format);

    assert!(!session.feed(AudioFrame::new(vec![1, 2, 3], AudioFormat::new(48000, 3))));
    assert!(!session.feed(AudioFrame::new(vec![1, 2], AudioFormat::new(0, 2))));
    assert_eq!(session.rejected_frames(), 2);
    assert_eq!(session.payload_len(), 0);

    // a trailing half frame is trimmed, keeping the payload aligned
    assert!(session.feed(AudioFrame::new(vec![1, 2, 3], format)));
    assert_eq!(session.payload_len() % format.block_align() as usize, 0);
    assert_eq!(session.payload_len(), 4);
}

#[tokio::test]
async fn test_frames_are_conformed_to_session_format() {
    let format = AudioFormat::new(48000, 2);
    let (session, _connection) = started_session(format);

    // 10ms of 24kHz mono becomes 10ms of 48kHz stereo
    let frame = AudioFrame::new(vec![1; 240], AudioFormat::new(24000, 1));
    assert!(session.feed(frame));

    assert_eq!(session.payload_len(), 480 * 2 * 2);
}
