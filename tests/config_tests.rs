// Configuration loading tests

use anyhow::Result;
use channel_scribe::config::DisconnectPolicy;
use channel_scribe::transcription::BackendKind;
use channel_scribe::Config;
use std::time::Duration;
use tempfile::TempDir;

const MINIMAL: &str = r#"
[service]
name = "channel-scribe"

[service.http]
bind = "127.0.0.1"
port = 8085

[audio]
sample_rate = 48000
channels = 2

[storage]
recordings_path = "recordings"
transcripts_path = "transcriptions"
"#;

fn write_config(temp: &TempDir, contents: &str) -> String {
    let path = temp.path().join("scribe.toml");
    std::fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_minimal_config_uses_defaults() -> Result<()> {
    let temp = TempDir::new()?;
    let cfg = Config::load(&write_config(&temp, MINIMAL))?;

    assert_eq!(cfg.audio.format, "wav");
    assert_eq!(cfg.voice.connect_timeout(), Duration::from_secs(20));
    assert!(cfg.voice.auto_record_on_join);
    assert_eq!(cfg.voice.disconnect_policy, DisconnectPolicy::WhenIdle);
    assert_eq!(cfg.transcription.backend, BackendKind::LocalEngine);
    assert_eq!(cfg.transcription.segment_duration(), Duration::from_secs(30));

    let session = cfg.session_config();
    assert_eq!(session.max_duration, Duration::from_secs(3 * 3600));
    assert_eq!(session.sample_rate, 48000);

    let storage = cfg.storage_layout();
    assert!(storage.recordings_root().ends_with("recordings"));
    assert!(storage.transcripts_root().ends_with("transcriptions"));

    Ok(())
}

#[test]
fn test_sections_override_defaults() -> Result<()> {
    let temp = TempDir::new()?;
    let contents = format!(
        "{}\n{}",
        MINIMAL,
        r#"
[voice]
connect_timeout_secs = 5
disconnect_policy = "always"
auto_record_on_join = false

[transcription]
backend = "cloud-engine"
segment_secs = 10

[transcription.cloud]
language_code = "en-US"
"#
    );
    let cfg = Config::load(&write_config(&temp, &contents))?;

    assert_eq!(cfg.voice.connect_timeout(), Duration::from_secs(5));
    assert_eq!(cfg.voice.disconnect_policy, DisconnectPolicy::Always);
    assert!(!cfg.voice.auto_record_on_join);
    assert_eq!(cfg.voice.frame_queue_capacity, 256);
    assert_eq!(cfg.transcription.backend, BackendKind::CloudEngine);
    assert_eq!(cfg.transcription.segment_secs, 10);
    assert_eq!(cfg.transcription.cloud.language_code, "en-US");
    assert_eq!(cfg.transcription.cloud.api_key_env, "GOOGLE_SPEECH_API_KEY");

    Ok(())
}

#[test]
fn test_invalid_channel_count_is_rejected() -> Result<()> {
    let temp = TempDir::new()?;
    let contents = MINIMAL.replace("channels = 2", "channels = 6");

    let err = Config::load(&write_config(&temp, &contents)).unwrap_err();
    assert!(err.to_string().contains("audio.channels"));

    Ok(())
}

#[test]
fn test_unsupported_format_is_rejected() -> Result<()> {
    let temp = TempDir::new()?;
    let contents = MINIMAL.replace("channels = 2", "channels = 2\nformat = \"mp3\"");

    let err = Config::load(&write_config(&temp, &contents)).unwrap_err();
    assert!(err.to_string().contains("mp3"));

    Ok(())
}

#[test]
fn test_shipped_config_loads() -> Result<()> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/channel-scribe.toml");
    let cfg = Config::load(path)?;

    assert_eq!(cfg.service.http.port, 8085);
    assert!(cfg.validate().is_ok());

    Ok(())
}
