//! Dated on-disk layout for recordings and transcripts
//!
//! ```text
//! <recordings_root>/<YYYY-MM-DD>/<name>_<HHMMSS>.wav
//! <transcripts_root>/<YYYY-MM-DD>/<name>_<HHMMSS>.txt
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::error::{RecorderError, RecorderResult};

/// Characters that never make it into a stored file name
pub const INVALID_NAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replacement for each invalid character
pub const NAME_FILLER: char = '_';

/// Longest sanitized name, in characters
pub const MAX_NAME_LEN: usize = 100;

/// Directory used for files found directly under a root
pub const UNDATED_DIR: &str = "undated";

const MAX_COLLISION_SUFFIX: u32 = 100;

/// Replace invalid characters and truncate to [`MAX_NAME_LEN`]
pub fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if INVALID_NAME_CHARS.contains(&c) || c.is_control() {
                NAME_FILLER
            } else {
                c
            }
        })
        .take(MAX_NAME_LEN)
        .collect()
}

/// A recording file found on disk
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecording {
    /// File stem, e.g. `standup_093012`
    pub name: String,
    /// Date directory the file lives in
    pub date: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StorageLayout {
    recordings_root: PathBuf,
    transcripts_root: PathBuf,
    extension: String,
}

impl StorageLayout {
    pub fn new(recordings_root: impl Into<PathBuf>, transcripts_root: impl Into<PathBuf>) -> Self {
        Self {
            recordings_root: recordings_root.into(),
            transcripts_root: transcripts_root.into(),
            extension: "wav".to_string(),
        }
    }

    pub fn recordings_root(&self) -> &Path {
        &self.recordings_root
    }

    pub fn transcripts_root(&self) -> &Path {
        &self.transcripts_root
    }

    pub fn recording_path(&self, name: &str, date: NaiveDate, time: NaiveTime) -> PathBuf {
        self.recordings_root
            .join(date.format("%Y-%m-%d").to_string())
            .join(format!(
                "{}_{}.{}",
                sanitize_name(name),
                time.format("%H%M%S"),
                self.extension
            ))
    }

    /// Transcript location mirroring the recording's dated layout
    pub fn transcript_path(&self, recording: &Path) -> PathBuf {
        let stem = recording
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let date_dir = match recording.strip_prefix(&self.recordings_root) {
            Ok(relative) => relative.parent().map(Path::to_path_buf),
            Err(_) => recording
                .parent()
                .and_then(Path::file_name)
                .map(PathBuf::from),
        };

        let mut path = self.transcripts_root.clone();
        if let Some(dir) = date_dir.filter(|d| !d.as_os_str().is_empty()) {
            path.push(dir);
        }
        path.push(format!("{stem}.txt"));
        path
    }

    /// Write a finalized recording. The time-of-day suffix is taken now, at
    /// save time; an existing file gets a numeric suffix instead of being
    /// overwritten.
    pub async fn save_recording(
        &self,
        bytes: &[u8],
        name: &str,
        date: NaiveDate,
    ) -> RecorderResult<PathBuf> {
        let path = self.recording_path(name, date, Local::now().time());
        let dir = path.parent().unwrap_or(&self.recordings_root).to_path_buf();

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RecorderError::storage(&dir, e))?;

        let mut candidate = path.clone();
        for attempt in 1..=MAX_COLLISION_SUFFIX {
            match write_new(&candidate, bytes).await {
                Ok(()) => {
                    info!("Recording saved to {}", candidate.display());
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = with_suffix(&path, attempt);
                }
                Err(e) => return Err(RecorderError::storage(&candidate, e)),
            }
        }

        Err(RecorderError::storage(
            path,
            std::io::Error::new(ErrorKind::AlreadyExists, "too many recordings with this name"),
        ))
    }

    pub async fn save_transcript(&self, recording: &Path, text: &str) -> std::io::Result<PathBuf> {
        let path = self.transcript_path(recording);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, text).await?;
        info!("Transcript saved to {}", path.display());
        Ok(path)
    }

    /// Every stored recording, newest date first
    pub async fn list_recordings(&self) -> std::io::Result<Vec<StoredRecording>> {
        let layout = self.clone();
        tokio::task::spawn_blocking(move || layout.scan_recordings())
            .await
            .map_err(|e| std::io::Error::new(ErrorKind::Other, e))?
    }

    fn scan_recordings(&self) -> std::io::Result<Vec<StoredRecording>> {
        let mut recordings = Vec::new();

        let entries = match fs::read_dir(&self.recordings_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(recordings),
            Err(e) => return Err(e),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                let date = entry.file_name().to_string_lossy().into_owned();
                for file in fs::read_dir(&path)? {
                    let file = file?;
                    if let Some(recording) = self.stored(&file.path(), &date) {
                        recordings.push(recording);
                    }
                }
            } else if let Some(recording) = self.stored(&path, UNDATED_DIR) {
                recordings.push(recording);
            }
        }

        recordings.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.name.cmp(&b.name)));
        Ok(recordings)
    }

    /// Most recently written recording whose name contains `query`
    pub async fn find_recording(&self, query: &str) -> RecorderResult<StoredRecording> {
        let recordings = self
            .list_recordings()
            .await
            .map_err(|e| RecorderError::storage(&self.recordings_root, e))?;

        recordings
            .into_iter()
            .filter(|recording| recording.name.contains(query))
            .max_by_key(|recording| recording.modified)
            .ok_or_else(|| RecorderError::RecordingNotFound(query.to_string()))
    }

    /// Delete the recording matching `query` and its transcript, if any
    pub async fn delete_recording(&self, query: &str) -> RecorderResult<StoredRecording> {
        let recording = self.find_recording(query).await?;
        tokio::fs::remove_file(&recording.path)
            .await
            .map_err(|e| RecorderError::storage(&recording.path, e))?;

        let transcript = self.transcript_path(&recording.path);
        match tokio::fs::remove_file(&transcript).await {
            Ok(()) => info!("Deleted transcript {}", transcript.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete transcript {}: {}", transcript.display(), e),
        }

        info!("Deleted recording {}", recording.path.display());
        Ok(recording)
    }

    fn stored(&self, path: &Path, date: &str) -> Option<StoredRecording> {
        if path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
            return None;
        }
        let metadata = fs::metadata(path).ok()?;
        if !metadata.is_file() {
            return None;
        }
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Some(StoredRecording {
            name: path.file_stem()?.to_string_lossy().into_owned(),
            date: date.to_string(),
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
            modified,
        })
    }
}

async fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    write_or_remove(path, file, bytes).await
}

/// Fill a freshly created file; on failure the partial file is removed so it
/// is never listed as a recording
async fn write_or_remove<W>(path: &Path, mut out: W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        out.write_all(bytes).await?;
        out.flush().await
    }
    .await;
    drop(out);

    if let Err(e) = written {
        match tokio::fs::remove_file(path).await {
            Ok(()) => warn!("Removed partial recording {}", path.display()),
            Err(remove) => warn!(
                "Failed to remove partial recording {}: {}",
                path.display(),
                remove
            ),
        }
        return Err(e);
    }
    Ok(())
}

fn with_suffix(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    path.with_file_name(format!("{stem}-{n}{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    #[test]
    fn sanitize_replaces_invalid_characters() {
        assert_eq!(sanitize_name("team: sync/notes*"), "team_ sync_notes_");
        assert_eq!(sanitize_name(r#"a<b>c"d\e|f?g"#), "a_b_c_d_e_f_g");
    }

    #[test]
    fn sanitize_truncates_long_names() {
        let long = "é".repeat(150);
        assert_eq!(sanitize_name(&long).chars().count(), MAX_NAME_LEN);
    }

    #[test]
    fn recording_path_uses_date_and_time() {
        let layout = StorageLayout::new("/rec", "/txt");
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let time = NaiveTime::from_hms_opt(7, 5, 3).unwrap();
        assert_eq!(
            layout.recording_path("daily", date, time),
            PathBuf::from("/rec/2024-03-09/daily_070503.wav")
        );
    }

    #[test]
    fn transcript_path_mirrors_recording_layout() {
        let layout = StorageLayout::new("/rec", "/txt");
        assert_eq!(
            layout.transcript_path(Path::new("/rec/2024-03-09/daily_070503.wav")),
            PathBuf::from("/txt/2024-03-09/daily_070503.txt")
        );
        assert_eq!(
            layout.transcript_path(Path::new("/elsewhere/2024-01-01/x_000000.wav")),
            PathBuf::from("/txt/2024-01-01/x_000000.txt")
        );
    }

    struct FailingWriter;

    impl AsyncWrite for FailingWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::new(ErrorKind::Other, "no space left")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn failed_write_leaves_no_partial_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("cut_short_101010.wav");
        fs::write(&path, b"RIFF").unwrap();

        let result = write_or_remove(&path, FailingWriter, b"RIFF....WAVE").await;

        assert!(result.is_err());
        assert!(!path.exists());

        let layout = StorageLayout::new(temp.path(), temp.path().join("txt"));
        assert!(layout.list_recordings().await.unwrap().is_empty());
    }

    #[test]
    fn collision_suffix_keeps_extension() {
        assert_eq!(
            with_suffix(Path::new("/rec/d/a_010203.wav"), 2),
            PathBuf::from("/rec/d/a_010203-2.wav")
        );
    }
}
