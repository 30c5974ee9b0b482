//! Audio artifact lifecycle
//!
//! Tracks generated audio files on disk and reclaims ones older than the
//! retention window. The sweep is the only background activity in the
//! system; it runs on its own timer and never blocks request handling.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::SpeechError;

/// Aggregate numbers over the stored artifacts
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AudioStats {
    pub files: usize,
    pub total_bytes: u64,
}

/// Generated-audio directory manager
pub struct AudioStore {
    dir: PathBuf,
    retention: Duration,
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    /// Create the audio directory if missing
    pub async fn ensure_dir(&self) -> Result<(), SpeechError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove the named artifact
    ///
    /// `name` must be a bare filename; path-like names never resolve.
    pub async fn delete_by_name(&self, name: &str) -> Result<(), SpeechError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(SpeechError::NotFound(name.to_string()));
        }

        let path = self.dir.join(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(file = %path.display(), "deleted audio file");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(SpeechError::NotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Count and aggregate size of stored WAV artifacts
    pub async fn stats(&self) -> Result<AudioStats, SpeechError> {
        let mut stats = AudioStats::default();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !is_wav(&entry.path()) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            stats.files += 1;
            stats.total_bytes += metadata.len();
        }

        Ok(stats)
    }

    /// Delete every WAV artifact older than the retention window
    ///
    /// Per-file failures are logged and the sweep continues with the rest.
    pub async fn sweep_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut removed = 0;

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    dir = %self.dir.display(),
                    "cleanup sweep could not read audio directory"
                );
                return 0;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "cleanup sweep stopped early");
                    break;
                }
            };

            let path = entry.path();
            if !is_wav(&path) {
                continue;
            }

            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(err) => {
                    tracing::warn!(
                        file = %path.display(),
                        error = %err,
                        "skipping file without modification time"
                    );
                    continue;
                }
            };

            if !is_expired(modified, now, self.retention) {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    removed += 1;
                    tracing::info!(file = %path.display(), "reclaimed expired audio file");
                }
                Err(err) => {
                    tracing::warn!(
                        file = %path.display(),
                        error = %err,
                        "failed to reclaim audio file"
                    );
                }
            }
        }

        removed
    }

    /// Run the sweep on a fixed interval for the lifetime of the process
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately; the sweep waits one
            // full interval before its first pass.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.sweep_expired().await;
                if removed > 0 {
                    tracing::info!(removed, "cleanup sweep complete");
                }
            }
        })
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// Age check for one artifact, pure so the boundary is testable
fn is_expired(modified: SystemTime, now: SystemTime, retention: Duration) -> bool {
    match now.duration_since(modified) {
        Ok(age) => age > retention,
        // Modification time in the future; leave the file alone
        Err(_) => false,
    }
}
