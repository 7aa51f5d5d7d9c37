//! Locating the artifact an extraction produced.
//!
//! The tool reports its output through weak signals: a printed path, a
//! printed identifier, and the state of the shared working directory. The
//! resolver tries them in order of reliability:
//!
//! 1. the printed path, when it names an existing regular file;
//! 2. the newest media file whose name contains the printed identifier;
//! 3. after a short settle delay, the newest media file that is new or newer
//!    than in the pre-launch [`DirSnapshot`].
//!
//! Tier 3 is inherently racy: another job finishing in the same directory at
//! the same time, or a purge running concurrently, can change the answer.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::media::has_media_extension;

/// Delay before the directory diff, to tolerate metadata lag after the
/// tool's final rename/merge.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Downloaded file not found after extraction.")]
    NotFound,

    #[error("Failed to scan download directory: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// DirSnapshot
// ---------------------------------------------------------------------------

/// Modification times of the working directory's entries at one instant.
#[derive(Debug, Clone, Default)]
pub struct DirSnapshot {
    entries: HashMap<PathBuf, SystemTime>,
}

impl DirSnapshot {
    /// Snapshot the direct children of `dir`.
    ///
    /// Entries whose metadata cannot be read are left out.
    pub async fn capture(dir: &Path) -> io::Result<Self> {
        let mut entries = HashMap::new();
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            if let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) {
                entries.insert(entry.path(), modified);
            }
        }
        Ok(Self { entries })
    }

    pub fn modified(&self, path: &Path) -> Option<SystemTime> {
        self.entries.get(path).copied()
    }
}

// ---------------------------------------------------------------------------
// FileResolver
// ---------------------------------------------------------------------------

/// Resolves the produced artifact inside one working directory.
#[derive(Debug, Clone)]
pub struct FileResolver {
    dir: PathBuf,
    settle_delay: Duration,
}

impl FileResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Run the three resolution tiers; first success wins.
    pub async fn resolve(
        &self,
        printed_path: Option<&str>,
        printed_id: Option<&str>,
        snapshot: &DirSnapshot,
    ) -> Result<PathBuf, ResolveError> {
        if let Some(printed) = printed_path {
            if let Some(path) = self.printed_file(printed).await {
                return Ok(path);
            }
        }

        if let Some(id) = printed_id.map(str::trim).filter(|id| !id.is_empty()) {
            if let Some(path) = self.newest_matching(|name| name.contains(id)).await? {
                return Ok(path);
            }
        }

        tokio::time::sleep(self.settle_delay).await;
        self.newest_since(snapshot)
            .await?
            .ok_or(ResolveError::NotFound)
    }

    /// Tier 1: the printed path, relative to the working directory if needed.
    async fn printed_file(&self, printed: &str) -> Option<PathBuf> {
        let printed = printed.trim();
        if printed.is_empty() {
            return None;
        }
        let path = Path::new(printed);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        };
        let is_file = tokio::fs::metadata(&path)
            .await
            .is_ok_and(|m| m.is_file());
        is_file.then_some(path)
    }

    /// Tier 2: newest media file whose name satisfies `matches`.
    async fn newest_matching(
        &self,
        matches: impl Fn(&str) -> bool,
    ) -> Result<Option<PathBuf>, ResolveError> {
        let candidates = self.media_files().await?;
        Ok(candidates
            .into_iter()
            .filter(|(path, _)| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(&matches)
            })
            .max_by_key(|(_, modified)| *modified)
            .map(|(path, _)| path))
    }

    /// Tier 3: newest media file that is new or changed since `snapshot`.
    async fn newest_since(&self, snapshot: &DirSnapshot) -> Result<Option<PathBuf>, ResolveError> {
        let candidates = self.media_files().await?;
        Ok(candidates
            .into_iter()
            .filter(|(path, modified)| match snapshot.modified(path) {
                None => true,
                Some(before) => *modified > before,
            })
            .max_by_key(|(_, modified)| *modified)
            .map(|(path, _)| path))
    }

    /// Regular files with a media extension, with their modification times.
    async fn media_files(&self) -> Result<Vec<(PathBuf, SystemTime)>, ResolveError> {
        let mut files = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if !has_media_extension(&path) {
                continue;
            }
            let Ok(metadata) = tokio::fs::metadata(&path).await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            if let Ok(modified) = metadata.modified() {
                files.push((path, modified));
            }
        }
        Ok(files)
    }
}
