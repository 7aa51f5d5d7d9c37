//! Working-directory maintenance.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Outcome of one [`purge_dir`] sweep.
#[derive(Debug, Default)]
pub struct PurgeReport {
    pub removed: usize,
    /// Entries left alone because they were younger than the minimum age.
    pub skipped: usize,
    /// Entries that could not be removed. The sweep continues past them.
    pub failures: Vec<(PathBuf, io::Error)>,
}

/// Delete every entry directly under `dir` (files, symlinks, and directories
/// recursively) whose modification time is at least `min_age` before `now`.
///
/// Per-entry failures are collected in the report rather than aborting the
/// sweep. Only failing to list `dir` itself is an error.
pub async fn purge_dir(dir: &Path, min_age: Duration, now: SystemTime) -> io::Result<PurgeReport> {
    let mut report = PurgeReport::default();
    let mut read_dir = tokio::fs::read_dir(dir).await?;

    loop {
        let entry = match read_dir.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                report.failures.push((dir.to_path_buf(), e));
                break;
            }
        };
        let path = entry.path();

        let metadata = match tokio::fs::symlink_metadata(&path).await {
            Ok(m) => m,
            Err(e) => {
                report.failures.push((path, e));
                continue;
            }
        };

        if !min_age.is_zero() {
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or(Duration::ZERO);
            if age < min_age {
                report.skipped += 1;
                continue;
            }
        }

        let result = if metadata.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };

        match result {
            Ok(()) => report.removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => report.failures.push((path, e)),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn removes_files_and_nested_directories() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.mp4"), b"x").unwrap();
        fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
        fs::write(dir.path().join("nested/deeper/b.txt"), b"x").unwrap();

        let report = purge_dir(dir.path(), Duration::ZERO, SystemTime::now())
            .await
            .unwrap();

        assert_eq!(report.removed, 2);
        assert!(report.failures.is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn keeps_entries_younger_than_min_age() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("old.mp4");
        fs::write(&old, b"x").unwrap();
        fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(7200))
            .unwrap();
        fs::write(dir.path().join("fresh.mp4"), b"x").unwrap();

        let report = purge_dir(dir.path(), Duration::from_secs(3600), SystemTime::now())
            .await
            .unwrap();

        assert_eq!(report.removed, 1);
        assert_eq!(report.skipped, 1);
        assert!(!old.exists());
        assert!(dir.path().join("fresh.mp4").exists());
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = purge_dir(&dir.path().join("missing"), Duration::ZERO, SystemTime::now()).await;
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn removes_symlinks_without_following_them() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("keep.txt");
        fs::write(&target, b"x").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let report = purge_dir(dir.path(), Duration::ZERO, SystemTime::now())
            .await
            .unwrap();

        assert_eq!(report.removed, 1);
        assert!(target.exists());
    }
}
