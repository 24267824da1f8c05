//! Named advisory file locks, valid across threads and processes.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tokio::fs::OpenOptions;

use crate::errors::AppError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A lock file at `<lock_dir>/<name>.lock`.
#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
    timeout: Duration,
}

/// Held lock; released when dropped.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl FileLock {
    pub fn new(lock_dir: &Path, name: &str, timeout: Duration) -> Self {
        Self {
            path: lock_dir.join(format!("{}.lock", name)),
            timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the exclusive lock, failing once the timeout elapses.
    pub async fn acquire(&self) -> Result<LockGuard, AppError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .await?
            .into_std()
            .await;

        let deadline = Instant::now() + self.timeout;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(LockGuard { file }),
                Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {}
                Err(e) => return Err(e.into()),
            }

            if Instant::now() >= deadline {
                tracing::warn!("Timed out waiting for lock {}", self.path.display());
                return Err(AppError::Storage(format!(
                    "Timed out waiting for lock {}",
                    self.path.display()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lock_times_out_while_held() {
        let temp_dir = TempDir::new().unwrap();
        let lock = FileLock::new(temp_dir.path(), "data", Duration::from_millis(100));

        let held = lock.acquire().await.unwrap();
        let err = lock.acquire().await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        drop(held);
        assert!(lock.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let lock = FileLock::new(
            &temp_dir.path().join("nested/locks"),
            "vote_history",
            Duration::from_secs(1),
        );

        let _guard = lock.acquire().await.unwrap();
        assert!(lock.path().ends_with("vote_history.lock"));
        assert!(lock.path().exists());
    }
}
