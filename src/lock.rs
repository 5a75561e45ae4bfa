//! Path-scoped advisory file lock with jittered exponential backoff.
//!
//! The lock lives on a sidecar `<file>.lock` so the data file itself can be
//! replaced by rename while the lock is held. Dropping a [`FileLock`]
//! releases it.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// Retry schedule for lock acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    pub factor: f64,
    pub min_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub randomize: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            factor: 3.0,
            min_timeout_ms: 50,
            max_timeout_ms: 5_000,
            randomize: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let jitter = if self.randomize {
            rand::thread_rng().gen_range(1.0..2.0)
        } else {
            1.0
        };
        let raw = jitter * self.min_timeout_ms as f64 * self.factor.powi(attempt as i32);
        let capped = raw.round().min(self.max_timeout_ms as f64);
        Duration::from_millis(capped as u64)
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Held exclusive lock on `<target>.lock`.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    pub fn lock_path(target: &Path) -> PathBuf {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        target.with_file_name(name)
    }

    /// Try to take the lock once without blocking.
    pub fn try_acquire(target: &Path) -> std::io::Result<Option<Self>> {
        let path = Self::lock_path(target);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Acquire the lock for `target`, sleeping between attempts per `policy`.
    ///
    /// Each attempt opens and flocks on the blocking pool.
    pub async fn acquire(target: &Path, policy: &RetryPolicy) -> Result<Self> {
        let attempts = policy.max_attempts();
        for attempt in 0..attempts {
            let sidecar_of = target.to_path_buf();
            let found = tokio::task::spawn_blocking(move || Self::try_acquire(&sidecar_of))
                .await
                .map_err(|e| CatalogError::io(e.to_string()))??;
            if let Some(lock) = found {
                log::debug!("locked {} (attempt {})", lock.path.display(), attempt + 1);
                return Ok(lock);
            }
            if attempt + 1 < attempts {
                let delay = policy.delay_for_attempt(attempt);
                log::warn!(
                    "{} is locked, retrying in {}ms",
                    target.display(),
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }
        Err(CatalogError::Lock {
            path: target.to_path_buf(),
            attempts,
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn fixed_policy() -> RetryPolicy {
        RetryPolicy {
            randomize: false,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn backoff_grows_by_factor_and_caps() {
        let policy = fixed_policy();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(50));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(150));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(450));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(1_350));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(4_050));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(5_000));
    }

    #[test]
    fn jitter_stays_within_one_to_two_times_base() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let d = policy.delay_for_attempt(1).as_millis();
            assert!((150..=300).contains(&d), "delay {d} out of range");
        }
    }

    #[test]
    fn lock_path_is_a_sidecar() {
        let p = FileLock::lock_path(Path::new("data/movies/MoviesList.json"));
        assert_eq!(p, PathBuf::from("data/movies/MoviesList.json.lock"));
    }

    #[test]
    fn second_lock_is_contended_until_first_drops() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("list.json");

        let first = FileLock::try_acquire(&target).unwrap();
        assert!(first.is_some());
        assert!(FileLock::try_acquire(&target).unwrap().is_none());

        drop(first);
        assert!(FileLock::try_acquire(&target).unwrap().is_some());
    }

    #[tokio::test]
    async fn acquire_takes_free_lock_and_releases_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("list.json");

        let lock = FileLock::acquire(&target, &fixed_policy()).await.unwrap();
        assert!(FileLock::lock_path(&target).exists());
        assert!(FileLock::try_acquire(&target).unwrap().is_none());

        drop(lock);
        assert!(FileLock::try_acquire(&target).unwrap().is_some());
    }

    #[tokio::test]
    async fn acquire_gives_up_after_retry_budget() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("list.json");
        let _held = FileLock::try_acquire(&target).unwrap().unwrap();

        let policy = RetryPolicy {
            retries: 2,
            min_timeout_ms: 1,
            max_timeout_ms: 5,
            ..fixed_policy()
        };
        let err = FileLock::acquire(&target, &policy).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockError);
        assert!(matches!(err, CatalogError::Lock { attempts: 3, .. }));
    }
}
