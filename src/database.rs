use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CatalogError, Result};
use crate::lock::{FileLock, RetryPolicy};

/// A JSON document on disk plus the in-memory copy of what was last read or written.
///
/// Every write goes through [`FileLock`], so cooperating writers to the same
/// path never interleave. The mirror is only replaced once the file write has
/// succeeded.
pub struct JsonStore<T> {
    path: PathBuf,
    policy: RetryPolicy,
    cache: Mutex<T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// A store for `path` whose cache starts as `data`, without touching the disk.
    pub fn new(path: impl Into<PathBuf>, policy: RetryPolicy, data: T) -> Self {
        Self {
            path: path.into(),
            policy,
            cache: Mutex::new(data),
        }
    }

    /// Read `path` and seed the cache; fails if the file is missing or malformed.
    pub async fn load(path: impl Into<PathBuf>, policy: RetryPolicy) -> Result<Self> {
        let path = path.into();
        let data = read_json(&path).await?;
        Ok(Self::new(path, policy, data))
    }

    /// Like [`JsonStore::load`], but a missing file starts from `fallback`.
    pub async fn load_or(path: impl Into<PathBuf>, policy: RetryPolicy, fallback: T) -> Result<Self> {
        let path = path.into();
        let data = match tokio::fs::metadata(&path).await {
            Ok(_) => read_json(&path).await?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("{} does not exist yet", path.display());
                fallback
            }
            Err(e) => return Err(CatalogError::read(&path, e)),
        };
        Ok(Self::new(path, policy, data))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deep copy of the cached document.
    pub fn snapshot(&self) -> T {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Re-read the file and replace the cache with its contents.
    pub async fn reload(&self) -> Result<T> {
        let data: T = read_json(&self.path).await?;
        self.set_cache(data.clone());
        Ok(data)
    }

    /// Serialize `value` to the file under the lock, then adopt it as the cache.
    pub async fn write(&self, value: &T) -> Result<()> {
        let content = serde_json::to_string(value).map_err(|e| CatalogError::io(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CatalogError::io(format!("creating {}: {}", parent.display(), e)))?;
        }

        let lock = FileLock::acquire(&self.path, &self.policy).await?;
        replace_file(&self.path, content.as_bytes()).await?;
        self.set_cache(value.clone());
        drop(lock);

        log::debug!("wrote {} ({} bytes)", self.path.display(), content.len());
        Ok(())
    }

    fn set_cache(&self, value: T) {
        *self.cache.lock().unwrap_or_else(|e| e.into_inner()) = value;
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CatalogError::read(path, e))?;
    serde_json::from_str(&content).map_err(|e| CatalogError::read(path, e))
}

/// Write to a sibling temp file and rename it over `path`.
async fn replace_file(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    if let Err(e) = tokio::fs::write(&tmp, data).await {
        return Err(CatalogError::io(format!("writing {}: {}", tmp.display(), e)));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(CatalogError::io(format!("replacing {}: {}", path.display(), e)));
    }
    Ok(())
}
