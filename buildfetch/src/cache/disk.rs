//! Directory-backed cache.
//!
//! Entries are files at `<root>/<key[..2]>/<key[2..]>`. Writes go to a
//! temporary file in the same directory which is then renamed over the
//! entry, so readers never observe partial entries and concurrent writers of
//! one key leave one complete copy.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::traits::{Cache, CacheError, CacheResult};
use crate::transport::BoxFuture;

/// Persistent cache storing one file per entry.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Open a cache rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::CreateRoot`] if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> CacheResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| CacheError::CreateRoot {
            path: root.clone(),
            source,
        })?;
        debug!(root = %root.display(), "Opened disk cache");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        entry_path(&self.root, key)
    }
}

fn entry_path(root: &Path, key: &str) -> PathBuf {
    match (key.get(..2), key.get(2..)) {
        (Some(prefix), Some(rest)) if !rest.is_empty() => root.join(prefix).join(rest),
        _ => root.join(key),
    }
}

fn write_entry(path: &Path, value: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "entry has no parent"))?;
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(value)?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

async fn blocking<T, F>(f: F) -> CacheResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?
        .map_err(CacheError::Io)
}

impl Cache for DiskCache {
    fn get(&self, key: &str) -> BoxFuture<'_, CacheResult<Option<Vec<u8>>>> {
        let path = self.entry_path(key);
        Box::pin(async move {
            blocking(move || match std::fs::read(&path) {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            })
            .await
        })
    }

    fn put(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, CacheResult<()>> {
        let path = self.entry_path(key);
        Box::pin(async move { blocking(move || write_entry(&path, &value)).await })
    }

    fn contains(&self, key: &str) -> BoxFuture<'_, CacheResult<bool>> {
        let path = self.entry_path(key);
        Box::pin(async move { blocking(move || Ok(path.is_file())).await })
    }
}
