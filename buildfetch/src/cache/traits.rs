//! Cache trait and errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::transport::BoxFuture;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache root directory could not be created.
    #[error("could not create cache directory {}: {}", .path.display(), .source)]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while reading or writing an entry.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking I/O task did not complete.
    #[error("cache task failed: {0}")]
    Task(String),
}

/// Key-value storage for raw fetched bytes.
///
/// Keys are lower-case hex digests. Writing the same key twice stores the
/// same bytes, so concurrent writers may race freely.
///
/// Uses boxed futures so that `Arc<dyn Cache>` works.
pub trait Cache: Send + Sync {
    /// Retrieve a value by key.
    ///
    /// - `Ok(Some(data))` if the key exists
    /// - `Ok(None)` if the key is not found
    fn get(&self, key: &str) -> BoxFuture<'_, CacheResult<Option<Vec<u8>>>>;

    /// Store a value, replacing any previous one.
    fn put(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, CacheResult<()>>;

    /// Check whether a key exists without reading it.
    fn contains(&self, key: &str) -> BoxFuture<'_, CacheResult<bool>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_display() {
        let err = CacheError::CreateRoot {
            path: PathBuf::from("/nope"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let display = err.to_string();
        assert!(display.contains("/nope"));
        assert!(display.contains("denied"));
    }

    #[test]
    fn test_cache_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cache_err: CacheError = io_err.into();
        assert!(matches!(cache_err, CacheError::Io(_)));
    }
}
