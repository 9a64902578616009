//! In-memory cache provider using moka.

use moka::future::Cache as MokaCache;

use super::traits::{Cache, CacheResult};
use crate::transport::BoxFuture;

/// In-process cache.
///
/// With no capacity the cache grows without bound; with one, moka evicts
/// least-recently-used entries by total byte weight.
#[derive(Clone)]
pub struct MemoryCache {
    cache: MokaCache<String, Vec<u8>>,
}

impl MemoryCache {
    /// An unbounded cache.
    pub fn new() -> Self {
        Self {
            cache: MokaCache::builder().build(),
        }
    }

    /// A cache holding at most `max_size_bytes` of values.
    pub fn with_capacity(max_size_bytes: u64) -> Self {
        let cache = MokaCache::builder()
            // Weight each entry by its data size
            .weigher(|_key: &String, value: &Vec<u8>| -> u32 {
                value.len().min(u32::MAX as usize) as u32
            })
            .max_capacity(max_size_bytes)
            .build();
        Self { cache }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> BoxFuture<'_, CacheResult<Option<Vec<u8>>>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.get(&key).await) })
    }

    fn put(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, CacheResult<()>> {
        let key = key.to_string();
        Box::pin(async move {
            self.cache.insert(key, value).await;
            Ok(())
        })
    }

    fn contains(&self, key: &str) -> BoxFuture<'_, CacheResult<bool>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.contains_key(&key)) })
    }
}
