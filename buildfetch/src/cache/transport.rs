//! Transport decorator serving chunk objects from a cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use reqwest::Url;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::traits::Cache;
use crate::transport::{BoxFuture, Method, Request, Response, Transport, TransportError};

/// Suffix of URL paths that are cached.
const CHUNK_SUFFIX: &str = ".chunk";

/// Cache key for a URL path: lower-case hex SHA-256 of the path.
pub fn cache_key(path: &str) -> String {
    format!("{:x}", Sha256::digest(path.as_bytes()))
}

/// Wraps a transport and caches successful chunk object GETs.
///
/// Only `GET` requests whose URL path ends in `.chunk` are intercepted;
/// everything else passes straight through. Concurrent requests for one
/// chunk are serialized on a per-key lock so the object is fetched once.
/// Cache failures are logged and the request falls back to the network.
pub struct CachingTransport<T> {
    inner: T,
    cache: Arc<dyn Cache>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: Transport> CachingTransport<T> {
    pub fn new(inner: T, cache: Arc<dyn Cache>) -> Self {
        Self {
            inner,
            cache,
            locks: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Requests served from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Intercepted requests that went to the network.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn chunk_key(request: &Request) -> Option<String> {
        if request.method != Method::Get {
            return None;
        }
        let url = Url::parse(&request.url).ok()?;
        url.path()
            .ends_with(CHUNK_SUFFIX)
            .then(|| cache_key(url.path()))
    }

    async fn send_cached(&self, key: String, request: Request) -> Result<Response, TransportError> {
        let lock = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        let guard = lock.lock().await;

        let result = self.lookup_or_fetch(&key, request).await;

        drop(guard);
        drop(lock);
        self.locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn lookup_or_fetch(&self, key: &str, request: Request) -> Result<Response, TransportError> {
        match self.cache.get(key).await {
            Ok(Some(data)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, bytes = data.len(), "Chunk cache hit");
                return Ok(Response::ok(data));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, key = %key, "Chunk cache read failed"),
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let url = request.url.clone();
        let response = self.inner.send(request).await?;

        if response.is_success() {
            if let Err(e) = self.cache.put(key, response.body.to_vec()).await {
                warn!(error = %e, key = %key, url = %url, "Chunk cache write failed");
            }
        }
        Ok(response)
    }
}

impl<T: Transport> Transport for CachingTransport<T> {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
        Box::pin(async move {
            match Self::chunk_key(&request) {
                Some(key) => self.send_cached(key, request).await,
                None => self.inner.send(request).await,
            }
        })
    }
}
