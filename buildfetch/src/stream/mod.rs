//! Seekable, read-only byte stream over one file's chunk parts.
//!
//! A [`DownloadStream`] presents a file of a build as a contiguous byte
//! sequence without downloading it up front. Reads fetch the parts covering
//! the requested range on demand. Fetched part payloads are memoized either
//! in a single slot (the last part fetched) or, with `cache_chunks`, for
//! every part until [`DownloadStream::clear_cache`].

mod memo;

use std::io::{self, SeekFrom};
use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

use crate::chunk::{ChunkError, ChunkFetcher};
use crate::manifest::{FileChunkPart, Manifest};

use memo::ChunkMemo;

/// Result type for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors raised by [`DownloadStream`].
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// A position or part index outside the stream.
    #[error("{value} is out of range (limit {limit})")]
    OutOfRange { value: i64, limit: u64 },

    /// The stream is read-only.
    #[error("{0} is not supported on a download stream")]
    Unsupported(&'static str),

    /// The operation needs a different stream configuration.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// The manifest has no file of that name.
    #[error("file not found in manifest: {0}")]
    UnknownFile(String),

    /// Fetching a part failed.
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

/// Random-access reader over a file's chunk parts.
pub struct DownloadStream {
    name: String,
    parts: Arc<[FileChunkPart]>,
    fetcher: ChunkFetcher,
    len: u64,
    position: u64,
    cache_chunks: bool,
    memo: Mutex<ChunkMemo>,
}

impl DownloadStream {
    /// Create a stream over `parts`.
    ///
    /// With `cache_chunks` every fetched part is kept in memory; otherwise
    /// only the most recently fetched part is.
    pub fn new(
        name: impl Into<String>,
        parts: impl Into<Arc<[FileChunkPart]>>,
        fetcher: ChunkFetcher,
        cache_chunks: bool,
    ) -> Self {
        let parts = parts.into();
        let len = parts.iter().map(FileChunkPart::len).sum();
        let memo = if cache_chunks {
            ChunkMemo::all(parts.len())
        } else {
            ChunkMemo::last_fetched()
        };

        Self {
            name: name.into(),
            parts,
            fetcher,
            len,
            position: 0,
            cache_chunks,
            memo: Mutex::new(memo),
        }
    }

    /// Open the named file of `manifest`.
    pub fn open(
        manifest: &Manifest,
        name: &str,
        fetcher: ChunkFetcher,
        cache_chunks: bool,
    ) -> StreamResult<Self> {
        let parts = manifest
            .parts(name)
            .ok_or_else(|| StreamError::UnknownFile(name.to_string()))?;
        Ok(Self::new(name, parts.to_vec(), fetcher, cache_chunks))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parts(&self) -> &[FileChunkPart] {
        &self.parts
    }

    /// Total length: the sum of the part sizes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.parts.len()
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn caches_chunks(&self) -> bool {
        self.cache_chunks
    }

    /// Move to `position`, which must satisfy `0 <= position < len`.
    pub fn set_position(&mut self, position: i64) -> StreamResult<()> {
        match u64::try_from(position) {
            Ok(p) if p < self.len => {
                self.position = p;
                Ok(())
            }
            _ => Err(StreamError::OutOfRange {
                value: position,
                limit: self.len,
            }),
        }
    }

    /// Seek relative to the start, the current position or the end.
    ///
    /// Returns the new position. The target must lie inside the stream.
    pub fn seek(&mut self, from: SeekFrom) -> StreamResult<u64> {
        let target = match from {
            SeekFrom::Start(offset) => i64::try_from(offset).ok(),
            SeekFrom::Current(delta) => (self.position as i64).checked_add(delta),
            SeekFrom::End(delta) => (self.len as i64).checked_add(delta),
        };
        let target = target.ok_or(StreamError::OutOfRange {
            value: i64::MAX,
            limit: self.len,
        })?;
        self.set_position(target)?;
        Ok(self.position)
    }

    /// Read into `buf` from the current position.
    ///
    /// Continues across part boundaries until `buf` is full or the stream
    /// ends. Returns the number of bytes read, `0` at the end.
    pub async fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        let Some((mut index, mut start)) = self.locate(self.position) else {
            return Ok(0);
        };

        let mut filled = 0;
        while filled < buf.len() && index < self.parts.len() {
            let payload = self.get_chunk(index).await?;
            let available = payload.len().saturating_sub(start);
            let n = available.min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&payload[start..start + n]);
            filled += n;

            index += 1;
            start = 0;
        }

        self.position += filled as u64;
        trace!(file = %self.name, bytes = filled, position = self.position, "Read");
        Ok(filled)
    }

    /// Read from the current position to the end of the stream.
    pub async fn read_to_end(&mut self) -> StreamResult<Vec<u8>> {
        let remaining = self.len.saturating_sub(self.position) as usize;
        let mut out = vec![0u8; remaining];
        let mut filled = 0;
        while filled < remaining {
            let n = self.read(&mut out[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        out.truncate(filled);
        Ok(out)
    }

    /// Payload bytes of part `index`, served from the memo when possible.
    pub async fn get_chunk(&self, index: usize) -> StreamResult<Bytes> {
        let part = self.parts.get(index).ok_or(StreamError::OutOfRange {
            value: index as i64,
            limit: self.parts.len() as u64,
        })?;

        let memoized = self.memo.lock().get(index);
        if let Some(payload) = memoized {
            return Ok(payload);
        }

        let payload = self.fetcher.fetch_part(part).await?;
        self.memo.lock().store(index, payload.clone());
        Ok(payload)
    }

    /// Fetch every part overlapping `[offset, offset + count)` with at most
    /// `concurrency` fetches in flight.
    ///
    /// Requires `cache_chunks`; otherwise the fetched payloads would be
    /// discarded.
    pub async fn prefetch(&self, offset: u64, count: u64, concurrency: usize) -> StreamResult<()> {
        if !self.cache_chunks {
            return Err(StreamError::InvalidOperation(
                "prefetch requires chunk caching",
            ));
        }

        let end = offset.saturating_add(count);
        let mut indices = Vec::new();
        let mut part_start = 0u64;
        for (index, part) in self.parts.iter().enumerate() {
            let part_end = part_start + part.len();
            if part_start >= end {
                break;
            }
            if part_end > offset && !part.is_empty() {
                indices.push(index);
            }
            part_start = part_end;
        }

        debug!(
            file = %self.name,
            offset,
            count,
            parts = indices.len(),
            concurrency,
            "Prefetching parts"
        );

        let permits = Semaphore::new(concurrency.max(1));
        try_join_all(indices.into_iter().map(|index| {
            let permits = &permits;
            async move {
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|_| StreamError::InvalidOperation("prefetch semaphore closed"))?;
                self.get_chunk(index).await.map(drop)
            }
        }))
        .await?;
        Ok(())
    }

    /// Drop all memoized payloads. Requires `cache_chunks`.
    pub fn clear_cache(&self) -> StreamResult<()> {
        if !self.cache_chunks {
            return Err(StreamError::InvalidOperation(
                "clear_cache requires chunk caching",
            ));
        }
        self.memo.lock().clear();
        Ok(())
    }

    /// Download streams cannot change length.
    pub fn set_len(&mut self, _len: u64) -> StreamResult<()> {
        Err(StreamError::Unsupported("set_len"))
    }

    /// Index of the part containing `position` and the offset inside it.
    fn locate(&self, position: u64) -> Option<(usize, usize)> {
        let mut remaining = position;
        for (index, part) in self.parts.iter().enumerate() {
            if remaining < part.len() {
                return Some((index, remaining as usize));
            }
            remaining -= part.len();
        }
        None
    }
}

impl io::Write for DownloadStream {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            StreamError::Unsupported("write"),
        ))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            StreamError::Unsupported("flush"),
        ))
    }
}

impl std::fmt::Debug for DownloadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadStream")
            .field("name", &self.name)
            .field("len", &self.len)
            .field("chunk_count", &self.parts.len())
            .field("position", &self.position)
            .field("cache_chunks", &self.cache_chunks)
            .finish()
    }
}
