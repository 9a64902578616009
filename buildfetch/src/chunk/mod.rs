//! Chunk objects.
//!
//! A chunk object is a small binary header followed by a payload that is
//! either stored or zlib-compressed. File parts address a byte window of the
//! decompressed payload. [`ChunkFetcher`] downloads an object and extracts
//! that window.

pub(crate) mod codec;
mod fetcher;

use thiserror::Error;

use crate::transport::TransportError;

pub use codec::{decode_window, CodecError};
pub use fetcher::ChunkFetcher;

/// Result type for chunk operations.
pub type ChunkResult<T> = Result<T, ChunkError>;

/// Errors raised while fetching or decoding a chunk.
#[derive(Debug, Clone, Error)]
pub enum ChunkError {
    /// The object is truncated, malformed or fails to decompress.
    #[error("chunk {guid} is corrupt: {source}")]
    Corrupt {
        guid: String,
        #[source]
        source: CodecError,
    },

    /// The CDN answered with a non-success status.
    #[error("chunk request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The request failed.
    #[error("chunk request failed: {0}")]
    Transport(#[from] TransportError),

    /// The blocking decode task did not complete.
    #[error("chunk decode task failed: {0}")]
    Task(String),
}

impl ChunkError {
    /// Whether the error came from the network rather than the chunk data.
    pub fn is_transport(&self) -> bool {
        matches!(self, ChunkError::Status { .. } | ChunkError::Transport(_))
    }
}
