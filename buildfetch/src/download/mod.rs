//! Parallel file reassembly.
//!
//! The [`DownloadOrchestrator`] fetches a file's parts concurrently and
//! writes them to the output strictly in part order, so the result is
//! byte-identical to a sequential download whatever order fetches complete
//! in.

mod orchestrator;
mod progress;

use std::path::PathBuf;

use thiserror::Error;

use crate::chunk::ChunkError;
use crate::stream::StreamError;

pub use orchestrator::DownloadOrchestrator;
pub use progress::{ProgressCallback, ProgressCounters, ProgressUpdate};

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors that fail a file download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// A part could not be fetched or decoded.
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    /// The part stream rejected an operation.
    #[error(transparent)]
    Stream(StreamError),

    /// Writing the output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file name would escape the output directory.
    #[error("refusing to write outside the output directory: {0}")]
    InvalidPath(String),

    /// The manifest has no file of that name.
    #[error("file not found in manifest: {0}")]
    UnknownFile(String),

    /// The download was cancelled.
    #[error("download cancelled")]
    Cancelled,

    /// A fetch task panicked or was aborted.
    #[error("download task failed: {0}")]
    Task(String),
}

impl From<StreamError> for DownloadError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Chunk(e) => DownloadError::Chunk(e),
            StreamError::UnknownFile(name) => DownloadError::UnknownFile(name),
            other => DownloadError::Stream(other),
        }
    }
}

impl DownloadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }
}

/// Result of downloading one file.
#[derive(Debug)]
pub struct FileOutcome {
    /// File name as listed in the manifest.
    pub name: String,
    /// Output path, when the name was valid.
    pub path: Option<PathBuf>,
    /// Bytes written, or why the file failed.
    pub result: DownloadResult<u64>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
