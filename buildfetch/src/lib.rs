//! BuildFetch - chunked CDN build downloader
//!
//! This library downloads game builds published on a chunked CDN. A build is
//! described by a manifest mapping every file to an ordered list of parts,
//! each part being a byte range inside a content-addressed chunk object.
//!
//! # Architecture
//!
//! ```text
//! Session ──► ManifestResolver ──► Manifest ──┬──► DownloadStream ────────┐
//!  (auth)                                     └──► DownloadOrchestrator ──┤
//!                                                                         ▼
//!                                         ChunkFetcher ──► ChunkCodec ◄── Transport
//!                                                                         (CachingTransport)
//! ```
//!
//! - [`auth`]: OAuth credential lifecycle with expiry-aware refresh
//! - [`manifest`]: decimal-triplet wire format decoding and manifest resolution
//! - [`chunk`]: chunk object layout, zlib payload decoding, chunk fetching
//! - [`cache`]: content cache trait, disk and memory providers, caching transport
//! - [`stream`]: seekable read-only byte stream over one file's parts
//! - [`download`]: bounded-concurrency, in-order file reassembly
//! - [`downloader`]: facade wiring everything to a configuration
//! - [`logging`]: tracing subscriber setup
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use buildfetch::{BuildDownloader, DownloaderConfig, ManifestSource, ReqwestTransport};
//!
//! let config = DownloaderConfig::default();
//! let transport = Arc::new(ReqwestTransport::new(config.timeout)?);
//! let downloader = BuildDownloader::new(config, transport, None, ManifestSource::Custom("abc".into()))?;
//!
//! let manifest = downloader.manifest(false).await?;
//! let mut stream = downloader.open_file("Game/Content/pak0.pak", false).await?;
//! let mut header = [0u8; 16];
//! stream.read(&mut header).await?;
//! ```

pub mod auth;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod download;
pub mod downloader;
pub mod logging;
pub mod manifest;
pub mod stream;
pub mod transport;

pub use auth::{AppCredentials, AuthError, AuthFlow, Credential, Session, SessionState};
pub use cache::{CachingTransport, Cache, CacheError, DiskCache, MemoryCache};
pub use chunk::{ChunkError, ChunkFetcher};
pub use config::{ConfigError, ConfigFile, DownloaderConfig};
pub use download::{
    DownloadError, DownloadOrchestrator, FileOutcome, ProgressCallback, ProgressCounters,
    ProgressUpdate,
};
pub use downloader::{BuildDownloader, DownloaderError, ManifestSource};
pub use logging::{init_logging, LoggingConfig, LoggingError, LoggingGuard};
pub use manifest::{
    CatalogElement, ChunkRef, FileChunkPart, FileManifest, Manifest, ManifestError,
    ManifestResolver,
};
pub use stream::{DownloadStream, StreamError};
pub use transport::{Method, ReqwestTransport, Request, Response, Transport, TransportError};
