//! Top-level downloader.
//!
//! [`BuildDownloader`] wires a configuration, a transport and an optional
//! authenticated session into the manifest resolver, the chunk fetcher and
//! the download orchestrator, for one [`ManifestSource`].
//!
//! # Example
//!
//! ```ignore
//! let downloader = BuildDownloader::new(
//!     config,
//!     transport,
//!     None,
//!     ManifestSource::Saved("10.0-CL-7658179".into()),
//! )?;
//! let outcomes = downloader
//!     .download(&files, Path::new("out"), None, CancellationToken::new())
//!     .await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::auth::Session;
use crate::cache::{CacheError, CachingTransport, DiskCache};
use crate::chunk::ChunkFetcher;
use crate::config::DownloaderConfig;
use crate::download::{DownloadOrchestrator, FileOutcome, ProgressCallback};
use crate::manifest::{Manifest, ManifestError, ManifestResolver};
use crate::stream::{DownloadStream, StreamError};
use crate::transport::Transport;

/// Where the build manifest comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// The live build, looked up in the catalog with an authenticated session.
    Build,
    /// A named entry of the saved manifest table.
    Saved(String),
    /// A manifest id or URL.
    Custom(String),
}

/// Result type for downloader operations.
pub type DownloaderResult<T> = Result<T, DownloaderError>;

/// Errors raised by [`BuildDownloader`].
#[derive(Debug, Error)]
pub enum DownloaderError {
    /// The saved manifest table has no such name.
    #[error("no saved manifest named {0}")]
    UnknownSavedManifest(String),

    /// The live build needs an authenticated session.
    #[error("resolving the live build requires an authenticated session")]
    SessionRequired,

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The chunk cache directory could not be opened.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Resolves one build's manifest and downloads or streams its files.
pub struct BuildDownloader {
    config: DownloaderConfig,
    session: Option<Arc<Session>>,
    source: ManifestSource,
    resolver: ManifestResolver,
    fetcher: ChunkFetcher,
}

impl BuildDownloader {
    /// Create a downloader.
    ///
    /// When `config.cache_dir` is set, chunk objects go through a
    /// [`CachingTransport`] backed by a [`DiskCache`] in that directory.
    pub fn new(
        config: DownloaderConfig,
        transport: Arc<dyn Transport>,
        session: Option<Arc<Session>>,
        source: ManifestSource,
    ) -> DownloaderResult<Self> {
        let chunk_transport: Arc<dyn Transport> = match &config.cache_dir {
            Some(dir) => {
                let cache = DiskCache::open(dir)?;
                info!(root = %cache.root().display(), "Chunk cache enabled");
                Arc::new(CachingTransport::new(Arc::clone(&transport), Arc::new(cache)))
            }
            None => Arc::clone(&transport),
        };

        let resolver = ManifestResolver::from_config(transport, &config);
        let fetcher = ChunkFetcher::new(chunk_transport, config.chunk_base());

        Ok(Self {
            config,
            session,
            source,
            resolver,
            fetcher,
        })
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    pub fn source(&self) -> &ManifestSource {
        &self.source
    }

    pub fn resolver(&self) -> &ManifestResolver {
        &self.resolver
    }

    pub fn fetcher(&self) -> &ChunkFetcher {
        &self.fetcher
    }

    /// URL of the selected manifest.
    ///
    /// For [`ManifestSource::Build`] this reads the catalog, memoized unless
    /// `force_update` is set.
    pub async fn manifest_url(&self, force_update: bool) -> DownloaderResult<String> {
        match &self.source {
            ManifestSource::Build => {
                let session = self
                    .session
                    .as_ref()
                    .ok_or(DownloaderError::SessionRequired)?;
                let element = self
                    .resolver
                    .resolve_app_manifest(session, force_update)
                    .await?;
                Ok(element.primary_manifest().built_url())
            }
            ManifestSource::Saved(name) => {
                let id = self
                    .resolver
                    .saved_manifest(name)
                    .ok_or_else(|| DownloaderError::UnknownSavedManifest(name.clone()))?;
                Ok(self.resolver.manifest_url(id))
            }
            ManifestSource::Custom(url_or_id) => Ok(self.resolver.manifest_url(url_or_id)),
        }
    }

    /// The selected build's manifest.
    pub async fn manifest(&self, force_update: bool) -> DownloaderResult<Arc<Manifest>> {
        let url = self.manifest_url(force_update).await?;
        Ok(self.resolver.resolve_manifest(&url, force_update).await?)
    }

    /// Open a seekable stream over one file of the build.
    pub async fn open_file(&self, name: &str, cache_chunks: bool) -> DownloaderResult<DownloadStream> {
        let manifest = self.manifest(false).await?;
        Ok(DownloadStream::open(
            &manifest,
            name,
            self.fetcher.clone(),
            cache_chunks,
        )?)
    }

    /// Download `files` below `out_dir`. An empty list downloads every file
    /// of the build.
    ///
    /// Per-file failures are reported in the outcomes; only failing to
    /// resolve the manifest fails the call.
    pub async fn download(
        &self,
        files: &[String],
        out_dir: &Path,
        progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> DownloaderResult<Vec<FileOutcome>> {
        let manifest = self.manifest(false).await?;
        let files: Vec<String> = if files.is_empty() {
            manifest.file_names().map(str::to_string).collect()
        } else {
            files.to_vec()
        };

        let mut orchestrator = DownloadOrchestrator::new(self.fetcher.clone(), self.config.concurrency)
            .with_cancellation(cancel);
        if let Some(progress) = progress {
            orchestrator = orchestrator.with_progress(progress);
        }

        Ok(orchestrator.download_files(&manifest, &files, out_dir).await)
    }
}
