//! Bounded-concurrency fetch with in-order commit.
//!
//! For one file with parts `0..n`:
//!
//! 1. Permits from a per-file semaphore of size `C` are acquired in index
//!    order, one per part, before the part's fetch task is spawned.
//! 2. Each task fetches its part, then waits on a `watch` channel until the
//!    shared next-to-commit index equals its own.
//! 3. It writes its bytes, advances the index and drops its permit.
//!
//! The lowest uncommitted part always holds a permit, so the pipeline cannot
//! stall, and at most `C` fetched-but-uncommitted payloads are in memory.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::progress::{ProgressCallback, ProgressCounters, ProgressUpdate};
use super::{DownloadError, DownloadResult, FileOutcome};
use crate::chunk::ChunkFetcher;
use crate::config::DEFAULT_CONCURRENCY;
use crate::manifest::{FileChunkPart, FileManifest, Manifest};
use crate::stream::DownloadStream;

/// Downloads files by fetching their parts in parallel and writing them in
/// order.
pub struct DownloadOrchestrator {
    fetcher: ChunkFetcher,
    concurrency: usize,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl DownloadOrchestrator {
    /// Create an orchestrator allowing `concurrency` part fetches in flight
    /// per file (minimum 1).
    pub fn new(fetcher: ChunkFetcher, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Create an orchestrator with the default concurrency.
    pub fn with_defaults(fetcher: ChunkFetcher) -> Self {
        Self::new(fetcher, DEFAULT_CONCURRENCY)
    }

    /// Report progress after every committed part.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Stop downloads when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Download `parts` into `sink`.
    ///
    /// Returns the sink, flushed, and the number of bytes written.
    pub async fn download_to_writer<W>(
        &self,
        name: &str,
        parts: &[FileChunkPart],
        sink: W,
    ) -> DownloadResult<(W, u64)>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let expected = parts.iter().map(FileChunkPart::len).sum();
        let counters = Arc::new(ProgressCounters::new(vec![expected]));
        self.download_parts(0, name, parts, sink, &counters).await
    }

    /// Download `files` of `manifest` below `out_dir`, all in parallel.
    ///
    /// Every file gets its own outcome; a failing file does not stop the
    /// others. Partial outputs of failed or cancelled files are left on disk.
    pub async fn download_files(
        &self,
        manifest: &Manifest,
        files: &[String],
        out_dir: &Path,
    ) -> Vec<FileOutcome> {
        let expected = files
            .iter()
            .map(|name| manifest.file(name).map_or(0, FileManifest::len))
            .collect();
        let counters = Arc::new(ProgressCounters::new(expected));

        info!(
            files = files.len(),
            bytes = counters.total_expected(),
            out_dir = %out_dir.display(),
            concurrency = self.concurrency,
            "Starting download"
        );

        let outcomes = join_all(
            files
                .iter()
                .enumerate()
                .map(|(index, name)| self.download_file(index, manifest, name, out_dir, &counters)),
        )
        .await;

        info!(
            completed = counters.completed_files(),
            failed = outcomes.len() - counters.completed_files(),
            bytes = counters.total_bytes(),
            "Download finished"
        );
        outcomes
    }

    async fn download_file(
        &self,
        file_index: usize,
        manifest: &Manifest,
        name: &str,
        out_dir: &Path,
        counters: &Arc<ProgressCounters>,
    ) -> FileOutcome {
        let path = match output_path(out_dir, name) {
            Ok(path) => path,
            Err(e) => {
                warn!(file = %name, error = %e, "Skipping file");
                return FileOutcome {
                    name: name.to_string(),
                    path: None,
                    result: Err(e),
                };
            }
        };

        let result = self
            .write_file(file_index, manifest, name, &path, counters)
            .await;
        match &result {
            Ok(bytes) => info!(file = %name, bytes, "File downloaded"),
            Err(e) if e.is_cancelled() => warn!(file = %name, "File download cancelled"),
            Err(e) => warn!(file = %name, error = %e, "File download failed"),
        }

        FileOutcome {
            name: name.to_string(),
            path: Some(path),
            result,
        }
    }

    async fn write_file(
        &self,
        file_index: usize,
        manifest: &Manifest,
        name: &str,
        path: &Path,
        counters: &Arc<ProgressCounters>,
    ) -> DownloadResult<u64> {
        let parts = manifest
            .parts(name)
            .ok_or_else(|| DownloadError::UnknownFile(name.to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::File::create(path).await?;

        let (_, bytes) = self
            .download_parts(file_index, name, parts, BufWriter::new(file), counters)
            .await?;
        counters.mark_completed();
        Ok(bytes)
    }

    async fn download_parts<W>(
        &self,
        file_index: usize,
        name: &str,
        parts: &[FileChunkPart],
        sink: W,
        counters: &Arc<ProgressCounters>,
    ) -> DownloadResult<(W, u64)>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let cancel = self.cancel.child_token();
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let stream = Arc::new(DownloadStream::new(
            name,
            parts.to_vec(),
            self.fetcher.clone(),
            false,
        ));
        let part_count = stream.chunk_count();
        let sink = Arc::new(Mutex::new(sink));
        let (next_tx, next_rx) = watch::channel(0usize);
        let next_tx = Arc::new(next_tx);
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        debug!(
            file = %name,
            parts = part_count,
            bytes = stream.len(),
            concurrency = self.concurrency,
            "Fetching parts"
        );

        for index in 0..part_count {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let commit = PartCommit {
                index,
                file_index,
                stream: Arc::clone(&stream),
                sink: Arc::clone(&sink),
                next_rx: next_rx.clone(),
                next_tx: Arc::clone(&next_tx),
                cancel: cancel.clone(),
                counters: Arc::clone(counters),
                progress: self.progress.clone(),
            };
            tasks.spawn(async move {
                let _permit = permit;
                commit.run().await
            });
        }

        let mut first_error: Option<DownloadError> = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined
                .map_err(|e| DownloadError::Task(e.to_string()))
                .and_then(|r| r);
            if let Err(err) = result {
                cancel.cancel();
                let replace = match &first_error {
                    None => true,
                    Some(existing) => existing.is_cancelled() && !err.is_cancelled(),
                };
                if replace {
                    first_error = Some(err);
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        if *next_rx.borrow() < part_count {
            return Err(DownloadError::Cancelled);
        }

        let mut sink = Arc::try_unwrap(sink)
            .map_err(|_| DownloadError::Task("output still shared after download".to_string()))?
            .into_inner();
        sink.flush().await?;
        Ok((sink, stream.len()))
    }
}

/// One part's fetch-then-commit task.
struct PartCommit<W> {
    index: usize,
    file_index: usize,
    stream: Arc<DownloadStream>,
    sink: Arc<Mutex<W>>,
    next_rx: watch::Receiver<usize>,
    next_tx: Arc<watch::Sender<usize>>,
    cancel: CancellationToken,
    counters: Arc<ProgressCounters>,
    progress: Option<ProgressCallback>,
}

impl<W: AsyncWrite + Unpin + Send> PartCommit<W> {
    async fn run(self) -> DownloadResult<()> {
        let index = self.index;

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(DownloadError::Cancelled),
            result = self.stream.get_chunk(index) => result,
        };
        let payload = match fetched {
            Ok(payload) => payload,
            Err(e) => {
                self.cancel.cancel();
                return Err(e.into());
            }
        };

        let mut next_rx = self.next_rx;
        let my_turn = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            ready = async { next_rx.wait_for(|next| *next == index).await.is_ok() } => ready,
        };
        if !my_turn {
            return Err(DownloadError::Cancelled);
        }

        {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.write_all(&payload).await {
                self.cancel.cancel();
                return Err(e.into());
            }
        }

        let file_bytes = self.counters.add_bytes(self.file_index, payload.len() as u64);
        if let Some(progress) = &self.progress {
            progress(&ProgressUpdate {
                file: self.stream.name().to_string(),
                file_bytes,
                file_total: self.stream.len(),
                total_bytes: self.counters.total_bytes(),
                total_expected: self.counters.total_expected(),
            });
        }

        self.next_tx.send_replace(index + 1);
        Ok(())
    }
}

/// Join a manifest file name onto the output directory, refusing names that
/// are absolute or climb out of it.
fn output_path(out_dir: &Path, name: &str) -> DownloadResult<PathBuf> {
    let relative = Path::new(name);
    let confined = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if name.is_empty() || !confined {
        return Err(DownloadError::InvalidPath(name.to_string()));
    }
    Ok(out_dir.join(relative))
}
