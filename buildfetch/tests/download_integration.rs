//! Integration tests for the download pipeline.
//!
//! These tests drive a [`BuildDownloader`] against an in-process CDN:
//! - OAuth login → catalog → manifest → chunk objects
//! - Seekable streaming across part boundaries
//! - Parallel, in-order reassembly under random fetch latency
//! - Persistent chunk cache reuse
//! - Per-file failure isolation
//!
//! Run with: `cargo test --test download_integration`

use std::collections::HashMap;
use std::io::{SeekFrom, Write};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use buildfetch::manifest::encode_triplets;
use buildfetch::transport::{BoxFuture, Method, Request, Response, Transport, TransportError};
use buildfetch::{
    AppCredentials, AuthFlow, BuildDownloader, ChunkError, DownloadError, DownloaderConfig,
    ManifestSource, ProgressCallback, ProgressUpdate, Session,
};

// ============================================================================
// Fake CDN
// ============================================================================

const BASE: &str = "http://cdn.test/CloudDir";
const TOKEN_URL: &str = "http://auth.test/token";
const CATALOG_URL: &str = "http://launcher.test/catalog";
const MANIFEST_URL: &str = "http://cdn.test/CloudDir/live.manifest";
const CHUNK_SIZE: usize = 64;
const CHUNK_COUNT: usize = 6;

/// Routes requests to canned responses and records them.
#[derive(Default)]
struct FakeCdn {
    routes: Mutex<HashMap<String, Bytes>>,
    requests: Mutex<Vec<Request>>,
    max_delay_ms: u64,
}

impl FakeCdn {
    fn with_latency(max_delay_ms: u64) -> Self {
        Self {
            max_delay_ms,
            ..Default::default()
        }
    }

    fn route(&self, url: &str, body: impl Into<Bytes>) {
        self.routes.lock().insert(url.to_string(), body.into());
    }

    fn requests_to(&self, url: &str) -> Vec<Request> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect()
    }

    fn chunk_requests(&self) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.ends_with(".chunk"))
            .count()
    }
}

impl Transport for FakeCdn {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
        Box::pin(async move {
            let body = self.routes.lock().get(&request.url).cloned();
            let is_chunk = request.url.ends_with(".chunk");
            self.requests.lock().push(request);

            if is_chunk && self.max_delay_ms > 0 {
                let delay = rand::rng().random_range(0..=self.max_delay_ms);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            Ok(match body {
                Some(body) => Response::ok(body),
                None => Response {
                    status: 404,
                    headers: HashMap::new(),
                    body: Bytes::new(),
                },
            })
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Build a compressed chunk object: 62-byte header, zlib payload.
fn chunk_object(payload: &[u8]) -> Vec<u8> {
    let mut object = vec![0u8; 62];
    object[8] = 62;
    object[40] = 1;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).unwrap();
    object.extend(encoder.finish().unwrap());
    object
}

fn chunk_guid(i: usize) -> String {
    format!("GUID{:04}", i)
}

/// Chunk URL for chunk `i`: one-byte hash `i + 0x10`, data group `i`.
fn chunk_url(i: usize) -> String {
    format!("{}/ChunksV3/{:02}/{:02X}_{}.chunk", BASE, i, i + 0x10, chunk_guid(i))
}

fn triplet(value: i32) -> String {
    encode_triplets(&value.to_le_bytes())
}

/// A build of two files spread over [`CHUNK_COUNT`] random chunks.
struct Build {
    chunks: Vec<Vec<u8>>,
    files: Vec<(&'static str, Vec<(usize, usize, usize)>)>,
}

impl Build {
    fn random() -> Self {
        let mut rng = rand::rng();
        let chunks: Vec<Vec<u8>> = (0..CHUNK_COUNT)
            .map(|_| (0..CHUNK_SIZE).map(|_| rng.random::<u8>()).collect())
            .collect();
        let files = vec![
            (
                "Game/Content/pak0.pak",
                vec![(0, 0, 64), (1, 10, 30), (2, 0, 64), (0, 32, 16), (4, 1, 63), (5, 0, 8)],
            ),
            ("Game/readme.txt", vec![(3, 5, 20)]),
        ];
        Self { chunks, files }
    }

    fn expected(&self, name: &str) -> Vec<u8> {
        let (_, parts) = self.files.iter().find(|(n, _)| *n == name).unwrap();
        parts
            .iter()
            .flat_map(|&(chunk, offset, size)| self.chunks[chunk][offset..offset + size].to_vec())
            .collect()
    }

    fn manifest_json(&self) -> String {
        let files: Vec<String> = self
            .files
            .iter()
            .map(|(name, parts)| {
                let parts: Vec<String> = parts
                    .iter()
                    .map(|&(chunk, offset, size)| {
                        format!(
                            r#"{{ "Guid": "{}", "Offset": "{}", "Size": "{}" }}"#,
                            chunk_guid(chunk),
                            triplet(offset as i32),
                            triplet(size as i32)
                        )
                    })
                    .collect();
                format!(
                    r#"{{ "Filename": "{}", "FileChunkParts": [{}] }}"#,
                    name,
                    parts.join(",")
                )
            })
            .collect();
        let hashes: Vec<String> = (0..CHUNK_COUNT)
            .map(|i| format!(r#""{}": "{}""#, chunk_guid(i), encode_triplets(&[(i + 0x10) as u8])))
            .collect();
        let groups: Vec<String> = (0..CHUNK_COUNT)
            .map(|i| format!(r#""{}": "{}""#, chunk_guid(i), i))
            .collect();
        format!(
            r#"{{ "BuildVersion": "10.00-CL-1", "FileManifestList": [{}], "ChunkHashList": {{ {} }}, "DataGroupList": {{ {} }} }}"#,
            files.join(","),
            hashes.join(","),
            groups.join(",")
        )
    }

    /// Serve the whole build, token and catalog endpoints included.
    fn serve(&self, cdn: &FakeCdn) {
        let expires = chrono::Utc::now() + chrono::Duration::hours(8);
        cdn.route(
            TOKEN_URL,
            format!(
                r#"{{ "access_token": "live-token", "expires_at": "{}" }}"#,
                expires.to_rfc3339()
            ),
        );
        cdn.route(
            CATALOG_URL,
            format!(
                r#"{{ "elements": [{{ "appName": "Game", "buildVersion": "10.00-CL-1",
                     "manifests": [{{ "uri": "{}" }}] }}] }}"#,
                MANIFEST_URL
            ),
        );
        cdn.route(MANIFEST_URL, self.manifest_json());
        for (i, chunk) in self.chunks.iter().enumerate() {
            cdn.route(&chunk_url(i), chunk_object(chunk));
        }
    }
}

fn config() -> DownloaderConfig {
    DownloaderConfig::new(BASE)
        .with_token_url(TOKEN_URL)
        .with_catalog_url(CATALOG_URL)
        .with_app_credentials(AppCredentials::new("client", "secret"))
}

fn custom_downloader(cdn: &Arc<FakeCdn>, config: DownloaderConfig) -> BuildDownloader {
    let transport: Arc<dyn Transport> = cdn.clone();
    BuildDownloader::new(config, transport, None, ManifestSource::Custom(MANIFEST_URL.into()))
        .unwrap()
}

fn all_files() -> Vec<String> {
    Vec::new()
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Login, catalog lookup, manifest decode and download of every file.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_authenticated_build_download() {
    let build = Build::random();
    let cdn = Arc::new(FakeCdn::with_latency(5));
    build.serve(&cdn);

    let transport: Arc<dyn Transport> = cdn.clone();
    let config = config();
    let session = Arc::new(Session::new(
        Arc::clone(&transport),
        &config.token_url,
        config.app_credentials.clone(),
        AuthFlow::ClientCredentials,
    ));
    let downloader =
        BuildDownloader::new(config, transport, Some(session), ManifestSource::Build).unwrap();

    let out = tempfile::tempdir().unwrap();
    let outcomes = downloader
        .download(&all_files(), out.path(), None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    for (name, _) in &build.files {
        let written = std::fs::read(out.path().join(name)).unwrap();
        assert_eq!(written, build.expected(name), "{} differs", name);
    }

    // One login, with Basic app auth
    let token_requests = cdn.requests_to(TOKEN_URL);
    assert_eq!(token_requests.len(), 1);
    assert_eq!(token_requests[0].method, Method::Post);
    assert_eq!(token_requests[0].form_value("grant_type"), Some("client_credentials"));
    assert!(token_requests[0]
        .header("authorization")
        .unwrap()
        .starts_with("basic "));

    // Catalog fetched with the bearer token
    let catalog_requests = cdn.requests_to(CATALOG_URL);
    assert_eq!(catalog_requests.len(), 1);
    assert_eq!(
        catalog_requests[0].header("authorization"),
        Some("bearer live-token")
    );
}

/// Seeks and reads spanning part boundaries match the reassembled file.
#[tokio::test]
async fn test_stream_reads_across_parts() {
    let build = Build::random();
    let cdn = Arc::new(FakeCdn::default());
    build.serve(&cdn);
    let downloader = custom_downloader(&cdn, config());

    let name = "Game/Content/pak0.pak";
    let expected = build.expected(name);
    let mut stream = downloader.open_file(name, true).await.unwrap();
    assert_eq!(stream.len(), expected.len() as u64);

    stream.seek(SeekFrom::Start(50)).unwrap();
    let mut buf = vec![0u8; 40];
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], &expected[50..50 + n]);
    assert_eq!(stream.position(), 50 + n as u64);

    stream.seek(SeekFrom::End(-5)).unwrap();
    let tail = stream.read_to_end().await.unwrap();
    assert_eq!(tail, expected[expected.len() - 5..].to_vec());
    assert_eq!(stream.read(&mut buf).await.unwrap(), 0);

    stream.seek(SeekFrom::Start(0)).unwrap();
    assert_eq!(stream.read_to_end().await.unwrap(), expected);
}

/// Output is byte-identical whatever the concurrency and completion order.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_download_matches_sequential() {
    let build = Build::random();
    let cdn = Arc::new(FakeCdn::with_latency(15));
    build.serve(&cdn);

    let mut results = Vec::new();
    for concurrency in [1, 3, 8] {
        let downloader = custom_downloader(&cdn, config().with_concurrency(concurrency));
        let out = tempfile::tempdir().unwrap();
        let outcomes = downloader
            .download(&all_files(), out.path(), None, CancellationToken::new())
            .await
            .unwrap();
        assert!(outcomes.iter().all(|o| o.is_ok()));
        results.push(std::fs::read(out.path().join("Game/Content/pak0.pak")).unwrap());
    }

    let expected = build.expected("Game/Content/pak0.pak");
    assert!(results.iter().all(|r| *r == expected));
}

/// A second download is served from the persistent chunk cache.
#[tokio::test]
async fn test_disk_cache_reused_across_downloaders() {
    let build = Build::random();
    let cdn = Arc::new(FakeCdn::default());
    build.serve(&cdn);
    let cache = tempfile::tempdir().unwrap();

    let first = custom_downloader(&cdn, config().with_cache_dir(cache.path().to_path_buf()));
    let out = tempfile::tempdir().unwrap();
    first
        .download(&all_files(), out.path(), None, CancellationToken::new())
        .await
        .unwrap();
    let fetched = cdn.chunk_requests();
    assert_eq!(fetched, CHUNK_COUNT);

    let second = custom_downloader(&cdn, config().with_cache_dir(cache.path().to_path_buf()));
    let out = tempfile::tempdir().unwrap();
    let outcomes = second
        .download(&all_files(), out.path(), None, CancellationToken::new())
        .await
        .unwrap();

    assert!(outcomes.iter().all(|o| o.is_ok()));
    assert_eq!(cdn.chunk_requests(), fetched);
    assert_eq!(
        std::fs::read(out.path().join("Game/readme.txt")).unwrap(),
        build.expected("Game/readme.txt")
    );
}

/// A corrupt chunk fails only the file that uses it.
#[tokio::test]
async fn test_corrupt_chunk_fails_only_its_file() {
    let build = Build::random();
    let cdn = Arc::new(FakeCdn::default());
    build.serve(&cdn);
    cdn.route(&chunk_url(3), vec![0u8; 20]);

    let downloader = custom_downloader(&cdn, config());
    let out = tempfile::tempdir().unwrap();
    let outcomes = downloader
        .download(&all_files(), out.path(), None, CancellationToken::new())
        .await
        .unwrap();

    let pak = outcomes.iter().find(|o| o.name == "Game/Content/pak0.pak").unwrap();
    let readme = outcomes.iter().find(|o| o.name == "Game/readme.txt").unwrap();
    assert!(pak.is_ok());
    assert!(matches!(
        readme.result,
        Err(DownloadError::Chunk(ChunkError::Corrupt { .. }))
    ));
}

/// Progress reaches the expected total and never goes backwards.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_progress_is_monotonic() {
    let build = Build::random();
    let cdn = Arc::new(FakeCdn::with_latency(5));
    build.serve(&cdn);

    let updates = Arc::new(Mutex::new(Vec::<ProgressUpdate>::new()));
    let sink = Arc::clone(&updates);
    let progress: ProgressCallback = Arc::new(move |u: &ProgressUpdate| sink.lock().push(u.clone()));

    let downloader = custom_downloader(&cdn, config());
    let out = tempfile::tempdir().unwrap();
    downloader
        .download(&all_files(), out.path(), Some(progress), CancellationToken::new())
        .await
        .unwrap();

    let updates = updates.lock();
    let total: u64 = build
        .files
        .iter()
        .map(|(name, _)| build.expected(name).len() as u64)
        .sum();
    assert_eq!(updates.len(), 7);
    assert!(updates.iter().all(|u| u.total_expected == total));
    assert_eq!(updates.iter().map(|u| u.total_bytes).max(), Some(total));

    for name in ["Game/Content/pak0.pak", "Game/readme.txt"] {
        let per_file: Vec<u64> = updates
            .iter()
            .filter(|u| u.file == name)
            .map(|u| u.file_bytes)
            .collect();
        assert!(per_file.windows(2).all(|w| w[0] < w[1]));
    }
}
