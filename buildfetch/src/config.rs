//! Configuration for the build downloader.
//!
//! [`DownloaderConfig`] carries every endpoint and tuning knob. It can be
//! built in code with the `with_*` methods or loaded from an INI file with
//! [`ConfigFile`]:
//!
//! ```ini
//! [cdn]
//! download_base = http://cdn.example.com/Builds/Game/CloudDir
//! catalog_url = https://launcher.example.com/catalog
//!
//! [auth]
//! token_url = https://account.example.com/oauth/token
//! client_id = abc
//! client_secret = def
//!
//! [download]
//! concurrency = 20
//! timeout_secs = 30
//!
//! [cache]
//! directory = /var/cache/buildfetch
//!
//! [manifests]
//! 10.0-CL-7658179 = wcfjh9c-okLtEOiDMkG8VzIC1p-ENg
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::auth::AppCredentials;
use crate::manifest::CHUNKS_DIR;

/// Default OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str =
    "https://account-public-service-prod03.ol.epicgames.com/account/api/oauth/token";

/// Default asset catalog endpoint used for authenticated build resolution.
pub const DEFAULT_CATALOG_URL: &str = "https://launcher-public-service-prod06.ol.epicgames.com/launcher/api/public/assets/v2/platform/Windows/namespace/fn/catalogItem/4fe75bbc5a674f4f9b356b5c90567da5/app/Fortnite/label/Live";

/// Default CDN download base (manifests and `ChunksV3/` live below it).
pub const DEFAULT_DOWNLOAD_BASE: &str =
    "http://epicgames-download1.akamaized.net/Builds/Fortnite/CloudDir";

/// Default number of chunk fetches in flight per file.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or parsed.
    #[error("failed to read config {}: {}", .path.display(), .reason)]
    Read { path: PathBuf, reason: String },

    /// A key holds a value of the wrong shape.
    #[error("invalid value for [{section}] {key}: {value:?}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}

/// Configuration for [`BuildDownloader`](crate::BuildDownloader).
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// OAuth token endpoint.
    pub token_url: String,

    /// Asset catalog endpoint listing the live build's manifests.
    pub catalog_url: String,

    /// CDN base URL; manifests are `<base>/<id>.manifest` and chunks live
    /// under `<base>/ChunksV3/`.
    pub download_base: String,

    /// App credentials used for HTTP Basic authorization of token requests.
    pub app_credentials: Option<AppCredentials>,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// Maximum chunk fetches in flight per file.
    pub concurrency: usize,

    /// Directory for the persistent chunk cache. `None` disables caching.
    pub cache_dir: Option<PathBuf>,

    /// Named builds mapped to manifest ids.
    pub saved_manifests: BTreeMap<String, String>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        let saved_manifests = [
            ("10.0-CL-7658179", "wcfjh9c-okLtEOiDMkG8VzIC1p-ENg"),
            ("10.0-CL-7704164", "7C0cEaVSyWc6Fge6RE2N7IqJ4oPhww"),
            ("10.10-CL-7955722", "QpjVgBdS5NubVduhREqDPr8piZTw-w"),
        ]
        .into_iter()
        .map(|(name, id)| (name.to_string(), id.to_string()))
        .collect();

        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            download_base: DEFAULT_DOWNLOAD_BASE.to_string(),
            app_credentials: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            cache_dir: None,
            saved_manifests,
        }
    }
}

impl DownloaderConfig {
    /// Create a configuration pointing at the given CDN download base.
    pub fn new(download_base: impl Into<String>) -> Self {
        Self {
            download_base: download_base.into(),
            ..Default::default()
        }
    }

    /// Set the OAuth token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Set the asset catalog endpoint.
    pub fn with_catalog_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_url = url.into();
        self
    }

    /// Set the app credentials for token requests.
    pub fn with_app_credentials(mut self, credentials: AppCredentials) -> Self {
        self.app_credentials = Some(credentials);
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the per-file fetch concurrency (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Enable the persistent chunk cache in `dir`.
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    /// Add or replace a saved manifest.
    pub fn with_saved_manifest(mut self, name: impl Into<String>, id: impl Into<String>) -> Self {
        self.saved_manifests.insert(name.into(), id.into());
        self
    }

    /// Base URL for chunk objects.
    pub fn chunk_base(&self) -> String {
        format!("{}/{}", self.download_base.trim_end_matches('/'), CHUNKS_DIR)
    }
}

/// INI configuration file loader.
pub struct ConfigFile;

impl ConfigFile {
    /// Default config location: `<config dir>/buildfetch/config.ini`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("buildfetch").join("config.ini"))
    }

    /// Load the default config file, falling back to defaults when absent.
    pub fn load_default() -> Result<DownloaderConfig, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(DownloaderConfig::default()),
        }
    }

    /// Load configuration from an INI file.
    ///
    /// Keys that are absent keep their default values.
    pub fn load(path: &Path) -> Result<DownloaderConfig, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn parse(text: &str) -> Result<DownloaderConfig, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<DownloaderConfig, ConfigError> {
        let mut config = DownloaderConfig::default();

        if let Some(cdn) = ini.section(Some("cdn")) {
            if let Some(base) = cdn.get("download_base") {
                config.download_base = base.trim_end_matches('/').to_string();
            }
            if let Some(url) = cdn.get("catalog_url") {
                config.catalog_url = url.to_string();
            }
        }

        if let Some(auth) = ini.section(Some("auth")) {
            if let Some(url) = auth.get("token_url") {
                config.token_url = url.to_string();
            }
            if let (Some(id), Some(secret)) = (auth.get("client_id"), auth.get("client_secret")) {
                config.app_credentials = Some(AppCredentials::new(id, secret));
            }
        }

        if let Some(download) = ini.section(Some("download")) {
            if let Some(value) = download.get("concurrency") {
                let concurrency: usize = parse_value("download", "concurrency", value)?;
                config.concurrency = concurrency.max(1);
            }
            if let Some(value) = download.get("timeout_secs") {
                config.timeout = Duration::from_secs(parse_value("download", "timeout_secs", value)?);
            }
        }

        if let Some(cache) = ini.section(Some("cache")) {
            if let Some(dir) = cache.get("directory") {
                if !dir.is_empty() {
                    config.cache_dir = Some(PathBuf::from(dir));
                }
            }
        }

        if let Some(manifests) = ini.section(Some("manifests")) {
            for (name, id) in manifests.iter() {
                config
                    .saved_manifests
                    .insert(name.to_string(), id.to_string());
            }
        }

        Ok(config)
    }
}

fn parse_value<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DownloaderConfig::default();
        assert_eq!(config.concurrency, 20);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.app_credentials.is_none());
        assert!(config.cache_dir.is_none());
        assert_eq!(config.saved_manifests.len(), 3);
    }

    #[test]
    fn test_builder_pattern() {
        let config = DownloaderConfig::new("http://cdn.test/CloudDir")
            .with_token_url("http://auth.test/token")
            .with_concurrency(0)
            .with_timeout(Duration::from_secs(5))
            .with_cache_dir(PathBuf::from("/tmp/cache"))
            .with_saved_manifest("old", "abc");

        assert_eq!(config.download_base, "http://cdn.test/CloudDir");
        assert_eq!(config.token_url, "http://auth.test/token");
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/cache")));
        assert_eq!(config.saved_manifests.get("old").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_chunk_base() {
        let config = DownloaderConfig::new("http://cdn.test/CloudDir/");
        assert_eq!(config.chunk_base(), "http://cdn.test/CloudDir/ChunksV3");
    }

    #[test]
    fn test_parse_full_file() {
        let config = ConfigFile::parse(
            "[cdn]\n\
             download_base = http://cdn.test/CloudDir/\n\
             catalog_url = http://launcher.test/catalog\n\
             [auth]\n\
             token_url = http://auth.test/token\n\
             client_id = id\n\
             client_secret = secret\n\
             [download]\n\
             concurrency = 8\n\
             timeout_secs = 90\n\
             [cache]\n\
             directory = /var/cache/bf\n\
             [manifests]\n\
             custom = xyz\n",
        )
        .unwrap();

        assert_eq!(config.download_base, "http://cdn.test/CloudDir");
        assert_eq!(config.catalog_url, "http://launcher.test/catalog");
        assert_eq!(config.token_url, "http://auth.test/token");
        assert_eq!(config.app_credentials, Some(AppCredentials::new("id", "secret")));
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.timeout, Duration::from_secs(90));
        assert_eq!(config.cache_dir, Some(PathBuf::from("/var/cache/bf")));
        assert_eq!(config.saved_manifests.get("custom").map(String::as_str), Some("xyz"));
        // Defaults are kept alongside file entries
        assert!(config.saved_manifests.contains_key("10.0-CL-7658179"));
    }

    #[test]
    fn test_parse_invalid_number() {
        let err = ConfigFile::parse("[download]\nconcurrency = many\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "concurrency"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigFile::load(Path::new("/nonexistent/buildfetch.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[download]\nconcurrency = 3\n").unwrap();

        let config = ConfigFile::load(&path).unwrap();
        assert_eq!(config.concurrency, 3);
    }
}
