//! Manifest location, fetching and memoization.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::catalog::{parse_catalog, CatalogElement};
use super::model::Manifest;
use super::wire::decode_manifest;
use super::{ManifestError, ManifestResult};
use crate::auth::Session;
use crate::config::DownloaderConfig;
use crate::transport::{Request, Transport};

/// Resolves and memoizes catalog entries and decoded manifests.
///
/// Memos live for the lifetime of the resolver; pass `force_update` to
/// bypass them.
pub struct ManifestResolver {
    transport: Arc<dyn Transport>,
    catalog_url: String,
    download_base: String,
    saved: BTreeMap<String, String>,
    app_manifest: Mutex<Option<Arc<CatalogElement>>>,
    manifests: Mutex<HashMap<String, Arc<Manifest>>>,
}

impl ManifestResolver {
    pub fn new(
        transport: Arc<dyn Transport>,
        catalog_url: impl Into<String>,
        download_base: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            catalog_url: catalog_url.into(),
            download_base: download_base.into().trim_end_matches('/').to_string(),
            saved: BTreeMap::new(),
            app_manifest: Mutex::new(None),
            manifests: Mutex::new(HashMap::new()),
        }
    }

    /// Build a resolver for the endpoints and saved manifests in `config`.
    pub fn from_config(transport: Arc<dyn Transport>, config: &DownloaderConfig) -> Self {
        Self::new(transport, &config.catalog_url, &config.download_base)
            .with_saved_manifests(config.saved_manifests.clone())
    }

    /// Replace the table of named builds.
    pub fn with_saved_manifests(mut self, saved: BTreeMap<String, String>) -> Self {
        self.saved = saved;
        self
    }

    /// Manifest id of a saved build.
    pub fn saved_manifest(&self, name: &str) -> Option<&str> {
        self.saved.get(name).map(String::as_str)
    }

    pub fn saved_manifests(&self) -> &BTreeMap<String, String> {
        &self.saved
    }

    /// URL a manifest reference resolves to.
    ///
    /// `http://` and `https://` URLs are used as is; anything else is a
    /// manifest id below the download base.
    pub fn manifest_url(&self, url_or_id: &str) -> String {
        if url_or_id.starts_with("http://") || url_or_id.starts_with("https://") {
            url_or_id.to_string()
        } else {
            format!("{}/{}.manifest", self.download_base, url_or_id)
        }
    }

    /// Fetch the catalog entry for the live build through `session`.
    pub async fn resolve_app_manifest(
        &self,
        session: &Session,
        force_update: bool,
    ) -> ManifestResult<Arc<CatalogElement>> {
        if !force_update {
            if let Some(element) = self.app_manifest.lock().clone() {
                return Ok(element);
            }
        }

        let response = session
            .authenticated_request(&self.catalog_url)
            .await?
            .error_for_status(&self.catalog_url)?;
        let element = Arc::new(parse_catalog(&response.body)?);

        info!(
            app = %element.app_name,
            build = %element.build_version,
            manifests = element.manifests.len(),
            "Resolved app manifest"
        );
        *self.app_manifest.lock() = Some(Arc::clone(&element));
        Ok(element)
    }

    /// Fetch and decode the manifest referenced by an id or URL.
    pub async fn resolve_manifest(
        &self,
        url_or_id: &str,
        force_update: bool,
    ) -> ManifestResult<Arc<Manifest>> {
        let url = self.manifest_url(url_or_id);
        if !force_update {
            if let Some(manifest) = self.manifests.lock().get(&url).cloned() {
                debug!(url = %url, "Manifest memo hit");
                return Ok(manifest);
            }
        }

        let response = self
            .transport
            .send(Request::get(&url))
            .await?
            .error_for_status(&url)?;
        debug!(url = %url, bytes = response.body.len(), "Fetched manifest");

        let body = response.body;
        let manifest = tokio::task::spawn_blocking(move || decode_manifest(&body))
            .await
            .map_err(|e| ManifestError::ManifestParse(format!("decode task failed: {}", e)))??;
        let manifest = Arc::new(manifest);

        info!(
            url = %url,
            files = manifest.files.len(),
            build = ?manifest.build_version,
            "Resolved manifest"
        );
        self.manifests.lock().insert(url, Arc::clone(&manifest));
        Ok(manifest)
    }

    /// Resolve the live build's manifest: catalog entry, then its first
    /// manifest descriptor.
    pub async fn resolve_build_manifest(
        &self,
        session: &Session,
        force_update: bool,
    ) -> ManifestResult<Arc<Manifest>> {
        let element = self.resolve_app_manifest(session, force_update).await?;
        let url = element.primary_manifest().built_url();
        self.resolve_manifest(&url, force_update).await
    }
}
