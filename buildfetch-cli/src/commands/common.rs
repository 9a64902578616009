//! Common types and utilities shared across CLI commands.

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use indicatif::HumanBytes;

use buildfetch::{
    AuthFlow, BuildDownloader, ConfigFile, DownloaderConfig, ManifestSource, ReqwestTransport,
    Session, Transport,
};

use crate::error::CliError;

/// Which build to work on.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Saved manifest name, manifest id or manifest URL
    #[arg(long, short = 'm', conflicts_with = "build")]
    pub manifest: Option<String>,

    /// Use the live build from the catalog (requires app credentials)
    #[arg(long)]
    pub build: bool,

    /// One-time exchange code for an interactive login (with --build)
    #[arg(long, requires = "build")]
    pub exchange_code: Option<String>,
}

impl SourceArgs {
    /// Map the arguments to a manifest source. Names found in the saved
    /// manifest table take precedence over ids.
    pub fn to_source(&self, config: &DownloaderConfig) -> Result<ManifestSource, CliError> {
        match (&self.manifest, self.build) {
            (_, true) => Ok(ManifestSource::Build),
            (Some(m), false) if config.saved_manifests.contains_key(m) => {
                Ok(ManifestSource::Saved(m.clone()))
            }
            (Some(m), false) => Ok(ManifestSource::Custom(m.clone())),
            (None, false) => Err(CliError::Usage(
                "Specify a build with --manifest <name|id|url> or --build".to_string(),
            )),
        }
    }

    fn auth_flow(&self) -> AuthFlow {
        match &self.exchange_code {
            Some(code) => AuthFlow::ExchangeCode { code: code.clone() },
            None => AuthFlow::ClientCredentials,
        }
    }
}

/// Load the config file given with `--config`, or the default one.
pub fn load_config(path: Option<&Path>) -> Result<DownloaderConfig, CliError> {
    Ok(match path {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    })
}

/// Create a downloader for `source` over a reqwest transport.
pub fn build_downloader(
    config: DownloaderConfig,
    source: &SourceArgs,
) -> Result<BuildDownloader, CliError> {
    let manifest_source = source.to_source(&config)?;
    let transport: Arc<dyn Transport> = Arc::new(
        ReqwestTransport::new(config.timeout).map_err(|e| CliError::Transport(e.to_string()))?,
    );

    let session = match manifest_source {
        ManifestSource::Build => {
            if config.app_credentials.is_none() {
                return Err(CliError::Config(
                    "--build needs client_id and client_secret in the [auth] section".to_string(),
                ));
            }
            Some(Arc::new(Session::new(
                Arc::clone(&transport),
                &config.token_url,
                config.app_credentials.clone(),
                source.auth_flow(),
            )))
        }
        _ => None,
    };

    Ok(BuildDownloader::new(config, transport, session, manifest_source)?)
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    HumanBytes(bytes).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(manifest: Option<&str>, build: bool) -> SourceArgs {
        SourceArgs {
            manifest: manifest.map(str::to_string),
            build,
            exchange_code: None,
        }
    }

    #[test]
    fn test_source_selection() {
        let config = DownloaderConfig::default().with_saved_manifest("old", "abc");

        assert_eq!(
            args(Some("old"), false).to_source(&config).unwrap(),
            ManifestSource::Saved("old".to_string())
        );
        assert_eq!(
            args(Some("xyz"), false).to_source(&config).unwrap(),
            ManifestSource::Custom("xyz".to_string())
        );
        assert_eq!(
            args(None, true).to_source(&config).unwrap(),
            ManifestSource::Build
        );
        assert!(matches!(
            args(None, false).to_source(&config),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn test_auth_flow() {
        let mut source = args(None, true);
        assert_eq!(source.auth_flow(), AuthFlow::ClientCredentials);
        source.exchange_code = Some("code".to_string());
        assert_eq!(
            source.auth_flow(),
            AuthFlow::ExchangeCode {
                code: "code".to_string()
            }
        );
    }

    #[test]
    fn test_build_without_credentials_is_rejected() {
        let config = DownloaderConfig::default();
        assert!(matches!(
            build_downloader(config, &args(None, true)),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KiB");
    }
}
