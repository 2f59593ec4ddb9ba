//! Trust resolver configuration
//!
//! Loaded from environment variables:
//! - `ROOT_CA_SOURCE`: `http`, `file` or `static`
//! - `ROOT_CA_URLS`, `ROOT_CA_PATHS`, `ROOT_CA_CERTS`: comma-separated lists
//! - `ROOT_CA_FETCH_TIMEOUT_SECONDS` (default 30)
//! - `TRUST_CACHE_ENABLED` (default true)
//! - `TRUST_SHORTCUT_SCOPE`: `leaf` or `any` (default leaf)
//! - `CHAIN_MAX_DEPTH` (default 10)

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::TrustCache;
use crate::chain::ShortcutScope;
use crate::error::{TrustError, TrustResult};
use crate::provider::KeyProvider;
use crate::roots::{FileRootSource, HttpRootSource, RootCertificateSource, StaticRootSource};
use crate::validator::{ValidationOptions, DEFAULT_MAX_DEPTH};

/// Where trusted Root CA certificates come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootSourceKind {
    /// Downloaded from URLs on every fetch
    Http,
    /// Read from files once per process
    File,
    /// Base64 certificates embedded in configuration
    Static,
}

impl FromStr for RootSourceKind {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" | "https" | "remote" => Ok(RootSourceKind::Http),
            "file" | "files" => Ok(RootSourceKind::File),
            "static" | "memory" | "raw" => Ok(RootSourceKind::Static),
            _ => Err(TrustError::Configuration(format!(
                "Unknown Root CA source: {}. Valid options: http, file, static",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrustConfig {
    pub source: RootSourceKind,
    pub urls: Vec<String>,
    pub paths: Vec<PathBuf>,
    /// Base64 (standard alphabet) root certificates
    pub certs: Vec<String>,
    pub fetch_timeout: Duration,
    pub cache_enabled: bool,
    pub shortcut_scope: ShortcutScope,
    pub max_depth: usize,
}

impl TrustConfig {
    /// A configuration for `source` with every other setting at its default.
    pub fn new(source: RootSourceKind) -> Self {
        Self {
            source,
            urls: Vec::new(),
            paths: Vec::new(),
            certs: Vec::new(),
            fetch_timeout: Duration::from_secs(30),
            cache_enabled: true,
            shortcut_scope: ShortcutScope::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Create a configuration from environment variables
    pub fn from_env() -> TrustResult<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Create a configuration from any variable lookup
    pub fn from_vars<F>(lookup: F) -> TrustResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = lookup("ROOT_CA_SOURCE")
            .ok_or_else(|| TrustError::Configuration("ROOT_CA_SOURCE is required".to_string()))?
            .parse()?;
        let mut config = Self::new(source);

        config.urls = list(lookup("ROOT_CA_URLS"));
        config.paths = list(lookup("ROOT_CA_PATHS"))
            .into_iter()
            .map(PathBuf::from)
            .collect();
        config.certs = list(lookup("ROOT_CA_CERTS"));

        if let Some(secs) = lookup("ROOT_CA_FETCH_TIMEOUT_SECONDS") {
            config.fetch_timeout = Duration::from_secs(secs.trim().parse().map_err(|_| {
                TrustError::Configuration(format!(
                    "ROOT_CA_FETCH_TIMEOUT_SECONDS must be a whole number of seconds, got {}",
                    secs
                ))
            })?);
        }
        if let Some(enabled) = lookup("TRUST_CACHE_ENABLED") {
            config.cache_enabled = enabled.trim().parse().map_err(|_| {
                TrustError::Configuration(format!(
                    "TRUST_CACHE_ENABLED must be true or false, got {}",
                    enabled
                ))
            })?;
        }
        if let Some(scope) = lookup("TRUST_SHORTCUT_SCOPE") {
            config.shortcut_scope = scope.trim().parse()?;
        }
        if let Some(depth) = lookup("CHAIN_MAX_DEPTH") {
            config.max_depth = depth.trim().parse().map_err(|_| {
                TrustError::Configuration(format!("CHAIN_MAX_DEPTH must be a number, got {}", depth))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> TrustResult<()> {
        let configured = match self.source {
            RootSourceKind::Http => (!self.urls.is_empty(), "ROOT_CA_URLS"),
            RootSourceKind::File => (!self.paths.is_empty(), "ROOT_CA_PATHS"),
            RootSourceKind::Static => (!self.certs.is_empty(), "ROOT_CA_CERTS"),
        };
        if let (false, var) = configured {
            return Err(TrustError::Configuration(format!(
                "{} must list at least one Root CA for source {:?}",
                var, self.source
            )));
        }
        if self.max_depth < 1 {
            return Err(TrustError::Configuration(
                "CHAIN_MAX_DEPTH must be at least 1".to_string(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(TrustError::Configuration(
                "ROOT_CA_FETCH_TIMEOUT_SECONDS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the configured root certificate source
    pub fn build_source(&self) -> TrustResult<Arc<dyn RootCertificateSource>> {
        let source: Arc<dyn RootCertificateSource> = match self.source {
            RootSourceKind::Http => {
                let client = reqwest::Client::builder()
                    .timeout(self.fetch_timeout)
                    .build()
                    .map_err(|e| {
                        TrustError::Configuration(format!("Failed to build HTTP client: {}", e))
                    })?;
                Arc::new(HttpRootSource::with_client(Some(client), &self.urls)?)
            }
            RootSourceKind::File => Arc::new(FileRootSource::new(self.paths.iter().cloned())?),
            RootSourceKind::Static => Arc::new(StaticRootSource::new(self.certs.iter().cloned())?),
        };
        Ok(source)
    }

    /// Build a key provider with the configured source, cache and limits
    pub fn build_provider(&self) -> TrustResult<KeyProvider> {
        self.validate()?;
        let cache = if self.cache_enabled {
            TrustCache::new()
        } else {
            TrustCache::disabled()
        };
        tracing::info!(
            source = ?self.source,
            cache_enabled = self.cache_enabled,
            shortcut_scope = self.shortcut_scope.as_str(),
            max_depth = self.max_depth,
            "Building trust key provider"
        );
        Ok(KeyProvider::new(self.build_source()?)
            .with_cache(Arc::new(cache))
            .with_scope(self.shortcut_scope)
            .with_options(ValidationOptions {
                max_depth: self.max_depth,
                ..ValidationOptions::default()
            }))
    }
}

fn list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_source_kind_from_str() {
        assert_eq!("HTTP".parse::<RootSourceKind>().unwrap(), RootSourceKind::Http);
        assert_eq!("file".parse::<RootSourceKind>().unwrap(), RootSourceKind::File);
        assert_eq!("static".parse::<RootSourceKind>().unwrap(), RootSourceKind::Static);
        assert!("ldap".parse::<RootSourceKind>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = TrustConfig::from_vars(vars(&[
            ("ROOT_CA_SOURCE", "static"),
            ("ROOT_CA_CERTS", "cm9vdA=="),
        ]))
        .unwrap();
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert!(config.cache_enabled);
        assert_eq!(config.shortcut_scope, ShortcutScope::LeafOnly);
        assert_eq!(config.max_depth, 10);
    }

    #[test]
    fn test_lists_are_trimmed() {
        let config = TrustConfig::from_vars(vars(&[
            ("ROOT_CA_SOURCE", "http"),
            ("ROOT_CA_URLS", " https://a.test/root.cer , ,https://b.test/root.cer"),
            ("TRUST_SHORTCUT_SCOPE", "any"),
            ("TRUST_CACHE_ENABLED", "false"),
            ("CHAIN_MAX_DEPTH", "4"),
        ]))
        .unwrap();
        assert_eq!(config.urls, vec!["https://a.test/root.cer", "https://b.test/root.cer"]);
        assert_eq!(config.shortcut_scope, ShortcutScope::AnyEntry);
        assert!(!config.cache_enabled);
        assert_eq!(config.max_depth, 4);
    }

    #[test]
    fn test_missing_source_is_rejected() {
        assert!(matches!(
            TrustConfig::from_vars(vars(&[])),
            Err(TrustError::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_sources_rejected_at_construction() {
        for kind in ["http", "file", "static"] {
            let err = TrustConfig::from_vars(vars(&[("ROOT_CA_SOURCE", kind)])).unwrap_err();
            assert!(matches!(err, TrustError::Configuration(_)), "{}", kind);
        }
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        assert!(TrustConfig::from_vars(vars(&[
            ("ROOT_CA_SOURCE", "static"),
            ("ROOT_CA_CERTS", "cm9vdA=="),
            ("CHAIN_MAX_DEPTH", "deep"),
        ]))
        .is_err());
        assert!(TrustConfig::from_vars(vars(&[
            ("ROOT_CA_SOURCE", "static"),
            ("ROOT_CA_CERTS", "cm9vdA=="),
            ("CHAIN_MAX_DEPTH", "0"),
        ]))
        .is_err());
    }

    #[test]
    fn test_invalid_cache_flag_rejected() {
        let err = TrustConfig::from_vars(vars(&[
            ("ROOT_CA_SOURCE", "static"),
            ("ROOT_CA_CERTS", "cm9vdA=="),
            ("TRUST_CACHE_ENABLED", "nope"),
        ]))
        .unwrap_err();
        assert!(matches!(err, TrustError::Configuration(ref msg) if msg.contains("TRUST_CACHE_ENABLED")));

        let config = TrustConfig::from_vars(vars(&[
            ("ROOT_CA_SOURCE", "static"),
            ("ROOT_CA_CERTS", "cm9vdA=="),
            ("TRUST_CACHE_ENABLED", " false "),
        ]))
        .unwrap();
        assert!(!config.cache_enabled);
    }

    #[test]
    fn test_build_provider() {
        let mut config = TrustConfig::new(RootSourceKind::Static);
        config.certs = vec!["cm9vdA==".to_string()];
        config.cache_enabled = false;

        let provider = config.build_provider().unwrap();
        assert!(!provider.cache().is_enabled());
        assert_eq!(config.build_source().unwrap().name(), "static");
    }

    #[test]
    fn test_build_http_and_file_sources() {
        let mut config = TrustConfig::new(RootSourceKind::Http);
        config.urls = vec!["https://roots.test/root.cer".to_string()];
        assert_eq!(config.build_source().unwrap().name(), "http");

        let mut config = TrustConfig::new(RootSourceKind::File);
        config.paths = vec![PathBuf::from("/etc/roots/root.cer")];
        assert_eq!(config.build_source().unwrap().name(), "file");
    }
}
