use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::{RootCertificateSource, RootSet};
use crate::certificate::EncodedCertificate;
use crate::context::FetchContext;
use crate::error::{TrustError, TrustResult};

/// Filesystem seam used by [`FileRootSource`].
#[async_trait]
pub trait FileReader: Send + Sync {
    async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

/// Reads files with `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFileReader;

#[async_trait]
impl FileReader for TokioFileReader {
    async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }
}

/// Root source backed by certificate files (DER or PEM).
///
/// The first successful fetch populates a cache that every later fetch
/// returns without touching the filesystem. A failed fetch leaves the
/// cache empty so the next call reads every file again from scratch.
pub struct FileRootSource {
    paths: Vec<PathBuf>,
    reader: Arc<dyn FileReader>,
    cache: OnceCell<RootSet>,
}

impl FileRootSource {
    /// # Errors
    ///
    /// Returns [`TrustError::Configuration`] when no path is given.
    pub fn new<I, P>(paths: I) -> TrustResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::with_reader(Arc::new(TokioFileReader), paths)
    }

    pub fn with_reader<I, P>(reader: Arc<dyn FileReader>, paths: I) -> TrustResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        if paths.is_empty() {
            return Err(TrustError::Configuration(
                "At least one Root CA file path must be set".to_string(),
            ));
        }
        Ok(Self {
            paths,
            reader,
            cache: OnceCell::new(),
        })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    async fn load(&self, ctx: &FetchContext) -> TrustResult<RootSet> {
        let mut collected = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let bytes = match ctx.run(self.reader.read(path)).await {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read Root CA file");
                    return Err(TrustError::SourceFetchFailed {
                        reason: format!("path: {}: {}", path.display(), e),
                        collected,
                    });
                }
                Err(reason) => return Err(TrustError::CancellationFailed { reason, collected }),
            };
            let root = EncodedCertificate::from_der_or_pem(&bytes).map_err(|e| {
                TrustError::SourceFetchFailed {
                    reason: format!("path: {}: invalid PEM: {}", path.display(), e),
                    collected: collected.clone(),
                }
            })?;
            collected.push(root);
        }
        tracing::info!(count = collected.len(), "Loaded Root CA certificates from files");
        Ok(collected.into())
    }
}

impl std::fmt::Debug for FileRootSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRootSource")
            .field("paths", &self.paths)
            .field("cached", &self.cache.initialized())
            .finish()
    }
}

#[async_trait]
impl RootCertificateSource for FileRootSource {
    async fn fetch(&self, ctx: &FetchContext) -> TrustResult<RootSet> {
        // Concurrent first calls wait on a single load instead of racing.
        self.cache
            .get_or_try_init(|| self.load(ctx))
            .await
            .map(Arc::clone)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
