use async_trait::async_trait;

use super::{RootCertificateSource, RootSet};
use crate::certificate::EncodedCertificate;
use crate::context::FetchContext;
use crate::error::{TrustError, TrustResult};

/// Root source backed by certificates held in memory.
///
/// Certificates are taken as already base64-encoded and returned unchanged.
#[derive(Debug, Clone)]
pub struct StaticRootSource {
    roots: RootSet,
}

impl StaticRootSource {
    /// # Errors
    ///
    /// Returns [`TrustError::Configuration`] when no certificate is given.
    pub fn new<I, C>(roots: I) -> TrustResult<Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<EncodedCertificate>,
    {
        let roots: Vec<EncodedCertificate> = roots.into_iter().map(Into::into).collect();
        if roots.is_empty() {
            return Err(TrustError::Configuration(
                "At least one root certificate must be set".to_string(),
            ));
        }
        Ok(Self { roots: roots.into() })
    }

    /// Build from DER certificates, encoding each one.
    pub fn from_der<I, B>(roots: I) -> TrustResult<Self>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Self::new(roots.into_iter().map(|der| EncodedCertificate::from_der(der.as_ref())))
    }
}

#[async_trait]
impl RootCertificateSource for StaticRootSource {
    async fn fetch(&self, _ctx: &FetchContext) -> TrustResult<RootSet> {
        Ok(self.roots.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
