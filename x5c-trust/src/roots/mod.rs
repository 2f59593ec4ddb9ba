//! Trusted root certificate sources
//!
//! A source hands out the configured Root CA certificates in base64 text
//! form. Three variants are provided:
//! - [`HttpRootSource`]: downloads every configured URL on every fetch
//! - [`FileRootSource`]: reads files once, then serves the cached set
//! - [`StaticRootSource`]: returns certificates supplied at construction
//!
//! Every constructor requires at least one url, path or certificate.

pub mod file;
pub mod http;
pub mod raw;

use std::sync::Arc;

use async_trait::async_trait;

use crate::certificate::EncodedCertificate;
use crate::context::FetchContext;
use crate::error::TrustResult;

pub use file::{FileReader, FileRootSource, TokioFileReader};
pub use http::HttpRootSource;
pub use raw::StaticRootSource;

/// Ordered set of trusted roots, shared between callers without copying.
pub type RootSet = Arc<[EncodedCertificate]>;

/// Provider of trusted Root CA certificates.
#[async_trait]
pub trait RootCertificateSource: Send + Sync {
    /// Return the trusted roots in base64 text form.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TrustError::SourceFetchFailed`] when a url or file
    /// cannot be read and [`crate::TrustError::CancellationFailed`] when
    /// `ctx` finishes first. Both carry the roots collected so far.
    async fn fetch(&self, ctx: &FetchContext) -> TrustResult<RootSet>;

    /// Short label used in logs.
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<S: RootCertificateSource + ?Sized> RootCertificateSource for Arc<S> {
    async fn fetch(&self, ctx: &FetchContext) -> TrustResult<RootSet> {
        (**self).fetch(ctx).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
