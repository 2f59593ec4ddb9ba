//! x5c certificate-chain trust resolution
//!
//! Resolves the `x5c` chain of a signed App Store server notification to
//! the leaf certificate's public key, provided the chain ends at a trusted
//! Root CA:
//! - trusted roots come from a pluggable [`RootCertificateSource`]
//!   (HTTP, files or static certificates)
//! - [`ChainClassifier`] splits the chain into leaf, roots and intermediates
//! - [`ChainValidator`] runs X.509 path validation
//! - [`TrustCache`] remembers the last validated leaf so repeat signers skip
//!   full validation
//!
//! Certificates are compared in base64 text form throughout, the way they
//! appear in an `x5c` header.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use x5c_trust::{CertificateChain, FetchContext, KeyProvider, StaticRootSource};
//!
//! # async fn run(root_der: Vec<u8>, x5c: Vec<String>) -> x5c_trust::TrustResult<()> {
//! let provider = KeyProvider::new(Arc::new(StaticRootSource::from_der([root_der])?));
//! let chain = CertificateChain::new(x5c)?;
//! let key = provider.resolve(&FetchContext::background(), &chain).await?;
//! println!("leaf key algorithm: {}", key.algorithm_oid());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod certificate;
pub mod chain;
pub mod config;
pub mod context;
pub mod error;
pub mod provider;
pub mod roots;
pub mod validator;

pub use cache::{TrustCache, TrustedEntry};
pub use certificate::{CertificateChain, EncodedCertificate, LeafPublicKey, ParsedCertificate};
pub use chain::{ChainClassifier, Classification, ClassifiedChain, ShortcutScope};
pub use config::{RootSourceKind, TrustConfig};
pub use context::{CancelHandle, ContextError, FetchContext};
pub use error::{TrustError, TrustResult};
pub use provider::{KeyProvider, KeySink, ProtectedHeader, SignatureAlgorithm};
pub use roots::{
    FileReader, FileRootSource, HttpRootSource, RootCertificateSource, RootSet, StaticRootSource,
    TokioFileReader,
};
pub use validator::{ChainValidator, ValidationOptions};
