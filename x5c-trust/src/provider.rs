//! Key provider
//!
//! Glues the root source, trust cache, classifier and validator together
//! and hands the validated leaf key to a signature verifier.
//!
//! ```ignore
//! let provider = KeyProvider::new(Arc::new(StaticRootSource::from_der([root_der])?));
//! let header = ProtectedHeader::from_segment(jws_header_segment)?;
//! let mut sink = |alg: SignatureAlgorithm, key: LeafPublicKey| verifier.set_key(alg, key);
//! provider
//!     .fetch_keys(&FetchContext::background(), &header, &mut sink)
//!     .await?;
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::cache::{TrustCache, TrustedEntry};
use crate::certificate::{CertificateChain, LeafPublicKey};
use crate::chain::{ChainClassifier, Classification, ShortcutScope};
use crate::context::FetchContext;
use crate::error::{TrustError, TrustResult};
use crate::roots::RootCertificateSource;
use crate::validator::{ChainValidator, ValidationOptions};

const EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";

/// JWS signing algorithm declared in a protected header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    ES256,
    ES384,
    ES512,
    RS256,
    RS384,
    RS512,
    PS256,
    PS384,
    PS512,
    Other(String),
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &str {
        match self {
            SignatureAlgorithm::ES256 => "ES256",
            SignatureAlgorithm::ES384 => "ES384",
            SignatureAlgorithm::ES512 => "ES512",
            SignatureAlgorithm::RS256 => "RS256",
            SignatureAlgorithm::RS384 => "RS384",
            SignatureAlgorithm::RS512 => "RS512",
            SignatureAlgorithm::PS256 => "PS256",
            SignatureAlgorithm::PS384 => "PS384",
            SignatureAlgorithm::PS512 => "PS512",
            SignatureAlgorithm::Other(name) => name,
        }
    }

    /// Whether `key` is of the family this algorithm signs with.
    /// Unrecognised algorithms accept any key; the verifier decides.
    pub fn accepts(&self, key: &LeafPublicKey) -> bool {
        match self {
            SignatureAlgorithm::ES256 | SignatureAlgorithm::ES384 | SignatureAlgorithm::ES512 => {
                key.algorithm_oid() == EC_PUBLIC_KEY
            }
            SignatureAlgorithm::RS256
            | SignatureAlgorithm::RS384
            | SignatureAlgorithm::RS512
            | SignatureAlgorithm::PS256
            | SignatureAlgorithm::PS384
            | SignatureAlgorithm::PS512 => key.algorithm_oid() == RSA_ENCRYPTION,
            SignatureAlgorithm::Other(_) => true,
        }
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let alg = match s {
            "" => return Err(TrustError::InvalidHeader("missing alg".to_string())),
            "none" => {
                return Err(TrustError::InvalidHeader(
                    "unsigned tokens are not accepted".to_string(),
                ))
            }
            "ES256" => SignatureAlgorithm::ES256,
            "ES384" => SignatureAlgorithm::ES384,
            "ES512" => SignatureAlgorithm::ES512,
            "RS256" => SignatureAlgorithm::RS256,
            "RS384" => SignatureAlgorithm::RS384,
            "RS512" => SignatureAlgorithm::RS512,
            "PS256" => SignatureAlgorithm::PS256,
            "PS384" => SignatureAlgorithm::PS384,
            "PS512" => SignatureAlgorithm::PS512,
            other => SignatureAlgorithm::Other(other.to_string()),
        };
        Ok(alg)
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parts of a JWS protected header this crate reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedHeader {
    pub alg: String,
    #[serde(default)]
    pub x5c: Vec<String>,
}

impl ProtectedHeader {
    /// Decode the first segment of a compact-serialized JWS.
    pub fn from_segment(segment: &str) -> TrustResult<Self> {
        let json = URL_SAFE_NO_PAD
            .decode(segment.trim_end_matches('='))
            .map_err(|e| TrustError::InvalidHeader(format!("base64url decode error: {}", e)))?;
        serde_json::from_slice(&json)
            .map_err(|e| TrustError::InvalidHeader(format!("JSON decode error: {}", e)))
    }

    pub fn algorithm(&self) -> TrustResult<SignatureAlgorithm> {
        self.alg.parse()
    }

    /// The `x5c` chain; `EmptyChain` when the header carries none.
    pub fn chain(&self) -> TrustResult<CertificateChain> {
        CertificateChain::new(self.x5c.iter().map(String::as_str))
    }
}

/// Receiver of the resolved key, typically a JWS signature verifier.
pub trait KeySink: Send {
    fn accept(&mut self, algorithm: SignatureAlgorithm, key: LeafPublicKey);
}

impl<F> KeySink for F
where
    F: FnMut(SignatureAlgorithm, LeafPublicKey) + Send,
{
    fn accept(&mut self, algorithm: SignatureAlgorithm, key: LeafPublicKey) {
        self(algorithm, key)
    }
}

/// Resolves an `x5c` chain to a trusted leaf public key.
///
/// Safe to share between tasks; concurrent resolutions serialize only on
/// the trust cache slot.
pub struct KeyProvider {
    source: Arc<dyn RootCertificateSource>,
    cache: Arc<TrustCache>,
    scope: ShortcutScope,
    validator: ChainValidator,
}

impl KeyProvider {
    pub fn new(source: Arc<dyn RootCertificateSource>) -> Self {
        Self {
            source,
            cache: Arc::new(TrustCache::new()),
            scope: ShortcutScope::default(),
            validator: ChainValidator::default(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<TrustCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_scope(mut self, scope: ShortcutScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.validator = ChainValidator::new(options);
        self
    }

    pub fn cache(&self) -> &Arc<TrustCache> {
        &self.cache
    }

    pub fn scope(&self) -> ShortcutScope {
        self.scope
    }

    /// Resolve `chain` to its leaf public key.
    ///
    /// The trust cache is written only after full validation succeeds; every
    /// failure leaves it untouched.
    pub async fn resolve(
        &self,
        ctx: &FetchContext,
        chain: &CertificateChain,
    ) -> TrustResult<LeafPublicKey> {
        let classifier = ChainClassifier::new(self.source.as_ref(), &self.cache, self.scope);
        let classified = match classifier.classify(ctx, chain).await {
            Ok(Classification::Cached(key)) => return Ok(key),
            Ok(Classification::Classified(classified)) => classified,
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Certificate chain rejected");
                return Err(e);
            }
        };

        let path = self.validator.validate(&classified).map_err(|e| {
            tracing::warn!(
                kind = e.kind(),
                subject = %classified.leaf().subject(),
                error = %e,
                "Certificate chain rejected"
            );
            e
        })?;

        let key = classified.leaf().public_key();
        self.cache.store(TrustedEntry {
            name: classified.label().clone(),
            pubkey: key.clone(),
        });
        tracing::info!(
            subject = %classified.leaf().subject(),
            path_len = path.len(),
            "Certificate chain validated"
        );
        Ok(key)
    }

    /// Resolve the chain carried by `header` and deliver the key to `sink`.
    ///
    /// Nothing is delivered on failure.
    pub async fn fetch_keys(
        &self,
        ctx: &FetchContext,
        header: &ProtectedHeader,
        sink: &mut dyn KeySink,
    ) -> TrustResult<()> {
        let algorithm = header.algorithm()?;
        let chain = header.chain()?;
        let key = self.resolve(ctx, &chain).await?;
        if !algorithm.accepts(&key) {
            return Err(TrustError::InvalidHeader(format!(
                "alg {} does not match the leaf key type {}",
                algorithm,
                key.algorithm_oid()
            )));
        }
        sink.accept(algorithm, key);
        Ok(())
    }
}

impl fmt::Debug for KeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyProvider")
            .field("source", &self.source.name())
            .field("cache_enabled", &self.cache.is_enabled())
            .field("scope", &self.scope)
            .field("validator", &self.validator)
            .finish()
    }
}
