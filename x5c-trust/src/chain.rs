//! Chain classification
//!
//! Index 0 of a [`CertificateChain`] is the leaf by contract. Every other
//! entry is compared byte-for-byte (base64 text form) with the trusted roots
//! and lands in exactly one of the roots or intermediates pools.

use std::str::FromStr;

use crate::cache::TrustCache;
use crate::certificate::{CertificateChain, EncodedCertificate, LeafPublicKey, ParsedCertificate};
use crate::context::FetchContext;
use crate::error::{TrustError, TrustResult};
use crate::roots::RootCertificateSource;

/// Which chain entries may short-circuit resolution through the trust cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortcutScope {
    /// Only the leaf (index 0) is compared with the cached entry.
    #[default]
    LeafOnly,
    /// Every entry is compared, so a cached leaf appearing anywhere in a
    /// chain returns its key without further validation.
    AnyEntry,
}

impl ShortcutScope {
    fn covers(self, index: usize) -> bool {
        match self {
            ShortcutScope::LeafOnly => index == 0,
            ShortcutScope::AnyEntry => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShortcutScope::LeafOnly => "leaf",
            ShortcutScope::AnyEntry => "any",
        }
    }
}

impl FromStr for ShortcutScope {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "leaf" | "leaf_only" => Ok(ShortcutScope::LeafOnly),
            "any" | "any_entry" => Ok(ShortcutScope::AnyEntry),
            _ => Err(TrustError::Configuration(format!(
                "Invalid trust shortcut scope: {}",
                s
            ))),
        }
    }
}

/// A chain split into leaf, trusted roots and intermediates.
#[derive(Debug, Clone)]
pub struct ClassifiedChain {
    label: EncodedCertificate,
    leaf: ParsedCertificate,
    roots: Vec<ParsedCertificate>,
    intermediates: Vec<ParsedCertificate>,
}

impl ClassifiedChain {
    /// Encoded form of the leaf, as it appeared in the chain.
    pub fn label(&self) -> &EncodedCertificate {
        &self.label
    }

    pub fn leaf(&self) -> &ParsedCertificate {
        &self.leaf
    }

    pub fn roots(&self) -> &[ParsedCertificate] {
        &self.roots
    }

    pub fn intermediates(&self) -> &[ParsedCertificate] {
        &self.intermediates
    }
}

#[derive(Debug, Clone)]
pub enum Classification {
    /// An entry matched the trust cache; no further work is needed.
    Cached(LeafPublicKey),
    /// The chain still has to go through path validation.
    Classified(ClassifiedChain),
}

pub struct ChainClassifier<'a> {
    source: &'a dyn RootCertificateSource,
    cache: &'a TrustCache,
    scope: ShortcutScope,
}

impl<'a> ChainClassifier<'a> {
    pub fn new(
        source: &'a dyn RootCertificateSource,
        cache: &'a TrustCache,
        scope: ShortcutScope,
    ) -> Self {
        Self { source, cache, scope }
    }

    /// Classify `chain`, consulting the trust cache first.
    ///
    /// Entries are processed strictly in order. The root source is fetched
    /// once per ancestor entry; its errors abort classification unchanged.
    ///
    /// # Errors
    ///
    /// - [`TrustError::MalformedCertificate`] for an entry that does not decode
    /// - [`TrustError::UntrustedIssuer`] when no ancestor is a trusted root
    /// - any error returned by the root source
    pub async fn classify(
        &self,
        ctx: &FetchContext,
        chain: &CertificateChain,
    ) -> TrustResult<Classification> {
        let label = chain.leaf();
        if let Some(key) = self.shortcut(0, label) {
            return Ok(Classification::Cached(key));
        }
        let leaf = ParsedCertificate::from_encoded(label, 0)?;

        let mut roots = Vec::new();
        let mut intermediates = Vec::new();
        for (index, entry) in chain.entries().enumerate().skip(1) {
            if let Some(key) = self.shortcut(index, entry) {
                return Ok(Classification::Cached(key));
            }
            let cert = ParsedCertificate::from_encoded(entry, index)?;

            let trusted = self.source.fetch(ctx).await?;
            if trusted.iter().any(|root| root == entry) {
                tracing::debug!(
                    index,
                    subject = %cert.subject(),
                    source = self.source.name(),
                    "Chain entry matches a trusted root"
                );
                roots.push(cert);
            } else {
                tracing::debug!(index, subject = %cert.subject(), "Chain entry recorded as intermediate");
                intermediates.push(cert);
            }
        }

        if roots.is_empty() {
            return Err(TrustError::UntrustedIssuer);
        }

        Ok(Classification::Classified(ClassifiedChain {
            label: label.clone(),
            leaf,
            roots,
            intermediates,
        }))
    }

    fn shortcut(&self, index: usize, entry: &EncodedCertificate) -> Option<LeafPublicKey> {
        if !self.scope.covers(index) {
            return None;
        }
        let key = self.cache.lookup(entry)?;
        tracing::debug!(index, "Trust cache hit");
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TrustedEntry;
    use crate::roots::StaticRootSource;

    fn cached(cache: &TrustCache, name: &str) -> LeafPublicKey {
        let key = LeafPublicKey::new("1.2.840.10045.2.1", b"spki", name.as_bytes());
        cache.store(TrustedEntry {
            name: EncodedCertificate::from(name),
            pubkey: key.clone(),
        });
        key
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!("leaf".parse::<ShortcutScope>().unwrap(), ShortcutScope::LeafOnly);
        assert_eq!("ANY".parse::<ShortcutScope>().unwrap(), ShortcutScope::AnyEntry);
        assert!("sometimes".parse::<ShortcutScope>().is_err());
        assert_eq!(ShortcutScope::default(), ShortcutScope::LeafOnly);
    }

    #[tokio::test]
    async fn test_cached_leaf_skips_decoding() {
        // Entries are not valid base64; only the cache can make this succeed.
        let source = StaticRootSource::new(["root"]).unwrap();
        let cache = TrustCache::new();
        let key = cached(&cache, "leaf!");
        let chain = CertificateChain::new(["leaf!", "root!"]).unwrap();

        let classifier = ChainClassifier::new(&source, &cache, ShortcutScope::LeafOnly);
        let outcome = classifier.classify(&FetchContext::background(), &chain).await.unwrap();
        assert!(matches!(outcome, Classification::Cached(found) if found == key));
    }

    #[tokio::test]
    async fn test_malformed_leaf_is_reported() {
        let source = StaticRootSource::new(["root"]).unwrap();
        let cache = TrustCache::new();
        let chain = CertificateChain::new(["%%%"]).unwrap();

        let classifier = ChainClassifier::new(&source, &cache, ShortcutScope::default());
        let err = classifier
            .classify(&FetchContext::background(), &chain)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "MALFORMED_CERTIFICATE");
    }
}
