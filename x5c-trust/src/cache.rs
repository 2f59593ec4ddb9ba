use parking_lot::RwLock;

use crate::certificate::{EncodedCertificate, LeafPublicKey};

/// The last leaf certificate that passed full chain validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedEntry {
    pub name: EncodedCertificate,
    pub pubkey: LeafPublicKey,
}

/// Single-slot memo of the most recently validated leaf.
///
/// Lookups compare encoded certificate bytes exactly. A store replaces the
/// slot wholesale; there is no removal and no expiry. Resolution must stay
/// correct with the cache disabled, which [`TrustCache::disabled`] provides.
#[derive(Debug)]
pub struct TrustCache {
    slot: RwLock<Option<TrustedEntry>>,
    enabled: bool,
}

impl Default for TrustCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustCache {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
            enabled: true,
        }
    }

    /// A cache that never stores and always misses.
    pub fn disabled() -> Self {
        Self {
            slot: RwLock::new(None),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Cached public key if `candidate` is byte-for-byte the cached leaf.
    pub fn lookup(&self, candidate: &EncodedCertificate) -> Option<LeafPublicKey> {
        if !self.enabled {
            return None;
        }
        self.slot
            .read()
            .as_ref()
            .filter(|entry| entry.name == *candidate)
            .map(|entry| entry.pubkey.clone())
    }

    pub fn store(&self, entry: TrustedEntry) {
        if !self.enabled {
            return;
        }
        *self.slot.write() = Some(entry);
    }

    /// Snapshot of the current slot.
    pub fn current(&self) -> Option<TrustedEntry> {
        self.slot.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> TrustedEntry {
        TrustedEntry {
            name: EncodedCertificate::from(name),
            pubkey: LeafPublicKey::new("1.2.840.10045.2.1", name.as_bytes(), name.as_bytes()),
        }
    }

    #[test]
    fn test_empty_cache_misses() {
        let cache = TrustCache::new();
        assert!(cache.lookup(&EncodedCertificate::from("leaf")).is_none());
        assert!(cache.current().is_none());
    }

    #[test]
    fn test_lookup_requires_exact_bytes() {
        let cache = TrustCache::new();
        cache.store(entry("leaf"));
        assert!(cache.lookup(&EncodedCertificate::from("leaf")).is_some());
        assert!(cache.lookup(&EncodedCertificate::from("leaf ")).is_none());
        assert!(cache.lookup(&EncodedCertificate::from("lea")).is_none());
    }

    #[test]
    fn test_store_overwrites_single_slot() {
        let cache = TrustCache::new();
        cache.store(entry("first"));
        cache.store(entry("second"));
        assert!(cache.lookup(&EncodedCertificate::from("first")).is_none());
        assert_eq!(cache.current(), Some(entry("second")));
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let cache = TrustCache::disabled();
        cache.store(entry("leaf"));
        assert!(cache.lookup(&EncodedCertificate::from("leaf")).is_none());
        assert!(cache.current().is_none());
    }
}
