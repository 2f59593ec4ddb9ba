#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CustomExtension, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose,
};
use x5c_trust::{
    CertificateChain, EncodedCertificate, FetchContext, RootCertificateSource, RootSet,
    StaticRootSource, TrustError, TrustResult,
};

/// A generated certificate and its private key.
pub struct Node {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl Node {
    pub fn der(&self) -> Vec<u8> {
        self.cert.der().to_vec()
    }

    pub fn encoded(&self) -> EncodedCertificate {
        EncodedCertificate::from_der(&self.der())
    }
}

fn params(cn: &str, ca: bool) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    params.distinguished_name = dn;
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_after = rcgen::date_time_ymd(2099, 1, 1);
    if ca {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    } else {
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    }
    params
}

pub fn root(cn: &str) -> Node {
    let key = KeyPair::generate().unwrap();
    let cert = params(cn, true).self_signed(&key).unwrap();
    Node { cert, key }
}

pub fn intermediate(cn: &str, issuer: &Node) -> Node {
    let key = KeyPair::generate().unwrap();
    let cert = params(cn, true)
        .signed_by(&key, &issuer.cert, &issuer.key)
        .unwrap();
    Node { cert, key }
}

pub fn leaf(cn: &str, issuer: &Node) -> Node {
    leaf_with(cn, issuer, |_| {})
}

/// A leaf whose parameters are adjusted by `customize` before signing.
pub fn leaf_with(cn: &str, issuer: &Node, customize: impl FnOnce(&mut CertificateParams)) -> Node {
    issue(cn, false, issuer, customize)
}

/// An intermediate whose parameters are adjusted by `customize` before signing.
pub fn intermediate_with(
    cn: &str,
    issuer: &Node,
    customize: impl FnOnce(&mut CertificateParams),
) -> Node {
    issue(cn, true, issuer, customize)
}

fn issue(
    cn: &str,
    ca: bool,
    issuer: &Node,
    customize: impl FnOnce(&mut CertificateParams),
) -> Node {
    let key = KeyPair::generate().unwrap();
    let mut params = params(cn, ca);
    customize(&mut params);
    let cert = params.signed_by(&key, &issuer.cert, &issuer.key).unwrap();
    Node { cert, key }
}

/// Adds a critical extension under a private OID no verifier understands.
pub fn add_unknown_critical_extension(params: &mut CertificateParams) {
    let mut ext = CustomExtension::from_oid_content(&[1, 3, 6, 1, 4, 1, 99999, 1], vec![0x05, 0x00]);
    ext.set_criticality(true);
    params.custom_extensions.push(ext);
}

pub fn set_extended_key_usage(params: &mut CertificateParams, usages: &[ExtendedKeyUsagePurpose]) {
    params.extended_key_usages = usages.to_vec();
}

/// A leaf whose validity period ended in 2021.
pub fn expired_leaf(cn: &str, issuer: &Node) -> Node {
    let key = KeyPair::generate().unwrap();
    let mut params = params(cn, false);
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_after = rcgen::date_time_ymd(2021, 1, 1);
    let cert = params.signed_by(&key, &issuer.cert, &issuer.key).unwrap();
    Node { cert, key }
}

/// DER of `node` with the last signature byte flipped.
pub fn tampered_der(node: &Node) -> Vec<u8> {
    let mut der = node.der();
    if let Some(last) = der.last_mut() {
        *last ^= 0x01;
    }
    der
}

/// Root -> intermediate -> leaf.
pub struct Pki {
    pub root: Node,
    pub intermediate: Node,
    pub leaf: Node,
}

impl Pki {
    pub fn new() -> Self {
        let root = root("Test Root CA");
        let intermediate = intermediate("Test Intermediate CA", &root);
        let leaf = leaf("Test Notification Signer", &intermediate);
        Self {
            root,
            intermediate,
            leaf,
        }
    }

    /// `[leaf, intermediate, root]`
    pub fn chain(&self) -> CertificateChain {
        CertificateChain::from_der([self.leaf.der(), self.intermediate.der(), self.root.der()])
            .unwrap()
    }

    pub fn static_source(&self) -> Arc<StaticRootSource> {
        Arc::new(StaticRootSource::from_der([self.root.der()]).unwrap())
    }
}

/// Static source that can be switched to fail every fetch.
pub struct FlakySource {
    inner: StaticRootSource,
    failing: AtomicBool,
    fetches: AtomicUsize,
}

impl FlakySource {
    pub fn new(inner: StaticRootSource) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RootCertificateSource for FlakySource {
    async fn fetch(&self, ctx: &FetchContext) -> TrustResult<RootSet> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(TrustError::SourceFetchFailed {
                reason: "source offline".to_string(),
                collected: Vec::new(),
            });
        }
        self.inner.fetch(ctx).await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}
