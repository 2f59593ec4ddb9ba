//! X.509 path validation
//!
//! Builds a path from the leaf through the intermediates pool to a
//! certificate in the roots pool and checks:
//! - each certificate's signature against its issuer's public key
//! - validity periods of every certificate on the path
//! - basicConstraints, keyUsage and pathLenConstraint on issuers
//! - digitalSignature / extended key usage on the leaf
//! - no unhandled critical extensions anywhere on the path
//! - maximum path length
//!
//! Issuers are matched by raw subject/issuer name; when several candidates
//! match, each is tried in turn before the path is rejected.

use chrono::{DateTime, Utc};
use p256::ecdsa::signature::hazmat::PrehashVerifier as _;
use rsa::pkcs1v15;
use rsa::pkcs8::DecodePublicKey as _;
use rsa::signature::Verifier as _;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::certificate::{ParsedCertificate, ANY_EXTENDED_KEY_USAGE, SERVER_AUTH};
use crate::chain::ClassifiedChain;
use crate::error::{TrustError, TrustResult};

// Certificate signature algorithm OIDs
const ECDSA_WITH_SHA256: &str = "1.2.840.10045.4.3.2";
const ECDSA_WITH_SHA384: &str = "1.2.840.10045.4.3.3";
const ECDSA_WITH_SHA512: &str = "1.2.840.10045.4.3.4";
const SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
const SHA384_WITH_RSA: &str = "1.2.840.113549.1.1.12";
const SHA512_WITH_RSA: &str = "1.2.840.113549.1.1.13";

pub const DEFAULT_MAX_DEPTH: usize = 10;

#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Time at which validity periods are evaluated; `None` means now.
    pub current_time: Option<DateTime<Utc>>,
    /// Maximum number of certificates on a path, leaf and root included.
    pub max_depth: usize,
    /// Extended key usage OID the leaf must carry when it has an EKU extension.
    /// Defaults to serverAuth; `None` accepts any EKU.
    pub required_eku: Option<String>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            current_time: None,
            max_depth: DEFAULT_MAX_DEPTH,
            required_eku: Some(SERVER_AUTH.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChainValidator {
    options: ValidationOptions,
}

impl ChainValidator {
    pub fn new(options: ValidationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Validate a classified chain's leaf against its roots and intermediates.
    ///
    /// Returns the subjects on the verified path, leaf first.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::ChainValidationFailed`] with the first reason
    /// that rejected the last candidate path.
    pub fn validate(&self, chain: &ClassifiedChain) -> TrustResult<Vec<String>> {
        self.verify(chain.leaf(), chain.intermediates(), chain.roots())
    }

    pub fn verify(
        &self,
        leaf: &ParsedCertificate,
        intermediates: &[ParsedCertificate],
        roots: &[ParsedCertificate],
    ) -> TrustResult<Vec<String>> {
        let now = self
            .options
            .current_time
            .unwrap_or_else(Utc::now)
            .timestamp();

        check_validity(leaf, now)
            .and_then(|()| check_critical(leaf))
            .and_then(|()| self.check_leaf_usage(leaf))
            .map_err(TrustError::ChainValidationFailed)?;

        if roots.iter().any(|root| root.der == leaf.der) {
            return Ok(vec![leaf.subject.clone()]);
        }

        let mut path = vec![leaf];
        self.extend(&mut path, intermediates, roots, now)
            .map_err(TrustError::ChainValidationFailed)?;
        Ok(path.iter().map(|cert| cert.subject.clone()).collect())
    }

    fn check_leaf_usage(&self, leaf: &ParsedCertificate) -> Result<(), String> {
        if let Some(usage) = leaf.key_usage {
            if !usage.digital_signature {
                return Err(format!(
                    "certificate {} key usage does not permit digital signatures",
                    leaf.subject
                ));
            }
        }
        if let (Some(required), Some(ekus)) = (&self.options.required_eku, &leaf.extended_key_usage) {
            let permitted = ekus
                .iter()
                .any(|oid| oid == required || oid == ANY_EXTENDED_KEY_USAGE);
            if !permitted {
                return Err(format!(
                    "certificate {} specifies an incompatible key usage (requires {})",
                    leaf.subject, required
                ));
            }
        }
        Ok(())
    }

    /// Extend `path` until it ends at a root; backtracks over candidate issuers.
    fn extend<'a>(
        &self,
        path: &mut Vec<&'a ParsedCertificate>,
        intermediates: &'a [ParsedCertificate],
        roots: &'a [ParsedCertificate],
        now: i64,
    ) -> Result<(), String> {
        let Some(current) = path.last().copied() else {
            return Err("empty certificate path".to_string());
        };
        if path.len() >= self.options.max_depth {
            return Err(format!(
                "certificate path exceeds maximum depth of {}",
                self.options.max_depth
            ));
        }
        // Non-self-issued intermediates already below the issuer being looked up.
        let below = path
            .iter()
            .skip(1)
            .filter(|cert| !cert.is_self_issued())
            .count();
        let mut last_err: Option<String> = None;

        for root in roots.iter().filter(|root| root.subject_raw == current.issuer_raw) {
            match check_issuer(current, root, below, now) {
                Ok(()) => {
                    path.push(root);
                    return Ok(());
                }
                Err(e) => last_err = Some(e),
            }
        }

        for candidate in intermediates
            .iter()
            .filter(|cert| cert.subject_raw == current.issuer_raw)
        {
            if path.iter().any(|cert| cert.der == candidate.der) {
                continue;
            }
            if !candidate.is_ca {
                last_err = Some(format!(
                    "certificate {} is not a certificate authority",
                    candidate.subject
                ));
                continue;
            }
            if let Err(e) = check_issuer(current, candidate, below, now) {
                last_err = Some(e);
                continue;
            }
            path.push(candidate);
            match self.extend(path, intermediates, roots, now) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    path.pop();
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            format!(
                "certificate {} signed by unknown authority",
                current.subject
            )
        }))
    }
}

fn check_validity(cert: &ParsedCertificate, now: i64) -> Result<(), String> {
    if now < cert.not_before {
        return Err(format!("certificate {} is not yet valid", cert.subject));
    }
    if now > cert.not_after {
        return Err(format!("certificate {} has expired", cert.subject));
    }
    Ok(())
}

fn check_critical(cert: &ParsedCertificate) -> Result<(), String> {
    match cert.unhandled_critical.first() {
        Some(oid) => Err(format!(
            "certificate {} has unhandled critical extension {}",
            cert.subject, oid
        )),
        None => Ok(()),
    }
}

fn check_issuer(
    child: &ParsedCertificate,
    issuer: &ParsedCertificate,
    below: usize,
    now: i64,
) -> Result<(), String> {
    verify_signature(&issuer.spki_der, &child.tbs_der, &child.signature_oid, &child.signature)
        .map_err(|e| format!("{} is not signed by {}: {}", child.subject, issuer.subject, e))?;
    check_validity(issuer, now)?;
    check_critical(issuer)?;
    if let Some(usage) = issuer.key_usage {
        if !usage.key_cert_sign {
            return Err(format!(
                "certificate {} key usage does not permit certificate signing",
                issuer.subject
            ));
        }
    }
    if let Some(max) = issuer.path_len_constraint {
        if u32::try_from(below).map_or(true, |below| below > max) {
            return Err(format!(
                "certificate {} path length constraint exceeded",
                issuer.subject
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum HashAlg {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlg {
    fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlg::Sha256 => Sha256::digest(data).to_vec(),
            HashAlg::Sha384 => Sha384::digest(data).to_vec(),
            HashAlg::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Verify `signature` over `tbs_der` with the issuer's SubjectPublicKeyInfo.
pub(crate) fn verify_signature(
    issuer_spki_der: &[u8],
    tbs_der: &[u8],
    signature_oid: &str,
    signature: &[u8],
) -> Result<(), String> {
    match signature_oid {
        ECDSA_WITH_SHA256 => verify_ecdsa(issuer_spki_der, &HashAlg::Sha256.digest(tbs_der), signature),
        ECDSA_WITH_SHA384 => verify_ecdsa(issuer_spki_der, &HashAlg::Sha384.digest(tbs_der), signature),
        ECDSA_WITH_SHA512 => verify_ecdsa(issuer_spki_der, &HashAlg::Sha512.digest(tbs_der), signature),
        SHA256_WITH_RSA => verify_rsa(issuer_spki_der, tbs_der, signature, HashAlg::Sha256),
        SHA384_WITH_RSA => verify_rsa(issuer_spki_der, tbs_der, signature, HashAlg::Sha384),
        SHA512_WITH_RSA => verify_rsa(issuer_spki_der, tbs_der, signature, HashAlg::Sha512),
        other => Err(format!("unsupported certificate signature algorithm OID: {}", other)),
    }
}

fn verify_ecdsa(issuer_spki_der: &[u8], prehash: &[u8], signature: &[u8]) -> Result<(), String> {
    // The hash comes from the signature algorithm, the curve from the issuer key.
    if let Ok(key) = p256::PublicKey::from_public_key_der(issuer_spki_der) {
        let sig = p256::ecdsa::Signature::from_der(signature)
            .map_err(|e| format!("bad ECDSA signature bytes: {}", e))?;
        return p256::ecdsa::VerifyingKey::from(key)
            .verify_prehash(prehash, &sig)
            .map_err(|_| "certificate signature verification failed".to_string());
    }
    if let Ok(key) = p384::PublicKey::from_public_key_der(issuer_spki_der) {
        let sig = p384::ecdsa::Signature::from_der(signature)
            .map_err(|e| format!("bad ECDSA signature bytes: {}", e))?;
        return p384::ecdsa::VerifyingKey::from(key)
            .verify_prehash(prehash, &sig)
            .map_err(|_| "certificate signature verification failed".to_string());
    }
    Err("issuer public key is not a supported EC key (P-256, P-384)".to_string())
}

fn verify_rsa(
    issuer_spki_der: &[u8],
    tbs_der: &[u8],
    signature: &[u8],
    hash: HashAlg,
) -> Result<(), String> {
    let key = RsaPublicKey::from_public_key_der(issuer_spki_der)
        .map_err(|e| format!("bad RSA public key: {}", e))?;
    let sig = pkcs1v15::Signature::try_from(signature)
        .map_err(|e| format!("bad RSA signature bytes: {}", e))?;
    let verified = match hash {
        HashAlg::Sha256 => pkcs1v15::VerifyingKey::<Sha256>::new(key).verify(tbs_der, &sig),
        HashAlg::Sha384 => pkcs1v15::VerifyingKey::<Sha384>::new(key).verify(tbs_der, &sig),
        HashAlg::Sha512 => pkcs1v15::VerifyingKey::<Sha512>::new(key).verify(tbs_der, &sig),
    };
    verified.map_err(|_| "certificate signature verification failed".to_string())
}
