//! Certificate data model
//!
//! Every identity comparison in this crate works on the base64 text form of
//! a certificate, which is how certificates travel in an `x5c` header and
//! how root sources hand them out. [`ParsedCertificate`] is the owned,
//! decoded view used for path validation.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use x509_parser::prelude::*;

use crate::error::{TrustError, TrustResult};

/// A certificate in base64 text form (standard alphabet, padded).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EncodedCertificate(Vec<u8>);

impl EncodedCertificate {
    /// Wrap bytes the caller already holds in base64 form. No validation.
    pub fn from_base64(encoded: impl Into<Vec<u8>>) -> Self {
        Self(encoded.into())
    }

    /// Encode DER bytes.
    pub fn from_der(der: &[u8]) -> Self {
        Self(STANDARD.encode(der).into_bytes())
    }

    /// Accept root material as DER or PEM and encode its DER content.
    pub fn from_der_or_pem(bytes: &[u8]) -> Result<Self, ::pem::PemError> {
        let armored = bytes
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .and_then(|start| bytes.get(start..))
            .is_some_and(|rest| rest.starts_with(b"-----BEGIN"));
        if armored {
            let parsed = ::pem::parse(bytes)?;
            return Ok(Self::from_der(parsed.contents()));
        }
        Ok(Self::from_der(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.0)
    }
}

impl fmt::Debug for EncodedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Certificates are long; a prefix is enough to tell them apart in logs.
        let shown = self.0.get(..16).unwrap_or(&self.0);
        write!(
            f,
            "EncodedCertificate({}.., {} bytes)",
            String::from_utf8_lossy(shown),
            self.0.len()
        )
    }
}

impl From<String> for EncodedCertificate {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<&str> for EncodedCertificate {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

/// An ordered `x5c` chain.
///
/// Index 0 is always the leaf (end-entity) certificate; the remaining
/// entries are its ancestors in ascending order toward the root. A chain
/// can only be constructed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    leaf: EncodedCertificate,
    ancestors: Vec<EncodedCertificate>,
}

impl CertificateChain {
    pub fn new<I, C>(entries: I) -> TrustResult<Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<EncodedCertificate>,
    {
        let mut entries = entries.into_iter().map(Into::into);
        let leaf = entries.next().ok_or(TrustError::EmptyChain)?;
        Ok(Self {
            leaf,
            ancestors: entries.collect(),
        })
    }

    /// Build a chain from DER certificates, leaf first.
    pub fn from_der<I, B>(certs: I) -> TrustResult<Self>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Self::new(certs.into_iter().map(|der| EncodedCertificate::from_der(der.as_ref())))
    }

    pub fn leaf(&self) -> &EncodedCertificate {
        &self.leaf
    }

    pub fn ancestors(&self) -> &[EncodedCertificate] {
        &self.ancestors
    }

    /// All entries in chain order, leaf first.
    pub fn entries(&self) -> impl Iterator<Item = &EncodedCertificate> {
        std::iter::once(&self.leaf).chain(self.ancestors.iter())
    }

    pub fn len(&self) -> usize {
        self.ancestors.len().saturating_add(1)
    }

    /// Always `false`; kept alongside [`CertificateChain::len`].
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Owned view of an X.509 certificate with the fields path validation needs.
#[derive(Debug, Clone)]
pub struct ParsedCertificate {
    pub(crate) der: Vec<u8>,
    pub(crate) subject: String,
    pub(crate) subject_raw: Vec<u8>,
    pub(crate) issuer_raw: Vec<u8>,
    pub(crate) spki_der: Vec<u8>,
    pub(crate) public_key_bits: Vec<u8>,
    pub(crate) public_key_oid: String,
    pub(crate) tbs_der: Vec<u8>,
    pub(crate) signature_oid: String,
    pub(crate) signature: Vec<u8>,
    pub(crate) not_before: i64,
    pub(crate) not_after: i64,
    pub(crate) is_ca: bool,
    pub(crate) path_len_constraint: Option<u32>,
    /// `None` when the certificate has no keyUsage extension.
    pub(crate) key_usage: Option<KeyUsageFlags>,
    /// `None` when the certificate has no extendedKeyUsage extension.
    pub(crate) extended_key_usage: Option<Vec<String>>,
    /// OIDs of critical extensions this crate does not understand.
    pub(crate) unhandled_critical: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyUsageFlags {
    pub(crate) digital_signature: bool,
    pub(crate) key_cert_sign: bool,
}

pub(crate) const ANY_EXTENDED_KEY_USAGE: &str = "2.5.29.37.0";
/// id-kp-serverAuth
pub const SERVER_AUTH: &str = "1.3.6.1.5.5.7.3.1";

impl ParsedCertificate {
    pub fn from_der(der: &[u8]) -> Result<Self, String> {
        let (_, cert) =
            X509Certificate::from_der(der).map_err(|e| format!("invalid certificate DER: {}", e))?;

        let basic_constraints = cert
            .basic_constraints()
            .map_err(|e| format!("invalid basicConstraints: {}", e))?;
        let key_usage = cert
            .key_usage()
            .map_err(|e| format!("invalid keyUsage: {}", e))?
            .map(|ext| KeyUsageFlags {
                digital_signature: ext.value.digital_signature(),
                key_cert_sign: ext.value.key_cert_sign(),
            });
        let extended_key_usage = cert
            .extended_key_usage()
            .map_err(|e| format!("invalid extendedKeyUsage: {}", e))?
            .map(|ext| extended_key_usage_oids(ext.value));

        let unhandled_critical = cert
            .extensions()
            .iter()
            .filter(|ext| ext.critical)
            .filter(|ext| {
                matches!(
                    ext.parsed_extension(),
                    ParsedExtension::UnsupportedExtension { .. } | ParsedExtension::ParseError { .. }
                )
            })
            .map(|ext| ext.oid.to_id_string())
            .collect();

        let spki = cert.public_key();

        Ok(Self {
            der: der.to_vec(),
            subject: cert.subject().to_string(),
            subject_raw: cert.subject().as_raw().to_vec(),
            issuer_raw: cert.issuer().as_raw().to_vec(),
            spki_der: spki.raw.to_vec(),
            public_key_bits: spki.subject_public_key.data.to_vec(),
            public_key_oid: spki.algorithm.algorithm.to_id_string(),
            tbs_der: cert.tbs_certificate.as_ref().to_vec(),
            signature_oid: cert.signature_algorithm.algorithm.to_id_string(),
            signature: cert.signature_value.data.to_vec(),
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
            is_ca: basic_constraints.as_ref().map(|bc| bc.value.ca).unwrap_or(false),
            path_len_constraint: basic_constraints.and_then(|bc| bc.value.path_len_constraint),
            key_usage,
            extended_key_usage,
            unhandled_critical,
        })
    }

    /// Decode a base64 chain entry and parse it.
    pub fn from_encoded(encoded: &EncodedCertificate, index: usize) -> TrustResult<Self> {
        let der = encoded
            .decode()
            .map_err(|e| TrustError::MalformedCertificate {
                index,
                reason: format!("base64 decode error: {}", e),
            })?;
        Self::from_der(&der).map_err(|reason| TrustError::MalformedCertificate { index, reason })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn public_key(&self) -> LeafPublicKey {
        LeafPublicKey::new(self.public_key_oid.clone(), &self.spki_der, &self.public_key_bits)
    }

    pub(crate) fn is_self_issued(&self) -> bool {
        self.subject_raw == self.issuer_raw
    }
}

fn extended_key_usage_oids(eku: &ExtendedKeyUsage) -> Vec<String> {
    let known = [
        (eku.any, ANY_EXTENDED_KEY_USAGE),
        (eku.server_auth, SERVER_AUTH),
        (eku.client_auth, "1.3.6.1.5.5.7.3.2"),
        (eku.code_signing, "1.3.6.1.5.5.7.3.3"),
        (eku.email_protection, "1.3.6.1.5.5.7.3.4"),
        (eku.time_stamping, "1.3.6.1.5.5.7.3.8"),
        (eku.ocsp_signing, "1.3.6.1.5.5.7.3.9"),
    ];
    known
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, oid)| oid.to_string())
        .chain(eku.other.iter().map(|oid| oid.to_id_string()))
        .collect()
}

/// Public key of a validated leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafPublicKey {
    algorithm_oid: String,
    spki_der: Vec<u8>,
    key_bits: Vec<u8>,
}

impl LeafPublicKey {
    pub fn new(algorithm_oid: impl Into<String>, spki_der: &[u8], key_bits: &[u8]) -> Self {
        Self {
            algorithm_oid: algorithm_oid.into(),
            spki_der: spki_der.to_vec(),
            key_bits: key_bits.to_vec(),
        }
    }

    /// Key algorithm OID from the SubjectPublicKeyInfo, e.g. `1.2.840.10045.2.1`.
    pub fn algorithm_oid(&self) -> &str {
        &self.algorithm_oid
    }

    /// DER-encoded SubjectPublicKeyInfo.
    pub fn subject_public_key_info(&self) -> &[u8] {
        &self.spki_der
    }

    /// Raw subject public key bits, e.g. the SEC1 point for EC keys.
    pub fn key_bits(&self) -> &[u8] {
        &self.key_bits
    }
}
