use thiserror::Error;

use crate::certificate::EncodedCertificate;
use crate::context::ContextError;

#[derive(Error, Debug)]
pub enum TrustError {
    /// A root certificate source could not be read (network or filesystem).
    ///
    /// `collected` holds the roots gathered before the failure. They are
    /// diagnostic only and must not be treated as the complete root set.
    #[error("Root certificate fetch failed: {reason}")]
    SourceFetchFailed {
        reason: String,
        collected: Vec<EncodedCertificate>,
    },

    /// The caller's context was cancelled or its deadline passed while a
    /// source was fetching.
    #[error("Root certificate fetch aborted: {reason}")]
    CancellationFailed {
        reason: ContextError,
        collected: Vec<EncodedCertificate>,
    },

    #[error("Malformed certificate at chain index {index}: {reason}")]
    MalformedCertificate { index: usize, reason: String },

    #[error("Certificate is not from a recognized authority")]
    UntrustedIssuer,

    #[error("Certificate chain validation failed: {0}")]
    ChainValidationFailed(String),

    #[error("Certificate chain is empty")]
    EmptyChain,

    #[error("Invalid signature header: {0}")]
    InvalidHeader(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TrustError {
    /// Stable code for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TrustError::SourceFetchFailed { .. } => "SOURCE_FETCH_FAILED",
            TrustError::CancellationFailed { .. } => "CANCELLATION_FAILED",
            TrustError::MalformedCertificate { .. } => "MALFORMED_CERTIFICATE",
            TrustError::UntrustedIssuer => "UNTRUSTED_ISSUER",
            TrustError::ChainValidationFailed(_) => "CHAIN_VALIDATION_FAILED",
            TrustError::EmptyChain => "EMPTY_CHAIN",
            TrustError::InvalidHeader(_) => "INVALID_HEADER",
            TrustError::Configuration(_) => "CONFIGURATION",
        }
    }

    /// Roots collected before a source failure, if any.
    pub fn collected(&self) -> &[EncodedCertificate] {
        match self {
            TrustError::SourceFetchFailed { collected, .. }
            | TrustError::CancellationFailed { collected, .. } => collected,
            _ => &[],
        }
    }
}

pub type TrustResult<T> = Result<T, TrustError>;
