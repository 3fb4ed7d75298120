//! Resolution failure taxonomy.
//!
//! Network-level variants never escape the resolver as-is: the signature
//! verifier wraps everything except the two syntax failures into a single
//! resolution-failed event so resolver internals stay out of validator logs.

use thiserror::Error;

/// Everything that can go wrong resolving a DID to key material.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The text is not a DID at all.
    #[error("malformed DID: {0}")]
    Malformed(String),

    /// Syntactically a DID, but the method has no resolver.
    #[error("unsupported DID method `{0}`")]
    MethodUnsupported(String),

    /// The authority is a reserved or private host.
    #[error("host `{0}` is blocked")]
    HostBlocked(String),

    /// TLS negotiation or certificate validation failed.
    #[error("TLS failure: {0}")]
    Tls(String),

    /// The per-authority token bucket is exhausted.
    #[error("rate limit exceeded for `{0}`")]
    RateLimitExceeded(String),

    /// The response body exceeded the configured ceiling.
    #[error("response exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    /// The response carried an unexpected content type.
    #[error("content type `{0}` rejected")]
    ContentTypeRejected(String),

    /// The DID document failed to parse or has no usable shape.
    #[error("DID document malformed: {0}")]
    DocumentMalformed(String),

    /// No verification method matched the requested key.
    #[error("key not found in DID document: {0}")]
    KeyNotFound(String),

    /// A verification method was found but its key type is unusable.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// Transport-level failure (timeout, refused connection, redirect).
    #[error("network failure: {0}")]
    Network(String),

    /// The aggregate resolution budget for this validation call ran out.
    #[error("resolution time budget exhausted")]
    BudgetExhausted,
}

impl ResolveError {
    /// True for the two failures that indicate bad input rather than a
    /// failed resolution attempt.
    pub fn is_syntax(&self) -> bool {
        matches!(
            self,
            ResolveError::Malformed(_) | ResolveError::MethodUnsupported(_)
        )
    }

    /// Short stable label used when wrapping into a resolution-failed
    /// event, so reports can name the inner failure without carrying
    /// resolver internals.
    pub fn label(&self) -> &'static str {
        match self {
            ResolveError::Malformed(_) => "Malformed",
            ResolveError::MethodUnsupported(_) => "MethodUnsupported",
            ResolveError::HostBlocked(_) => "HostBlocked",
            ResolveError::Tls(_) => "TLSFailure",
            ResolveError::RateLimitExceeded(_) => "RateLimitExceeded",
            ResolveError::ResponseTooLarge { .. } => "ResponseTooLarge",
            ResolveError::ContentTypeRejected(_) => "ContentTypeRejected",
            ResolveError::DocumentMalformed(_) => "DocumentMalformed",
            ResolveError::KeyNotFound(_) => "KeyNotFound",
            ResolveError::UnsupportedKeyType(_) => "UnsupportedKeyType",
            ResolveError::Network(_) => "NetworkFailure",
            ResolveError::BudgetExhausted => "BudgetExhausted",
        }
    }
}
