//! Terminal engine failures.
//!
//! Nearly everything the engine finds wrong with a document is reported
//! inside the [`crate::ValidationResult`]; this type covers the few
//! conditions that prevent producing a result at all.

use thiserror::Error;

/// Failures that abort a validation call.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The document could not be read from disk.
    #[error("cannot read document: {0}")]
    Io(#[from] std::io::Error),

    /// The loader produced no parse tree.
    #[error("document rejected: {0}")]
    Load(#[from] provenant_model::LoadError),

    /// The resolver could not be constructed (TLS backend missing, for
    /// example).
    #[error("resolver construction failed: {0}")]
    Resolver(String),
}
