//! # Document Loader
//!
//! Parses a byte sequence in either surface syntax into one in-memory tree:
//!
//! - the human form, an indentation-sensitive mapping syntax conventionally
//!   stored as `*.gg.yaml`, and
//! - the canonical form, a single-line object literal with sorted keys.
//!
//! The loader is the only stage allowed to abort a validation call: without
//! a parse tree there is nothing to aggregate diagnostics against. Size and
//! encoding ceilings are enforced before any parsing happens, and parsing is
//! strictly value-level. No type-polymorphic or instruction-executing
//! deserialization exists in this path.

use crate::canonical::{canonicalize, CanonicalizeError};
use crate::document::Document;
use serde_json::Value;
use thiserror::Error;

/// Default input ceiling: 8 MiB.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 8 * 1024 * 1024;

/// Terminal loader failures.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Input exceeds the configured byte ceiling.
    #[error("document is {actual} bytes, ceiling is {limit}")]
    Oversized { actual: usize, limit: usize },

    /// Input is not valid UTF-8.
    #[error("document is not valid UTF-8: {0}")]
    Encoding(String),

    /// Neither surface syntax produced a tree.
    #[error("document failed to parse: {0}")]
    Malformed(String),
}

/// Result of loading: the raw tree plus the typed decode attempt.
///
/// The typed decode is allowed to fail (for example when a sequence sits
/// where a mapping belongs); the schema checker reports that as a violation
/// and the pipeline continues over an empty document rather than aborting.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// The parsed tree exactly as written, used for canonical round trips
    /// and unknown-key checks.
    pub value: Value,

    /// Typed view, or `Document::default()` when decoding failed.
    pub document: Document,

    /// Decoder failure text, when the typed view is degraded.
    pub decode_error: Option<String>,
}

/// Parses a document from raw bytes.
///
/// The canonical object-literal form is detected by a leading `{`; anything
/// else is treated as the human mapping form.
///
/// # Errors
///
/// [`LoadError::Oversized`] before any parsing when the input exceeds
/// `max_bytes`; [`LoadError::Encoding`] for non-UTF-8 input;
/// [`LoadError::Malformed`] when no tree can be produced or the root is not
/// a mapping.
pub fn load_document(bytes: &[u8], max_bytes: usize) -> Result<LoadedDocument, LoadError> {
    if bytes.len() > max_bytes {
        return Err(LoadError::Oversized {
            actual: bytes.len(),
            limit: max_bytes,
        });
    }

    let text = std::str::from_utf8(bytes).map_err(|e| LoadError::Encoding(e.to_string()))?;

    let value: Value = if text.trim_start().starts_with('{') {
        serde_json::from_str(text).map_err(|e| LoadError::Malformed(e.to_string()))?
    } else {
        serde_yaml::from_str(text).map_err(|e| LoadError::Malformed(e.to_string()))?
    };

    if !value.is_object() {
        return Err(LoadError::Malformed(
            "top level must be a mapping".to_string(),
        ));
    }

    let (document, decode_error) = match serde_json::from_value::<Document>(value.clone()) {
        Ok(doc) => (doc, None),
        Err(e) => (Document::default(), Some(e.to_string())),
    };

    Ok(LoadedDocument {
        value,
        document,
        decode_error,
    })
}

/// Renders a typed document in the canonical form.
///
/// This is the round-trip converter between the two surface syntaxes; the
/// output is the authoritative form for signing.
pub fn to_canonical_string(document: &Document) -> Result<String, CanonicalizeError> {
    let value = serde_json::to_value(document)
        .map_err(|e| CanonicalizeError::Serialize(e.to_string()))?;
    canonicalize(&value)
}
