//! # Canonical Serialization
//!
//! Deterministic byte representation of any document subtree. The canonical
//! form is the signed payload for attestation verification and the leaf
//! preimage for Merkle commitments, so any two semantically identical
//! subtrees must produce bytewise identical output.
//!
//! ## Rules
//!
//! 1. **Object keys** are sorted lexicographically by UTF-8 code points.
//! 2. **Whitespace** outside string literals is never emitted.
//! 3. **Sequences** preserve document order.
//! 4. **Numbers** must be integers; non-integer values are rejected rather
//!    than given a canonical decimal spelling.
//! 5. **Output** is UTF-8.
//!
//! ## Threat Model
//!
//! Canonicalization defends against key-reordering and whitespace
//! manipulation, where an attacker crafts a semantically identical document
//! whose bytes (and therefore digest and signature payload) differ. The
//! integer-only number rule removes the remaining aliasing channel
//! (`1` vs `1.0` vs `1e0`) instead of trying to normalize it.
//!
//! ## Example
//!
//! ```rust
//! use provenant_model::canonical::canonicalize;
//! use serde_json::json;
//!
//! let a = canonicalize(&json!({"b": 1, "a": [2, 3]})).unwrap();
//! let b = canonicalize(&json!({"a": [2, 3], "b": 1})).unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a, r#"{"a":[2,3],"b":1}"#);
//! ```

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Failures producing a canonical form.
#[derive(Debug, Error)]
pub enum CanonicalizeError {
    /// The subtree contains a number without an exact integer value.
    #[error("non-integer number {0} has no canonical form")]
    NonIntegerNumber(String),

    /// The value could not be converted to a tree at all.
    #[error("value does not serialize: {0}")]
    Serialize(String),
}

/// Produces the canonical text of a JSON value.
///
/// # Errors
///
/// Returns [`CanonicalizeError::NonIntegerNumber`] when the subtree contains
/// a float with a fractional part or outside the exactly-representable
/// integer range.
pub fn canonicalize(value: &Value) -> Result<String, CanonicalizeError> {
    let mut out = String::new();
    write_value(value, &mut out)?;
    Ok(out)
}

/// Canonical bytes of any serializable value.
///
/// Convenience wrapper used to build signed payloads from typed nodes.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonicalizeError> {
    let tree = serde_json::to_value(value)
        .map_err(|e| CanonicalizeError::Serialize(e.to_string()))?;
    Ok(canonicalize(&tree)?.into_bytes())
}

/// SHA-256 digest of the canonical form, in `sha256:<hex>` notation.
///
/// # Example
///
/// ```rust
/// use provenant_model::canonical::canonical_digest;
/// use serde_json::json;
///
/// let d1 = canonical_digest(&json!({"x": 1, "y": 2})).unwrap();
/// let d2 = canonical_digest(&json!({"y": 2, "x": 1})).unwrap();
/// assert_eq!(d1, d2);
/// assert!(d1.starts_with("sha256:"));
/// ```
pub fn canonical_digest(value: &Value) -> Result<String, CanonicalizeError> {
    let canonical = canonicalize(value)?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(format!("sha256:{}", hex::encode(digest)))
}

fn write_value(value: &Value, out: &mut String) -> Result<(), CanonicalizeError> {
    match value {
        Value::Null => {
            out.push_str("null");
            Ok(())
        }
        Value::Bool(b) => {
            out.push_str(if *b { "true" } else { "false" });
            Ok(())
        }
        Value::Number(n) => write_number(n, out),
        Value::String(s) => {
            write_string(s, out);
            Ok(())
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
            Ok(())
        }
        Value::Object(map) => {
            // Sort keys by UTF-8 code points. Rust string ordering is
            // exactly that, so no transcoding step is needed.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(item, out)?;
            }
            out.push('}');
            Ok(())
        }
    }
}

/// Largest magnitude a float can hold while remaining an exact integer.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0; // 2^53

fn write_number(n: &serde_json::Number, out: &mut String) -> Result<(), CanonicalizeError> {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
        return Ok(());
    }
    if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
        return Ok(());
    }
    if let Some(f) = n.as_f64() {
        // A float that happens to be a whole number is still an integer
        // semantically; give it the integer spelling.
        if f.fract() == 0.0 && f.abs() < MAX_EXACT_INT {
            out.push_str(&format!("{}", f as i64));
            return Ok(());
        }
    }
    Err(CanonicalizeError::NonIntegerNumber(n.to_string()))
}

/// Minimal-escape string form: only `"`, `\` and control characters are
/// escaped, everything else passes through as UTF-8.
fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x08' => out.push_str("\\b"),
            '\x0C' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c < '\x20' => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
