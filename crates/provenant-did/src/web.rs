//! `did:web` URL construction and DID document parsing.
//!
//! The authority and path segments select a single HTTPS URL:
//!
//! - `did:web:example.com` -> `https://example.com/.well-known/did.json`
//! - `did:web:example.com:user:alice` -> `https://example.com/user/alice/did.json`
//!
//! A `%3A` in the authority segment percent-decodes to `:` for a port.
//! The fetched document's `verificationMethod` array is scanned for the
//! requested key; three encodings are recognized: raw base58, multibase
//! (with or without the Ed25519 multicodec prefix) and JWK (`kty=OKP`,
//! `crv=Ed25519`).

use crate::did::Did;
use crate::error::ResolveError;
use crate::key::ED25519_KEY_LEN;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;
use url::Url;

/// Builds the HTTPS URL a `did:web` identifier resolves through.
///
/// # Example
///
/// ```rust
/// use provenant_did::{web::web_url, Did};
///
/// let bare = Did::parse("did:web:example.com").unwrap();
/// assert_eq!(web_url(&bare).unwrap().as_str(),
///            "https://example.com/.well-known/did.json");
///
/// let pathed = Did::parse("did:web:example.com:user:alice").unwrap();
/// assert_eq!(web_url(&pathed).unwrap().as_str(),
///            "https://example.com/user/alice/did.json");
/// ```
pub fn web_url(did: &Did) -> Result<Url, ResolveError> {
    let mut segments = did.segments();
    let authority = segments
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ResolveError::Malformed(format!("did:web without authority: {did}")))?;
    let authority = authority.replace("%3A", ":").replace("%3a", ":");

    let path: Vec<&str> = segments.collect();
    let text = if path.is_empty() {
        format!("https://{authority}/.well-known/did.json")
    } else {
        if path.iter().any(|s| s.is_empty()) {
            return Err(ResolveError::Malformed(format!(
                "did:web with empty path segment: {did}"
            )));
        }
        format!("https://{authority}/{}/did.json", path.join("/"))
    };

    Url::parse(&text).map_err(|e| ResolveError::Malformed(format!("`{text}`: {e}")))
}

/// Pulls Ed25519 key bytes out of a parsed DID document.
///
/// With a `key_id` the matching `verificationMethod` entry is required;
/// without one the first entry yielding an Ed25519 key wins.
pub fn extract_key(document: &Value, key_id: Option<&str>) -> Result<Vec<u8>, ResolveError> {
    let methods = document
        .get("verificationMethod")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ResolveError::DocumentMalformed("no verificationMethod array".to_string())
        })?;

    if let Some(fragment) = key_id {
        let entry = methods
            .iter()
            .find(|m| {
                m.get("id")
                    .and_then(Value::as_str)
                    .map(|id| id == fragment || id.ends_with(&format!("#{fragment}")))
                    .unwrap_or(false)
            })
            .ok_or_else(|| ResolveError::KeyNotFound(format!("no entry matches `#{fragment}`")))?;
        return method_key(entry);
    }

    let mut last_err = ResolveError::KeyNotFound("verificationMethod array is empty".to_string());
    for entry in methods {
        match method_key(entry) {
            Ok(key) => return Ok(key),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

/// Decodes one verification-method entry into raw key bytes.
fn method_key(entry: &Value) -> Result<Vec<u8>, ResolveError> {
    if let Some(b58) = entry.get("publicKeyBase58").and_then(Value::as_str) {
        let bytes = bs58::decode(b58)
            .into_vec()
            .map_err(|e| ResolveError::DocumentMalformed(format!("publicKeyBase58: {e}")))?;
        return check_len(bytes);
    }

    if let Some(multibase) = entry.get("publicKeyMultibase").and_then(Value::as_str) {
        let encoded = multibase.strip_prefix('z').ok_or_else(|| {
            ResolveError::UnsupportedKeyType("publicKeyMultibase is not base58btc".to_string())
        })?;
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| ResolveError::DocumentMalformed(format!("publicKeyMultibase: {e}")))?;
        // Multicodec prefix is optional in the wild; accept both spellings.
        let bytes = match bytes.strip_prefix(&[0xED, 0x01][..]) {
            Some(stripped) => stripped.to_vec(),
            None => bytes,
        };
        return check_len(bytes);
    }

    if let Some(jwk) = entry.get("publicKeyJwk") {
        let kty = jwk.get("kty").and_then(Value::as_str).unwrap_or("");
        let crv = jwk.get("crv").and_then(Value::as_str).unwrap_or("");
        if kty != "OKP" || crv != "Ed25519" {
            return Err(ResolveError::UnsupportedKeyType(format!(
                "JWK kty={kty} crv={crv}"
            )));
        }
        let x = jwk
            .get("x")
            .and_then(Value::as_str)
            .ok_or_else(|| ResolveError::DocumentMalformed("JWK without `x`".to_string()))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(x)
            .map_err(|e| ResolveError::DocumentMalformed(format!("JWK x: {e}")))?;
        return check_len(bytes);
    }

    Err(ResolveError::UnsupportedKeyType(
        "verification method has no recognized key encoding".to_string(),
    ))
}

fn check_len(bytes: Vec<u8>) -> Result<Vec<u8>, ResolveError> {
    if bytes.len() == ED25519_KEY_LEN {
        Ok(bytes)
    } else {
        Err(ResolveError::UnsupportedKeyType(format!(
            "expected {ED25519_KEY_LEN} key bytes, found {}",
            bytes.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KEY: [u8; 32] = [9u8; 32];

    fn b58(bytes: &[u8]) -> String {
        bs58::encode(bytes).into_string()
    }

    #[test]
    fn url_with_port() {
        let did = Did::parse("did:web:example.com%3A8443:api").unwrap();
        assert_eq!(
            web_url(&did).unwrap().as_str(),
            "https://example.com:8443/api/did.json"
        );
    }

    #[test]
    fn base58_encoding() {
        let doc = json!({
            "verificationMethod": [
                {"id": "did:web:x#key-1", "type": "Ed25519VerificationKey2018",
                 "publicKeyBase58": b58(&KEY)}
            ]
        });
        assert_eq!(extract_key(&doc, None).unwrap(), KEY.to_vec());
    }

    #[test]
    fn multibase_with_and_without_codec_prefix() {
        let mut prefixed = vec![0xED, 0x01];
        prefixed.extend_from_slice(&KEY);

        for encoded in [format!("z{}", b58(&prefixed)), format!("z{}", b58(&KEY))] {
            let doc = json!({
                "verificationMethod": [
                    {"id": "did:web:x#k", "publicKeyMultibase": encoded}
                ]
            });
            assert_eq!(extract_key(&doc, None).unwrap(), KEY.to_vec());
        }
    }

    #[test]
    fn jwk_encoding() {
        let doc = json!({
            "verificationMethod": [
                {"id": "did:web:x#k",
                 "publicKeyJwk": {"kty": "OKP", "crv": "Ed25519",
                                  "x": URL_SAFE_NO_PAD.encode(KEY)}}
            ]
        });
        assert_eq!(extract_key(&doc, None).unwrap(), KEY.to_vec());
    }

    #[test]
    fn fragment_selects_entry() {
        let other = [1u8; 32];
        let doc = json!({
            "verificationMethod": [
                {"id": "did:web:x#key-1", "publicKeyBase58": b58(&other)},
                {"id": "did:web:x#key-2", "publicKeyBase58": b58(&KEY)}
            ]
        });
        assert_eq!(extract_key(&doc, Some("key-2")).unwrap(), KEY.to_vec());
        assert!(matches!(
            extract_key(&doc, Some("key-9")),
            Err(ResolveError::KeyNotFound(_))
        ));
    }

    #[test]
    fn non_ed25519_jwk_rejected() {
        let doc = json!({
            "verificationMethod": [
                {"id": "did:web:x#k",
                 "publicKeyJwk": {"kty": "EC", "crv": "P-256", "x": "AA"}}
            ]
        });
        assert!(matches!(
            extract_key(&doc, None),
            Err(ResolveError::UnsupportedKeyType(_))
        ));
    }

    #[test]
    fn missing_method_array_rejected() {
        assert!(matches!(
            extract_key(&json!({}), None),
            Err(ResolveError::DocumentMalformed(_))
        ));
    }
}
