//! `did:key` decoding.
//!
//! The method-specific id is a multibase string: a one-character base
//! prefix (`z` = base58btc, the only base accepted here) followed by the
//! encoded bytes. The decoded bytes start with a multicodec varint naming
//! the key type; Ed25519 is `0xED 0x01`, followed by the 32 raw key bytes.
//!
//! No network activity, no caching: decoding is cheap and pure.

use crate::error::ResolveError;

/// Ceiling on the multibase identifier length, bounding the decoder.
pub const MAX_MULTIBASE_CHARS: usize = 128;

/// Multicodec varint prefix for Ed25519 public keys.
const ED25519_CODEC: [u8; 2] = [0xED, 0x01];

/// Length of a raw Ed25519 public key.
pub const ED25519_KEY_LEN: usize = 32;

/// Decodes a `did:key` method-specific id into raw Ed25519 key bytes.
///
/// # Errors
///
/// - [`ResolveError::Malformed`] for oversized input, a base prefix other
///   than `z`, or bytes that do not decode as base58btc.
/// - [`ResolveError::UnsupportedKeyType`] for a multicodec prefix other
///   than Ed25519 or a wrong key length.
pub fn decode_key_did(id: &str) -> Result<Vec<u8>, ResolveError> {
    if id.len() > MAX_MULTIBASE_CHARS {
        return Err(ResolveError::Malformed(format!(
            "did:key identifier exceeds {MAX_MULTIBASE_CHARS} characters"
        )));
    }

    let encoded = id.strip_prefix('z').ok_or_else(|| {
        ResolveError::Malformed("did:key identifier must be multibase base58btc (`z`)".to_string())
    })?;

    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| ResolveError::Malformed(format!("base58 decode failed: {e}")))?;

    let key = bytes
        .strip_prefix(&ED25519_CODEC)
        .ok_or_else(|| ResolveError::UnsupportedKeyType("multicodec prefix is not Ed25519".to_string()))?;

    if key.len() != ED25519_KEY_LEN {
        return Err(ResolveError::UnsupportedKeyType(format!(
            "Ed25519 key must be {ED25519_KEY_LEN} bytes, found {}",
            key.len()
        )));
    }

    Ok(key.to_vec())
}

/// Encodes raw Ed25519 key bytes as a `did:key` identifier.
///
/// The inverse of [`decode_key_did`]; used by test harnesses and authoring
/// collaborators to mint resolvable signer identities.
pub fn encode_key_did(key: &[u8]) -> String {
    let mut prefixed = Vec::with_capacity(ED25519_CODEC.len() + key.len());
    prefixed.extend_from_slice(&ED25519_CODEC);
    prefixed.extend_from_slice(key);
    format!("did:key:z{}", bs58::encode(prefixed).into_string())
}
