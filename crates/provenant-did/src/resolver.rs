//! The resolver facade.
//!
//! `resolve(did, key_id)` checks the cache, dispatches to the method
//! strategy and caches what comes back. One resolver handle carries the
//! cache and rate-limit buckets; embedders share it across validation
//! calls for throughput, tests construct a throwaway instance.

use crate::cache::KeyCache;
use crate::client::{ClientConfig, HardenedClient};
use crate::did::Did;
use crate::error::ResolveError;
use crate::key::decode_key_did;
use crate::ratelimit::RateLimiter;
use crate::web::{extract_key, web_url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Resolved verification-key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Raw Ed25519 public key bytes.
    pub key: Vec<u8>,
}

/// Resolver tuning, with the engine's default ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Cache entry lifetime in seconds.
    pub cache_ttl_secs: u64,

    /// Cache capacity before LRU eviction.
    pub cache_capacity: usize,

    /// Token-bucket burst per authority.
    pub rate_limit_max: u32,

    /// Token-bucket refill window in seconds.
    pub rate_limit_window_secs: u64,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Response body ceiling in bytes.
    pub max_response_bytes: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            cache_capacity: 1024,
            rate_limit_max: 10,
            rate_limit_window_secs: 60,
            request_timeout_secs: 10,
            max_response_bytes: 1024 * 1024,
        }
    }
}

/// Maps DIDs to verification keys. See the crate docs for the threat
/// model this component carries.
#[derive(Debug)]
pub struct Resolver {
    cache: KeyCache,
    limiter: RateLimiter,
    client: HardenedClient,
}

impl Resolver {
    /// Builds a resolver with fresh cache and buckets.
    pub fn new(config: ResolverConfig) -> Result<Self, ResolveError> {
        let client = HardenedClient::new(ClientConfig {
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_response_bytes: config.max_response_bytes,
            pool_max: config.rate_limit_max as usize,
        })?;
        Ok(Self {
            cache: KeyCache::new(
                Duration::from_secs(config.cache_ttl_secs),
                config.cache_capacity,
            ),
            limiter: RateLimiter::new(
                config.rate_limit_max,
                Duration::from_secs(config.rate_limit_window_secs),
            ),
            client,
        })
    }

    /// Resolves a DID (optionally a specific key id) to Ed25519 key bytes.
    ///
    /// Cache key is `(did, key_id)`; a DID's fragment acts as the key id
    /// when no explicit one is given.
    pub async fn resolve(
        &self,
        did_text: &str,
        key_id: Option<&str>,
    ) -> Result<KeyMaterial, ResolveError> {
        let did = Did::parse(did_text)?;
        let key_id = key_id.or(did.fragment.as_deref());

        if let Some(key) = self.cache.get(did_text, key_id) {
            debug!(did = did_text, "resolver cache hit");
            return Ok(KeyMaterial { key });
        }

        let key = match did.method.as_str() {
            "key" => decode_key_did(&did.id)?,
            "web" => self.resolve_web(&did, key_id).await?,
            other => return Err(ResolveError::MethodUnsupported(other.to_string())),
        };

        self.cache.insert(did_text, key_id, key.clone());
        Ok(KeyMaterial { key })
    }

    async fn resolve_web(&self, did: &Did, key_id: Option<&str>) -> Result<Vec<u8>, ResolveError> {
        let url = web_url(did)?;
        let document = self.client.fetch_json(&url, &self.limiter).await?;
        extract_key(&document, key_id)
    }

    /// Cache population count, exposed for idempotence checks in tests.
    pub fn cached_keys(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::encode_key_did;

    fn resolver() -> Resolver {
        Resolver::new(ResolverConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn key_method_resolves_offline() {
        let key = [3u8; 32];
        let did = encode_key_did(&key);

        let material = resolver().resolve(&did, None).await.unwrap();
        assert_eq!(material.key, key.to_vec());
    }

    #[tokio::test]
    async fn key_method_populates_cache() {
        let resolver = resolver();
        let did = encode_key_did(&[5u8; 32]);

        resolver.resolve(&did, None).await.unwrap();
        assert_eq!(resolver.cached_keys(), 1);

        // Second resolution is served from cache.
        resolver.resolve(&did, None).await.unwrap();
        assert_eq!(resolver.cached_keys(), 1);
    }

    #[tokio::test]
    async fn unsupported_method_rejected() {
        let err = resolver().resolve("did:ion:abc123", None).await.unwrap_err();
        assert!(matches!(err, ResolveError::MethodUnsupported(_)));
    }

    #[tokio::test]
    async fn malformed_did_rejected() {
        let err = resolver().resolve("not-a-did", None).await.unwrap_err();
        assert!(matches!(err, ResolveError::Malformed(_)));
    }

    #[tokio::test]
    async fn web_method_blocks_metadata_endpoint() {
        let err = resolver()
            .resolve("did:web:169.254.169.254", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::HostBlocked(_)));
    }

    #[tokio::test]
    async fn web_method_blocks_private_ranges() {
        for did in ["did:web:127.0.0.1", "did:web:10.0.0.8", "did:web:192.168.1.2", "did:web:localhost"] {
            let err = resolver().resolve(did, None).await.unwrap_err();
            assert!(matches!(err, ResolveError::HostBlocked(_)), "{did}");
        }
    }
}
