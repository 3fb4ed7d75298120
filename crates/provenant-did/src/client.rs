//! Hardened HTTPS client for DID document fetches.
//!
//! Every request goes through the same gauntlet, in order: scheme check,
//! host guard, token bucket, dispatch with TLS validation and no redirects,
//! status and content-type checks, then a streamed read with a hard byte
//! ceiling. The guard works on the URL as written; a host that merely
//! *resolves* to a private address is a DNS-rebinding concern outside this
//! layer's reach and is deliberately not promised here.

use crate::error::ResolveError;
use crate::ratelimit::RateLimiter;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use tracing::{debug, warn};
use url::{Host, Url};

/// Accepted response content types.
const ACCEPTED_CONTENT_TYPES: [&str; 2] = ["application/json", "application/did+json"];

/// Decides whether an authority may be dialed at all.
///
/// Refused outright: `localhost`, loopback, link-local, the RFC 1918
/// ranges, CGNAT-free unique-local v6 space and anything else that
/// literally parses as an IP inside those ranges.
///
/// # Example
///
/// ```rust
/// use provenant_did::client::host_blocked;
///
/// assert!(host_blocked("localhost"));
/// assert!(host_blocked("127.0.0.1"));
/// assert!(host_blocked("169.254.169.254"));
/// assert!(host_blocked("10.2.3.4"));
/// assert!(host_blocked("172.20.1.1"));
/// assert!(host_blocked("192.168.0.10"));
/// assert!(host_blocked("[::1]"));
/// assert!(!host_blocked("example.com"));
/// assert!(!host_blocked("8.8.8.8"));
/// ```
pub fn host_blocked(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }

    let literal = host.trim_start_matches('[').trim_end_matches(']');
    match literal.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => ipv4_blocked(v4),
        Ok(IpAddr::V6(v6)) => ipv6_blocked(v6),
        Err(_) => false,
    }
}

fn ipv4_blocked(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_loopback()                                    // 127.0.0.0/8
        || ip.is_link_local()                           // 169.254.0.0/16
        || ip.is_private()                              // 10/8, 172.16/12, 192.168/16
        || octets[0] == 0                               // 0.0.0.0/8
        || ip.is_broadcast()
}

fn ipv6_blocked(ip: Ipv6Addr) -> bool {
    let segments = ip.segments();
    ip.is_loopback()                                    // ::1
        || (segments[0] & 0xfe00) == 0xfc00             // fc00::/7 unique local
        || (segments[0] & 0xffc0) == 0xfe80             // fe80::/10 link local
        || ip.to_ipv4_mapped().map(ipv4_blocked).unwrap_or(false)
}

/// Configuration knobs for the hardened client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request timeout.
    pub timeout: Duration,

    /// Response body ceiling in bytes.
    pub max_response_bytes: usize,

    /// Concurrent connection cap, aligned with the rate-limit burst.
    pub pool_max: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_response_bytes: 1024 * 1024,
            pool_max: 10,
        }
    }
}

/// HTTPS client with the full dispatch gauntlet applied per request.
pub struct HardenedClient {
    inner: reqwest::Client,
    config: ClientConfig,
}

impl HardenedClient {
    /// Builds the client. TLS validation stays at reqwest's defaults
    /// (mandatory); redirects are disabled at the client level so not even
    /// a same-host redirect is followed.
    pub fn new(config: ClientConfig) -> Result<Self, ResolveError> {
        let inner = reqwest::Client::builder()
            .https_only(true)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.pool_max)
            .build()
            .map_err(|e| ResolveError::Network(format!("client construction failed: {e}")))?;
        Ok(Self { inner, config })
    }

    /// Fetches a JSON document from `url`, applying scheme, host, rate
    /// limit, content-type and size checks. The rate-limit token is
    /// consumed before dispatch; hosts refused by the guard never reach
    /// the bucket at all.
    pub async fn fetch_json(
        &self,
        url: &Url,
        limiter: &RateLimiter,
    ) -> Result<serde_json::Value, ResolveError> {
        if url.scheme() != "https" {
            return Err(ResolveError::Network(format!(
                "refusing non-HTTPS scheme `{}`",
                url.scheme()
            )));
        }

        let host = match url.host() {
            Some(Host::Domain(d)) => d.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => format!("[{ip}]"),
            None => return Err(ResolveError::Network("URL has no host".to_string())),
        };

        if host_blocked(&host) {
            warn!(%host, "refusing dispatch to blocked host");
            return Err(ResolveError::HostBlocked(host));
        }

        limiter.try_acquire(&host)?;

        debug!(%url, "fetching DID document");
        let response = self.inner.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                ResolveError::Network("request timed out".to_string())
            } else if e.is_connect() {
                // Certificate problems surface as connect errors; keep the
                // TLS hint when reqwest provides one.
                let text = e.to_string();
                if text.contains("certificate") || text.contains("tls") {
                    ResolveError::Tls(text)
                } else {
                    ResolveError::Network(text)
                }
            } else if e.is_redirect() {
                ResolveError::Network("redirect refused".to_string())
            } else {
                ResolveError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_redirection() {
            return Err(ResolveError::Network(format!("redirect {status} refused")));
        }
        if !status.is_success() {
            return Err(ResolveError::Network(format!("HTTP status {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if !ACCEPTED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(ResolveError::ContentTypeRejected(content_type));
        }

        let body = self.read_capped(response).await?;
        serde_json::from_slice(&body)
            .map_err(|e| ResolveError::DocumentMalformed(format!("body is not JSON: {e}")))
    }

    /// Streams the body in chunks, failing as soon as the ceiling is
    /// crossed rather than after buffering the whole response.
    async fn read_capped(&self, mut response: reqwest::Response) -> Result<Vec<u8>, ResolveError> {
        let limit = self.config.max_response_bytes;

        if let Some(declared) = response.content_length() {
            if declared as usize > limit {
                return Err(ResolveError::ResponseTooLarge { limit });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ResolveError::Network(e.to_string()))?
        {
            if body.len() + chunk.len() > limit {
                return Err(ResolveError::ResponseTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

impl std::fmt::Debug for HardenedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardenedClient")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ranges_blocked() {
        for host in [
            "localhost",
            "LOCALHOST",
            "127.0.0.1",
            "127.8.8.8",
            "169.254.169.254",
            "10.0.0.1",
            "10.255.255.255",
            "172.16.0.1",
            "172.31.255.254",
            "192.168.1.1",
            "0.0.0.0",
            "[::1]",
            "::1",
            "fc00::1",
            "fdab::12",
            "fe80::1",
            "::ffff:127.0.0.1",
            "::ffff:10.0.0.8",
        ] {
            assert!(host_blocked(host), "{host} should be blocked");
        }
    }

    #[test]
    fn public_hosts_allowed() {
        for host in [
            "example.com",
            "w3c-ccg.github.io",
            "8.8.8.8",
            "1.1.1.1",
            "172.15.0.1",
            "172.32.0.1",
            "2606:4700::1111",
        ] {
            assert!(!host_blocked(host), "{host} should be allowed");
        }
    }

    #[tokio::test]
    async fn plain_http_refused_without_dispatch() {
        let client = HardenedClient::new(ClientConfig::default()).unwrap();
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        let url = Url::parse("http://example.com/did.json").unwrap();

        let err = client.fetch_json(&url, &limiter).await.unwrap_err();
        assert!(matches!(err, ResolveError::Network(_)));
        // The bucket was never consulted.
        assert!(limiter.try_acquire("example.com").is_ok());
    }

    #[tokio::test]
    async fn blocked_host_refused_without_consuming_token() {
        let client = HardenedClient::new(ClientConfig::default()).unwrap();
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let url = Url::parse("https://169.254.169.254/did.json").unwrap();

        let err = client.fetch_json(&url, &limiter).await.unwrap_err();
        assert!(matches!(err, ResolveError::HostBlocked(_)));
        assert!(limiter.try_acquire("169.254.169.254").is_ok());
    }
}
