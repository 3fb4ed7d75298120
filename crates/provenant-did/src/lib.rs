//! # Provenant DID - Signer Identity Resolution
//!
//! Maps a decentralized identifier to Ed25519 verification-key material.
//! Two methods are built in:
//!
//! - `did:key` decodes the key straight out of the identifier; no network.
//! - `did:web` fetches a DID document over a hardened HTTPS client.
//!
//! ## Threat Model
//!
//! The resolver is the only component of the engine that touches the
//! network, so it concentrates the network hardening:
//!
//! | Threat | Defense |
//! |--------|---------|
//! | SSRF via attacker-chosen authority | Reserved/private host ranges refused before dispatch |
//! | Redirect laundering | HTTP redirects refused outright |
//! | Plaintext downgrade | HTTPS only, TLS validation mandatory |
//! | Response flooding | Streamed body capped at 1 MiB |
//! | Resolver hammering | Per-authority token bucket, 10 requests / 60 s |
//! | Slowloris | 10 s request timeout |
//! | Decoder bombs | `did:key` identifier capped at 128 multibase characters |
//!
//! ## Shared State
//!
//! A [`Resolver`] owns a TTL + LRU key cache and the rate-limit buckets.
//! Embedders may share one resolver handle across validation calls for
//! cache hits; tests construct a throwaway instance. There is no global
//! singleton.

pub mod cache;
pub mod client;
pub mod did;
pub mod error;
pub mod key;
pub mod ratelimit;
pub mod resolver;
pub mod web;

pub use did::Did;
pub use error::ResolveError;
pub use resolver::{KeyMaterial, Resolver, ResolverConfig};
