//! # Provenant Crypto - Integrity and Proof Verification
//!
//! The cryptographic half of the verification engine:
//!
//! - **Hash verification** ([`hash`]) - content digests of locally
//!   referenced files, with safe path resolution bound to the document's
//!   directory.
//! - **Signature verification** ([`signature`]) - Ed25519 over the
//!   canonical operation payload, with multisig threshold counting and a
//!   collaborator seam for credential formats the core does not implement.
//! - **Merkle proofs** ([`merkle`]) - inclusion and consistency
//!   verification with the `0x00`/`0x01` leaf and node tagging of
//!   Certificate Transparency, plus a small tree builder for producing
//!   proofs.
//! - **Transparency anchors** ([`transparency`]) - binding operation
//!   digests to append-only-log entries carried in the document.
//! - **Sealed subgraphs** ([`sealed`]) - commitments that hide a subgraph
//!   behind a root hash while exposing selected leaves and signed policy
//!   assertions.
//!
//! All checks report events and continue; none of them aborts a
//! validation call.

pub mod collab;
pub mod hash;
pub mod merkle;
pub mod sealed;
pub mod signature;
pub mod transparency;

pub use collab::{CredentialVerifier, TransparencyLogClient};
pub use hash::{HashSettings, HashVerifier};
pub use merkle::{LogTree, ProofError};
pub use signature::{SignatureOptions, SignatureVerifier};
