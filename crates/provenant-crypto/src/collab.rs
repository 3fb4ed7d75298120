//! Optional collaborator seams.
//!
//! The engine verifies what it can by itself; credential formats and
//! live log access plug in behind these traits. Absence is never a hard
//! failure: missing collaborators degrade to capability warnings.

use provenant_model::{Attestation, TransparencyAnchor};

/// Verifies credential-format attestations the core does not implement.
pub trait CredentialVerifier: Send + Sync {
    /// Verdict over an `sd-jwt` attestation and its signed payload.
    fn verify_sd_jwt(&self, attestation: &Attestation, signed_payload: &[u8])
        -> Result<bool, String>;

    /// Verdict over a `bbs-plus` attestation and its signed payload.
    fn verify_bbs_plus(
        &self,
        attestation: &Attestation,
        signed_payload: &[u8],
    ) -> Result<bool, String>;
}

/// Fetches fresh proofs from a live transparency log.
///
/// Never invoked in offline verification, where proof bytes are carried in
/// the document; installed by operators who want validation-time
/// freshness.
pub trait TransparencyLogClient: Send + Sync {
    fn fetch_proof(&self, log_id: &str, entry_id: &str) -> Result<TransparencyAnchor, String>;
}
