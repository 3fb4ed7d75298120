//! # Signature Verifier
//!
//! Verifies attestations whose mode demands a signature. Per attestation
//! the verifier moves through four states, each with one failure terminal:
//!
//! ```text
//!   unresolved --resolve key--> resolved --canonicalize--> prepared --verify--> accepted
//!        |                         |                          |                    |
//!        v                         v                          v                    v
//!  resolution failed       key type unusable         payload malformed     signature invalid
//! ```
//!
//! The signed payload is the canonical serialization of the enclosing
//! operation with the signature material elided: the `signature` field is
//! replaced by an empty string at its position and any collected multisig
//! signatures are replaced by an empty sequence, so no signature ever
//! covers itself or a sibling signature.
//!
//! Ed25519 is verified cryptographically. The `ecdsa:` and `rsa:` prefixes
//! are checked syntactically only and reported as an unavailable
//! capability; `sd-jwt` and `bbs-plus` modes delegate to the credentials
//! collaborator when one is installed.

use crate::collab::CredentialVerifier;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use provenant_did::{ResolveError, Resolver};
use provenant_model::canonical::canonicalize;
use provenant_model::{
    Attestation, AttestationMode, Component, Document, EventKind, Operation, ValidationError,
    ValidationWarning,
};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

/// Marker for test-harness signatures, accepted only when enabled.
const MOCK_PREFIX: &str = "mock:";

/// Signature-stage options.
#[derive(Debug, Clone, Default)]
pub struct SignatureOptions {
    /// Accept the `ed25519:mock:valid` test marker.
    pub allow_mock: bool,
}

/// Verifies every signed attestation in a document.
pub struct SignatureVerifier<'a> {
    resolver: &'a Resolver,
    options: SignatureOptions,
    credentials: Option<&'a dyn CredentialVerifier>,
}

impl<'a> SignatureVerifier<'a> {
    pub fn new(
        resolver: &'a Resolver,
        options: SignatureOptions,
        credentials: Option<&'a dyn CredentialVerifier>,
    ) -> Self {
        Self {
            resolver,
            options,
            credentials,
        }
    }

    /// Walks the document's operations in order. `deadline` bounds the
    /// aggregate time spent on DID resolution for this validation call;
    /// once past it, remaining resolutions fail fast.
    pub async fn verify_document(
        &self,
        doc: &Document,
        deadline: Option<Instant>,
    ) -> (Vec<ValidationError>, Vec<ValidationWarning>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for (i, op) in doc.operations.iter().enumerate() {
            let Some(att) = &op.attestation else { continue };
            let path = format!("operations[{i}].attestation");

            match &att.mode {
                AttestationMode::Basic | AttestationMode::Other(_) => {}
                AttestationMode::SdJwt | AttestationMode::BbsPlus => {
                    self.verify_credential(op, att, &path, &mut errors, &mut warnings);
                }
                _ => {
                    self.verify_core(op, att, &path, deadline, &mut errors, &mut warnings)
                        .await;
                }
            }
        }

        (errors, warnings)
    }

    /// Ed25519 path for `signed` / `verifiable` / `zk` modes.
    async fn verify_core(
        &self,
        op: &Operation,
        att: &Attestation,
        path: &str,
        deadline: Option<Instant>,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<ValidationWarning>,
    ) {
        // Prerequisites (signer and signature present) are the structural
        // validator's finding; nothing to verify without them.
        let (Some(signer), Some(signature)) = (&att.signer, &att.signature) else {
            return;
        };

        let Some((algorithm, payload_b64)) = signature.split_once(':') else {
            // Schema already flagged the missing prefix.
            return;
        };

        match algorithm {
            "ed25519" => {}
            "ecdsa" | "rsa" => {
                // Syntactic validation only; cryptographic support for
                // these algorithms is not wired in.
                if BASE64.decode(payload_b64).map(|b| b.is_empty()).unwrap_or(true) {
                    errors.push(ValidationError::new(
                        EventKind::SignatureFormatMalformed,
                        Component::Signature,
                        Some(format!("{path}.signature")),
                        format!("`{algorithm}` payload is not base64"),
                    ));
                } else {
                    warnings.push(ValidationWarning::new(
                        EventKind::CapabilityUnavailable,
                        Component::Signature,
                        Some(format!("{path}.signature")),
                        format!("`{algorithm}` signatures are accepted syntactically but not verified"),
                    ));
                }
                return;
            }
            _ => return,
        }

        let payload = match signed_payload(op) {
            Ok(payload) => payload,
            Err(message) => {
                errors.push(ValidationError::new(
                    EventKind::CanonicalizationFailure,
                    Component::Signature,
                    Some(path.to_string()),
                    message,
                ));
                return;
            }
        };

        match self
            .verify_one(signer, payload_b64, &payload, path, deadline)
            .await
        {
            Ok(()) => debug!(%path, "attestation accepted"),
            Err(event) => errors.push(event),
        }

        if let Some(multisig) = &att.multisig {
            self.verify_multisig(&payload, path, deadline, errors, multisig)
                .await;
        }
    }

    /// One signer: resolve, decode, verify. The returned error is the
    /// failure terminal for this attestation.
    async fn verify_one(
        &self,
        signer: &str,
        payload_b64: &str,
        payload: &[u8],
        path: &str,
        deadline: Option<Instant>,
    ) -> Result<(), ValidationError> {
        if let Some(rest) = payload_b64.strip_prefix(MOCK_PREFIX) {
            return if !self.options.allow_mock {
                Err(ValidationError::new(
                    EventKind::SignatureFormatMalformed,
                    Component::Signature,
                    Some(format!("{path}.signature")),
                    "mock signatures are not accepted outside test harnesses",
                ))
            } else if rest == "valid" {
                Ok(())
            } else {
                Err(ValidationError::new(
                    EventKind::SignatureInvalid,
                    Component::Signature,
                    Some(format!("{path}.signature")),
                    "mock signature marked invalid",
                ))
            };
        }

        if deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
            return Err(ValidationError::new(
                EventKind::DidResolutionFailed,
                Component::Signature,
                Some(path.to_string()),
                format!("resolution budget exhausted before resolving `{signer}`"),
            ));
        }

        let key = self
            .resolver
            .resolve(signer, None)
            .await
            .map_err(|e| resolution_event(&e, signer, path))?;

        let key_bytes: [u8; 32] = key.key.as_slice().try_into().map_err(|_| {
            ValidationError::new(
                EventKind::AlgorithmUnsupported,
                Component::Signature,
                Some(path.to_string()),
                format!("`{signer}` did not resolve to an Ed25519 key"),
            )
        })?;

        let verifying_key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| {
            ValidationError::new(
                EventKind::AlgorithmUnsupported,
                Component::Signature,
                Some(path.to_string()),
                format!("`{signer}` resolved to bytes that are not a curve point"),
            )
        })?;

        let signature_bytes = BASE64.decode(payload_b64).map_err(|e| {
            ValidationError::new(
                EventKind::SignatureFormatMalformed,
                Component::Signature,
                Some(format!("{path}.signature")),
                format!("signature payload is not base64: {e}"),
            )
        })?;

        // Anything that decodes but is not a 64-byte signature can never
        // verify; report it the same way a failed verification is.
        let signature = Signature::from_slice(&signature_bytes).map_err(|_| {
            ValidationError::new(
                EventKind::SignatureInvalid,
                Component::Signature,
                Some(path.to_string()),
                format!("decoded signature is {} bytes, expected 64", signature_bytes.len()),
            )
        })?;

        verifying_key.verify(payload, &signature).map_err(|_| {
            warn!(%path, "signature does not verify");
            ValidationError::new(
                EventKind::SignatureInvalid,
                Component::Signature,
                Some(path.to_string()),
                format!(
                    "signature by `{signer}` does not verify (payload prefix {})",
                    provenant_model::event::truncate_for_report(payload_b64)
                ),
            )
        })
    }

    /// Counts distinct declared signers whose collected signature verifies
    /// against the same payload, then enforces the threshold.
    async fn verify_multisig(
        &self,
        payload: &[u8],
        path: &str,
        deadline: Option<Instant>,
        errors: &mut Vec<ValidationError>,
        multisig: &provenant_model::Multisig,
    ) {
        let mut verified: Vec<&str> = Vec::new();

        for collected in &multisig.signatures {
            if !multisig.signers.iter().any(|s| s == &collected.signer) {
                continue; // Signatures from undeclared signers do not count.
            }
            if verified.contains(&collected.signer.as_str()) {
                continue; // Distinct signers only.
            }
            let Some(payload_b64) = collected.signature.strip_prefix("ed25519:") else {
                continue;
            };
            if self
                .verify_one(&collected.signer, payload_b64, payload, path, deadline)
                .await
                .is_ok()
            {
                verified.push(&collected.signer);
            }
        }

        let threshold = multisig.threshold;
        if threshold >= 1 && (verified.len() as i64) < threshold {
            errors.push(ValidationError::new(
                EventKind::MultisigThresholdNotMet,
                Component::Signature,
                Some(format!("{path}.multisig")),
                format!(
                    "{} of {} required signatures verified",
                    verified.len(),
                    threshold
                ),
            ));
        }
    }

    /// Delegates credential-format modes to the collaborator, degrading to
    /// a capability warning when none is installed.
    fn verify_credential(
        &self,
        op: &Operation,
        att: &Attestation,
        path: &str,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<ValidationWarning>,
    ) {
        let Some(credentials) = self.credentials else {
            warnings.push(ValidationWarning::new(
                EventKind::CapabilityUnavailable,
                Component::Signature,
                Some(path.to_string()),
                format!(
                    "no credentials collaborator installed for `{}` attestations",
                    att.mode.as_str()
                ),
            ));
            return;
        };

        let payload = match signed_payload(op) {
            Ok(payload) => payload,
            Err(message) => {
                errors.push(ValidationError::new(
                    EventKind::CanonicalizationFailure,
                    Component::Signature,
                    Some(path.to_string()),
                    message,
                ));
                return;
            }
        };

        let verdict = match att.mode {
            AttestationMode::SdJwt => credentials.verify_sd_jwt(att, &payload),
            _ => credentials.verify_bbs_plus(att, &payload),
        };

        match verdict {
            Ok(true) => {}
            Ok(false) => errors.push(ValidationError::new(
                EventKind::SignatureInvalid,
                Component::Signature,
                Some(path.to_string()),
                format!("`{}` credential did not verify", att.mode.as_str()),
            )),
            Err(message) => warnings.push(ValidationWarning::new(
                EventKind::CapabilityUnavailable,
                Component::Signature,
                Some(path.to_string()),
                format!("credentials collaborator failed: {message}"),
            )),
        }
    }

    /// Detached verification over caller-supplied bytes; used for sealed
    /// policy assertions. `signature` carries its algorithm prefix.
    pub async fn verify_detached(
        &self,
        signer: &str,
        signature: &str,
        payload: &[u8],
        path: &str,
        deadline: Option<Instant>,
    ) -> Result<(), ValidationError> {
        let Some(payload_b64) = signature.strip_prefix("ed25519:") else {
            return Err(ValidationError::new(
                EventKind::AlgorithmUnsupported,
                Component::Signature,
                Some(path.to_string()),
                "only ed25519 signatures are verified here",
            ));
        };
        self.verify_one(signer, payload_b64, payload, path, deadline)
            .await
    }
}

/// Builds the signed payload for an operation: canonical bytes with
/// `attestation.signature` emptied in place and collected multisig
/// signatures removed.
pub fn signed_payload(op: &Operation) -> Result<Vec<u8>, String> {
    let mut value = serde_json::to_value(op).map_err(|e| e.to_string())?;

    if let Some(att) = value.get_mut("attestation") {
        if let Some(slot) = att.get_mut("signature") {
            *slot = Value::String(String::new());
        }
        if let Some(multisig) = att.get_mut("multisig") {
            if let Some(collected) = multisig.get_mut("signatures") {
                *collected = Value::Array(Vec::new());
            }
        }
    }

    canonicalize(&value)
        .map(String::into_bytes)
        .map_err(|e| e.to_string())
}

/// Maps a resolver failure onto the event taxonomy. Syntax failures keep
/// their own kinds; everything else collapses into one resolution-failed
/// event naming the inner failure class, so resolver internals stay out of
/// validator output.
fn resolution_event(error: &ResolveError, signer: &str, path: &str) -> ValidationError {
    let (kind, component) = match error {
        ResolveError::Malformed(_) => (EventKind::DidMalformed, Component::Signature),
        ResolveError::MethodUnsupported(_) => (EventKind::DidMethodUnsupported, Component::Signature),
        _ => (EventKind::DidResolutionFailed, Component::Signature),
    };
    let message = if error.is_syntax() {
        format!("signer `{signer}`: {error}")
    } else {
        format!("could not resolve `{signer}` ({})", error.label())
    };
    ValidationError::new(kind, component, Some(path.to_string()), message)
}
