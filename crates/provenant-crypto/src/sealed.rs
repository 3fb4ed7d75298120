//! # Sealed-Subgraph Checker
//!
//! A `sealed_subgraph` operation replaces an opaque pipeline segment with
//! a Merkle commitment: a root hash, a handful of exposed leaf hashes with
//! declared roles, and signed policy assertions from auditors who saw the
//! hidden interior.
//!
//! A sealed operation validates only when
//!
//! 1. the commitment root is well-formed,
//! 2. the sealed node itself carries a `signed` or `verifiable`
//!    attestation (whose signature the signature stage verifies),
//! 3. every policy assertion is signed by its asserting DID over the
//!    canonical assertion record and reports `pass`, and
//! 4. every exposed leaf that carries an inclusion proof verifies under
//!    the commitment root.
//!
//! Exposed leaves without proofs cannot be checked in isolation (the
//! preimages are deliberately withheld); they are left alone rather than
//! failed.

use crate::merkle::{root_from_inclusion, split_digests, TreeDigest, DIGEST_LEN};
use crate::signature::SignatureVerifier;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use provenant_model::canonical::canonical_bytes;
use provenant_model::{
    AttestationMode, Component, Document, EventKind, PolicyAssertion, PolicyResult,
    SealedCommitment, ValidationError,
};
use serde_json::json;
use std::time::Instant;
use tracing::debug;

/// Checks every sealed operation in the document. Policy-assertion
/// signatures resolve signer DIDs, hence async and deadline-aware.
pub async fn check_document(
    doc: &Document,
    signatures: &SignatureVerifier<'_>,
    deadline: Option<Instant>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (i, op) in doc.operations.iter().enumerate() {
        if !op.is_sealed() {
            continue;
        }
        // Presence/absence mismatches are the structural validator's call.
        let Some(sealed) = &op.sealed else { continue };
        check_sealed(op, sealed, i, signatures, deadline, &mut errors).await;
    }

    errors
}

async fn check_sealed(
    op: &provenant_model::Operation,
    sealed: &SealedCommitment,
    op_index: usize,
    signatures: &SignatureVerifier<'_>,
    deadline: Option<Instant>,
    errors: &mut Vec<ValidationError>,
) {
    let base = format!("operations[{op_index}].sealed");

    let root = match commitment_root(sealed) {
        Ok(root) => Some(root),
        Err(message) => {
            errors.push(ValidationError::new(
                EventKind::SealedCommitmentInvalid,
                Component::Sealed,
                Some(format!("{base}.merkle_root")),
                message,
            ));
            None
        }
    };

    match &op.attestation {
        Some(att)
            if matches!(
                att.mode,
                AttestationMode::Signed | AttestationMode::Verifiable
            ) => {}
        _ => {
            errors.push(ValidationError::new(
                EventKind::SealedCommitmentInvalid,
                Component::Sealed,
                Some(format!("operations[{op_index}]")),
                "sealed operations require an attestation of mode `signed` or `verifiable`",
            ));
        }
    }

    for (j, leaf) in sealed.leaves_exposed.iter().enumerate() {
        check_exposed_leaf(leaf, j, sealed, root, &base, errors);
    }

    for (j, assertion) in sealed.policy_assertions.iter().enumerate() {
        check_assertion(assertion, j, &base, signatures, deadline, errors).await;
    }
}

/// Decodes the `sha256:<hex>` commitment root into digest bytes. Only the
/// tree-hash algorithm is accepted; the commitment is a tree root, not a
/// content digest.
fn commitment_root(sealed: &SealedCommitment) -> Result<TreeDigest, String> {
    let Some((algorithm, hex_part)) = sealed.merkle_root.split_once(':') else {
        return Err("merkle_root is not `<algorithm>:<hex>`".to_string());
    };
    if algorithm != "sha256" {
        return Err(format!("merkle_root must be sha256, found `{algorithm}`"));
    }
    let bytes = hex::decode(hex_part).map_err(|e| format!("merkle_root hex: {e}"))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("merkle_root is {} bytes, expected {DIGEST_LEN}", bytes.len()))
}

fn check_exposed_leaf(
    leaf: &provenant_model::ExposedLeaf,
    leaf_index: usize,
    sealed: &SealedCommitment,
    root: Option<TreeDigest>,
    base: &str,
    errors: &mut Vec<ValidationError>,
) {
    let path = format!("{base}.leaves_exposed[{leaf_index}]");

    let leaf_digest = match decode_leaf_hash(&leaf.hash) {
        Ok(digest) => digest,
        Err(message) => {
            errors.push(ValidationError::new(
                EventKind::SealedCommitmentInvalid,
                Component::Sealed,
                Some(path),
                message,
            ));
            return;
        }
    };

    // A leaf is only checkable against the root when the document supplies
    // the proof, the position and the sealed tree size.
    let (Some(proof_b64), Some(index), Some(tree_size), Some(root)) =
        (&leaf.inclusion_proof, leaf.index, sealed.tree_size, root)
    else {
        return;
    };

    if index < 0 || tree_size < 1 {
        errors.push(ValidationError::new(
            EventKind::InclusionProofMalformed,
            Component::Sealed,
            Some(path),
            format!("index {index} / tree_size {tree_size} out of range"),
        ));
        return;
    }

    let siblings = match BASE64.decode(proof_b64).ok().and_then(|b| split_digests(&b)) {
        Some(siblings) => siblings,
        None => {
            errors.push(ValidationError::new(
                EventKind::InclusionProofMalformed,
                Component::Sealed,
                Some(path),
                "inclusion_proof does not decode to whole digests".to_string(),
            ));
            return;
        }
    };

    match root_from_inclusion(leaf_digest, index as u64, tree_size as u64, &siblings) {
        Ok(computed) if computed == root => {
            debug!(role = leaf.role.as_str(), "exposed leaf verified under commitment root");
        }
        Ok(_) => errors.push(ValidationError::new(
            EventKind::MerkleRootMismatch,
            Component::Sealed,
            Some(path),
            format!("`{}` leaf is not included under the commitment root", leaf.role.as_str()),
        )),
        Err(e) => errors.push(ValidationError::new(
            EventKind::InclusionProofMalformed,
            Component::Sealed,
            Some(path),
            e.to_string(),
        )),
    }
}

async fn check_assertion(
    assertion: &PolicyAssertion,
    assertion_index: usize,
    base: &str,
    signatures: &SignatureVerifier<'_>,
    deadline: Option<Instant>,
    errors: &mut Vec<ValidationError>,
) {
    let path = format!("{base}.policy_assertions[{assertion_index}]");

    if assertion.result != PolicyResult::Pass {
        errors.push(ValidationError::new(
            EventKind::SealedCommitmentInvalid,
            Component::Sealed,
            Some(path.clone()),
            format!(
                "policy `{}` reports `{}`; sealed operations require `pass`",
                assertion.id,
                assertion.result.as_str()
            ),
        ));
    }

    let Some(signature) = &assertion.signature else {
        errors.push(ValidationError::new(
            EventKind::SealedCommitmentInvalid,
            Component::Sealed,
            Some(path),
            format!("policy `{}` carries no signature", assertion.id),
        ));
        return;
    };

    let record = match assertion_record(assertion) {
        Ok(record) => record,
        Err(message) => {
            errors.push(ValidationError::new(
                EventKind::CanonicalizationFailure,
                Component::Sealed,
                Some(path),
                message,
            ));
            return;
        }
    };

    if let Err(mut event) = signatures
        .verify_detached(&assertion.signer, signature, &record, &path, deadline)
        .await
    {
        event.component = Component::Sealed;
        errors.push(event);
    }
}

/// Canonical bytes of the assertion record the auditor signed:
/// `{id, result, evidence_hash?}`.
pub fn assertion_record(assertion: &PolicyAssertion) -> Result<Vec<u8>, String> {
    let mut record = json!({
        "id": assertion.id,
        "result": assertion.result.as_str(),
    });
    if let Some(evidence) = &assertion.evidence_hash {
        record["evidence_hash"] = json!(evidence);
    }
    canonical_bytes(&record).map_err(|e| e.to_string())
}

fn decode_leaf_hash(text: &str) -> Result<TreeDigest, String> {
    let Some((algorithm, hex_part)) = text.split_once(':') else {
        return Err("leaf hash is not `<algorithm>:<hex>`".to_string());
    };
    if algorithm != "sha256" {
        return Err(format!("leaf hashes must be sha256, found `{algorithm}`"));
    }
    let bytes = hex::decode(hex_part).map_err(|e| format!("leaf hash hex: {e}"))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("leaf hash is {} bytes, expected {DIGEST_LEN}", bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::{leaf_hash, LogTree};
    use crate::signature::{signed_payload, SignatureOptions};
    use ed25519_dalek::{Signer, SigningKey};
    use provenant_did::key::encode_key_did;
    use provenant_did::{Resolver, ResolverConfig};
    use provenant_model::{Attestation, ExposedLeaf, LeafRole, Operation};
    use rand::rngs::OsRng;

    struct Harness {
        resolver: Resolver,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                resolver: Resolver::new(ResolverConfig::default()).unwrap(),
            }
        }

        async fn run(&self, doc: &Document) -> Vec<ValidationError> {
            let signatures =
                SignatureVerifier::new(&self.resolver, SignatureOptions::default(), None);
            check_document(doc, &signatures, None).await
        }
    }

    fn keypair() -> (SigningKey, String) {
        let signing = SigningKey::generate(&mut OsRng);
        let did = encode_key_did(signing.verifying_key().as_bytes());
        (signing, did)
    }

    fn signed_assertion(signing: &SigningKey, did: &str, result: &str) -> PolicyAssertion {
        let mut assertion = PolicyAssertion {
            id: "gg-cam-v1".into(),
            result: serde_json::from_value(json!(result)).unwrap(),
            signer: did.to_string(),
            evidence_hash: Some(format!("sha256:{}", hex::encode([7u8; 32]))),
            signature: None,
        };
        let record = assertion_record(&assertion).unwrap();
        assertion.signature =
            Some(format!("ed25519:{}", BASE64.encode(signing.sign(&record).to_bytes())));
        assertion
    }

    /// A sealed operation over a three-leaf hidden tree, exposing the
    /// first and last leaves with valid proofs.
    fn sealed_operation(signing: &SigningKey, did: &str) -> Operation {
        let preimages = [b"hidden-input".as_slice(), b"hidden-mid", b"hidden-output"];
        let tree = LogTree::from_preimages(preimages);
        let root = tree.root();

        let exposed = |index: u64, role: LeafRole| ExposedLeaf {
            role,
            hash: format!("sha256:{}", hex::encode(leaf_hash(preimages[index as usize]))),
            index: Some(index as i64),
            inclusion_proof: Some(BASE64.encode(tree.inclusion_proof(index).unwrap().concat())),
        };

        let mut op = Operation {
            id: "sealed1".into(),
            kind: "sealed_subgraph".into(),
            sealed: Some(SealedCommitment {
                merkle_root: format!("sha256:{}", hex::encode(root)),
                tree_size: Some(3),
                leaves_exposed: vec![
                    exposed(0, LeafRole::SubInput),
                    exposed(2, LeafRole::SubOutput),
                ],
                policy_assertions: vec![signed_assertion(signing, did, "pass")],
            }),
            attestation: Some(Attestation {
                mode: AttestationMode::Signed,
                timestamp: "2025-11-01T00:00:00Z".into(),
                signer: Some(did.to_string()),
                signature: Some("ed25519:".into()),
                ..Attestation::default()
            }),
            ..Operation::default()
        };

        let payload = signed_payload(&op).unwrap();
        op.attestation.as_mut().unwrap().signature =
            Some(format!("ed25519:{}", BASE64.encode(signing.sign(&payload).to_bytes())));
        op
    }

    fn doc_with(op: Operation) -> Document {
        Document {
            spec_version: "0.1.0".into(),
            operations: vec![op],
            ..Document::default()
        }
    }

    #[tokio::test]
    async fn complete_sealed_operation_passes() {
        let (signing, did) = keypair();
        let doc = doc_with(sealed_operation(&signing, &did));
        let errors = Harness::new().run(&doc).await;
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[tokio::test]
    async fn failing_policy_is_an_error() {
        let (signing, did) = keypair();
        let mut op = sealed_operation(&signing, &did);
        op.sealed.as_mut().unwrap().policy_assertions =
            vec![signed_assertion(&signing, &did, "fail")];

        let errors = Harness::new().run(&doc_with(op)).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, EventKind::SealedCommitmentInvalid);
    }

    #[tokio::test]
    async fn tampered_assertion_signature_rejected() {
        let (signing, did) = keypair();
        let mut op = sealed_operation(&signing, &did);
        // The auditor signed `pass`; the document claims a different id.
        op.sealed.as_mut().unwrap().policy_assertions[0].id = "gg-cam-v2".into();

        let errors = Harness::new().run(&doc_with(op)).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, EventKind::SignatureInvalid);
        assert_eq!(errors[0].component, Component::Sealed);
    }

    #[tokio::test]
    async fn unsigned_assertion_rejected() {
        let (signing, did) = keypair();
        let mut op = sealed_operation(&signing, &did);
        op.sealed.as_mut().unwrap().policy_assertions[0].signature = None;

        let errors = Harness::new().run(&doc_with(op)).await;
        assert_eq!(errors[0].kind, EventKind::SealedCommitmentInvalid);
    }

    #[tokio::test]
    async fn corrupted_leaf_proof_is_root_mismatch_only() {
        let (signing, did) = keypair();
        let mut op = sealed_operation(&signing, &did);
        {
            let sealed = op.sealed.as_mut().unwrap();
            let mut bytes = BASE64
                .decode(sealed.leaves_exposed[0].inclusion_proof.as_ref().unwrap())
                .unwrap();
            bytes[0] ^= 0x01;
            sealed.leaves_exposed[0].inclusion_proof = Some(BASE64.encode(bytes));
        }

        let errors = Harness::new().run(&doc_with(op)).await;
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(errors[0].kind, EventKind::MerkleRootMismatch);
    }

    #[tokio::test]
    async fn leaf_without_proof_is_tolerated() {
        let (signing, did) = keypair();
        let mut op = sealed_operation(&signing, &did);
        {
            let sealed = op.sealed.as_mut().unwrap();
            sealed.leaves_exposed[0].inclusion_proof = None;
            sealed.leaves_exposed[0].index = None;
        }

        let errors = Harness::new().run(&doc_with(op)).await;
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[tokio::test]
    async fn basic_attestation_on_sealed_node_rejected() {
        let (signing, did) = keypair();
        let mut op = sealed_operation(&signing, &did);
        op.attestation = Some(Attestation {
            mode: AttestationMode::Basic,
            timestamp: "2025-11-01T00:00:00Z".into(),
            ..Attestation::default()
        });

        let errors = Harness::new().run(&doc_with(op)).await;
        assert!(errors
            .iter()
            .any(|e| e.kind == EventKind::SealedCommitmentInvalid));
    }

    #[tokio::test]
    async fn malformed_root_rejected() {
        let (signing, did) = keypair();
        let mut op = sealed_operation(&signing, &did);
        op.sealed.as_mut().unwrap().merkle_root = "sha512:0011".into();

        let errors = Harness::new().run(&doc_with(op)).await;
        assert!(errors
            .iter()
            .any(|e| e.kind == EventKind::SealedCommitmentInvalid
                && e.path.as_deref() == Some("operations[0].sealed.merkle_root")));
    }
}
