//! End-to-end pipeline tests.
//!
//! Each scenario drives the full verifier over a real document (and real
//! files, keys and Merkle trees where needed) and checks the exact verdict
//! and event kinds the engine must produce.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use provenant_core::{CancelToken, EventKind, Mode, Verifier, VerifierConfig};
use provenant_crypto::merkle::{leaf_hash, LogTree};
use provenant_crypto::sealed::assertion_record;
use provenant_crypto::signature::signed_payload;
use provenant_did::key::encode_key_did;
use provenant_model::loader::to_canonical_string;
use provenant_model::{
    Attestation, AttestationMode, Document, Entity, ExposedLeaf, LeafRole, Operation,
    PolicyAssertion, PolicyResult, SealedCommitment, Tool, ToolType,
};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

fn verifier() -> Verifier {
    Verifier::new(VerifierConfig::default()).unwrap()
}

fn keypair() -> (SigningKey, String) {
    let signing = SigningKey::generate(&mut OsRng);
    let did = encode_key_did(signing.verifying_key().as_bytes());
    (signing, did)
}

async fn verify_doc(doc: &Document, base: &TempDir) -> provenant_core::report::ValidationResult {
    let canonical = to_canonical_string(doc).unwrap();
    verifier()
        .verify_bytes(canonical.as_bytes(), Some(base.path()), &CancelToken::new())
        .await
        .unwrap()
}

// =============================================================================
// SCENARIO: minimal valid document
// =============================================================================

fn minimal_document(dir: &TempDir) -> Document {
    std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
    let digest = hex::encode(Sha256::digest(b"a"));

    Document {
        spec_version: "0.1.0".into(),
        tools: vec![Tool {
            id: "mytool".into(),
            kind: ToolType::Software,
            version: Some("1.0".into()),
            ..Tool::default()
        }],
        entities: vec![Entity {
            id: "ent".into(),
            kind: "Text".into(),
            version: "1".into(),
            file: Some("./a.txt".into()),
            hash: Some(format!("sha256:{digest}")),
            ..Entity::default()
        }],
        operations: vec![Operation {
            id: "op1".into(),
            kind: "transform".into(),
            outputs: vec!["ent@1".into()],
            tool: Some("mytool@1.0".into()),
            attestation: Some(Attestation {
                mode: AttestationMode::Basic,
                timestamp: "2025-11-01T00:00:00Z".into(),
                ..Attestation::default()
            }),
            ..Operation::default()
        }],
        ..Document::default()
    }
}

#[tokio::test]
async fn minimal_valid_document_passes_clean() {
    let dir = TempDir::new().unwrap();
    let doc = minimal_document(&dir);

    let result = verify_doc(&doc, &dir).await;
    assert!(result.valid, "{:?}", result.errors);
    assert!(result.errors.is_empty());
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
}

#[tokio::test]
async fn minimal_document_with_absent_file_warns_but_validates() {
    let dir = TempDir::new().unwrap();
    let mut doc = minimal_document(&dir);
    doc.entities[0].file = Some("./not-written.txt".into());

    let result = verify_doc(&doc, &dir).await;
    assert!(result.valid);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].kind, EventKind::FileUnreadable);
}

#[tokio::test]
async fn human_form_verifies_via_verify_path() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
    let digest = hex::encode(Sha256::digest(b"a"));

    let yaml = format!(
        r#"
spec_version: 0.1.0
tools:
  - id: mytool
    type: Software
    version: "1.0"
entities:
  - id: ent
    type: Text
    version: "1"
    file: ./a.txt
    hash: sha256:{digest}
operations:
  - id: op1
    type: transform
    outputs: [ent@1]
    tool: mytool@1.0
    attestation:
      mode: basic
      timestamp: 2025-11-01T00:00:00Z
"#
    );
    let doc_path = dir.path().join("pipeline.gg.yaml");
    std::fs::write(&doc_path, yaml).unwrap();

    let result = verifier().verify_path(&doc_path).await.unwrap();
    assert!(result.valid, "{:?}", result.errors);
    assert!(result.warnings.is_empty());
}

// =============================================================================
// SCENARIO: signature verification
// =============================================================================

fn signed_document(signing: &SigningKey, did: &str) -> Document {
    let mut doc = Document {
        spec_version: "0.1.0".into(),
        entities: vec![Entity {
            id: "ent".into(),
            kind: "Text".into(),
            version: "1".into(),
            uri: Some("https://example.com/artifact".into()),
            ..Entity::default()
        }],
        operations: vec![Operation {
            id: "op1".into(),
            kind: "transform".into(),
            outputs: vec!["ent@1".into()],
            attestation: Some(Attestation {
                mode: AttestationMode::Signed,
                timestamp: "2025-11-01T00:00:00Z".into(),
                signer: Some(did.to_string()),
                signature: Some("ed25519:".into()),
                ..Attestation::default()
            }),
            ..Operation::default()
        }],
        ..Document::default()
    };

    let payload = signed_payload(&doc.operations[0]).unwrap();
    doc.operations[0].attestation.as_mut().unwrap().signature =
        Some(format!("ed25519:{}", BASE64.encode(signing.sign(&payload).to_bytes())));
    doc
}

#[tokio::test]
async fn properly_signed_document_validates() {
    let dir = TempDir::new().unwrap();
    let (signing, did) = keypair();

    let result = verify_doc(&signed_document(&signing, &did), &dir).await;
    assert!(result.valid, "{:?}", result.errors);
}

#[tokio::test]
async fn known_bad_signature_yields_exactly_one_signature_invalid() {
    let dir = TempDir::new().unwrap();
    let (signing, did) = keypair();
    let mut doc = signed_document(&signing, &did);
    doc.operations[0].attestation.as_mut().unwrap().signature =
        Some("ed25519:AAAA".into());

    let result = verify_doc(&doc, &dir).await;
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
    assert_eq!(result.errors[0].kind, EventKind::SignatureInvalid);
    assert_eq!(
        result.errors[0].path.as_deref(),
        Some("operations[0].attestation")
    );
}

// =============================================================================
// SCENARIO: path traversal
// =============================================================================

#[tokio::test]
async fn traversal_attempt_is_rejected_without_opening_the_file() {
    let dir = TempDir::new().unwrap();
    let mut doc = minimal_document(&dir);
    doc.entities[0].file = Some("../../../etc/passwd".into());

    let result = verify_doc(&doc, &dir).await;
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, EventKind::PathTraversalAttempt);
    // No read was attempted, so no readability event can exist.
    assert!(result
        .warnings
        .iter()
        .all(|w| w.kind != EventKind::FileUnreadable));
}

// =============================================================================
// SCENARIO: SSRF attempt through a signer DID
// =============================================================================

#[tokio::test]
async fn metadata_endpoint_signer_is_blocked_before_dispatch() {
    let dir = TempDir::new().unwrap();
    let (signing, _) = keypair();
    let mut doc = signed_document(&signing, "did:web:169.254.169.254");
    // Keep a syntactically fine 64-byte signature so the resolver is the
    // component under test.
    let payload = signed_payload(&doc.operations[0]).unwrap();
    doc.operations[0].attestation.as_mut().unwrap().signature =
        Some(format!("ed25519:{}", BASE64.encode(signing.sign(&payload).to_bytes())));

    let result = verify_doc(&doc, &dir).await;
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
    assert_eq!(result.errors[0].kind, EventKind::DidResolutionFailed);
    assert!(result.errors[0].message.contains("HostBlocked"));
}

// =============================================================================
// SCENARIO: sealed subgraph
// =============================================================================

fn sealed_document(signing: &SigningKey, did: &str) -> Document {
    let preimages = [b"hidden-in".as_slice(), b"hidden-mid", b"hidden-out"];
    let tree = LogTree::from_preimages(preimages);

    let exposed = |index: u64, role: LeafRole| ExposedLeaf {
        role,
        hash: format!("sha256:{}", hex::encode(leaf_hash(preimages[index as usize]))),
        index: Some(index as i64),
        inclusion_proof: Some(BASE64.encode(tree.inclusion_proof(index).unwrap().concat())),
    };

    let mut assertion = PolicyAssertion {
        id: "gg-cam-v1".into(),
        result: PolicyResult::Pass,
        signer: did.to_string(),
        evidence_hash: Some(format!("sha256:{}", hex::encode([5u8; 32]))),
        signature: None,
    };
    let record = assertion_record(&assertion).unwrap();
    assertion.signature =
        Some(format!("ed25519:{}", BASE64.encode(signing.sign(&record).to_bytes())));

    let mut op = Operation {
        id: "sealed1".into(),
        kind: "sealed_subgraph".into(),
        sealed: Some(SealedCommitment {
            merkle_root: format!("sha256:{}", hex::encode(tree.root())),
            tree_size: Some(3),
            leaves_exposed: vec![
                exposed(0, LeafRole::SubInput),
                exposed(2, LeafRole::SubOutput),
            ],
            policy_assertions: vec![assertion],
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

    Document {
        spec_version: "0.1.0".into(),
        operations: vec![op],
        ..Document::default()
    }
}

#[tokio::test]
async fn complete_sealed_subgraph_validates() {
    let dir = TempDir::new().unwrap();
    let (signing, did) = keypair();

    let result = verify_doc(&sealed_document(&signing, &did), &dir).await;
    assert!(result.valid, "{:?}", result.errors);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
}

#[tokio::test]
async fn corrupted_inclusion_proof_fails_while_attestation_still_verifies() {
    let dir = TempDir::new().unwrap();
    let (signing, did) = keypair();
    let mut doc = sealed_document(&signing, &did);

    {
        let sealed = doc.operations[0].sealed.as_mut().unwrap();
        let mut bytes = BASE64
            .decode(sealed.leaves_exposed[0].inclusion_proof.as_ref().unwrap())
            .unwrap();
        bytes[0] ^= 0x01;
        sealed.leaves_exposed[0].inclusion_proof = Some(BASE64.encode(bytes));
    }

    let result = verify_doc(&doc, &dir).await;
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
    assert_eq!(result.errors[0].kind, EventKind::MerkleRootMismatch);
    // The operation signature is untouched by the proof corruption: no
    // signature event anywhere.
    assert!(result
        .errors
        .iter()
        .all(|e| e.kind != EventKind::SignatureInvalid));
}

// =============================================================================
// DETERMINISM AND IDEMPOTENCE
// =============================================================================

#[tokio::test]
async fn same_input_emits_byte_identical_event_sequences() {
    let dir = TempDir::new().unwrap();
    let mut doc = minimal_document(&dir);
    // Salt the document with several independent problems.
    doc.entities[0].hash = Some(format!("sha256:{}", hex::encode([9u8; 32])));
    doc.operations[0].inputs = vec!["ghost@1".into(), "also-ghost@2".into()];

    let first = verify_doc(&doc, &dir).await;
    let second = verify_doc(&doc, &dir).await;

    assert!(!first.valid);
    assert_eq!(
        serde_json::to_string(&first.errors).unwrap(),
        serde_json::to_string(&second.errors).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&first.warnings).unwrap(),
        serde_json::to_string(&second.warnings).unwrap()
    );
}

#[tokio::test]
async fn second_run_hits_the_resolver_cache() {
    let dir = TempDir::new().unwrap();
    let (signing, did) = keypair();
    let doc = signed_document(&signing, &did);
    let canonical = to_canonical_string(&doc).unwrap();

    let verifier = verifier();
    let first = verifier
        .verify_bytes(canonical.as_bytes(), Some(dir.path()), &CancelToken::new())
        .await
        .unwrap();
    let cached_after_first = verifier.resolver().cached_keys();

    let second = verifier
        .verify_bytes(canonical.as_bytes(), Some(dir.path()), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(first.valid, second.valid);
    assert_eq!(verifier.resolver().cached_keys(), cached_after_first);
}

// =============================================================================
// MODES AND CANCELLATION
// =============================================================================

#[tokio::test]
async fn strict_mode_elevates_oversized_file_skip() {
    let dir = TempDir::new().unwrap();
    let mut doc = minimal_document(&dir);
    std::fs::write(dir.path().join("big.bin"), vec![0u8; 4096]).unwrap();
    doc.entities[0].file = Some("./big.bin".into());
    doc.entities[0].hash = Some(format!("sha256:{}", hex::encode([1u8; 32])));

    let mut config = VerifierConfig::default();
    config.hash.max_file_bytes = 1024;
    let standard = Verifier::new(config.clone()).unwrap();
    let canonical = to_canonical_string(&doc).unwrap();
    let result = standard
        .verify_bytes(canonical.as_bytes(), Some(dir.path()), &CancelToken::new())
        .await
        .unwrap();
    assert!(result.valid);
    assert_eq!(result.warnings[0].kind, EventKind::OversizedFileSkipped);

    config.mode = Mode::Strict;
    let strict = Verifier::new(config).unwrap();
    let result = strict
        .verify_bytes(canonical.as_bytes(), Some(dir.path()), &CancelToken::new())
        .await
        .unwrap();
    assert!(!result.valid);
    assert!(result
        .errors
        .iter()
        .any(|e| e.kind == EventKind::OversizedFileSkipped));
}

#[tokio::test]
async fn quiet_mode_suppresses_warnings() {
    let dir = TempDir::new().unwrap();
    let mut doc = minimal_document(&dir);
    doc.entities[0].file = Some("./absent.txt".into());

    let mut config = VerifierConfig::default();
    config.mode = Mode::Quiet;
    let canonical = to_canonical_string(&doc).unwrap();
    let result = Verifier::new(config)
        .unwrap()
        .verify_bytes(canonical.as_bytes(), Some(dir.path()), &CancelToken::new())
        .await
        .unwrap();
    assert!(result.valid);
    assert!(result.warnings.is_empty());
}

#[tokio::test]
async fn cancelled_call_returns_partial_result_with_marker() {
    let dir = TempDir::new().unwrap();
    let doc = minimal_document(&dir);
    let canonical = to_canonical_string(&doc).unwrap();

    let token = CancelToken::new();
    token.cancel();

    let result = verifier()
        .verify_bytes(canonical.as_bytes(), Some(dir.path()), &token)
        .await
        .unwrap();
    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == EventKind::Cancelled));
}

#[tokio::test]
async fn mock_signatures_accepted_only_with_the_flag() {
    let dir = TempDir::new().unwrap();
    let (signing, did) = keypair();
    let mut doc = signed_document(&signing, &did);
    doc.operations[0].attestation.as_mut().unwrap().signature =
        Some("ed25519:mock:valid".into());
    let canonical = to_canonical_string(&doc).unwrap();

    let result = verifier()
        .verify_bytes(canonical.as_bytes(), Some(dir.path()), &CancelToken::new())
        .await
        .unwrap();
    assert!(!result.valid);

    let mut config = VerifierConfig::default();
    config.allow_mock_signatures = true;
    let result = Verifier::new(config)
        .unwrap()
        .verify_bytes(canonical.as_bytes(), Some(dir.path()), &CancelToken::new())
        .await
        .unwrap();
    assert!(result.valid, "{:?}", result.errors);
}
