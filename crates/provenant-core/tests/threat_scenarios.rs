//! Boundary and hostile-input coverage through the full pipeline.
//!
//! | Threat | Component | Test |
//! |--------|-----------|------|
//! | Oversized document | Loader | `oversized_document_is_terminal` |
//! | Non-UTF-8 payload | Loader | `binary_garbage_is_terminal` |
//! | Sequence cap overflow | Structural | `tool_cap_boundary` |
//! | Circular derivations | Structural | `derivation_cycle_via_pipeline` |
//! | Sealed block missing | Structural | `sealed_subgraph_without_commitment` |
//! | Threshold gaming | Structural | `multisig_threshold_boundaries` |
//! | Private-range resolution | Resolver | `private_range_signers_never_resolve` |
//! | Identifier flooding | Structural | `identifier_length_cap` |

use provenant_core::{CancelToken, EngineError, EventKind, Verifier, VerifierConfig};
use provenant_model::document::{MAX_ID_LEN, MAX_TOOLS};
use tempfile::TempDir;

fn verifier() -> Verifier {
    Verifier::new(VerifierConfig::default()).unwrap()
}

async fn verify_text(text: &str) -> provenant_core::ValidationResult {
    let dir = TempDir::new().unwrap();
    verifier()
        .verify_bytes(text.as_bytes(), Some(dir.path()), &CancelToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn oversized_document_is_terminal() {
    let mut config = VerifierConfig::default();
    config.loader.max_document_bytes = 64;
    let verifier = Verifier::new(config).unwrap();

    let doc = format!("spec_version: 0.1.0\n# {}\n", "x".repeat(256));
    let err = verifier
        .verify_bytes(doc.as_bytes(), None, &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Load(_)));
}

#[tokio::test]
async fn binary_garbage_is_terminal() {
    let err = verifier()
        .verify_bytes(&[0xde, 0xad, 0xbe, 0xef, 0xff], None, &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Load(_)));
}

#[tokio::test]
async fn empty_sequences_are_fine() {
    let result = verify_text("spec_version: 0.1.0\ntools: []\nentities: []\noperations: []\n").await;
    assert!(result.valid, "{:?}", result.errors);
}

#[tokio::test]
async fn single_element_sequences_are_fine() {
    let result = verify_text(
        "spec_version: 0.1.0\ntools:\n  - id: t\n    type: Service\n",
    )
    .await;
    assert!(result.valid, "{:?}", result.errors);
}

#[tokio::test]
async fn tool_cap_boundary() {
    let mut at_cap = String::from("spec_version: 0.1.0\ntools:\n");
    for i in 0..MAX_TOOLS {
        at_cap.push_str(&format!("  - id: t{i}\n    type: Software\n"));
    }
    let result = verify_text(&at_cap).await;
    assert!(result.valid, "exactly the cap must pass");

    let mut over_cap = at_cap.clone();
    over_cap.push_str(&format!("  - id: t{MAX_TOOLS}\n    type: Software\n"));
    let result = verify_text(&over_cap).await;
    assert!(!result.valid);
    assert!(result
        .errors
        .iter()
        .any(|e| e.kind == EventKind::CardinalityViolation && e.path.as_deref() == Some("tools")));
}

#[tokio::test]
async fn identifier_length_cap() {
    let at_cap = format!(
        "spec_version: 0.1.0\ntools:\n  - id: {}\n    type: Software\n",
        "a".repeat(MAX_ID_LEN)
    );
    assert!(verify_text(&at_cap).await.valid);

    let over_cap = format!(
        "spec_version: 0.1.0\ntools:\n  - id: {}\n    type: Software\n",
        "a".repeat(MAX_ID_LEN + 1)
    );
    let result = verify_text(&over_cap).await;
    assert!(!result.valid);
    assert!(result
        .errors
        .iter()
        .any(|e| e.kind == EventKind::LengthCapExceeded));
}

#[tokio::test]
async fn derivation_cycle_via_pipeline() {
    let result = verify_text(
        r#"
spec_version: 0.1.0
entities:
  - id: a
    type: T
    version: "1"
    uri: https://example.com/a
    derived_from: [b@1]
  - id: b
    type: T
    version: "1"
    uri: https://example.com/b
    derived_from: [c@1]
  - id: c
    type: T
    version: "1"
    uri: https://example.com/c
    derived_from: [a@1]
"#,
    )
    .await;
    assert!(!result.valid);
    assert!(result
        .errors
        .iter()
        .any(|e| e.kind == EventKind::DerivationCycle));
}

#[tokio::test]
async fn sealed_subgraph_without_commitment() {
    let result = verify_text(
        "spec_version: 0.1.0\noperations:\n  - id: op\n    type: sealed_subgraph\n    attestation:\n      mode: basic\n      timestamp: 2025-11-01T00:00:00Z\n",
    )
    .await;
    assert!(!result.valid);
    assert!(result
        .errors
        .iter()
        .any(|e| e.kind == EventKind::SealedCommitmentInvalid));
}

#[tokio::test]
async fn multisig_threshold_boundaries() {
    for (threshold, expect_violation) in [(0, true), (1, false), (2, false), (3, true)] {
        let doc = format!(
            r#"
spec_version: 0.1.0
operations:
  - id: op
    type: transform
    attestation:
      mode: signed
      timestamp: 2025-11-01T00:00:00Z
      signer: did:key:z6MkfakeSigner
      signature: "ed25519:mock:valid"
      multisig:
        threshold: {threshold}
        signers: [did:key:z6Mka, did:key:z6Mkb]
"#
        );
        let mut config = VerifierConfig::default();
        config.allow_mock_signatures = true;
        let result = Verifier::new(config)
            .unwrap()
            .verify_bytes(doc.as_bytes(), None, &CancelToken::new())
            .await
            .unwrap();

        let has_violation = result
            .errors
            .iter()
            .any(|e| e.kind == EventKind::CardinalityViolation);
        assert_eq!(has_violation, expect_violation, "threshold {threshold}");
    }
}

#[tokio::test]
async fn private_range_signers_never_resolve() {
    for authority in ["127.0.0.1", "10.1.2.3", "192.168.7.7", "172.16.9.9", "localhost"] {
        let doc = format!(
            r#"
spec_version: 0.1.0
operations:
  - id: op
    type: transform
    attestation:
      mode: signed
      timestamp: 2025-11-01T00:00:00Z
      signer: did:web:{authority}
      signature: "ed25519:{}"
"#,
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, [0u8; 64])
        );
        let result = verify_text(&doc).await;
        assert!(!result.valid, "{authority}");
        let event = result
            .errors
            .iter()
            .find(|e| e.kind == EventKind::DidResolutionFailed)
            .unwrap_or_else(|| panic!("no resolution event for {authority}"));
        assert!(event.message.contains("HostBlocked"), "{authority}: {event}");
    }
}

#[tokio::test]
async fn root_level_attestation_is_flagged() {
    let result = verify_text(
        "spec_version: 0.1.0\nattestation:\n  mode: basic\n  timestamp: 2025-11-01T00:00:00Z\n",
    )
    .await;
    assert!(!result.valid);
    assert!(result
        .errors
        .iter()
        .any(|e| e.kind == EventKind::SchemaViolation && e.path.as_deref() == Some("attestation")));
}

#[tokio::test]
async fn schema_violations_mark_later_findings_as_follow_on() {
    // Bad spec_version (schema) plus an unresolved reference (structural).
    let result = verify_text(
        "spec_version: nope\noperations:\n  - id: op\n    type: transform\n    inputs: [ghost@1]\n",
    )
    .await;
    assert!(!result.valid);

    let schema_event = result
        .errors
        .iter()
        .find(|e| e.kind == EventKind::SchemaViolation)
        .unwrap();
    assert!(!schema_event.follow_on);

    let structural_event = result
        .errors
        .iter()
        .find(|e| e.kind == EventKind::UnresolvedReference)
        .unwrap();
    assert!(structural_event.follow_on);
}

#[tokio::test]
async fn multisig_threshold_zero_with_empty_signers() {
    let doc = r#"
spec_version: 0.1.0
operations:
  - id: op
    type: transform
    attestation:
      mode: signed
      timestamp: 2025-11-01T00:00:00Z
      signer: did:key:z6MkfakeSigner
      signature: "ed25519:mock:valid"
      multisig:
        threshold: 0
        signers: []
"#;
    let mut config = VerifierConfig::default();
    config.allow_mock_signatures = true;
    let result = Verifier::new(config)
        .unwrap()
        .verify_bytes(doc.as_bytes(), None, &CancelToken::new())
        .await
        .unwrap();
    assert!(!result.valid);
    assert!(result
        .errors
        .iter()
        .any(|e| e.kind == EventKind::CardinalityViolation));
}
