//! # Transparency-Anchor Checker
//!
//! Binds an operation to one or more append-only-log entries. The leaf
//! preimage is the canonical serialization of the operation with the
//! `transparency` field itself elided, which breaks the circularity of a
//! proof that would otherwise cover its own bytes.
//!
//! This checker runs offline: proof bytes, roots and sizes must all be
//! carried in the document. Anchors for two or more distinct logs form a
//! multi-witness set; each entry must verify independently, failures
//! isolate to the offending log, and partial success is reported as an
//! incomplete witness set on top of the per-entry events.

use crate::merkle::{
    leaf_hash, root_from_inclusion, split_digests, verify_consistency, TreeDigest, DIGEST_LEN,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use provenant_model::canonical::canonicalize;
use provenant_model::{
    Component, Document, EventKind, Operation, TransparencyAnchor, ValidationError,
};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// Checks every transparency anchor in the document. Pure computation,
/// no network.
pub fn check_document(doc: &Document) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (i, op) in doc.operations.iter().enumerate() {
        let Some(att) = &op.attestation else { continue };
        let Some(entries) = &att.transparency else { continue };
        if entries.is_empty() {
            continue;
        }
        check_operation(op, entries, i, &mut errors);
    }

    errors
}

fn check_operation(
    op: &Operation,
    entries: &[TransparencyAnchor],
    op_index: usize,
    errors: &mut Vec<ValidationError>,
) {
    let base_path = format!("operations[{op_index}].attestation.transparency");

    let leaf = match anchored_leaf(op) {
        Ok(leaf) => leaf,
        Err(message) => {
            errors.push(ValidationError::new(
                EventKind::CanonicalizationFailure,
                Component::Transparency,
                Some(base_path),
                message,
            ));
            return;
        }
    };

    let distinct_logs: BTreeSet<&str> = entries.iter().map(|e| e.log_id.as_str()).collect();
    let multi_witness = distinct_logs.len() >= 2;

    let mut failed_logs: BTreeSet<&str> = BTreeSet::new();
    let mut verified_any = false;

    for (j, entry) in entries.iter().enumerate() {
        let path = format!("{base_path}[{j}]");
        let before = errors.len();
        check_entry(entry, leaf, &path, errors);
        if errors.len() == before {
            verified_any = true;
            debug!(log = %entry.log_id, "transparency anchor verified");
        } else {
            failed_logs.insert(entry.log_id.as_str());
        }
    }

    if multi_witness && verified_any && !failed_logs.is_empty() {
        let offenders: Vec<&str> = failed_logs.into_iter().collect();
        errors.push(ValidationError::new(
            EventKind::MultiWitnessIncomplete,
            Component::Transparency,
            Some(base_path),
            format!(
                "operation digest is not witnessed by every declared log (failing: {})",
                offenders.join(", ")
            ),
        ));
    }
}

fn check_entry(
    entry: &TransparencyAnchor,
    leaf: TreeDigest,
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    let mut fail = |kind: EventKind, message: String| {
        errors.push(ValidationError::new(
            kind,
            Component::Transparency,
            Some(path.to_string()),
            message,
        ));
    };

    if entry.tree_size < 1 {
        fail(
            EventKind::InclusionProofMalformed,
            format!("tree_size {} is not a positive integer", entry.tree_size),
        );
        return;
    }
    let tree_size = entry.tree_size as u64;

    let index = match u64::from_str_radix(&entry.entry_id, 16) {
        Ok(index) => index,
        Err(_) => {
            fail(
                EventKind::InclusionProofMalformed,
                format!("entry_id `{}` is not hex", entry.entry_id),
            );
            return;
        }
    };

    let Some(root_b64) = &entry.root_hash else {
        fail(
            EventKind::InclusionProofMalformed,
            "offline verification requires the log root to be carried in `root_hash`".to_string(),
        );
        return;
    };
    let root = match decode_digest(root_b64) {
        Ok(root) => root,
        Err(message) => {
            fail(EventKind::InclusionProofMalformed, format!("root_hash: {message}"));
            return;
        }
    };

    let siblings = match BASE64.decode(&entry.inclusion_proof) {
        Ok(bytes) => match split_digests(&bytes) {
            Some(siblings) => siblings,
            None => {
                fail(
                    EventKind::InclusionProofMalformed,
                    format!(
                        "inclusion_proof is {} bytes, not a whole number of {DIGEST_LEN}-byte digests",
                        bytes.len()
                    ),
                );
                return;
            }
        },
        Err(e) => {
            fail(
                EventKind::InclusionProofMalformed,
                format!("inclusion_proof is not base64: {e}"),
            );
            return;
        }
    };

    match root_from_inclusion(leaf, index, tree_size, &siblings) {
        Ok(computed) if computed == root => {}
        Ok(_) => {
            fail(
                EventKind::MerkleRootMismatch,
                format!(
                    "log `{}`: recomputed root does not match the anchored root",
                    entry.log_id
                ),
            );
            return;
        }
        Err(e) => {
            fail(EventKind::InclusionProofMalformed, e.to_string());
            return;
        }
    }

    if let Some(consistency_b64) = &entry.consistency_proof {
        check_entry_consistency(entry, consistency_b64, &root, tree_size, path, errors);
    }
}

fn check_entry_consistency(
    entry: &TransparencyAnchor,
    consistency_b64: &str,
    root: &TreeDigest,
    tree_size: u64,
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    let mut fail = |kind: EventKind, message: String| {
        errors.push(ValidationError::new(
            kind,
            Component::Transparency,
            Some(path.to_string()),
            message,
        ));
    };

    let (Some(prev_size), Some(prev_root_b64)) = (entry.prev_tree_size, &entry.prev_root_hash)
    else {
        fail(
            EventKind::ConsistencyProofMalformed,
            "consistency_proof requires prev_tree_size and prev_root_hash".to_string(),
        );
        return;
    };
    if prev_size < 1 {
        fail(
            EventKind::ConsistencyProofMalformed,
            format!("prev_tree_size {prev_size} is not a positive integer"),
        );
        return;
    }

    let prev_root = match decode_digest(prev_root_b64) {
        Ok(prev_root) => prev_root,
        Err(message) => {
            fail(
                EventKind::ConsistencyProofMalformed,
                format!("prev_root_hash: {message}"),
            );
            return;
        }
    };

    let proof = match BASE64.decode(consistency_b64) {
        Ok(bytes) => match split_digests(&bytes) {
            Some(proof) => proof,
            None => {
                fail(
                    EventKind::ConsistencyProofMalformed,
                    "consistency_proof is not a whole number of digests".to_string(),
                );
                return;
            }
        },
        Err(e) => {
            fail(
                EventKind::ConsistencyProofMalformed,
                format!("consistency_proof is not base64: {e}"),
            );
            return;
        }
    };

    match verify_consistency(prev_size as u64, &prev_root, tree_size, root, &proof) {
        Ok(true) => {}
        Ok(false) => fail(
            EventKind::MerkleRootMismatch,
            format!(
                "log `{}`: old tree is not a prefix of the anchored tree",
                entry.log_id
            ),
        ),
        Err(e) => fail(EventKind::ConsistencyProofMalformed, e.to_string()),
    }
}

/// Leaf preimage for a transparency anchor: the canonical operation with
/// the `transparency` field removed.
pub fn anchored_leaf(op: &Operation) -> Result<TreeDigest, String> {
    Ok(leaf_hash(&anchored_preimage(op)?))
}

/// The exact bytes a log is expected to have recorded for this operation.
pub fn anchored_preimage(op: &Operation) -> Result<Vec<u8>, String> {
    let mut value = serde_json::to_value(op).map_err(|e| e.to_string())?;
    if let Some(Value::Object(att)) = value.get_mut("attestation") {
        att.remove("transparency");
    }
    canonicalize(&value)
        .map(String::into_bytes)
        .map_err(|e| e.to_string())
}

fn decode_digest(b64: &str) -> Result<TreeDigest, String> {
    let bytes = BASE64.decode(b64).map_err(|e| format!("not base64: {e}"))?;
    let digest: TreeDigest = bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("{} bytes, expected {DIGEST_LEN}", bytes.len()))?;
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::LogTree;
    use provenant_model::{Attestation, AttestationMode};

    fn operation_with(entries: Vec<TransparencyAnchor>) -> Operation {
        Operation {
            id: "op1".into(),
            kind: "transform".into(),
            outputs: vec!["ent@1".into()],
            attestation: Some(Attestation {
                mode: AttestationMode::Basic,
                timestamp: "2025-11-01T00:00:00Z".into(),
                transparency: Some(entries),
                ..Attestation::default()
            }),
            ..Operation::default()
        }
    }

    /// Builds a log containing the operation's preimage at `index` among
    /// `total` leaves, returning a fully-populated anchor.
    fn anchor_for(op: &Operation, log_id: &str, index: u64, total: u64) -> TransparencyAnchor {
        let mut tree = LogTree::new();
        for i in 0..total {
            if i == index {
                tree.push_preimage(&anchored_preimage(op).unwrap());
            } else {
                tree.push_preimage(format!("filler-{i}").as_bytes());
            }
        }
        TransparencyAnchor {
            log_id: log_id.into(),
            entry_id: format!("{index:x}"),
            tree_size: total as i64,
            inclusion_proof: BASE64.encode(
                tree.inclusion_proof(index)
                    .unwrap()
                    .concat(),
            ),
            root_hash: Some(BASE64.encode(tree.root())),
            ..TransparencyAnchor::default()
        }
    }

    fn doc_with(op: Operation) -> Document {
        Document {
            spec_version: "0.1.0".into(),
            operations: vec![op],
            ..Document::default()
        }
    }

    #[test]
    fn valid_anchor_verifies() {
        let mut op = operation_with(Vec::new());
        let anchor = anchor_for(&op, "log-a", 2, 5);
        op.attestation.as_mut().unwrap().transparency = Some(vec![anchor]);

        let errors = check_document(&doc_with(op));
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn anchor_is_independent_of_its_own_bytes() {
        // Adding a second anchor must not invalidate the first: the
        // preimage elides the whole transparency sequence.
        let mut op = operation_with(Vec::new());
        let first = anchor_for(&op, "log-a", 0, 3);
        let second = anchor_for(&op, "log-b", 1, 8);
        op.attestation.as_mut().unwrap().transparency = Some(vec![first, second]);

        let errors = check_document(&doc_with(op));
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn corrupted_proof_is_root_mismatch() {
        let mut op = operation_with(Vec::new());
        let mut anchor = anchor_for(&op, "log-a", 2, 5);

        let mut bytes = BASE64.decode(&anchor.inclusion_proof).unwrap();
        bytes[0] ^= 0x01;
        anchor.inclusion_proof = BASE64.encode(bytes);
        op.attestation.as_mut().unwrap().transparency = Some(vec![anchor]);

        let errors = check_document(&doc_with(op));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, EventKind::MerkleRootMismatch);
    }

    #[test]
    fn missing_root_rejected_offline() {
        let mut op = operation_with(Vec::new());
        let mut anchor = anchor_for(&op, "log-a", 0, 1);
        anchor.root_hash = None;
        op.attestation.as_mut().unwrap().transparency = Some(vec![anchor]);

        let errors = check_document(&doc_with(op));
        assert_eq!(errors[0].kind, EventKind::InclusionProofMalformed);
    }

    #[test]
    fn ragged_proof_bytes_rejected() {
        let mut op = operation_with(Vec::new());
        let mut anchor = anchor_for(&op, "log-a", 2, 5);
        let mut bytes = BASE64.decode(&anchor.inclusion_proof).unwrap();
        bytes.pop();
        anchor.inclusion_proof = BASE64.encode(bytes);
        op.attestation.as_mut().unwrap().transparency = Some(vec![anchor]);

        let errors = check_document(&doc_with(op));
        assert_eq!(errors[0].kind, EventKind::InclusionProofMalformed);
    }

    #[test]
    fn zero_tree_size_rejected() {
        let mut op = operation_with(Vec::new());
        let mut anchor = anchor_for(&op, "log-a", 0, 1);
        anchor.tree_size = 0;
        op.attestation.as_mut().unwrap().transparency = Some(vec![anchor]);

        let errors = check_document(&doc_with(op));
        assert_eq!(errors[0].kind, EventKind::InclusionProofMalformed);
    }

    #[test]
    fn multi_witness_partial_failure_isolates_and_reports() {
        let mut op = operation_with(Vec::new());
        let good = anchor_for(&op, "log-a", 0, 4);
        let mut bad = anchor_for(&op, "log-b", 1, 4);
        let mut bytes = BASE64.decode(&bad.inclusion_proof).unwrap();
        bytes[0] ^= 0xff;
        bad.inclusion_proof = BASE64.encode(bytes);
        op.attestation.as_mut().unwrap().transparency = Some(vec![good, bad]);

        let errors = check_document(&doc_with(op));
        let kinds: Vec<EventKind> = errors.iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&EventKind::MerkleRootMismatch));
        assert!(kinds.contains(&EventKind::MultiWitnessIncomplete));
        let incomplete = errors
            .iter()
            .find(|e| e.kind == EventKind::MultiWitnessIncomplete)
            .unwrap();
        assert!(incomplete.message.contains("log-b"));
        assert!(!incomplete.message.contains("log-a"));
    }

    #[test]
    fn same_log_entries_are_not_multi_witness() {
        let mut op = operation_with(Vec::new());
        let good = anchor_for(&op, "log-a", 0, 4);
        let mut bad = anchor_for(&op, "log-a", 1, 4);
        bad.entry_id = "3".into(); // Wrong index, proof no longer matches.
        op.attestation.as_mut().unwrap().transparency = Some(vec![good, bad]);

        let errors = check_document(&doc_with(op));
        assert!(errors
            .iter()
            .all(|e| e.kind != EventKind::MultiWitnessIncomplete));
    }

    #[test]
    fn consistency_proof_verifies_when_prev_fields_present() {
        let mut op = operation_with(Vec::new());

        // The log held 3 entries when observed earlier and 6 now.
        let mut tree = LogTree::new();
        tree.push_preimage(&anchored_preimage(&op).unwrap());
        for i in 1..6u32 {
            tree.push_preimage(format!("filler-{i}").as_bytes());
        }
        let mut old = LogTree::new();
        old.push_preimage(&anchored_preimage(&op).unwrap());
        for i in 1..3u32 {
            old.push_preimage(format!("filler-{i}").as_bytes());
        }

        let anchor = TransparencyAnchor {
            log_id: "log-a".into(),
            entry_id: "0".into(),
            tree_size: 6,
            inclusion_proof: BASE64.encode(tree.inclusion_proof(0).unwrap().concat()),
            root_hash: Some(BASE64.encode(tree.root())),
            consistency_proof: Some(BASE64.encode(tree.consistency_proof(3).unwrap().concat())),
            prev_tree_size: Some(3),
            prev_root_hash: Some(BASE64.encode(old.root())),
        };
        op.attestation.as_mut().unwrap().transparency = Some(vec![anchor]);

        let errors = check_document(&doc_with(op));
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn consistency_without_prev_fields_rejected() {
        let mut op = operation_with(Vec::new());
        let mut anchor = anchor_for(&op, "log-a", 0, 4);
        anchor.consistency_proof = Some(BASE64.encode([0u8; 32]));
        op.attestation.as_mut().unwrap().transparency = Some(vec![anchor]);

        let errors = check_document(&doc_with(op));
        assert_eq!(errors[0].kind, EventKind::ConsistencyProofMalformed);
    }
}
