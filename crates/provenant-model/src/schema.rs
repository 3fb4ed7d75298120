//! # Schema Checker
//!
//! Enforces the declared structural schema over a loaded document: required
//! fields, closed enumerations, cardinalities and regex-shaped scalars.
//! The checker is a hand-written walker over the typed tree (plus the raw
//! tree for unknown-key detection); it reports an ordered sequence of
//! events and never aborts, so a document with ten shape problems surfaces
//! all ten in one pass.
//!
//! Schema results are advisory-but-binding: later pipeline stages still run
//! when violations exist, but their diagnostics are marked as follow-on.

use crate::document::{Document, Entity, Operation, Tool, MAX_HASH_LEN, MAX_SIGNATURE_LEN};
use crate::event::{Component, EventKind, ValidationError};
use crate::loader::LoadedDocument;
use regex::Regex;

/// Top-level keys the schema recognizes.
const ROOT_KEYS: &[&str] = &[
    "spec_version",
    "profile",
    "imports",
    "context",
    "tools",
    "entities",
    "operations",
];

/// The packaged schema, compiled once per checker.
pub struct SchemaChecker {
    spec_version: Regex,
    hash: Regex,
    did: Regex,
    signature: Regex,
    operation_type: Regex,
    entry_id: Regex,
}

impl SchemaChecker {
    pub fn new() -> Self {
        // Pattern literals are part of the schema; a failure to compile is a
        // build defect, not a runtime condition.
        Self {
            spec_version: Regex::new(r"^\d+\.\d+\.\d+$").unwrap(),
            hash: Regex::new(r"^(sha256|sha512|blake3):[a-f0-9]+$").unwrap(),
            did: Regex::new(r"^did:[a-z0-9]+:.+$").unwrap(),
            signature: Regex::new(r"^(ed25519|ecdsa|rsa):\S+$").unwrap(),
            operation_type: Regex::new(r"^[a-z][a-z0-9_]*$").unwrap(),
            entry_id: Regex::new(r"^[0-9a-f]+$").unwrap(),
        }
    }

    /// Walks the loaded document and returns every schema violation in
    /// document order.
    pub fn check(&self, loaded: &LoadedDocument) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Some(decode_error) = &loaded.decode_error {
            errors.push(violation(
                None,
                format!("document does not match the declared shape: {decode_error}"),
            ));
        }

        self.check_root(loaded, &mut errors);
        self.check_document(&loaded.document, &mut errors);
        errors
    }

    fn check_root(&self, loaded: &LoadedDocument, errors: &mut Vec<ValidationError>) {
        let Some(map) = loaded.value.as_object() else {
            return;
        };
        for key in map.keys() {
            if !ROOT_KEYS.contains(&key.as_str()) {
                errors.push(violation(
                    Some(key.clone()),
                    format!("unrecognized top-level key `{key}`"),
                ));
            }
        }
    }

    fn check_document(&self, doc: &Document, errors: &mut Vec<ValidationError>) {
        if doc.spec_version.is_empty() {
            errors.push(violation(
                Some("spec_version".to_string()),
                "spec_version is required",
            ));
        } else if !self.spec_version.is_match(&doc.spec_version) {
            errors.push(violation(
                Some("spec_version".to_string()),
                format!(
                    "spec_version `{}` is not a three-part numeric version",
                    doc.spec_version
                ),
            ));
        }

        for (i, tool) in doc.tools.iter().enumerate() {
            self.check_tool(tool, i, errors);
        }
        for (i, entity) in doc.entities.iter().enumerate() {
            self.check_entity(entity, i, errors);
        }
        for (i, op) in doc.operations.iter().enumerate() {
            self.check_operation(op, i, errors);
        }
    }

    fn check_tool(&self, tool: &Tool, index: usize, errors: &mut Vec<ValidationError>) {
        let at = |field: &str| Some(format!("tools[{index}].{field}"));

        if tool.id.is_empty() {
            errors.push(violation(at("id"), "tool id is required"));
        }
        if !tool.kind.is_known() {
            errors.push(violation(
                at("type"),
                format!("tool type `{}` is not in the closed set", tool.kind.as_str()),
            ));
        }
        if let Some(identity) = &tool.identity {
            if let Some(did) = &identity.did {
                if !self.did.is_match(did) {
                    errors.push(violation(
                        at("identity.did"),
                        format!("`{did}` is not a DID"),
                    ));
                }
            }
        }
    }

    fn check_entity(&self, entity: &Entity, index: usize, errors: &mut Vec<ValidationError>) {
        let at = |field: &str| Some(format!("entities[{index}].{field}"));

        if entity.id.is_empty() {
            errors.push(violation(at("id"), "entity id is required"));
        }
        if entity.version.is_empty() {
            errors.push(violation(at("version"), "entity version is required"));
        }

        match (&entity.file, &entity.uri) {
            (None, None) => errors.push(ValidationError::new(
                EventKind::CardinalityViolation,
                Component::Schema,
                Some(format!("entities[{index}]")),
                "exactly one of `file` or `uri` is required, found neither",
            )),
            (Some(_), Some(_)) => errors.push(ValidationError::new(
                EventKind::CardinalityViolation,
                Component::Schema,
                Some(format!("entities[{index}]")),
                "exactly one of `file` or `uri` is required, found both",
            )),
            _ => {}
        }

        if let Some(hash) = &entity.hash {
            self.check_hash(hash, at("hash"), errors);
        }
    }

    fn check_operation(&self, op: &Operation, index: usize, errors: &mut Vec<ValidationError>) {
        let at = |field: &str| Some(format!("operations[{index}].{field}"));

        if op.id.is_empty() {
            errors.push(violation(at("id"), "operation id is required"));
        }
        if op.kind.is_empty() {
            errors.push(violation(at("type"), "operation type is required"));
        } else if !self.operation_type.is_match(&op.kind) {
            errors.push(violation(
                at("type"),
                format!("operation type `{}` is not lowercase_with_underscores", op.kind),
            ));
        }

        if let Some(fidelity) = &op.fidelity {
            if !fidelity.expected.is_known() {
                errors.push(violation(
                    at("fidelity.expected"),
                    format!(
                        "fidelity tag `{}` is not in the closed set",
                        fidelity.expected.as_str()
                    ),
                ));
            }
        }

        if let Some(att) = &op.attestation {
            self.check_attestation(att, index, errors);
        }
        if let Some(sealed) = &op.sealed {
            self.check_sealed(sealed, index, errors);
        }
    }

    fn check_attestation(
        &self,
        att: &crate::document::Attestation,
        op_index: usize,
        errors: &mut Vec<ValidationError>,
    ) {
        let at = |field: &str| Some(format!("operations[{op_index}].attestation.{field}"));

        if !att.mode.is_known() {
            errors.push(violation(
                at("mode"),
                format!("attestation mode `{}` is not in the closed set", att.mode.as_str()),
            ));
        }

        if att.timestamp.is_empty() {
            errors.push(violation(at("timestamp"), "attestation timestamp is required"));
        } else if chrono::DateTime::parse_from_rfc3339(&att.timestamp).is_err() {
            errors.push(violation(
                at("timestamp"),
                format!("timestamp `{}` does not parse as ISO 8601", att.timestamp),
            ));
        }

        if let Some(signer) = &att.signer {
            if !self.did.is_match(signer) {
                errors.push(violation(at("signer"), format!("`{signer}` is not a DID")));
            }
        }
        if let Some(delegation) = &att.delegation {
            if !self.did.is_match(delegation) {
                errors.push(violation(
                    at("delegation"),
                    format!("`{delegation}` is not a DID"),
                ));
            }
        }
        if let Some(signature) = &att.signature {
            self.check_signature(signature, at("signature"), errors);
        }

        if let Some(multisig) = &att.multisig {
            for (i, signer) in multisig.signers.iter().enumerate() {
                if !self.did.is_match(signer) {
                    errors.push(violation(
                        at(&format!("multisig.signers[{i}]")),
                        format!("`{signer}` is not a DID"),
                    ));
                }
            }
            for (i, sig) in multisig.signatures.iter().enumerate() {
                self.check_signature(
                    &sig.signature,
                    at(&format!("multisig.signatures[{i}].signature")),
                    errors,
                );
            }
        }

        if let Some(entries) = &att.transparency {
            for (i, entry) in entries.iter().enumerate() {
                if entry.log_id.is_empty() {
                    errors.push(violation(
                        at(&format!("transparency[{i}].log_id")),
                        "log_id is required",
                    ));
                }
                if !self.entry_id.is_match(&entry.entry_id) {
                    errors.push(violation(
                        at(&format!("transparency[{i}].entry_id")),
                        format!("entry_id `{}` is not lowercase hex", entry.entry_id),
                    ));
                }
            }
        }
    }

    fn check_sealed(
        &self,
        sealed: &crate::document::SealedCommitment,
        op_index: usize,
        errors: &mut Vec<ValidationError>,
    ) {
        let at = |field: &str| Some(format!("operations[{op_index}].sealed.{field}"));

        if sealed.merkle_root.is_empty() {
            errors.push(violation(at("merkle_root"), "merkle_root is required"));
        } else {
            self.check_hash(&sealed.merkle_root, at("merkle_root"), errors);
        }

        for (i, leaf) in sealed.leaves_exposed.iter().enumerate() {
            if !leaf.role.is_known() {
                errors.push(violation(
                    at(&format!("leaves_exposed[{i}].role")),
                    format!("leaf role `{}` is not in the closed set", leaf.role.as_str()),
                ));
            }
            self.check_hash(&leaf.hash, at(&format!("leaves_exposed[{i}].hash")), errors);
        }

        for (i, assertion) in sealed.policy_assertions.iter().enumerate() {
            let field = |f: &str| at(&format!("policy_assertions[{i}].{f}"));
            if assertion.id.is_empty() {
                errors.push(violation(field("id"), "assertion id is required"));
            }
            if !assertion.result.is_known() {
                errors.push(violation(
                    field("result"),
                    format!(
                        "assertion result `{}` is not in the closed set",
                        assertion.result.as_str()
                    ),
                ));
            }
            if !self.did.is_match(&assertion.signer) {
                errors.push(violation(
                    field("signer"),
                    format!("`{}` is not a DID", assertion.signer),
                ));
            }
            if let Some(evidence) = &assertion.evidence_hash {
                self.check_hash(evidence, field("evidence_hash"), errors);
            }
            if let Some(signature) = &assertion.signature {
                self.check_signature(signature, field("signature"), errors);
            }
        }
    }

    fn check_hash(&self, hash: &str, path: Option<String>, errors: &mut Vec<ValidationError>) {
        if hash.len() > MAX_HASH_LEN {
            // Length caps are re-checked structurally; flag here too so the
            // regex below is never exercised on unbounded input.
            errors.push(ValidationError::new(
                EventKind::LengthCapExceeded,
                Component::Schema,
                path,
                format!("hash is {} characters, cap is {MAX_HASH_LEN}", hash.len()),
            ));
            return;
        }
        if !self.hash.is_match(hash) {
            errors.push(violation(
                path,
                format!("`{}` is not `<algorithm>:<lowercase-hex>`", crate::event::truncate_for_report(hash)),
            ));
        }
    }

    fn check_signature(
        &self,
        signature: &str,
        path: Option<String>,
        errors: &mut Vec<ValidationError>,
    ) {
        if signature.len() > MAX_SIGNATURE_LEN {
            errors.push(ValidationError::new(
                EventKind::LengthCapExceeded,
                Component::Schema,
                path,
                format!(
                    "signature is {} characters, cap is {MAX_SIGNATURE_LEN}",
                    signature.len()
                ),
            ));
            return;
        }
        if !self.signature.is_match(signature) {
            errors.push(ValidationError::new(
                EventKind::SignatureFormatMalformed,
                Component::Schema,
                path,
                "signature is not `<algorithm>:<payload>` with a known algorithm prefix",
            ));
        }
    }
}

impl Default for SchemaChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn violation(path: Option<String>, message: impl Into<String>) -> ValidationError {
    ValidationError::new(EventKind::SchemaViolation, Component::Schema, path, message)
}
