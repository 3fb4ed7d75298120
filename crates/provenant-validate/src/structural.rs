//! # Structural Validator
//!
//! Cross-reference and cardinality checks over the typed document, run in a
//! fixed order so the emitted event sequence is stable:
//!
//! 1. Sequence size caps and identifier length caps.
//! 2. Identifier uniqueness within each sequence.
//! 3. Reference resolution (`inputs`, `outputs`, `derived_from`, `tool`)
//!    and acyclicity of the derivation graph.
//! 4. Attestation-mode prerequisites.
//! 5. Sealed-operation typing.
//! 6. Realized-capability consistency (warnings only).
//!
//! Every check reports and continues; nothing here aborts the pipeline.

use crate::index::DocumentIndex;
use provenant_model::{
    AttestationMode, Document, EventKind, NodeRef, ValidationError, ValidationWarning,
};
use provenant_model::document::{
    LeafRole, MAX_ENTITIES, MAX_ID_LEN, MAX_OPERATIONS, MAX_TOOLS,
};
use provenant_model::Component;
use serde_json::Value;
use tracing::debug;

/// Runs the ordered structural checks.
pub struct StructuralValidator;

impl StructuralValidator {
    /// Validates the document, returning error and warning streams in
    /// emission order.
    pub fn validate(doc: &Document) -> (Vec<ValidationError>, Vec<ValidationWarning>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        check_caps(doc, &mut errors);

        let index = DocumentIndex::build(doc);
        for (kind, id, position) in index.duplicates() {
            let path = match *kind {
                "entity" => format!("entities[{position}]"),
                "tool" => format!("tools[{position}]"),
                _ => format!("operations[{position}]"),
            };
            errors.push(err(
                EventKind::DuplicateId,
                path,
                format!("duplicate {kind} id `{id}`"),
            ));
        }

        check_references(doc, &index, &mut errors);
        check_derivation_dag(doc, &index, &mut errors);
        check_attestations(doc, &mut errors);
        check_sealed_typing(doc, &mut errors, &mut warnings);
        check_capabilities(doc, &index, &mut warnings);

        debug!(
            errors = errors.len(),
            warnings = warnings.len(),
            "structural validation finished"
        );
        (errors, warnings)
    }
}

fn err(kind: EventKind, path: String, message: impl Into<String>) -> ValidationError {
    ValidationError::new(kind, Component::Structural, Some(path), message)
}

fn check_caps(doc: &Document, errors: &mut Vec<ValidationError>) {
    let caps: [(&str, usize, usize); 3] = [
        ("entities", doc.entities.len(), MAX_ENTITIES),
        ("operations", doc.operations.len(), MAX_OPERATIONS),
        ("tools", doc.tools.len(), MAX_TOOLS),
    ];
    for (name, actual, cap) in caps {
        if actual > cap {
            errors.push(err(
                EventKind::CardinalityViolation,
                name.to_string(),
                format!("{actual} {name} declared, cap is {cap}"),
            ));
        }
    }

    let too_long = |id: &str| id.chars().count() > MAX_ID_LEN;
    for (i, tool) in doc.tools.iter().enumerate() {
        if too_long(&tool.id) {
            errors.push(err(
                EventKind::LengthCapExceeded,
                format!("tools[{i}].id"),
                format!("id exceeds {MAX_ID_LEN} characters"),
            ));
        }
    }
    for (i, entity) in doc.entities.iter().enumerate() {
        if too_long(&entity.id) {
            errors.push(err(
                EventKind::LengthCapExceeded,
                format!("entities[{i}].id"),
                format!("id exceeds {MAX_ID_LEN} characters"),
            ));
        }
    }
    for (i, op) in doc.operations.iter().enumerate() {
        if too_long(&op.id) {
            errors.push(err(
                EventKind::LengthCapExceeded,
                format!("operations[{i}].id"),
                format!("id exceeds {MAX_ID_LEN} characters"),
            ));
        }
    }
}

fn check_references(doc: &Document, index: &DocumentIndex, errors: &mut Vec<ValidationError>) {
    let entity_ref = |text: &str, path: String, errors: &mut Vec<ValidationError>| {
        match NodeRef::parse(text) {
            Some(reference) if reference.version.is_some() => {
                if index.resolve_entity(&reference).is_none() {
                    let hint = if index.knows_entity_id(&reference.id) {
                        " (id exists under a different version)"
                    } else {
                        ""
                    };
                    errors.push(err(
                        EventKind::UnresolvedReference,
                        path,
                        format!("`{text}` does not name a declared entity{hint}"),
                    ));
                }
            }
            Some(_) => errors.push(err(
                EventKind::UnresolvedReference,
                path,
                format!("entity reference `{text}` requires an explicit version"),
            )),
            None => errors.push(err(
                EventKind::UnresolvedReference,
                path,
                format!("`{text}` is not an `id@version` reference"),
            )),
        }
    };

    for (i, entity) in doc.entities.iter().enumerate() {
        for (j, parent) in entity.derived_from.iter().enumerate() {
            entity_ref(parent, format!("entities[{i}].derived_from[{j}]"), errors);
        }
    }

    for (i, op) in doc.operations.iter().enumerate() {
        for (j, input) in op.inputs.iter().enumerate() {
            entity_ref(input, format!("operations[{i}].inputs[{j}]"), errors);
        }
        for (j, output) in op.outputs.iter().enumerate() {
            entity_ref(output, format!("operations[{i}].outputs[{j}]"), errors);
        }

        if let Some(tool_ref) = &op.tool {
            let path = format!("operations[{i}].tool");
            match NodeRef::parse(tool_ref) {
                Some(reference) => {
                    if index.resolve_tool(doc, &reference).is_none() {
                        errors.push(err(
                            EventKind::UnresolvedReference,
                            path,
                            format!("`{tool_ref}` does not name a declared tool"),
                        ));
                    }
                }
                None => errors.push(err(
                    EventKind::UnresolvedReference,
                    path,
                    format!("`{tool_ref}` is not an `id@version` reference"),
                )),
            }
        }
    }
}

/// Depth-first walk over resolved `derived_from` edges. A gray-on-gray edge
/// is a cycle; the offending chain is reported by id and the walk continues
/// so independent cycles each get one event.
fn check_derivation_dag(doc: &Document, index: &DocumentIndex, errors: &mut Vec<ValidationError>) {
    let n = doc.entities.len();
    let mut parents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, entity) in doc.entities.iter().enumerate() {
        for parent in &entity.derived_from {
            if let Some(reference) = NodeRef::parse(parent) {
                if let Some(target) = index.resolve_entity(&reference) {
                    parents[i].push(target);
                }
            }
        }
    }

    const WHITE: u8 = 0;
    const GRAY: u8 = 1;
    const BLACK: u8 = 2;
    let mut color = vec![WHITE; n];

    for start in 0..n {
        if color[start] != WHITE {
            continue;
        }
        // (node, next-edge cursor)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        color[start] = GRAY;

        while let Some(&(node, cursor)) = stack.last() {
            if cursor < parents[node].len() {
                stack.last_mut().expect("stack is non-empty").1 += 1;
                let next = parents[node][cursor];

                if color[next] == WHITE {
                    color[next] = GRAY;
                    stack.push((next, 0));
                } else if color[next] == GRAY {
                    let mut chain: Vec<&str> = stack
                        .iter()
                        .skip_while(|(id, _)| *id != next)
                        .map(|(id, _)| doc.entities[*id].id.as_str())
                        .collect();
                    chain.push(doc.entities[next].id.as_str());
                    errors.push(err(
                        EventKind::DerivationCycle,
                        format!("entities[{node}].derived_from"),
                        format!("derivation cycle: {}", chain.join(" -> ")),
                    ));
                }
            } else {
                color[node] = BLACK;
                stack.pop();
            }
        }
    }
}

fn check_attestations(doc: &Document, errors: &mut Vec<ValidationError>) {
    for (i, op) in doc.operations.iter().enumerate() {
        let Some(att) = &op.attestation else { continue };
        let path = format!("operations[{i}].attestation");

        match &att.mode {
            AttestationMode::Basic => {
                if att.signer.is_some() || att.signature.is_some() {
                    errors.push(err(
                        EventKind::AttestationModeInconsistent,
                        path.clone(),
                        "mode `basic` does not take a signer or signature",
                    ));
                }
            }
            mode if mode.is_known() => {
                if att.signer.is_none() || att.signature.is_none() {
                    errors.push(err(
                        EventKind::AttestationRequirementsMissing,
                        path.clone(),
                        format!("mode `{}` requires both signer and signature", mode.as_str()),
                    ));
                }
            }
            // Unknown modes were already flagged by the schema checker.
            _ => {}
        }

        if let Some(multisig) = &att.multisig {
            let signers = multisig.signers.len() as i64;
            if multisig.threshold < 1 || multisig.threshold > signers {
                errors.push(err(
                    EventKind::CardinalityViolation,
                    format!("{path}.multisig.threshold"),
                    format!(
                        "threshold {} is outside [1, {signers}]",
                        multisig.threshold
                    ),
                ));
            }
        }
    }
}

fn check_sealed_typing(
    doc: &Document,
    errors: &mut Vec<ValidationError>,
    warnings: &mut Vec<ValidationWarning>,
) {
    for (i, op) in doc.operations.iter().enumerate() {
        match (op.is_sealed(), &op.sealed) {
            (true, None) => errors.push(err(
                EventKind::SealedCommitmentInvalid,
                format!("operations[{i}]"),
                "sealed_subgraph operations require a `sealed` commitment",
            )),
            (false, Some(_)) => errors.push(err(
                EventKind::SealedCommitmentInvalid,
                format!("operations[{i}].sealed"),
                format!("`sealed` is only allowed on sealed_subgraph operations, not `{}`", op.kind),
            )),
            (true, Some(sealed)) => {
                let has = |role: &LeafRole| sealed.leaves_exposed.iter().any(|l| l.role == *role);
                if !has(&LeafRole::SubInput) || !has(&LeafRole::SubOutput) {
                    warnings.push(ValidationWarning::new(
                        EventKind::SealedCommitmentInvalid,
                        Component::Structural,
                        Some(format!("operations[{i}].sealed.leaves_exposed")),
                        "sealed commitment exposes no sub_input/sub_output leaf pair",
                    ));
                }
            }
            (false, None) => {}
        }
    }
}

/// Compares realized capability values against the tool's declared ranges.
/// Declared ranges may be `"min..max"` strings, `{min, max}` mappings or
/// `[min, max]` pairs; anything else is compared for equality when numeric.
/// Findings are warnings, never hard errors.
fn check_capabilities(
    doc: &Document,
    index: &DocumentIndex,
    warnings: &mut Vec<ValidationWarning>,
) {
    for (i, op) in doc.operations.iter().enumerate() {
        let Some(realized) = &op.realized_capability else { continue };
        let Some(tool_ref) = &op.tool else { continue };
        let Some(reference) = NodeRef::parse(tool_ref) else { continue };
        let Some(tool_pos) = index.resolve_tool(doc, &reference) else { continue };
        let Some(declared) = &doc.tools[tool_pos].capabilities else { continue };

        for (key, value) in realized {
            let path = format!("operations[{i}].realized_capability.{key}");
            let Some(actual) = value.as_f64() else { continue };

            match declared.get(key) {
                None => warnings.push(ValidationWarning::new(
                    EventKind::CapabilityOutOfRange,
                    Component::Structural,
                    Some(path),
                    format!("tool `{}` declares no `{key}` capability", reference.id),
                )),
                Some(range) => {
                    if let Some((min, max)) = parse_range(range) {
                        if actual < min || actual > max {
                            warnings.push(ValidationWarning::new(
                                EventKind::CapabilityOutOfRange,
                                Component::Structural,
                                Some(path),
                                format!("realized {actual} outside declared {min}..{max}"),
                            ));
                        }
                    }
                }
            }
        }
    }
}

fn parse_range(value: &Value) -> Option<(f64, f64)> {
    match value {
        Value::String(s) => {
            let (lo, hi) = s.split_once("..")?;
            Some((lo.trim().parse().ok()?, hi.trim().parse().ok()?))
        }
        Value::Object(map) => {
            let lo = map.get("min")?.as_f64()?;
            let hi = map.get("max")?.as_f64()?;
            Some((lo, hi))
        }
        Value::Array(items) if items.len() == 2 => {
            Some((items[0].as_f64()?, items[1].as_f64()?))
        }
        Value::Number(n) => {
            let v = n.as_f64()?;
            Some((v, v))
        }
        _ => None,
    }
}
