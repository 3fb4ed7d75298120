//! # Validation Events
//!
//! Errors and warnings are reported, not raised: each component returns
//! structured events to the aggregator and the pipeline keeps running so a
//! caller sees every fault in one pass. Each event carries a stable kind
//! tag, the component that emitted it and an optional path into the
//! document tree (for example `operations[0].attestation`).
//!
//! Messages are for humans; tooling matches on [`EventKind`] only.

use serde::{Deserialize, Serialize};

/// Pipeline component that emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Loader,
    Schema,
    Structural,
    Hash,
    Signature,
    Transparency,
    Sealed,
    Resolver,
    Profile,
    Engine,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Loader => "loader",
            Component::Schema => "schema",
            Component::Structural => "structural",
            Component::Hash => "hash",
            Component::Signature => "signature",
            Component::Transparency => "transparency",
            Component::Sealed => "sealed",
            Component::Resolver => "resolver",
            Component::Profile => "profile",
            Component::Engine => "engine",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable kind tags for every error and warning the engine can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    // Structural
    MalformedDocument,
    OversizedDocument,
    UnsupportedEncoding,
    SchemaViolation,
    DuplicateId,
    UnresolvedReference,
    DerivationCycle,
    CardinalityViolation,
    PathTraversalAttempt,
    LengthCapExceeded,

    // Integrity
    HashMismatch,
    HashUnsupportedAlgorithm,
    FileUnreadable,
    OversizedFileSkipped,

    // Cryptographic
    SignatureInvalid,
    SignatureFormatMalformed,
    AlgorithmUnsupported,
    MultisigThresholdNotMet,
    CanonicalizationFailure,

    // Resolution
    #[serde(rename = "DIDMalformed")]
    DidMalformed,
    #[serde(rename = "DIDMethodUnsupported")]
    DidMethodUnsupported,
    #[serde(rename = "DIDResolutionFailed")]
    DidResolutionFailed,

    // Proofs
    MerkleRootMismatch,
    InclusionProofMalformed,
    ConsistencyProofMalformed,
    MultiWitnessIncomplete,
    SealedCommitmentInvalid,

    // Attestation modes
    AttestationModeInconsistent,
    AttestationRequirementsMissing,
    CapabilityUnavailable,
    CapabilityOutOfRange,

    // Engine
    Cancelled,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MalformedDocument => "MalformedDocument",
            EventKind::OversizedDocument => "OversizedDocument",
            EventKind::UnsupportedEncoding => "UnsupportedEncoding",
            EventKind::SchemaViolation => "SchemaViolation",
            EventKind::DuplicateId => "DuplicateId",
            EventKind::UnresolvedReference => "UnresolvedReference",
            EventKind::DerivationCycle => "DerivationCycle",
            EventKind::CardinalityViolation => "CardinalityViolation",
            EventKind::PathTraversalAttempt => "PathTraversalAttempt",
            EventKind::LengthCapExceeded => "LengthCapExceeded",
            EventKind::HashMismatch => "HashMismatch",
            EventKind::HashUnsupportedAlgorithm => "HashUnsupportedAlgorithm",
            EventKind::FileUnreadable => "FileUnreadable",
            EventKind::OversizedFileSkipped => "OversizedFileSkipped",
            EventKind::SignatureInvalid => "SignatureInvalid",
            EventKind::SignatureFormatMalformed => "SignatureFormatMalformed",
            EventKind::AlgorithmUnsupported => "AlgorithmUnsupported",
            EventKind::MultisigThresholdNotMet => "MultisigThresholdNotMet",
            EventKind::CanonicalizationFailure => "CanonicalizationFailure",
            EventKind::DidMalformed => "DIDMalformed",
            EventKind::DidMethodUnsupported => "DIDMethodUnsupported",
            EventKind::DidResolutionFailed => "DIDResolutionFailed",
            EventKind::MerkleRootMismatch => "MerkleRootMismatch",
            EventKind::InclusionProofMalformed => "InclusionProofMalformed",
            EventKind::ConsistencyProofMalformed => "ConsistencyProofMalformed",
            EventKind::MultiWitnessIncomplete => "MultiWitnessIncomplete",
            EventKind::SealedCommitmentInvalid => "SealedCommitmentInvalid",
            EventKind::AttestationModeInconsistent => "AttestationModeInconsistent",
            EventKind::AttestationRequirementsMissing => "AttestationRequirementsMissing",
            EventKind::CapabilityUnavailable => "CapabilityUnavailable",
            EventKind::CapabilityOutOfRange => "CapabilityOutOfRange",
            EventKind::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured validation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub kind: EventKind,

    pub component: Component,

    /// Path into the document tree, e.g. `entities[2].hash`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    pub message: String,

    /// Set when the document already failed the schema check, marking this
    /// diagnostic as a possible consequence of the earlier violations.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub follow_on: bool,
}

impl ValidationError {
    pub fn new(
        kind: EventKind,
        component: Component,
        path: impl Into<Option<String>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            component,
            path: path.into(),
            message: message.into(),
            follow_on: false,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {} at {}: {}", self.kind, self.component, path, self.message),
            None => write!(f, "[{}] {}: {}", self.kind, self.component, self.message),
        }
    }
}

/// A structured validation warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub kind: EventKind,

    pub component: Component,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    pub message: String,
}

impl ValidationWarning {
    pub fn new(
        kind: EventKind,
        component: Component,
        path: impl Into<Option<String>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            component,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Converts this warning into an error of the same kind, used by strict
    /// mode elevation.
    pub fn into_error(self) -> ValidationError {
        ValidationError {
            kind: self.kind,
            component: self.component,
            path: self.path,
            message: self.message,
            follow_on: false,
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {} at {}: {}", self.kind, self.component, path, self.message),
            None => write!(f, "[{}] {}: {}", self.kind, self.component, self.message),
        }
    }
}

/// Truncates a digest or signature to its first twelve hex characters for
/// reporting, keeping full values out of logs.
pub fn truncate_for_report(value: &str) -> String {
    const KEEP: usize = 12;
    let hex_part = value.rsplit(':').next().unwrap_or(value);
    if hex_part.len() <= KEEP {
        hex_part.to_string()
    } else {
        format!("{}..", &hex_part[..KEEP])
    }
}
