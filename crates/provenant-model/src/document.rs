//! # Typed Document Tree
//!
//! The in-memory representation of a provenance document. The document owns
//! its tools, entities and operations by sequence position; every other
//! relationship (`inputs`, `outputs`, `derived_from`, `tool`) is a string
//! reference resolved by lookup, so no cyclic ownership can arise.
//!
//! Field types are deliberately permissive: enumerated scalars decode into
//! tagged variants with an untagged `Other` fallback, and almost everything
//! is optional or defaulted. A document that parses as a mapping therefore
//! almost always produces a typed tree, and the schema checker reports shape
//! problems as ordered events rather than the decoder aborting on the first
//! bad field.
//!
//! All nodes are immutable for the life of a validation call.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum number of entities a document may declare.
pub const MAX_ENTITIES: usize = 10_000;

/// Maximum number of operations a document may declare.
pub const MAX_OPERATIONS: usize = 10_000;

/// Maximum number of tools a document may declare.
pub const MAX_TOOLS: usize = 1_000;

/// Maximum length of any node identifier, in characters.
pub const MAX_ID_LEN: usize = 256;

/// Maximum length of a declared hash string, in characters.
pub const MAX_HASH_LEN: usize = 512;

/// Maximum length of a signature string, in characters.
pub const MAX_SIGNATURE_LEN: usize = 4096;

/// Operation type that carries a sealed commitment.
pub const SEALED_SUBGRAPH_TYPE: &str = "sealed_subgraph";

/// Root container of a provenance document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Three-part numeric format version, e.g. `0.1.0`.
    #[serde(default)]
    pub spec_version: String,

    /// Optional domain profile identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Optional namespace imports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imports: Option<Vec<String>>,

    /// Optional execution context (environment, hardware, location).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ExecutionContext>,

    /// Actors that perform operations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,

    /// Artifacts at rest.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<Entity>,

    /// Transformations between entities.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,
}

/// Execution context metadata attached to the document root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Free-form additions the schema does not constrain.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An actor: software, machine, human, model or service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Document-unique identifier.
    #[serde(default)]
    pub id: String,

    /// Actor kind from the closed set.
    #[serde(rename = "type", default)]
    pub kind: ToolType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Declared capability ranges, free-form mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Map<String, Value>>,

    /// Optional identity binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<ToolIdentity>,
}

/// Identity binding for a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
}

/// Closed set of actor kinds.
///
/// Unknown values decode into [`ToolType::Other`] so the schema checker can
/// report them instead of the decoder failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolType {
    Software,
    Machine,
    Human,
    #[serde(rename = "AIModel")]
    AiModel,
    Service,
    #[serde(untagged)]
    Other(String),
}

impl Default for ToolType {
    fn default() -> Self {
        ToolType::Other(String::new())
    }
}

impl ToolType {
    /// Returns true when the value is a member of the closed set.
    pub fn is_known(&self) -> bool {
        !matches!(self, ToolType::Other(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            ToolType::Software => "Software",
            ToolType::Machine => "Machine",
            ToolType::Human => "Human",
            ToolType::AiModel => "AIModel",
            ToolType::Service => "Service",
            ToolType::Other(s) => s,
        }
    }
}

/// An artifact at rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Document-unique identifier.
    #[serde(default)]
    pub id: String,

    /// Free-form artifact type.
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub version: String,

    /// Filesystem path relative to the document's directory.
    ///
    /// Exactly one of `file` and `uri` must be set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// External reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// Declared content digest, `<algorithm>:<lowercase-hex>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// Ordered parent references, `id@version`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_from: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// A transformation from input entities to output entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Document-unique identifier.
    #[serde(default)]
    pub id: String,

    /// Free-form operation type, lowercase with underscores.
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Input entity references, `id@version`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,

    /// Output entity references, `id@version`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,

    /// Tool reference, `id@version` (or `id@` for a versionless tool).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Parameter map, or the opaque marker `{_redacted: true}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fidelity: Option<Fidelity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Map<String, Value>>,

    /// Capability values actually realized during the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realized_capability: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<Attestation>,

    /// Merkle commitment, present iff `type` is `sealed_subgraph`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sealed: Option<SealedCommitment>,
}

impl Operation {
    /// True when this operation commits to an opaque subgraph.
    pub fn is_sealed(&self) -> bool {
        self.kind == SEALED_SUBGRAPH_TYPE
    }

    /// True when the parameter map is the redaction marker.
    pub fn parameters_redacted(&self) -> bool {
        self.parameters
            .as_ref()
            .and_then(Value::as_object)
            .and_then(|m| m.get("_redacted"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Expected-loss descriptor for an operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fidelity {
    #[serde(default)]
    pub expected: FidelityExpected,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measured: Option<Map<String, Value>>,
}

/// Closed set of expected-loss tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FidelityExpected {
    Lossless,
    Bounded,
    Lossy,
    Unknown,
    #[serde(untagged)]
    Other(String),
}

impl Default for FidelityExpected {
    fn default() -> Self {
        FidelityExpected::Unknown
    }
}

impl FidelityExpected {
    pub fn is_known(&self) -> bool {
        !matches!(self, FidelityExpected::Other(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            FidelityExpected::Lossless => "lossless",
            FidelityExpected::Bounded => "bounded",
            FidelityExpected::Lossy => "lossy",
            FidelityExpected::Unknown => "unknown",
            FidelityExpected::Other(s) => s,
        }
    }
}

/// A timestamped, optionally signed claim over an operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    #[serde(default)]
    pub mode: AttestationMode,

    /// ISO 8601 timestamp. Kept as text so the canonical form reproduces the
    /// author's bytes exactly; parseability is checked, not normalized.
    #[serde(default)]
    pub timestamp: String,

    /// Signer DID. Required for every mode except `basic`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,

    /// Algorithm-tagged signature, `<algorithm>:<base64>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    /// Delegated signer DID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation: Option<String>,

    /// Policy-result envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<Claims>,

    /// Append-only-log anchors with carried proofs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparency: Option<Vec<TransparencyAnchor>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multisig: Option<Multisig>,

    /// Hardware attestation blob, uninterpreted by the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tee: Option<Value>,
}

/// Closed set of attestation modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttestationMode {
    Basic,
    Signed,
    Verifiable,
    Zk,
    SdJwt,
    BbsPlus,
    #[serde(untagged)]
    Other(String),
}

impl Default for AttestationMode {
    fn default() -> Self {
        AttestationMode::Basic
    }
}

impl AttestationMode {
    pub fn is_known(&self) -> bool {
        !matches!(self, AttestationMode::Other(_))
    }

    /// Modes whose signatures the core verifies cryptographically.
    pub fn is_core_signed(&self) -> bool {
        matches!(
            self,
            AttestationMode::Signed | AttestationMode::Verifiable | AttestationMode::Zk
        )
    }

    /// Modes delegated to the credentials collaborator.
    pub fn is_credential(&self) -> bool {
        matches!(self, AttestationMode::SdJwt | AttestationMode::BbsPlus)
    }

    pub fn as_str(&self) -> &str {
        match self {
            AttestationMode::Basic => "basic",
            AttestationMode::Signed => "signed",
            AttestationMode::Verifiable => "verifiable",
            AttestationMode::Zk => "zk",
            AttestationMode::SdJwt => "sd-jwt",
            AttestationMode::BbsPlus => "bbs-plus",
            AttestationMode::Other(s) => s,
        }
    }
}

/// Policy-result envelope attached to an attestation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub policy: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub results: Map<String, Value>,
}

/// Threshold signature declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Multisig {
    /// Minimum number of distinct verified signers required.
    #[serde(default)]
    pub threshold: i64,

    /// Declared signer DIDs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signers: Vec<String>,

    /// Collected signatures, one per participating signer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<MultisigSignature>,
}

/// One collected signature inside a multisig block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultisigSignature {
    #[serde(default)]
    pub signer: String,

    #[serde(default)]
    pub signature: String,
}

/// A reference from the document into an append-only log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransparencyAnchor {
    #[serde(default)]
    pub log_id: String,

    /// Leaf index at inclusion, hex-encoded.
    #[serde(default)]
    pub entry_id: String,

    /// Tree size at inclusion. Signed so out-of-range values surface as
    /// proof errors rather than decode failures.
    #[serde(default)]
    pub tree_size: i64,

    /// Base64-encoded concatenation of fixed-width sibling digests.
    #[serde(default)]
    pub inclusion_proof: String,

    /// Base64-encoded root hash the proof resolves to. Required for
    /// offline verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency_proof: Option<String>,

    /// Old tree size the consistency proof extends from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_tree_size: Option<i64>,

    /// Base64-encoded old root the consistency proof extends from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_root_hash: Option<String>,
}

/// Merkle commitment sealing an opaque subgraph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SealedCommitment {
    /// Tagged digest, `sha256:<hex>`.
    #[serde(default)]
    pub merkle_root: String,

    /// Leaf count of the sealed tree; required for verifying exposed-leaf
    /// inclusion proofs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_size: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub leaves_exposed: Vec<ExposedLeaf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_assertions: Vec<PolicyAssertion>,
}

/// A leaf the sealed subgraph chooses to expose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposedLeaf {
    #[serde(default)]
    pub role: LeafRole,

    /// Leaf hash, tagged digest form.
    #[serde(default)]
    pub hash: String,

    /// Leaf index within the sealed tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,

    /// Base64-encoded sibling digests proving inclusion under the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion_proof: Option<String>,
}

/// Closed set of exposed-leaf roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafRole {
    SubInput,
    SubOutput,
    Intermediate,
    #[serde(untagged)]
    Other(String),
}

impl Default for LeafRole {
    fn default() -> Self {
        LeafRole::Other(String::new())
    }
}

impl LeafRole {
    pub fn is_known(&self) -> bool {
        !matches!(self, LeafRole::Other(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            LeafRole::SubInput => "sub_input",
            LeafRole::SubOutput => "sub_output",
            LeafRole::Intermediate => "intermediate",
            LeafRole::Other(s) => s,
        }
    }
}

/// A policy assertion over the sealed subgraph, independently attested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyAssertion {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub result: PolicyResult,

    /// Asserting signer DID.
    #[serde(default)]
    pub signer: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_hash: Option<String>,

    /// Signature over the canonical assertion record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Closed set of policy-assertion results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyResult {
    Pass,
    Fail,
    Unknown,
    #[serde(untagged)]
    Other(String),
}

impl Default for PolicyResult {
    fn default() -> Self {
        PolicyResult::Unknown
    }
}

impl PolicyResult {
    pub fn is_known(&self) -> bool {
        !matches!(self, PolicyResult::Other(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            PolicyResult::Pass => "pass",
            PolicyResult::Fail => "fail",
            PolicyResult::Unknown => "unknown",
            PolicyResult::Other(s) => s,
        }
    }
}

/// A parsed `id@version` reference.
///
/// `version` is `None` for the wildcard form `id@`, which is only accepted
/// for tool references to tools that declare no version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub id: String,
    pub version: Option<String>,
}

impl NodeRef {
    /// Parses a reference of the form `id@version` or `id@`.
    ///
    /// Returns `None` when the text lacks the `@` separator or names no
    /// identifier.
    ///
    /// # Example
    ///
    /// ```rust
    /// use provenant_model::NodeRef;
    ///
    /// let r = NodeRef::parse("model@2.1").unwrap();
    /// assert_eq!(r.id, "model");
    /// assert_eq!(r.version.as_deref(), Some("2.1"));
    ///
    /// let wild = NodeRef::parse("lathe@").unwrap();
    /// assert!(wild.version.is_none());
    ///
    /// assert!(NodeRef::parse("no-separator").is_none());
    /// ```
    pub fn parse(text: &str) -> Option<NodeRef> {
        let (id, version) = text.split_once('@')?;
        if id.is_empty() {
            return None;
        }
        Some(NodeRef {
            id: id.to_string(),
            version: if version.is_empty() {
                None
            } else {
                Some(version.to_string())
            },
        })
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.id, v),
            None => write!(f, "{}@", self.id),
        }
    }
}
