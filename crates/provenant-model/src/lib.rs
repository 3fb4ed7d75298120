//! # Provenant Model - Document Tree, Loader and Canonical Form
//!
//! This crate defines the typed model for provenance documents: directed
//! acyclic graphs of entities (artifacts), operations (transformations) and
//! tools (actors), with attestations (signed claims) over selected nodes.
//! It also owns the three pure transformations every other component builds
//! on:
//!
//! 1. **Loading** - parsing either surface syntax (indentation-sensitive
//!    mapping form or single-line canonical form) into one in-memory tree,
//!    with byte-size and encoding enforcement up front.
//!
//! 2. **Schema checking** - a hand-written walker enforcing required fields,
//!    closed enumerations and regex-shaped scalars, reporting violations as
//!    ordered events instead of aborting.
//!
//! 3. **Canonical serialization** - the deterministic byte form used as the
//!    signed payload for attestations and as the leaf preimage for Merkle
//!    commitments.
//!
//! ## Threat Model
//!
//! | Threat | Defense |
//! |--------|---------|
//! | Key reordering | Canonical form sorts keys by UTF-8 code points |
//! | Whitespace manipulation | Canonical form emits no insignificant whitespace |
//! | Number aliasing (`1` vs `1.0`) | Non-integer numerics rejected outright |
//! | Parser gadgets | Value-level parsing only; no polymorphic deserialization |
//! | Memory exhaustion | Input byte ceiling enforced before parsing |
//!
//! ## Event Model
//!
//! Components report structured [`event::ValidationError`] and
//! [`event::ValidationWarning`] values carrying a stable kind tag and a
//! path into the document. Downstream tooling matches on the tag, never on
//! message text.

pub mod canonical;
pub mod document;
pub mod event;
pub mod loader;
pub mod schema;

pub use canonical::{canonical_bytes, canonical_digest, canonicalize, CanonicalizeError};
pub use document::{
    Attestation, AttestationMode, Claims, Document, Entity, ExecutionContext, ExposedLeaf,
    FidelityExpected, LeafRole, Multisig, MultisigSignature, NodeRef, Operation, PolicyAssertion,
    PolicyResult, SealedCommitment, Tool, ToolType, TransparencyAnchor,
};
pub use event::{Component, EventKind, ValidationError, ValidationWarning};
pub use loader::{load_document, LoadError, LoadedDocument};
pub use schema::SchemaChecker;
