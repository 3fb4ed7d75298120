//! # Provenant Validate - Structural Validator and Profile Plug-ins
//!
//! Cross-cutting checks the schema cannot express: size caps, identifier
//! uniqueness, reference closure over the entity/operation/tool graph,
//! acyclicity of derivation chains, attestation-mode prerequisites and the
//! sealed-operation typing rule.
//!
//! The validator builds flat per-kind index tables once, then resolves every
//! `id@version` reference against them. The document graph is a name-keyed
//! lookup table, never a pointer structure, so no cyclic ownership can
//! arise even for documents that declare cyclic derivations (those are
//! reported, not followed).
//!
//! Domain-specific policy lives behind the [`Profile`] trait; profiles are
//! registered by opaque identifier and run after core validation without
//! the ability to override its verdict.

pub mod index;
pub mod profile;
pub mod structural;

pub use index::DocumentIndex;
pub use profile::{Profile, ProfileRegistry};
pub use structural::StructuralValidator;
