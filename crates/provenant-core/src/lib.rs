//! # Provenant Core - The Verification Facade
//!
//! One entry point over the whole pipeline: load a document, check its
//! schema, validate its structure, hash its files, verify its signatures,
//! its transparency anchors and its sealed commitments, run any registered
//! domain profile, and aggregate everything into a single deterministic
//! report.
//!
//! ## Pipeline
//!
//! ```text
//!  bytes -> [loader] -> [schema] -> [structural]
//!                                       |
//!            +------------+-------------+------------+
//!            v            v             v            v
//!         [hash]     [signatures]  [transparency] [sealed]
//!            |            |             |            |
//!            +------------+------+------+------------+
//!                                v
//!                          [profiles] -> ValidationResult
//! ```
//!
//! Components report events and keep going; only a loader failure aborts
//! a call. The event order is stable: component order first, document
//! order within a component, so two runs over the same input produce
//! byte-identical reports.
//!
//! ## Example
//!
//! ```rust,no_run
//! use provenant_core::{Verifier, VerifierConfig};
//!
//! # async fn demo() -> Result<(), provenant_core::EngineError> {
//! let verifier = Verifier::new(VerifierConfig::default())?;
//! let result = verifier.verify_path("pipeline.gg.yaml".as_ref()).await?;
//!
//! if result.valid {
//!     println!("document verifies");
//! } else {
//!     for error in &result.errors {
//!         eprintln!("{error}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod report;
pub mod verifier;

pub use cancel::CancelToken;
pub use config::{Mode, VerifierConfig};
pub use error::EngineError;
pub use provenant_crypto::{CredentialVerifier, TransparencyLogClient};
pub use provenant_model::{
    Component, Document, EventKind, ValidationError, ValidationWarning,
};
pub use provenant_validate::Profile;
pub use report::ValidationResult;
pub use verifier::Verifier;
