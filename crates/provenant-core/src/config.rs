//! Engine configuration.

use provenant_crypto::HashSettings;
use provenant_did::ResolverConfig;
use serde::{Deserialize, Serialize};

/// Operating mode for report shaping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Errors are errors, warnings are warnings.
    #[default]
    Standard,

    /// Selected warnings (unavailable hash algorithms, oversized-file
    /// skips) are elevated to errors.
    Strict,

    /// Warnings are suppressed from the report.
    Quiet,
}

/// Configuration for the [`crate::Verifier`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    pub mode: Mode,

    pub loader: LoaderConfig,

    pub hash: HashConfig,

    pub resolver: ResolverConfig,

    /// Aggregate ceiling over all DID resolutions in one validation call.
    #[serde(default = "default_resolution_budget")]
    pub resolution_budget_secs: u64,

    /// Accept the `ed25519:mock:valid` test marker. Off outside test
    /// harnesses.
    #[serde(default)]
    pub allow_mock_signatures: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            loader: LoaderConfig::default(),
            hash: HashConfig::default(),
            resolver: ResolverConfig::default(),
            resolution_budget_secs: default_resolution_budget(),
            allow_mock_signatures: false,
        }
    }
}

fn default_resolution_budget() -> u64 {
    60
}

/// Loader ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Input byte ceiling.
    pub max_document_bytes: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: provenant_model::loader::DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

/// Hash-stage ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashConfig {
    /// Files larger than this are skipped with a warning.
    pub max_file_bytes: u64,

    /// Streaming read granularity.
    pub chunk_bytes: usize,
}

impl Default for HashConfig {
    fn default() -> Self {
        let defaults = HashSettings::default();
        Self {
            max_file_bytes: defaults.max_file_bytes,
            chunk_bytes: defaults.chunk_bytes,
        }
    }
}

impl HashConfig {
    pub(crate) fn settings(&self) -> HashSettings {
        HashSettings {
            max_file_bytes: self.max_file_bytes,
            chunk_bytes: self.chunk_bytes,
        }
    }
}
