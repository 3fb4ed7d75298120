//! # Hash Verifier
//!
//! Computes content digests of locally referenced files and compares them
//! against the digests declared in the document. This is the only
//! component of the engine allowed to open files.
//!
//! ## Path Containment
//!
//! Declared paths resolve against the document's enclosing directory and
//! nothing else:
//!
//! 1. Absolute paths are refused.
//! 2. The path is normalized lexically; a `..` that would climb past the
//!    base is refused before anything touches the filesystem.
//! 3. The opened path is canonicalized and must remain a descendant of the
//!    canonical base, which catches symlinks pointing out of the tree.
//! 4. Only regular files are hashed; directories and special files are
//!    refused.
//!
//! A missing file is a warning, not an error: the document may describe
//! artifacts that are distributed separately. A file over the size ceiling
//! is skipped with a warning (elevated to an error in strict mode by the
//! aggregator).
//!
//! Hashing fans out over a worker pool; results are collected in entity
//! order so the report is deterministic regardless of scheduling.

use provenant_model::{Component, Document, EventKind, ValidationError, ValidationWarning};
use provenant_model::event::truncate_for_report;
use rayon::prelude::*;
use sha2::{Digest, Sha256, Sha512};
use std::fs::File;
use std::io::Read;
use std::path::{Component as PathComponent, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Hash-stage tuning.
#[derive(Debug, Clone)]
pub struct HashSettings {
    /// Files larger than this are skipped with a warning. Default 512 MiB.
    pub max_file_bytes: u64,

    /// Streaming read granularity. Default 8 MiB.
    pub chunk_bytes: usize,
}

impl Default for HashSettings {
    fn default() -> Self {
        Self {
            max_file_bytes: 512 * 1024 * 1024,
            chunk_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Digest algorithms the document format names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
    Blake3,
}

impl HashAlgorithm {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(Self::Sha256),
            "sha512" => Some(Self::Sha512),
            "blake3" => Some(Self::Blake3),
            _ => None,
        }
    }
}

/// Per-document hash verification.
pub struct HashVerifier {
    settings: HashSettings,
}

impl HashVerifier {
    pub fn new(settings: HashSettings) -> Self {
        Self { settings }
    }

    /// Hashes every entity that declares both `file` and `hash`, comparing
    /// against the declared digest. `base_dir` is the document's enclosing
    /// directory; `cancel` is observed before each file is opened.
    pub fn verify(
        &self,
        doc: &Document,
        base_dir: &Path,
        cancel: &AtomicBool,
    ) -> (Vec<ValidationError>, Vec<ValidationWarning>) {
        let canonical_base = base_dir.canonicalize().ok();

        let per_entity: Vec<(Vec<ValidationError>, Vec<ValidationWarning>)> = doc
            .entities
            .par_iter()
            .enumerate()
            .map(|(i, entity)| {
                if cancel.load(Ordering::Relaxed) {
                    return (Vec::new(), Vec::new());
                }
                self.verify_entity(i, entity, base_dir, canonical_base.as_deref())
            })
            .collect();

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for (entity_errors, entity_warnings) in per_entity {
            errors.extend(entity_errors);
            warnings.extend(entity_warnings);
        }
        (errors, warnings)
    }

    fn verify_entity(
        &self,
        index: usize,
        entity: &provenant_model::Entity,
        base_dir: &Path,
        canonical_base: Option<&Path>,
    ) -> (Vec<ValidationError>, Vec<ValidationWarning>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let (Some(file), Some(declared)) = (&entity.file, &entity.hash) else {
            return (errors, warnings);
        };
        let path_label = format!("entities[{index}].file");

        let Some((algorithm_name, expected_hex)) = declared.split_once(':') else {
            // Schema already reported the malformed digest; nothing to do.
            return (errors, warnings);
        };

        let algorithm = match HashAlgorithm::parse(algorithm_name) {
            Some(algorithm) => algorithm,
            None => return (errors, warnings),
        };

        #[cfg(not(feature = "blake3"))]
        if algorithm == HashAlgorithm::Blake3 {
            warnings.push(ValidationWarning::new(
                EventKind::HashUnsupportedAlgorithm,
                Component::Hash,
                Some(path_label),
                "blake3 support is not compiled into this engine",
            ));
            return (errors, warnings);
        }

        let resolved = match resolve_under(base_dir, file) {
            Ok(path) => path,
            Err(reason) => {
                errors.push(ValidationError::new(
                    EventKind::PathTraversalAttempt,
                    Component::Hash,
                    Some(path_label),
                    reason,
                ));
                return (errors, warnings);
            }
        };

        // Canonicalization fails for missing files; that is the
        // distributed-artifact case and only warrants a warning.
        let canonical = match resolved.canonicalize() {
            Ok(canonical) => canonical,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warnings.push(ValidationWarning::new(
                    EventKind::FileUnreadable,
                    Component::Hash,
                    Some(path_label),
                    format!("`{file}` does not exist"),
                ));
                return (errors, warnings);
            }
            Err(e) => {
                errors.push(ValidationError::new(
                    EventKind::FileUnreadable,
                    Component::Hash,
                    Some(path_label),
                    format!("`{file}`: {e}"),
                ));
                return (errors, warnings);
            }
        };

        if let Some(base) = canonical_base {
            if !canonical.starts_with(base) {
                warn!(entity = %entity.id, "symlink escapes the document directory");
                errors.push(ValidationError::new(
                    EventKind::PathTraversalAttempt,
                    Component::Hash,
                    Some(path_label),
                    format!("`{file}` escapes the document directory via a link"),
                ));
                return (errors, warnings);
            }
        }

        let metadata = match std::fs::metadata(&canonical) {
            Ok(metadata) => metadata,
            Err(e) => {
                errors.push(ValidationError::new(
                    EventKind::FileUnreadable,
                    Component::Hash,
                    Some(path_label),
                    format!("`{file}`: {e}"),
                ));
                return (errors, warnings);
            }
        };

        if !metadata.is_file() {
            errors.push(ValidationError::new(
                EventKind::FileUnreadable,
                Component::Hash,
                Some(path_label),
                format!("`{file}` is not a regular file"),
            ));
            return (errors, warnings);
        }

        if metadata.len() > self.settings.max_file_bytes {
            warnings.push(ValidationWarning::new(
                EventKind::OversizedFileSkipped,
                Component::Hash,
                Some(path_label),
                format!(
                    "`{file}` is {} bytes, over the {} byte hashing ceiling",
                    metadata.len(),
                    self.settings.max_file_bytes
                ),
            ));
            return (errors, warnings);
        }

        match self.digest_file(&canonical, algorithm) {
            Ok(actual_hex) => {
                if actual_hex == expected_hex {
                    debug!(entity = %entity.id, "content digest verified");
                } else {
                    errors.push(ValidationError::new(
                        EventKind::HashMismatch,
                        Component::Hash,
                        Some(format!("entities[{index}].hash")),
                        format!(
                            "entity `{}`: declared {} but computed {}",
                            entity.id,
                            truncate_for_report(declared),
                            truncate_for_report(&actual_hex)
                        ),
                    ));
                }
            }
            Err(e) => {
                errors.push(ValidationError::new(
                    EventKind::FileUnreadable,
                    Component::Hash,
                    Some(path_label),
                    format!("`{file}`: {e}"),
                ));
            }
        }

        (errors, warnings)
    }

    /// Streams the file through the selected hasher in bounded chunks.
    fn digest_file(&self, path: &Path, algorithm: HashAlgorithm) -> std::io::Result<String> {
        let mut file = File::open(path)?;
        let mut buffer = vec![0u8; self.settings.chunk_bytes];

        match algorithm {
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                loop {
                    let n = file.read(&mut buffer)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buffer[..n]);
                }
                Ok(hex::encode(hasher.finalize()))
            }
            HashAlgorithm::Sha512 => {
                let mut hasher = Sha512::new();
                loop {
                    let n = file.read(&mut buffer)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buffer[..n]);
                }
                Ok(hex::encode(hasher.finalize()))
            }
            #[cfg(feature = "blake3")]
            HashAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                loop {
                    let n = file.read(&mut buffer)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buffer[..n]);
                }
                Ok(hasher.finalize().to_hex().to_string())
            }
            #[cfg(not(feature = "blake3"))]
            HashAlgorithm::Blake3 => unreachable!("rejected before dispatch"),
        }
    }
}

/// Lexical containment: refuses absolute paths and any `..` that climbs
/// past the base before the filesystem is consulted at all.
fn resolve_under(base: &Path, declared: &str) -> Result<PathBuf, String> {
    let declared_path = Path::new(declared);
    if declared_path.is_absolute() {
        return Err(format!("`{declared}` is absolute"));
    }

    let mut normalized = PathBuf::new();
    let mut depth: usize = 0;
    for component in declared_path.components() {
        match component {
            PathComponent::Normal(part) => {
                normalized.push(part);
                depth += 1;
            }
            PathComponent::CurDir => {}
            PathComponent::ParentDir => {
                if depth == 0 {
                    return Err(format!("`{declared}` escapes the document directory"));
                }
                normalized.pop();
                depth -= 1;
            }
            PathComponent::RootDir | PathComponent::Prefix(_) => {
                return Err(format!("`{declared}` is absolute"));
            }
        }
    }

    Ok(base.join(normalized))
}
