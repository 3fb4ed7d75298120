//! The unified verification facade.
//!
//! [`Verifier`] owns the component handles and walks them in a fixed
//! order. Any component can contribute errors; none of them stops the
//! pipeline. The engine is stateless between calls apart from the
//! resolver's cache and rate-limit buckets, which embedders may share
//! across verifiers by constructing with [`Verifier::with_resolver`].

use crate::cancel::CancelToken;
use crate::config::VerifierConfig;
use crate::error::EngineError;
use crate::report::{Collector, ValidationResult};
use provenant_crypto::signature::{SignatureOptions, SignatureVerifier};
use provenant_crypto::{sealed, transparency, CredentialVerifier, HashVerifier, TransparencyLogClient};
use provenant_did::Resolver;
use provenant_model::{load_document, Component, EventKind, SchemaChecker, ValidationError};
use provenant_validate::{Profile, ProfileRegistry, StructuralValidator};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Verification engine for provenance documents.
pub struct Verifier {
    config: VerifierConfig,
    resolver: Arc<Resolver>,
    schema: SchemaChecker,
    profiles: ProfileRegistry,
    credentials: Option<Box<dyn CredentialVerifier>>,
    log_client: Option<Box<dyn TransparencyLogClient>>,
}

impl Verifier {
    /// Builds an engine with a private resolver.
    pub fn new(config: VerifierConfig) -> Result<Self, EngineError> {
        let resolver = Resolver::new(config.resolver.clone())
            .map_err(|e| EngineError::Resolver(e.to_string()))?;
        Ok(Self::with_resolver(config, Arc::new(resolver)))
    }

    /// Builds an engine around a shared resolver handle, keeping its cache
    /// and rate-limit buckets warm across verifier instances.
    pub fn with_resolver(config: VerifierConfig, resolver: Arc<Resolver>) -> Self {
        info!(mode = ?config.mode, "verifier initialized");
        Self {
            config,
            resolver,
            schema: SchemaChecker::new(),
            profiles: ProfileRegistry::new(),
            credentials: None,
            log_client: None,
        }
    }

    /// Registers a domain profile.
    pub fn register_profile(&mut self, profile: Box<dyn Profile>) {
        self.profiles.register(profile);
    }

    /// Installs the credentials collaborator for `sd-jwt` / `bbs-plus`
    /// attestations.
    pub fn set_credential_verifier(&mut self, credentials: Box<dyn CredentialVerifier>) {
        self.credentials = Some(credentials);
    }

    /// Installs a transparency-log client. The engine itself verifies
    /// offline and never calls it; it is held for embedders that fetch
    /// fresh proofs before validation.
    pub fn set_transparency_log_client(&mut self, client: Box<dyn TransparencyLogClient>) {
        self.log_client = Some(client);
    }

    /// The shared resolver handle.
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// Whether a transparency-log client is installed.
    pub fn has_log_client(&self) -> bool {
        self.log_client.is_some()
    }

    /// Verifies a document file. The file's directory becomes the base for
    /// entity path resolution.
    pub async fn verify_path(&self, path: &Path) -> Result<ValidationResult, EngineError> {
        self.verify_path_with(path, &CancelToken::new()).await
    }

    /// [`Verifier::verify_path`] with a caller-held cancellation token.
    pub async fn verify_path_with(
        &self,
        path: &Path,
        cancel: &CancelToken,
    ) -> Result<ValidationResult, EngineError> {
        let bytes = std::fs::read(path)?;
        let base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        self.verify_bytes(&bytes, Some(base_dir), cancel).await
    }

    /// Verifies raw document bytes. Without a `base_dir` the hash stage is
    /// skipped (there is no filesystem to resolve entity paths against).
    pub async fn verify_bytes(
        &self,
        bytes: &[u8],
        base_dir: Option<&Path>,
        cancel: &CancelToken,
    ) -> Result<ValidationResult, EngineError> {
        // Loader failure is the one terminal condition: without a parse
        // tree there is nothing to aggregate against.
        let loaded = load_document(bytes, self.config.loader.max_document_bytes)?;
        let doc = loaded.document.clone();

        let mut collector = Collector::new();

        // Schema; violations mark everything after as follow-on.
        let schema_errors = self.schema.check(&loaded);
        debug!(violations = schema_errors.len(), "schema check finished");
        let had_schema_errors = !schema_errors.is_empty();
        for error in schema_errors {
            collector.push_error(error);
        }
        if had_schema_errors {
            collector.mark_follow_on();
        }

        // Structure.
        let (errors, warnings) = StructuralValidator::validate(&doc);
        collector.extend(errors, warnings);

        // Content digests.
        if cancel.is_cancelled() {
            collector.push_cancelled();
            return Ok(collector.finish(self.config.mode, doc));
        }
        if let Some(base_dir) = base_dir {
            let hasher = HashVerifier::new(self.config.hash.settings());
            let (errors, warnings) = hasher.verify(&doc, base_dir, cancel.flag());
            collector.extend(errors, warnings);
        }

        // Signatures, transparency anchors and sealed commitments share
        // one resolution deadline for the whole call.
        let deadline =
            Instant::now() + Duration::from_secs(self.config.resolution_budget_secs);
        let signatures = SignatureVerifier::new(
            &self.resolver,
            SignatureOptions {
                allow_mock: self.config.allow_mock_signatures,
            },
            self.credentials.as_deref(),
        );

        if cancel.is_cancelled() {
            collector.push_cancelled();
            return Ok(collector.finish(self.config.mode, doc));
        }
        let (errors, warnings) = signatures.verify_document(&doc, Some(deadline)).await;
        collector.extend(errors, warnings);

        if cancel.is_cancelled() {
            collector.push_cancelled();
            return Ok(collector.finish(self.config.mode, doc));
        }
        for error in transparency::check_document(&doc) {
            collector.push_error(error);
        }

        if cancel.is_cancelled() {
            collector.push_cancelled();
            return Ok(collector.finish(self.config.mode, doc));
        }
        for error in sealed::check_document(&doc, &signatures, Some(deadline)).await {
            collector.push_error(error);
        }

        self.run_profiles(&doc, &mut collector);

        let result = collector.finish(self.config.mode, doc);
        info!(
            valid = result.valid,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "validation finished"
        );
        Ok(result)
    }

    /// Runs the matching domain profile, if any. Profile events are
    /// appended after core events and cannot remove them, so a profile can
    /// add findings but never flip a core verdict.
    fn run_profiles(&self, doc: &provenant_model::Document, collector: &mut Collector) {
        let Some(profile_id) = self.profiles.identify(doc).map(str::to_string) else {
            if let Some(declared) = &doc.profile {
                collector.push_warning(provenant_model::ValidationWarning::new(
                    EventKind::CapabilityUnavailable,
                    Component::Profile,
                    Some("profile".to_string()),
                    format!("no validator registered for profile `{declared}`"),
                ));
            }
            return;
        };

        debug!(profile = %profile_id, "running domain profile");
        if let Some((errors, warnings)) = self.profiles.validate(doc, &profile_id) {
            let tagged = errors
                .into_iter()
                .map(|e| ValidationError { component: Component::Profile, ..e })
                .collect();
            collector.extend(tagged, warnings);
        }
    }
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("mode", &self.config.mode)
            .field("profiles", &self.profiles)
            .field("credentials", &self.credentials.is_some())
            .field("log_client", &self.log_client.is_some())
            .finish()
    }
}
