//! Domain-profile plug-in seam.
//!
//! Profiles add domain checks (AI inference workflows, machining workflows)
//! on top of core validation. The core never names a profile; it asks the
//! registry whether an identifier is recognized and collects whatever the
//! profile reports. Profile events are appended after core events and can
//! never remove a core error, so a profile cannot flip a verdict.

use provenant_model::{Document, ValidationError, ValidationWarning};
use std::collections::HashMap;
use tracing::debug;

/// A domain-specific validator, registered by opaque identifier.
pub trait Profile: Send + Sync {
    /// The identifier documents select this profile with.
    fn id(&self) -> &str;

    /// Inspects a document and claims it when recognized, returning the
    /// profile identifier to run.
    fn identify(&self, doc: &Document) -> Option<String> {
        doc.profile
            .as_deref()
            .filter(|p| *p == self.id())
            .map(str::to_string)
    }

    /// Runs the domain checks.
    fn validate(&self, doc: &Document) -> (Vec<ValidationError>, Vec<ValidationWarning>);
}

/// Profiles known to an engine instance.
#[derive(Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, Box<dyn Profile>>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a profile; the last registration of an id wins.
    pub fn register(&mut self, profile: Box<dyn Profile>) {
        debug!(profile = profile.id(), "profile registered");
        self.profiles.insert(profile.id().to_string(), profile);
    }

    /// True when the identifier names a registered profile.
    pub fn recognizes(&self, profile_id: &str) -> bool {
        self.profiles.contains_key(profile_id)
    }

    /// Finds the profile to run for a document: the document's declared
    /// profile when registered, otherwise the first registered profile that
    /// identifies the document. Iteration is id-sorted for determinism.
    pub fn identify<'a>(&'a self, doc: &'a Document) -> Option<&'a str> {
        if let Some(declared) = doc.profile.as_deref() {
            if self.recognizes(declared) {
                return Some(declared);
            }
        }
        let mut ids: Vec<&String> = self.profiles.keys().collect();
        ids.sort();
        for id in ids {
            if self.profiles[id].identify(doc).is_some() {
                return Some(id);
            }
        }
        None
    }

    /// Runs the named profile over the document.
    pub fn validate(
        &self,
        doc: &Document,
        profile_id: &str,
    ) -> Option<(Vec<ValidationError>, Vec<ValidationWarning>)> {
        let profile = self.profiles.get(profile_id)?;
        Some(profile.validate(doc))
    }
}

impl std::fmt::Debug for ProfileRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.profiles.keys().collect();
        ids.sort();
        f.debug_struct("ProfileRegistry").field("profiles", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provenant_model::{Component, EventKind};

    struct RequireContext;

    impl Profile for RequireContext {
        fn id(&self) -> &str {
            "require-context"
        }

        fn validate(&self, doc: &Document) -> (Vec<ValidationError>, Vec<ValidationWarning>) {
            if doc.context.is_none() {
                (
                    vec![ValidationError::new(
                        EventKind::SchemaViolation,
                        Component::Profile,
                        Some("context".to_string()),
                        "this profile requires an execution context",
                    )],
                    Vec::new(),
                )
            } else {
                (Vec::new(), Vec::new())
            }
        }
    }

    #[test]
    fn declared_profile_selected() {
        let mut registry = ProfileRegistry::new();
        registry.register(Box::new(RequireContext));

        let doc = Document {
            spec_version: "0.1.0".into(),
            profile: Some("require-context".into()),
            ..Document::default()
        };
        assert_eq!(registry.identify(&doc), Some("require-context"));

        let (errors, _) = registry.validate(&doc, "require-context").unwrap();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn unknown_profile_not_identified() {
        let registry = ProfileRegistry::new();
        let doc = Document {
            profile: Some("nonexistent".into()),
            ..Document::default()
        };
        assert_eq!(registry.identify(&doc), None);
        assert!(registry.validate(&doc, "nonexistent").is_none());
    }
}
