//! Flat per-kind index tables over a document.
//!
//! Built once after schema checking and consulted by every later stage.
//! Duplicate identifiers are collected during construction so the builder
//! doubles as the uniqueness check.

use provenant_model::{Document, NodeRef};
use std::collections::HashMap;

/// Name-keyed lookup tables for the three node kinds.
#[derive(Debug)]
pub struct DocumentIndex<'a> {
    /// Entity position by `(id, version)`.
    entities: HashMap<(&'a str, &'a str), usize>,

    /// Entity positions by bare id, for duplicate detection and messages.
    entity_ids: HashMap<&'a str, Vec<usize>>,

    /// Tool position by id.
    tools: HashMap<&'a str, usize>,

    /// Operation position by id.
    operations: HashMap<&'a str, usize>,

    /// Duplicates found while building, `(kind, id, position)`.
    duplicates: Vec<(&'static str, String, usize)>,
}

impl<'a> DocumentIndex<'a> {
    /// Builds the tables in one pass over the document.
    pub fn build(doc: &'a Document) -> Self {
        let mut index = DocumentIndex {
            entities: HashMap::new(),
            entity_ids: HashMap::new(),
            tools: HashMap::new(),
            operations: HashMap::new(),
            duplicates: Vec::new(),
        };

        for (i, entity) in doc.entities.iter().enumerate() {
            index
                .entity_ids
                .entry(entity.id.as_str())
                .or_default()
                .push(i);
            if index
                .entities
                .insert((entity.id.as_str(), entity.version.as_str()), i)
                .is_some()
            {
                index.duplicates.push(("entity", entity.id.clone(), i));
            }
        }

        for (i, tool) in doc.tools.iter().enumerate() {
            if index.tools.insert(tool.id.as_str(), i).is_some() {
                index.duplicates.push(("tool", tool.id.clone(), i));
            }
        }

        for (i, op) in doc.operations.iter().enumerate() {
            if index.operations.insert(op.id.as_str(), i).is_some() {
                index.duplicates.push(("operation", op.id.clone(), i));
            }
        }

        index
    }

    /// Duplicate identifiers found during construction.
    pub fn duplicates(&self) -> &[(&'static str, String, usize)] {
        &self.duplicates
    }

    /// Resolves an entity reference; entity references always need an exact
    /// version.
    pub fn resolve_entity(&self, reference: &NodeRef) -> Option<usize> {
        let version = reference.version.as_deref()?;
        self.entities.get(&(reference.id.as_str(), version)).copied()
    }

    /// Resolves a tool reference. The wildcard form `id@` matches only a
    /// tool that declares no version.
    pub fn resolve_tool(&self, doc: &Document, reference: &NodeRef) -> Option<usize> {
        let position = *self.tools.get(reference.id.as_str())?;
        let declared = doc.tools[position].version.as_deref();
        match (&reference.version, declared) {
            (Some(want), Some(have)) if want == have => Some(position),
            (None, None) => Some(position),
            _ => None,
        }
    }

    /// True when any entity declares this id, regardless of version.
    pub fn knows_entity_id(&self, id: &str) -> bool {
        self.entity_ids.contains_key(id)
    }
}
