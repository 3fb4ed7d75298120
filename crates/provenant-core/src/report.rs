//! Result aggregation.
//!
//! Components push error and warning events into a [`Collector`] in
//! pipeline order; the collector finishes into a [`ValidationResult`]
//! after applying the operating mode (strict elevation, quiet
//! suppression) and computing per-component counters. Nothing here
//! short-circuits: the collector accepts events until the pipeline is
//! done.

use crate::config::Mode;
use provenant_model::{Component, Document, EventKind, ValidationError, ValidationWarning};
use serde::Serialize;
use std::collections::BTreeMap;

/// Warning kinds strict mode turns into errors.
const STRICT_ELEVATED: [EventKind; 2] = [
    EventKind::HashUnsupportedAlgorithm,
    EventKind::OversizedFileSkipped,
];

/// The final structured verdict.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    /// True iff the error sequence is empty.
    pub valid: bool,

    /// Errors in emission order, stable across runs of the same input.
    pub errors: Vec<ValidationError>,

    /// Warnings in emission order (empty in quiet mode).
    pub warnings: Vec<ValidationWarning>,

    /// Event counts per component, for summary lines.
    pub summary: BTreeMap<String, ComponentSummary>,

    /// The parsed document, for downstream consumers.
    #[serde(skip)]
    pub document: Document,
}

/// Per-component event counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ComponentSummary {
    pub errors: usize,
    pub warnings: usize,
}

/// Ordered event sink threaded through the pipeline.
#[derive(Debug, Default)]
pub struct Collector {
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationWarning>,
    follow_on: bool,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// From here on, incoming errors are marked as possible consequences
    /// of earlier schema violations.
    pub fn mark_follow_on(&mut self) {
        self.follow_on = true;
    }

    pub fn push_error(&mut self, mut error: ValidationError) {
        if self.follow_on {
            error.follow_on = true;
        }
        self.errors.push(error);
    }

    pub fn push_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn extend(
        &mut self,
        errors: Vec<ValidationError>,
        warnings: Vec<ValidationWarning>,
    ) {
        for error in errors {
            self.push_error(error);
        }
        for warning in warnings {
            self.push_warning(warning);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Appends the cancellation marker.
    pub fn push_cancelled(&mut self) {
        self.warnings.push(ValidationWarning::new(
            EventKind::Cancelled,
            Component::Engine,
            None,
            "validation cancelled; result is partial",
        ));
    }

    /// Applies the operating mode and produces the final result.
    pub fn finish(mut self, mode: Mode, document: Document) -> ValidationResult {
        if mode == Mode::Strict {
            let (elevate, keep): (Vec<_>, Vec<_>) = self
                .warnings
                .drain(..)
                .partition(|w| STRICT_ELEVATED.contains(&w.kind));
            self.warnings = keep;
            // Elevated warnings land after the organically-collected
            // errors, preserving intra-kind document order.
            for warning in elevate {
                self.errors.push(warning.into_error());
            }
        }

        if mode == Mode::Quiet {
            self.warnings.clear();
        }

        let mut summary: BTreeMap<String, ComponentSummary> = BTreeMap::new();
        for error in &self.errors {
            summary
                .entry(error.component.as_str().to_string())
                .or_default()
                .errors += 1;
        }
        for warning in &self.warnings {
            summary
                .entry(warning.component.as_str().to_string())
                .or_default()
                .warnings += 1;
        }

        ValidationResult {
            valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
            summary,
            document,
        }
    }
}
