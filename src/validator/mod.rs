//! Dynamic validation: cross-checking the static closure against an authoritative
//! trace of imports actually executed by the host language's loader.
//!
//! Loader interception is inherently specific to the Python interpreter's import
//! machinery and cannot be implemented inside this process without embedding that
//! runtime. This module therefore defines only the capability — the [`LoaderTrace`]
//! trait plus the comparison/diagnostic logic that consumes a completed trace — and
//! ships one reference adapter, [`RecordedTrace`], that replays a trace supplied
//! in-process. A concrete adapter that actually drives a Python interpreter (out of
//! process, parsing its output) is external to this crate.

use std::collections::HashSet;

use crate::error::{CoreError, Diagnostic};
use crate::graph::Graph;
use crate::resolver::Mid;

/// A capability for recording `(importer, imported)` edges observed while a loader
/// actually ran. `RecordedTrace` is the only implementation shipped here; a real
/// Python-driving adapter would implement this trait from outside the crate.
pub trait LoaderTrace {
    fn record(&mut self, importer: Mid, imported: Mid);
    fn edges(&self) -> &[(Mid, Mid)];
}

/// Replays a trace collected elsewhere (by a test, or by an out-of-process adapter
/// that shelled out to the interpreter and parsed its output).
#[derive(Debug, Default)]
pub struct RecordedTrace {
    edges: Vec<(Mid, Mid)>,
}

impl RecordedTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replay(edges: impl IntoIterator<Item = (Mid, Mid)>) -> Self {
        Self {
            edges: edges.into_iter().collect(),
        }
    }
}

impl LoaderTrace for RecordedTrace {
    fn record(&mut self, importer: Mid, imported: Mid) {
        self.edges.push((importer, imported));
    }

    fn edges(&self) -> &[(Mid, Mid)] {
        &self.edges
    }
}

/// Failure policy for a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateMode {
    /// Any missing edge is a fatal error.
    Strict,
    /// Diagnostics only; the run continues.
    Warn,
    /// The validator is not installed at all.
    Disabled,
}

impl ValidateMode {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "strict" => Ok(Self::Strict),
            "warn" => Ok(Self::Warn),
            "disabled" => Ok(Self::Disabled),
            other => Err(CoreError::InvalidMode(other.to_string())),
        }
    }
}

pub struct ValidationReport {
    pub diagnostics: Vec<Diagnostic>,
    pub missing: usize,
}

/// Compare every traced `(importer, imported)` edge against `graph`'s static
/// `closure_out(importer)`. `hinted` names edges the resolver already knew it left
/// out of the static graph (typecheck-only imports with `include_typechecking =
/// false`) so the emitted diagnostic can say so instead of reporting a bare surprise.
pub fn validate(
    graph: &Graph,
    trace: &dyn LoaderTrace,
    mode: ValidateMode,
    hinted: &HashSet<(Mid, Mid)>,
) -> Result<ValidationReport, CoreError> {
    if mode == ValidateMode::Disabled {
        return Ok(ValidationReport {
            diagnostics: Vec::new(),
            missing: 0,
        });
    }

    let mut diagnostics = Vec::new();
    for (importer, imported) in trace.edges() {
        let Some(importer_idx) = graph.node_index(importer) else {
            continue;
        };
        let Some(imported_idx) = graph.node_index(imported) else {
            continue;
        };
        if graph.closure_out(importer_idx).contains(&imported_idx) {
            continue;
        }
        let guarded = hinted.contains(&(importer.clone(), imported.clone()));
        let message = if guarded {
            format!("{importer} -> {imported} observed at runtime but excluded as a TYPE_CHECKING-only import")
        } else {
            format!("{importer} -> {imported} observed at runtime but absent from the static closure")
        };
        diagnostics.push(Diagnostic::validate(imported.clone(), message));
    }

    let missing = diagnostics.len();
    if missing > 0 && mode == ValidateMode::Strict {
        return Err(CoreError::ValidationFailed(missing));
    }
    Ok(ValidationReport { diagnostics, missing })
}
