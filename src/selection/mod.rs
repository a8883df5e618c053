//! Turning a set of changed files into the minimal set of test files that could be
//! affected by them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::Diagnostic;
use crate::graph::Graph;
use crate::graph::node::ModuleNode;

#[derive(Debug)]
pub struct SelectionResult {
    /// Test files to run, sorted ascending by path. Empty means "no tests affected",
    /// never "run nothing because something went wrong" — see `full_suite`.
    pub tests: Vec<PathBuf>,
    /// Set when a changed file couldn't be resolved to any graph node (most often:
    /// the file was deleted, or it lies outside every known source root). Callers
    /// should treat this as "run everything" rather than trust `tests`.
    pub full_suite: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve `changed_files` against `graph`, union their reverse closures, and
/// intersect with the graph's test-file set.
///
/// A changed file absent from the graph (deleted, renamed, outside every source
/// root) can't be reasoned about statically, so it forces `full_suite` rather than
/// silently under-selecting.
pub fn select(graph: &Graph, changed_files: &[PathBuf]) -> SelectionResult {
    let mut diagnostics = Vec::new();
    let mut full_suite = false;
    let mut affected = HashSet::new();

    for file in changed_files {
        let Some(mid) = graph.mid_for_path(file).cloned() else {
            diagnostics.push(Diagnostic::select(
                file.clone(),
                "changed file does not resolve to any graph node; falling back to the full suite".to_string(),
            ));
            full_suite = true;
            continue;
        };
        let Some(idx) = graph.node_index(&mid) else {
            continue;
        };
        affected.insert(idx);
        affected.extend(graph.closure_in(idx));
    }

    let test_files = graph.test_files();
    let mut tests: Vec<PathBuf> = affected
        .intersection(&test_files)
        .filter_map(|&idx| match graph.node(idx) {
            ModuleNode::Internal(m) => Some(m.path.clone()),
            ModuleNode::External(_) => None,
        })
        .collect();
    tests.sort();

    SelectionResult {
        tests,
        full_suite,
        diagnostics,
    }
}

/// Every test file the graph knows about, sorted ascending by path — the set
/// `select` falls back to running when `SelectionResult::full_suite` is set.
pub fn all_tests(graph: &Graph) -> Vec<PathBuf> {
    let mut tests: Vec<PathBuf> = graph
        .test_files()
        .into_iter()
        .filter_map(|idx| match graph.node(idx) {
            ModuleNode::Internal(m) => Some(m.path.clone()),
            ModuleNode::External(_) => None,
        })
        .collect();
    tests.sort();
    tests
}

pub fn affected_tests(graph: &Graph, changed_files: &[&Path]) -> SelectionResult {
    let owned: Vec<PathBuf> = changed_files.iter().map(|p| p.to_path_buf()).collect();
    select(graph, &owned)
}
