//! Static import-graph engine for test selection in Python repositories.
//!
//! The pipeline is Walker → Extractor → Resolver → Graph Store, with the first two
//! stages running across `rayon`'s worker pool and the resolver performing the
//! single-writer merge that interns MIDs and inserts edges. See `DESIGN.md` for how
//! each stage maps onto the reference implementation this crate is adapted from.

pub mod config;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod parser;
pub mod resolver;
pub mod selection;
pub mod serialize;
pub mod validator;
pub mod walker;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

pub use config::Config;
pub use error::{CoreError, Diagnostic, DiagnosticKind};
pub use graph::{Graph, GraphStore};
pub use hooks::{ConfigHooks, Hooks};
pub use resolver::Mid;
pub use selection::SelectionResult;
pub use validator::{LoaderTrace, RecordedTrace, ValidateMode, ValidationReport};

use parser::ParseResult;

/// Outcome of reading and parsing one discovered file, classified so the caller can
/// emit the right [`DiagnosticKind`] instead of collapsing every failure into one.
enum FileOutcome {
    Parsed(ParseResult),
    ReadFailed(String),
    ParseFailed,
}

/// Full build: walk `root` for Python sources, parse them in parallel, resolve every
/// reference into a graph edge, apply any pre-closure hook dependencies, and finish
/// the build into a read-only [`Graph`].
///
/// Diagnostics accumulated at every stage (unreadable files, parse failures, resolve
/// warnings) end up on `Graph::diagnostics` — this function only returns `Err` for
/// conditions outside the spec's recoverable taxonomy, which today is none; it is
/// fallible in signature so a future fatal precondition (e.g. an unreadable root) can
/// be added without breaking callers.
pub fn build_graph(root: &Path, hooks: &dyn Hooks) -> Result<Graph, CoreError> {
    let config = Config {
        source_roots: hooks.source_roots(),
        ignore: hooks.ignore_patterns(),
        include_typechecking: hooks.include_typechecking(),
        ..Config::default()
    };

    let (files, walk_diagnostics) = walker::walk_project(root, &config);

    let file_outcomes: Vec<(PathBuf, FileOutcome)> = files
        .par_iter()
        .map(|file| {
            let outcome = match std::fs::read(&file.path) {
                Ok(source) => match parser::parse_file_parallel(&source, config.parse_timeout_ms) {
                    Some(result) => FileOutcome::Parsed(result),
                    None => FileOutcome::ParseFailed,
                },
                Err(err) => FileOutcome::ReadFailed(err.to_string()),
            };
            (file.path.clone(), outcome)
        })
        .collect();

    let mut parse_results: HashMap<PathBuf, ParseResult> = HashMap::new();
    let mut store = GraphStore::new();
    for diagnostic in walk_diagnostics {
        store.add_diagnostic(diagnostic);
    }
    for (path, outcome) in file_outcomes {
        match outcome {
            FileOutcome::Parsed(result) => {
                parse_results.insert(path, result);
            }
            FileOutcome::ReadFailed(message) => {
                store.add_diagnostic(Diagnostic::io(path, message));
            }
            FileOutcome::ParseFailed => {
                store.add_diagnostic(Diagnostic::parse(
                    path,
                    "file failed to parse; registered as an empty node",
                ));
            }
        }
    }

    resolver::resolve_all(&mut store, &files, &parse_results, &config);

    apply_dynamic_dependencies(&mut store, hooks.dynamic_dependencies());

    let mut graph = store.finish_build();
    let leaves = hooks.dynamic_dependencies_at_leaves();
    if !leaves.is_empty() {
        let mut store = graph.into_store();
        for (mid, extra) in leaves {
            store.add_post_closure_augmentation(mid, extra);
        }
        graph = store.finish_build();
    }

    Ok(graph)
}

/// Resolve hook-provided pre-closure dependencies (MID-or-path strings) into real
/// edges before the graph closes its write phase.
fn apply_dynamic_dependencies(store: &mut GraphStore, deps: HashMap<String, std::collections::HashSet<String>>) {
    for (from, targets) in deps {
        let from_mid = Mid::new(from);
        let from_idx = match store.node_index(&from_mid) {
            Some(idx) => idx,
            None => store.get_or_insert_external(from_mid),
        };
        for target in targets {
            let target_mid = Mid::new(target);
            let target_idx = match store.node_index(&target_mid) {
                Some(idx) => idx,
                None => store.get_or_insert_external(target_mid),
            };
            store.add_edge(from_idx, target_idx);
        }
    }
}

pub fn load_graph(path: &Path) -> Result<Graph, CoreError> {
    serialize::load(path)
}

pub fn save_graph(graph: &Graph, path: &Path, config: &Config) -> Result<(), CoreError> {
    serialize::save(path, graph, config)
}

pub fn select(graph: &Graph, changed_files: &[PathBuf]) -> SelectionResult {
    selection::select(graph, changed_files)
}

/// `hinted` is normally `graph.hinted_typecheck()` — the edges the resolver excluded
/// as `TYPE_CHECKING`-only, so a matching runtime edge is reported as a guarded
/// exclusion instead of an unexplained gap. Pass an empty set to treat every
/// unmatched runtime edge as unexplained regardless of why it was excluded.
pub fn validate(
    graph: &Graph,
    trace: &dyn LoaderTrace,
    mode: ValidateMode,
    hinted: &std::collections::HashSet<(Mid, Mid)>,
) -> Result<ValidationReport, CoreError> {
    validator::validate(graph, trace, mode, hinted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_build_graph_resolves_package_cycle() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pkg/__init__.py", "");
        write(dir.path(), "pkg/a.py", "import pkg.b\n");
        write(dir.path(), "pkg/b.py", "from . import a\n");

        let hooks = ConfigHooks::new(Config::default());
        let graph = build_graph(dir.path(), &hooks).unwrap();

        let a = graph.node_index(&Mid::new("pkg.a")).unwrap();
        let b = graph.node_index(&Mid::new("pkg.b")).unwrap();
        assert!(graph.out(a).contains(&b));
        assert!(graph.out(b).contains(&a));
    }

    #[test]
    fn test_build_graph_then_select_finds_dependent_test() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pkg/__init__.py", "");
        write(dir.path(), "pkg/lib.py", "x = 1\n");
        write(dir.path(), "pkg/test_lib.py", "import pkg.lib\n");

        let hooks = ConfigHooks::new(Config::default());
        let graph = build_graph(dir.path(), &hooks).unwrap();

        let result = select(&graph, &[dir.path().join("pkg/lib.py")]);
        assert!(!result.full_suite);
        assert_eq!(result.tests, vec![dir.path().join("pkg/test_lib.py")]);
    }

    #[test]
    fn test_save_and_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pkg/__init__.py", "");
        write(dir.path(), "pkg/a.py", "import pkg.b\n");
        write(dir.path(), "pkg/b.py", "");

        let hooks = ConfigHooks::new(Config::default());
        let graph = build_graph(dir.path(), &hooks).unwrap();
        let cache_path = dir.path().join("graph.bin");
        save_graph(&graph, &cache_path, hooks.config()).unwrap();

        let loaded = load_graph(&cache_path).unwrap();
        assert_eq!(loaded.node_count(), graph.node_count());
        assert_eq!(loaded.edge_count(), graph.edge_count());
    }

    #[test]
    fn test_build_graph_surfaces_hinted_typecheck_to_validate() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "only_typed.py", "");
        write(
            dir.path(),
            "consumer.py",
            "from typing import TYPE_CHECKING\nif TYPE_CHECKING:\n    import only_typed\n",
        );

        let hooks = ConfigHooks::new(Config::default());
        let graph = build_graph(dir.path(), &hooks).unwrap();
        assert!(
            graph
                .hinted_typecheck()
                .contains(&(Mid::new("consumer"), Mid::new("only_typed"))),
            "the resolver's skipped edge must reach the built graph"
        );

        let trace = validator::RecordedTrace::replay([(Mid::new("consumer"), Mid::new("only_typed"))]);
        let report = validate(&graph, &trace, ValidateMode::Warn, graph.hinted_typecheck()).unwrap();
        assert!(report.diagnostics[0].message.contains("TYPE_CHECKING"));
    }

    #[test]
    fn test_unreadable_file_reports_io_not_parse() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("pkg");
        std::fs::create_dir_all(&sub).unwrap();
        let file_path = sub.join("broken.py");
        std::fs::write(&file_path, "x = 1\n").unwrap();

        // Make the file unreadable so `std::fs::read` fails without touching the
        // directory walk itself.
        let mut perms = std::fs::metadata(&file_path).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o000);
        std::fs::set_permissions(&file_path, perms).unwrap();

        let hooks = ConfigHooks::new(Config::default());
        let graph = build_graph(dir.path(), &hooks).unwrap();

        // restore permissions so the tempdir can be cleaned up
        let mut perms = std::fs::metadata(&file_path).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o644);
        std::fs::set_permissions(&file_path, perms).unwrap();

        assert!(
            graph.diagnostics().iter().any(|d| d.kind == DiagnosticKind::Io),
            "an unreadable file must produce an Io diagnostic, not Parse"
        );
    }

    #[test]
    fn test_build_graph_with_dynamic_dependencies_at_leaves() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pkg/__init__.py", "");
        write(dir.path(), "pkg/a.py", "");
        write(dir.path(), "pkg/test_a.py", "import pkg.a\n");

        struct ExtraLeafHook;
        impl Hooks for ExtraLeafHook {
            fn source_roots(&self) -> Vec<String> {
                Vec::new()
            }
            fn ignore_patterns(&self) -> Vec<String> {
                Vec::new()
            }
            fn include_typechecking(&self) -> bool {
                false
            }
            fn dynamic_dependencies_at_leaves(&self) -> HashMap<Mid, std::collections::HashSet<Mid>> {
                let mut map = HashMap::new();
                map.insert(Mid::new("pkg.a"), [Mid::new("generated.thing")].into());
                map
            }
        }

        let graph = build_graph(dir.path(), &ExtraLeafHook).unwrap();
        let generated = graph.node_index(&Mid::new("generated.thing")).unwrap();
        let test_idx = graph.node_index(&Mid::new("pkg.test_a")).unwrap();
        assert!(graph.closure_in(generated).contains(&test_idx));
    }
}
