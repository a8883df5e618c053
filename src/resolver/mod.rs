pub mod mid;

pub use mid::Mid;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::stable_graph::NodeIndex;

use crate::config::Config;
use crate::error::Diagnostic;
use crate::graph::GraphStore;
use crate::graph::node::InternalModule;
use crate::parser::ParseResult;
use crate::parser::imports::RawImportRef;
use crate::walker::DiscoveredFile;

/// Edges the resolver chose not to add because they were `TYPE_CHECKING`-only and
/// `include_typechecking` is off — fed back to the dynamic validator so a runtime
/// edge it doesn't find statically can be explained instead of just flagged.
pub struct ResolveOutcome {
    pub hinted_typecheck: HashSet<(Mid, Mid)>,
}

/// Run the full resolution pass: intern every discovered file as an internal node,
/// then resolve every parsed reference into a graph edge (or a diagnostic).
///
/// This is the single-writer merge phase: by the time this function runs, the
/// parallel walk-and-parse stage has already produced per-file, locally-owned data
/// with no shared mutable state — everything here runs against `store` sequentially,
/// so MID interning and edge insertion both happen exactly once per reference.
pub fn resolve_all(
    store: &mut GraphStore,
    files: &[DiscoveredFile],
    parse_results: &HashMap<PathBuf, ParseResult>,
    config: &Config,
) -> ResolveOutcome {
    let mut internal_mids: HashSet<Mid> = HashSet::new();

    for file in files {
        if store.contains(&file.mid) {
            store.add_diagnostic(Diagnostic::resolve(
                file.path.clone(),
                Some(file.mid.clone()),
                format!(
                    "duplicate module id \"{}\"; keeping the earlier source root's file, ignoring {}",
                    file.mid,
                    file.path.display()
                ),
            ));
            continue;
        }
        let content_hash = parse_results.get(&file.path).map(|r| r.content_hash).unwrap_or(0);
        store.get_or_insert_internal(InternalModule {
            mid: file.mid.clone(),
            path: file.path.clone(),
            package_root: file.package_root.clone(),
            content_hash,
            is_test: file.is_test,
        });
        internal_mids.insert(file.mid.clone());
    }

    let mut hinted_typecheck = HashSet::new();

    for file in files {
        let Some(owner_idx) = store.node_index(&file.mid) else {
            continue; // lost the duplicate-MID race above; already diagnosed
        };
        let Some(parsed) = parse_results.get(&file.path) else {
            continue;
        };

        for raw in &parsed.refs {
            if raw.typecheck_only && !config.include_typechecking {
                if let Some(target_mid) = joined_mid(&file.mid, raw) {
                    hinted_typecheck.insert((file.mid.clone(), target_mid.clone()));
                    store.record_hinted_typecheck(file.mid.clone(), target_mid.clone());
                    store.add_diagnostic(Diagnostic::resolve(
                        file.path.clone(),
                        Some(target_mid),
                        "typecheck-only import skipped (include_typechecking = false)",
                    ));
                }
                continue;
            }

            if raw.wildcard {
                resolve_wildcard(store, owner_idx, &file.path, &file.mid, raw, &internal_mids);
            } else {
                resolve_plain(store, owner_idx, &file.path, &file.mid, raw);
            }
        }
    }

    ResolveOutcome { hinted_typecheck }
}

/// Absolute payloads are already canonical; relative payloads pop `level` components
/// off the owner's own MID and join the remainder. Returns `None` if `level` exceeds
/// the owner's depth (relative import past the repository root).
fn joined_mid(owner_mid: &Mid, raw: &RawImportRef) -> Option<Mid> {
    if raw.level == 0 {
        return Some(Mid::new(raw.payload.clone()));
    }
    let base = owner_mid.ancestor(raw.level)?;
    Some(base.join(&raw.payload))
}

fn resolve_plain(store: &mut GraphStore, owner_idx: NodeIndex, file_path: &Path, owner_mid: &Mid, raw: &RawImportRef) {
    let Some(target_mid) = joined_mid(owner_mid, raw) else {
        store.add_diagnostic(Diagnostic::resolve(
            file_path.to_path_buf(),
            None,
            format!(
                "relative import level {} exceeds package depth of \"{}\"",
                raw.level, owner_mid
            ),
        ));
        return;
    };

    let target_idx = match store.node_index(&target_mid) {
        Some(idx) => idx,
        None => store.get_or_insert_external(target_mid),
    };
    store.add_edge(owner_idx, target_idx);
}

/// Wildcard references expand to one edge per direct internal submodule of the
/// prefix package. A prefix with no internal directory at all (truly external)
/// expands to a single edge to the prefix itself; a prefix that *is* internal but
/// has no submodules is a reported "wildcard over nothing" failure with no edge.
fn resolve_wildcard(
    store: &mut GraphStore,
    owner_idx: NodeIndex,
    file_path: &Path,
    owner_mid: &Mid,
    raw: &RawImportRef,
    internal_mids: &HashSet<Mid>,
) {
    let prefix_mid = if raw.level == 0 {
        Mid::new(raw.payload.clone())
    } else {
        match owner_mid.ancestor(raw.level) {
            Some(base) => base.join(&raw.payload),
            None => {
                store.add_diagnostic(Diagnostic::resolve(
                    file_path.to_path_buf(),
                    None,
                    format!("relative wildcard import level {} exceeds package depth", raw.level),
                ));
                return;
            }
        }
    };

    if !internal_mids.contains(&prefix_mid) {
        let idx = match store.node_index(&prefix_mid) {
            Some(idx) => idx,
            None => store.get_or_insert_external(prefix_mid),
        };
        store.add_edge(owner_idx, idx);
        return;
    }

    let children: Vec<&Mid> = internal_mids
        .iter()
        .filter(|mid| mid.parent().as_ref() == Some(&prefix_mid))
        .collect();

    if children.is_empty() {
        store.add_diagnostic(Diagnostic::resolve(
            file_path.to_path_buf(),
            Some(prefix_mid),
            "wildcard import over a package with no direct submodules",
        ));
        return;
    }

    for child in children {
        let idx = store.node_index(child).expect("internal mid must already be indexed");
        store.add_edge(owner_idx, idx);
    }
}
