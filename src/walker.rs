//! Parallel, gitignore-aware source discovery, and the package-root/MID assignment
//! that the resolver depends on for everything downstream.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ignore::{WalkBuilder, WalkState};

use crate::config::Config;
use crate::error::Diagnostic;
use crate::resolver::Mid;

/// A source file discovered under a configured or auto-detected package root,
/// together with everything the resolver needs about it.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub package_root: PathBuf,
    pub mid: Mid,
    pub is_test: bool,
    /// Index into `config.source_roots` for files under an explicit root (lower wins
    /// a top-level MID collision); auto-detected roots sort after all explicit ones.
    pub root_priority: usize,
}

const AUTO_DETECTED_PRIORITY: usize = usize::MAX;

/// Walk `root`, returning every `.py`/`.pyi` file found plus any recoverable
/// traversal warnings. Ordered so that files under an earlier-configured source root
/// sort before files under a later one — the resolver relies on this order to let
/// the earlier root win a top-level MID collision.
pub fn walk_project(root: &Path, config: &Config) -> (Vec<DiscoveredFile>, Vec<Diagnostic>) {
    let files: Arc<Mutex<Vec<DiscoveredFile>>> = Arc::new(Mutex::new(Vec::new()));
    let diagnostics: Arc<Mutex<Vec<Diagnostic>>> = Arc::new(Mutex::new(Vec::new()));
    let visited_dirs: Arc<Mutex<HashSet<PathBuf>>> = Arc::new(Mutex::new(HashSet::new()));

    let explicit_roots: Vec<PathBuf> = config.source_roots.iter().map(|r| root.join(r)).collect();
    let root_owned = root.to_path_buf();

    let mut builder = WalkBuilder::new(root);
    builder.standard_filters(true).require_git(false).follow_links(true);

    let walker = builder.build_parallel();
    walker.run(|| {
        let files = Arc::clone(&files);
        let diagnostics = Arc::clone(&diagnostics);
        let visited_dirs = Arc::clone(&visited_dirs);
        let explicit_roots = explicit_roots.clone();
        let config_ignore = config.ignore.clone();
        let root_owned = root_owned.clone();

        Box::new(move |result| {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    diagnostics.lock().unwrap().push(Diagnostic::io(root_owned.clone(), err.to_string()));
                    return WalkState::Continue;
                }
            };

            let path = entry.path();

            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                // Guard against symlink cycles: skip a directory whose canonical form
                // we have already descended into.
                if let Ok(canonical) = path.canonicalize()
                    && !visited_dirs.lock().unwrap().insert(canonical)
                {
                    return WalkState::Skip;
                }
                return WalkState::Continue;
            }

            if !is_python_source(path) {
                return WalkState::Continue;
            }
            if matches_extra_ignore(path, &config_ignore) {
                return WalkState::Continue;
            }

            let (package_root, root_priority) = package_root_for(path, &explicit_roots);
            let mid = mid_from_path(&package_root, path);

            files.lock().unwrap().push(DiscoveredFile {
                path: path.to_path_buf(),
                package_root,
                mid,
                is_test: false, // classified once the walk completes, against config.test_patterns
                root_priority,
            });
            WalkState::Continue
        })
    });

    let mut files = Arc::try_unwrap(files).unwrap_or_else(|a| Mutex::new(a.lock().unwrap().clone())).into_inner().unwrap();
    for file in &mut files {
        let file_name = file.path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        file.is_test = config.is_test_file(file_name);
    }
    files.sort_by(|a, b| (a.root_priority, &a.path).cmp(&(b.root_priority, &b.path)));

    let diagnostics = Arc::try_unwrap(diagnostics).unwrap_or_else(|a| Mutex::new(a.lock().unwrap().clone())).into_inner().unwrap();
    (files, diagnostics)
}

fn is_python_source(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("py") | Some("pyi"))
}

fn matches_extra_ignore(path: &Path, patterns: &[String]) -> bool {
    let path_str = path.to_string_lossy();
    patterns.iter().any(|pattern| {
        glob::Pattern::new(pattern)
            .map(|p| p.matches(&path_str))
            .unwrap_or(false)
    })
}

/// If `path` falls under one of the explicitly configured `source_roots`, that root
/// wins outright (namespace packages are free under it — no marker-file check).
/// Otherwise auto-detect: climb from the file's directory while each directory
/// carries a package marker (`__init__.py`/`__init__.pyi`); the first ancestor
/// without one is the root.
fn package_root_for(path: &Path, explicit_roots: &[PathBuf]) -> (PathBuf, usize) {
    let mut best: Option<(usize, &PathBuf)> = None;
    for (idx, root) in explicit_roots.iter().enumerate() {
        if path.starts_with(root) {
            let better = best.is_none_or(|(_, current)| root.components().count() > current.components().count());
            if better {
                best = Some((idx, root));
            }
        }
    }
    if let Some((idx, root)) = best {
        return (root.clone(), idx);
    }

    (detect_package_root(path), AUTO_DETECTED_PRIORITY)
}

fn detect_package_root(file: &Path) -> PathBuf {
    let mut dir = file.parent().unwrap_or_else(|| Path::new(""));
    loop {
        if !has_package_marker(dir) {
            return dir.to_path_buf();
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return dir.to_path_buf(),
        }
    }
}

fn has_package_marker(dir: &Path) -> bool {
    dir.join("__init__.py").is_file() || dir.join("__init__.pyi").is_file()
}

/// Dotted module id for `file` relative to `package_root`: path separators become
/// dots, the extension is dropped, and a trailing `__init__` component (the package
/// itself) collapses away.
fn mid_from_path(package_root: &Path, file: &Path) -> Mid {
    let rel = file.strip_prefix(package_root).unwrap_or(file);
    let mut components: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if let Some(last) = components.last_mut() {
        if let Some(stripped) = last.strip_suffix(".py").or_else(|| last.strip_suffix(".pyi")) {
            *last = stripped.to_string();
        }
    }
    if components.last().map(|s| s.as_str()) == Some("__init__") {
        components.pop();
    }

    Mid::new(components.join("."))
}
