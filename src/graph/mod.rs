pub mod closure;
pub mod node;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use petgraph::Directed;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;

use crate::error::Diagnostic;
use crate::resolver::Mid;
use node::{InternalModule, ModuleNode};

/// The mutable builder for a module graph. Exactly one writer may hold a `GraphStore`
/// at a time; once the build completes, [`GraphStore::finish_build`] consumes it and
/// returns a read-only [`Graph`] any number of readers can share concurrently. This
/// explicit write-phase/read-phase split is the graph's entire concurrency contract —
/// there is no locking inside `GraphStore` itself because, by construction, only one
/// thread ever holds one.
pub struct GraphStore {
    graph: StableGraph<ModuleNode, (), Directed>,
    index: HashMap<Mid, NodeIndex>,
    diagnostics: Vec<Diagnostic>,
    post_closure: HashMap<Mid, HashSet<Mid>>,
    hinted_typecheck: HashSet<(Mid, Mid)>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            index: HashMap::new(),
            diagnostics: Vec::new(),
            post_closure: HashMap::new(),
            hinted_typecheck: HashSet::new(),
        }
    }

    /// Insert an internal module node, or return the existing index if its MID was
    /// already registered (idempotent — an internal MID appears exactly once).
    pub fn get_or_insert_internal(&mut self, module: InternalModule) -> NodeIndex {
        if let Some(&existing) = self.index.get(&module.mid) {
            return existing;
        }
        let mid = module.mid.clone();
        let idx = self.graph.add_node(ModuleNode::Internal(module));
        self.index.insert(mid, idx);
        idx
    }

    /// Insert an external module node, or return the existing index. An internal MID
    /// always wins: if `mid` is already registered as internal, its index is returned
    /// unchanged rather than shadowed.
    pub fn get_or_insert_external(&mut self, mid: Mid) -> NodeIndex {
        if let Some(&existing) = self.index.get(&mid) {
            return existing;
        }
        let idx = self.graph.add_node(ModuleNode::External(mid.clone()));
        self.index.insert(mid, idx);
        idx
    }

    pub fn node_index(&self, mid: &Mid) -> Option<NodeIndex> {
        self.index.get(mid).copied()
    }

    pub fn contains(&self, mid: &Mid) -> bool {
        self.index.contains_key(mid)
    }

    /// Add a directed edge. Idempotent: adding the same edge twice is a no-op.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex) {
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
    }

    /// Remove a directed edge. No-op if absent.
    pub fn remove_edge(&mut self, from: NodeIndex, to: NodeIndex) {
        if let Some(edge) = self.graph.find_edge(from, to) {
            self.graph.remove_edge(edge);
        }
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Register a post-closure augmentation: `extra` MIDs are added to the closure
    /// results of any seed that transitively reaches `mid`. Multiple registrations for
    /// the same `mid` are unioned, never overwritten.
    pub fn add_post_closure_augmentation(&mut self, mid: Mid, extra: HashSet<Mid>) {
        self.post_closure.entry(mid).or_default().extend(extra);
    }

    /// Record an edge the resolver skipped because it was `TYPE_CHECKING`-only and
    /// typechecking imports are excluded. Carried through to the finished [`Graph`]
    /// so the dynamic validator can tell a hinted exclusion from a genuine gap.
    pub fn record_hinted_typecheck(&mut self, from: Mid, to: Mid) {
        self.hinted_typecheck.insert((from, to));
    }

    /// Close the write phase and hand back a read-only, shareable [`Graph`].
    pub fn finish_build(self) -> Graph {
        let post_closure_rev = reverse_augmentations(&self.post_closure);
        Graph {
            graph: self.graph,
            index: self.index,
            diagnostics: self.diagnostics,
            post_closure: self.post_closure,
            post_closure_rev,
            out_cache: Mutex::new(HashMap::new()),
            in_cache: Mutex::new(HashMap::new()),
            loaded_hook_signature: None,
            hinted_typecheck: self.hinted_typecheck,
        }
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

fn reverse_augmentations(post_closure: &HashMap<Mid, HashSet<Mid>>) -> HashMap<Mid, HashSet<Mid>> {
    let mut rev: HashMap<Mid, HashSet<Mid>> = HashMap::new();
    for (augmented, extras) in post_closure {
        for extra in extras {
            rev.entry(extra.clone()).or_default().insert(augmented.clone());
        }
    }
    rev
}

/// A read-only, built module graph. Safe to share behind an `Arc` across threads:
/// closure queries on disjoint seeds may run concurrently since nothing here mutates
/// after [`GraphStore::finish_build`] — the per-node closure caches use interior
/// mutability (`Mutex`) purely to memoize repeat queries, never to change topology.
pub struct Graph {
    graph: StableGraph<ModuleNode, (), Directed>,
    index: HashMap<Mid, NodeIndex>,
    diagnostics: Vec<Diagnostic>,
    post_closure: HashMap<Mid, HashSet<Mid>>,
    post_closure_rev: HashMap<Mid, HashSet<Mid>>,
    out_cache: Mutex<HashMap<NodeIndex, Arc<HashSet<NodeIndex>>>>,
    in_cache: Mutex<HashMap<NodeIndex, Arc<HashSet<NodeIndex>>>>,
    /// The hook signature recorded in a loaded graph's serialized metadata block, if
    /// this `Graph` came from [`crate::serialize::load`] rather than a fresh
    /// [`GraphStore::finish_build`]. `None` for a freshly built graph, which has no
    /// prior on-disk signature to compare against.
    loaded_hook_signature: Option<String>,
    /// Edges the resolver skipped as `TYPE_CHECKING`-only, fed to [`crate::validate`]
    /// so a runtime edge the static closure doesn't have can be explained instead of
    /// just flagged as missing.
    hinted_typecheck: HashSet<(Mid, Mid)>,
}

impl Graph {
    pub fn node_index(&self, mid: &Mid) -> Option<NodeIndex> {
        self.index.get(mid).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &ModuleNode {
        &self.graph[idx]
    }

    pub fn mid_for_path(&self, path: &Path) -> Option<&Mid> {
        self.graph
            .node_weights()
            .find(|n| n.path().is_some_and(|p| p == path))
            .map(|n| n.mid())
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &ModuleNode)> {
        self.graph.node_indices().map(|i| (i, &self.graph[i]))
    }

    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex)> + '_ {
        self.graph.edge_indices().filter_map(|e| self.graph.edge_endpoints(e))
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Direct successors of `node` (not transitive).
    pub fn out(&self, node: NodeIndex) -> HashSet<NodeIndex> {
        self.graph
            .edges_directed(node, petgraph::Direction::Outgoing)
            .map(|e| e.target())
            .collect()
    }

    /// Direct predecessors of `node` (not transitive).
    pub fn r#in(&self, node: NodeIndex) -> HashSet<NodeIndex> {
        self.graph
            .edges_directed(node, petgraph::Direction::Incoming)
            .map(|e| e.source())
            .collect()
    }

    pub fn closure_out(&self, node: NodeIndex) -> HashSet<NodeIndex> {
        closure::closure_out(self, node)
    }

    pub fn closure_in(&self, node: NodeIndex) -> HashSet<NodeIndex> {
        closure::closure_in(self, node)
    }

    /// All internal nodes classified as test files.
    pub fn test_files(&self) -> HashSet<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&i| self.graph[i].is_test())
            .collect()
    }

    /// The hook signature stashed in this graph's on-disk metadata block, if it was
    /// produced by [`crate::serialize::load`]. `None` for a graph that has never been
    /// round-tripped through [`crate::serialize::save`]/`load`.
    pub(crate) fn loaded_hook_signature(&self) -> Option<&str> {
        self.loaded_hook_signature.as_deref()
    }

    pub(crate) fn set_loaded_hook_signature(&mut self, signature: String) {
        self.loaded_hook_signature = Some(signature);
    }

    /// Edges the resolver excluded as `TYPE_CHECKING`-only. Pass this to
    /// [`crate::validate`] so a runtime import observed for one of these pairs is
    /// reported as a guarded exclusion rather than an unexplained missing edge.
    pub fn hinted_typecheck(&self) -> &HashSet<(Mid, Mid)> {
        &self.hinted_typecheck
    }

    /// Reopen the write phase. Used only by the dynamic validator, and only when
    /// explicitly configured to prune spurious static edges — by default the
    /// validator only emits diagnostics and never calls this.
    pub fn into_store(self) -> GraphStore {
        GraphStore {
            graph: self.graph,
            index: self.index,
            diagnostics: self.diagnostics,
            post_closure: self.post_closure,
            hinted_typecheck: self.hinted_typecheck,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node::InternalModule;
    use std::path::PathBuf;

    fn internal(mid: &str) -> InternalModule {
        InternalModule {
            mid: Mid::new(mid),
            path: PathBuf::from(format!("{}.py", mid.replace('.', "/"))),
            package_root: PathBuf::from("."),
            content_hash: 0,
            is_test: false,
        }
    }

    #[test]
    fn test_add_edge_idempotent() {
        let mut store = GraphStore::new();
        let a = store.get_or_insert_internal(internal("a"));
        let b = store.get_or_insert_internal(internal("b"));
        store.add_edge(a, b);
        store.add_edge(a, b);
        let graph = store.finish_build();
        assert_eq!(graph.edge_count(), 1, "duplicate edges must collapse");
    }

    #[test]
    fn test_out_and_in_agree_with_add_edge() {
        let mut store = GraphStore::new();
        let a = store.get_or_insert_internal(internal("a"));
        let b = store.get_or_insert_internal(internal("b"));
        store.add_edge(a, b);
        let graph = store.finish_build();
        assert!(graph.out(a).contains(&b));
        assert!(graph.r#in(b).contains(&a));
    }

    #[test]
    fn test_remove_edge_is_noop_if_absent() {
        let mut store = GraphStore::new();
        let a = store.get_or_insert_internal(internal("a"));
        let b = store.get_or_insert_internal(internal("b"));
        store.remove_edge(a, b); // never added
        let graph = store.finish_build();
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_internal_mid_appears_exactly_once() {
        let mut store = GraphStore::new();
        let first = store.get_or_insert_internal(internal("pkg.a"));
        let second = store.get_or_insert_internal(internal("pkg.a"));
        assert_eq!(first, second);
        let graph = store.finish_build();
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_internal_precedence_over_external() {
        let mut store = GraphStore::new();
        let internal_idx = store.get_or_insert_internal(internal("pkg.a"));
        let shadowed = store.get_or_insert_external(Mid::new("pkg.a"));
        assert_eq!(internal_idx, shadowed, "internal MID must win over external of the same name");
        let graph = store.finish_build();
        assert!(graph.node(internal_idx).is_internal());
    }
}
