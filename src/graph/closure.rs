//! Transitive closure over the module graph: iterative, worklist-based (never
//! recursive, so cyclic import graphs — common in real repositories — terminate
//! cleanly), with per-node caching and support for the post-closure augmentation hook.

use std::collections::{HashSet, VecDeque};

use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;

use super::Graph;

/// Compute the transitive successor set of `seed` (not including `seed` itself unless
/// it is reachable via a cycle back to itself).
///
/// Follows real graph edges plus any post-closure augmentation registered for a visited
/// node's MID — augmented MIDs are enqueued exactly as if a real edge existed, so their
/// own successors are included too.
pub fn closure_out(graph: &Graph, seed: NodeIndex) -> HashSet<NodeIndex> {
    if let Some(cached) = graph.out_cache.lock().unwrap().get(&seed) {
        return cached.as_ref().clone();
    }
    let result = walk(graph, seed, Direction::Outgoing);
    graph
        .out_cache
        .lock()
        .unwrap()
        .insert(seed, std::sync::Arc::new(result.clone()));
    result
}

/// Compute the transitive predecessor set of `seed` — the set of nodes that can reach
/// `seed` by following real edges, plus the symmetric post-closure augmentation: if
/// `seed` (or a node reached along the way) was registered as an "extra" leaf of some
/// augmented MID, that augmented MID's node counts as a predecessor too.
pub fn closure_in(graph: &Graph, seed: NodeIndex) -> HashSet<NodeIndex> {
    if let Some(cached) = graph.in_cache.lock().unwrap().get(&seed) {
        return cached.as_ref().clone();
    }
    let result = walk(graph, seed, Direction::Incoming);
    graph
        .in_cache
        .lock()
        .unwrap()
        .insert(seed, std::sync::Arc::new(result.clone()));
    result
}

fn walk(graph: &Graph, seed: NodeIndex, direction: Direction) -> HashSet<NodeIndex> {
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut queue: VecDeque<NodeIndex> = VecDeque::new();
    queue.push_back(seed);

    while let Some(current) = queue.pop_front() {
        for edge in graph.graph.edges_directed(current, direction) {
            let next = match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            };
            if visited.insert(next) {
                queue.push_back(next);
            }
        }

        // Augmentation expansion: virtual edges from the post-closure hook.
        let current_mid = graph.graph[current].mid();
        let virtual_targets: Vec<NodeIndex> = match direction {
            Direction::Outgoing => graph
                .post_closure
                .get(current_mid)
                .into_iter()
                .flatten()
                .filter_map(|extra_mid| graph.index.get(extra_mid).copied())
                .collect(),
            Direction::Incoming => graph
                .post_closure_rev
                .get(current_mid)
                .into_iter()
                .flatten()
                .filter_map(|augmented_mid| graph.index.get(augmented_mid).copied())
                .collect(),
        };
        for next in virtual_targets {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;
    use crate::graph::node::InternalModule;
    use crate::resolver::Mid;
    use std::path::PathBuf;

    fn internal(mid: &str) -> InternalModule {
        InternalModule {
            mid: Mid::new(mid),
            path: PathBuf::from(format!("{}.py", mid.replace('.', "/"))),
            package_root: PathBuf::from("."),
            content_hash: 0,
            is_test: mid.starts_with("test_"),
        }
    }

    #[test]
    fn test_closure_out_terminates_on_cycle() {
        let mut store = GraphStore::new();
        let a = store.get_or_insert_internal(internal("a"));
        let b = store.get_or_insert_internal(internal("b"));
        store.add_edge(a, b);
        store.add_edge(b, a);
        let graph = store.finish_build();

        let out_a = closure_out(&graph, a);
        assert!(out_a.contains(&a), "cycle must include itself in its own closure");
        assert!(out_a.contains(&b));

        let in_a = closure_in(&graph, a);
        assert!(in_a.contains(&a));
        assert!(in_a.contains(&b));
    }

    #[test]
    fn test_closure_out_is_superset_of_direct_successors() {
        let mut store = GraphStore::new();
        let a = store.get_or_insert_internal(internal("a"));
        let b = store.get_or_insert_internal(internal("b"));
        let c = store.get_or_insert_internal(internal("c"));
        store.add_edge(a, b);
        store.add_edge(b, c);
        let graph = store.finish_build();

        let out = closure_out(&graph, a);
        assert!(out.contains(&b));
        assert!(out.contains(&c), "closure must be transitive");
    }

    #[test]
    fn test_post_closure_augmentation_expands_forward_and_backward() {
        let mut store = GraphStore::new();
        let a = store.get_or_insert_internal(internal("a"));
        let leaf = store.get_or_insert_internal(internal("leaf"));
        store.add_post_closure_augmentation(Mid::new("a"), [Mid::new("leaf")].into());
        let graph = store.finish_build();

        let out_a = closure_out(&graph, a);
        assert!(out_a.contains(&leaf), "post-closure extra must appear in forward closure");

        let in_leaf = closure_in(&graph, leaf);
        assert!(
            in_leaf.contains(&a),
            "post-closure augmentation must be symmetric for reverse closure lookups"
        );
    }
}
