//! Persisting and reloading a built graph cheaply.
//!
//! The on-disk envelope mirrors the reference implementation's own cache envelope
//! (`cache::envelope::CacheEnvelope`: versioned struct, atomic write via a temp file
//! in the same directory followed by a rename, `bincode` over `serde`) but its fields
//! take the string-table/edge-list/metadata shape this format requires instead of
//! wrapping an opaque graph blob — MIDs are stored once in a string table and
//! referenced by index, edges are index pairs, and a metadata block records the
//! source roots, ignore patterns, and config that produced the graph.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use petgraph::stable_graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::CoreError;
use crate::graph::node::{InternalModule, ModuleNode};
use crate::graph::{Graph, GraphStore};
use crate::resolver::Mid;

const MAGIC: u32 = 0x5052_4745; // b"PRGE", read as a little-endian u32
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    mid_index: u32,
    internal: bool,
    path: Option<PathBuf>,
    package_root: Option<PathBuf>,
    content_hash: u64,
    is_test: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct EdgeRecord {
    from: u32,
    to: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Metadata {
    source_roots: Vec<String>,
    ignore_patterns: Vec<String>,
    /// A short description of the hook configuration active when this graph was
    /// built, compared against the current configuration to decide staleness
    /// alongside the content-hash summary.
    hook_signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    magic: u32,
    format_version: u32,
    content_hash_summary: u64,
    strings: Vec<String>,
    nodes: Vec<NodeRecord>,
    edges: Vec<EdgeRecord>,
    metadata: Metadata,
}

fn hook_signature(config: &Config) -> String {
    format!(
        "typechecking={};test_patterns={:?}",
        config.include_typechecking, config.test_patterns
    )
}

/// Order-independent combination of every internal file's content hash, used to
/// decide whether a loaded graph is stale with respect to the current tree.
pub fn content_hash_summary(graph: &Graph) -> u64 {
    graph
        .nodes()
        .filter_map(|(_, node)| match node {
            ModuleNode::Internal(m) => Some(m.content_hash),
            ModuleNode::External(_) => None,
        })
        .fold(0u64, |acc, h| acc ^ h.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

fn to_envelope(graph: &Graph, config: &Config) -> Envelope {
    let mut strings: Vec<String> = Vec::new();
    let mut mid_index: HashMap<Mid, u32> = HashMap::new();
    let mut node_order: HashMap<NodeIndex, u32> = HashMap::new();
    let mut nodes = Vec::new();

    for (idx, node) in graph.nodes() {
        let mid = node.mid();
        let string_idx = *mid_index.entry(mid.clone()).or_insert_with(|| {
            strings.push(mid.as_str().to_string());
            (strings.len() - 1) as u32
        });
        node_order.insert(idx, nodes.len() as u32);
        nodes.push(match node {
            ModuleNode::Internal(m) => NodeRecord {
                mid_index: string_idx,
                internal: true,
                path: Some(m.path.clone()),
                package_root: Some(m.package_root.clone()),
                content_hash: m.content_hash,
                is_test: m.is_test,
            },
            ModuleNode::External(_) => NodeRecord {
                mid_index: string_idx,
                internal: false,
                path: None,
                package_root: None,
                content_hash: 0,
                is_test: false,
            },
        });
    }

    let edges = graph
        .edges()
        .map(|(from, to)| EdgeRecord {
            from: node_order[&from],
            to: node_order[&to],
        })
        .collect();

    Envelope {
        magic: MAGIC,
        format_version: FORMAT_VERSION,
        content_hash_summary: content_hash_summary(graph),
        strings,
        nodes,
        edges,
        metadata: Metadata {
            source_roots: config.source_roots.clone(),
            ignore_patterns: config.ignore.clone(),
            hook_signature: hook_signature(config),
        },
    }
}

fn from_envelope(envelope: Envelope) -> Graph {
    let mut store = GraphStore::new();
    let mut indices: Vec<NodeIndex> = Vec::with_capacity(envelope.nodes.len());

    for record in &envelope.nodes {
        let mid = Mid::new(envelope.strings[record.mid_index as usize].clone());
        let idx = if record.internal {
            store.get_or_insert_internal(InternalModule {
                mid,
                path: record.path.clone().unwrap_or_default(),
                package_root: record.package_root.clone().unwrap_or_default(),
                content_hash: record.content_hash,
                is_test: record.is_test,
            })
        } else {
            store.get_or_insert_external(mid)
        };
        indices.push(idx);
    }

    for edge in &envelope.edges {
        store.add_edge(indices[edge.from as usize], indices[edge.to as usize]);
    }

    store.finish_build()
}

/// Serialize `graph` and atomically write it to `path` (temp file in the same
/// directory, then rename).
pub fn save(path: &Path, graph: &Graph, config: &Config) -> Result<(), CoreError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|source| CoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let envelope = to_envelope(graph, config);
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| CoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    bincode::serde::encode_into_std_write(&envelope, &mut tmp, bincode::config::standard())
        .map_err(|e| CoreError::Encode(e.to_string()))?;
    tmp.as_file().flush().map_err(|source| CoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.persist(path).map_err(|e| CoreError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Load a graph previously written by [`save`]. A format-version mismatch or
/// corrupt envelope is a hard error — there is no silent fallback.
pub fn load(path: &Path) -> Result<Graph, CoreError> {
    let bytes = std::fs::read(path).map_err(|source| CoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let (envelope, _): (Envelope, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
            .map_err(|e| CoreError::Decode(e.to_string()))?;

    if envelope.magic != MAGIC {
        return Err(CoreError::Corrupt {
            path: path.to_path_buf(),
            message: "bad magic number".to_string(),
        });
    }
    if envelope.format_version != FORMAT_VERSION {
        return Err(CoreError::VersionMismatch {
            expected: FORMAT_VERSION,
            found: envelope.format_version,
        });
    }

    let signature = envelope.metadata.hook_signature.clone();
    let mut graph = from_envelope(envelope);
    graph.set_loaded_hook_signature(signature);
    Ok(graph)
}

/// Whether a loaded graph is trustworthy against the current tree: its content-hash
/// summary must match, and — for a graph that was actually reloaded from disk — the
/// hook configuration that produced it must be unchanged. A freshly built graph (never
/// round-tripped through [`save`]/[`load`]) has no prior signature to compare and is
/// judged on content hash alone.
pub fn is_stale(graph: &Graph, config: &Config, current_summary: u64) -> bool {
    if content_hash_summary(graph) != current_summary {
        return true;
    }
    match graph.loaded_hook_signature() {
        Some(loaded) => loaded != hook_signature(config),
        None => false,
    }
}
