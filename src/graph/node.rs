use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::resolver::Mid;

/// A node in the module-dependency graph — either backed by a source file under a
/// configured root ("internal"), or referenced but not backed by the repository
/// ("external"). External MIDs are kept because tests may depend on them transitively
/// through hooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModuleNode {
    Internal(InternalModule),
    External(Mid),
}

impl ModuleNode {
    pub fn mid(&self) -> &Mid {
        match self {
            ModuleNode::Internal(m) => &m.mid,
            ModuleNode::External(mid) => mid,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, ModuleNode::Internal(_))
    }

    pub fn is_test(&self) -> bool {
        matches!(self, ModuleNode::Internal(m) if m.is_test)
    }

    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ModuleNode::Internal(m) => Some(&m.path),
            ModuleNode::External(_) => None,
        }
    }
}

/// Metadata for a MID backed by a source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalModule {
    pub mid: Mid,
    pub path: PathBuf,
    pub package_root: PathBuf,
    /// Hash of the file's contents at the time of the last build, used for cache
    /// invalidation.
    pub content_hash: u64,
    /// Whether this file matches the configured test-file glob patterns.
    pub is_test: bool,
}
