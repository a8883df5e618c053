//! Structured error and diagnostic taxonomy shared across every component.
//!
//! Recoverable problems (a file that fails to parse, an import that resolves past the
//! repository root) are never propagated as `Err` — they accumulate as [`Diagnostic`]
//! values on the build result so a caller can inspect them without aborting. Only the
//! handful of genuinely fatal conditions (corrupt cache, version mismatch) are surfaced
//! as [`CoreError`].

use std::path::PathBuf;

use crate::resolver::Mid;

/// The kind of a structured diagnostic or fatal error, matching the taxonomy in
/// the error-handling design: IO, Parse, Resolve, Validate, Serialize, Select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A file or directory could not be read.
    Io,
    /// A source file failed to parse.
    Parse,
    /// An import reference could not be resolved (relative past root, empty wildcard,
    /// duplicate top-level module).
    Resolve,
    /// The dynamic validator observed an edge absent from the static closure.
    Validate,
    /// The graph serialization format is corrupt or version-mismatched.
    Serialize,
    /// A changed file passed to `select` did not resolve to any graph node.
    Select,
}

/// A single recoverable problem observed during a build, resolve, validate, or select
/// pass. Diagnostics never abort their phase; they accumulate on the caller-visible
/// result.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub file: Option<PathBuf>,
    pub mid: Option<Mid>,
    pub message: String,
    pub byte_offset: Option<usize>,
}

impl Diagnostic {
    pub fn io(file: PathBuf, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Io,
            file: Some(file),
            mid: None,
            message: message.into(),
            byte_offset: None,
        }
    }

    pub fn parse(file: PathBuf, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Parse,
            file: Some(file),
            mid: None,
            message: message.into(),
            byte_offset: None,
        }
    }

    pub fn resolve(file: PathBuf, mid: Option<Mid>, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Resolve,
            file: Some(file),
            mid,
            message: message.into(),
            byte_offset: None,
        }
    }

    pub fn validate(mid: Mid, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Validate,
            file: None,
            mid: Some(mid),
            message: message.into(),
            byte_offset: None,
        }
    }

    pub fn select(file: PathBuf, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Select,
            file: Some(file),
            mid: None,
            message: message.into(),
            byte_offset: None,
        }
    }
}

/// Fatal errors. These abort the current phase and surface to the caller — every
/// variant carries enough context (file, MID, or byte offset) to identify the
/// offending input.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("corrupt graph cache at {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("dynamic validation failed in strict mode: {0} missing edge(s)")]
    ValidationFailed(usize),

    #[error("invalid validator mode {0:?}; expected one of strict, warn, disabled")]
    InvalidMode(String),

    #[error("failed to encode graph: {0}")]
    Encode(String),

    #[error("failed to decode graph: {0}")]
    Decode(String),
}
