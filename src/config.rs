//! Project-local configuration, loaded from an optional `prunegraph.toml` at the
//! repository root. Every field has a documented default; a missing or unparsable
//! file never aborts a build — it falls back to defaults with a warning to stderr,
//! matching the reference implementation's own `code-graph.toml` loading convention.

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Additional explicit source roots, beyond auto-detected package roots.
    /// Declaring one disables marker-file auto-detection for files it contains and
    /// namespace packages (directories with submodules but no `__init__.py`) are
    /// supported under it for free.
    pub source_roots: Vec<String>,
    /// Extra glob patterns to ignore, on top of `.gitignore`.
    pub ignore: Vec<String>,
    /// Whether imports gated by a `TYPE_CHECKING` guard count as real edges.
    pub include_typechecking: bool,
    /// Glob patterns identifying test files.
    pub test_patterns: Vec<String>,
    /// One of `"strict" | "warn" | "disabled"`.
    pub validate_mode: String,
    /// Per-file parse timeout; `None` is unbounded.
    pub parse_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_roots: Vec::new(),
            ignore: Vec::new(),
            include_typechecking: false,
            test_patterns: vec!["test_*.py".to_string(), "*_test.py".to_string()],
            validate_mode: "disabled".to_string(),
            parse_timeout_ms: None,
        }
    }
}

impl Config {
    /// Load `prunegraph.toml` from `root`, falling back to defaults on absence or
    /// parse failure.
    pub fn load(root: &Path) -> Self {
        Self::load_file(&root.join("prunegraph.toml"))
    }

    /// Load a config TOML from an exact path (the CLI's `--hook <path>` override),
    /// falling back to defaults on absence or parse failure.
    pub fn load_file(config_path: &Path) -> Self {
        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("warning: failed to parse {}: {err}. Using defaults.", config_path.display());
                    Self::default()
                }
            },
            Err(err) => {
                eprintln!("warning: failed to read {}: {err}. Using defaults.", config_path.display());
                Self::default()
            }
        }
    }

    /// Whether `file_name` (just the final path component) matches one of
    /// `test_patterns`.
    pub fn is_test_file(&self, file_name: &str) -> bool {
        self.test_patterns.iter().any(|pattern| {
            glob::Pattern::new(pattern)
                .map(|p| p.matches(file_name))
                .unwrap_or(false)
        })
    }

    pub fn validate_mode(&self) -> Result<crate::validator::ValidateMode, crate::error::CoreError> {
        crate::validator::ValidateMode::parse(&self.validate_mode)
    }
}
