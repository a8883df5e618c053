//! The fixed-interface hook surface that replaces the distilled spec's duck-typed
//! override objects: implementors supply any subset of methods, and every method
//! left unimplemented falls back to reading [`Config`].

use std::collections::{HashMap, HashSet};

use crate::config::Config;
use crate::resolver::Mid;

/// Capability surface a caller can override to customize a build beyond what
/// `prunegraph.toml` expresses. `ConfigHooks` is the default implementation, reading
/// everything from a loaded [`Config`]; callers with extra knowledge (e.g. a plugin
/// that knows about dependencies injected by a DI container) implement only the
/// methods they need to change.
pub trait Hooks {
    fn source_roots(&self) -> Vec<String>;
    fn ignore_patterns(&self) -> Vec<String>;
    fn include_typechecking(&self) -> bool;

    /// Extra dependency edges to add before closure computation (pre-closure):
    /// importer MID (as a dotted string) to the set of MIDs it should be treated as
    /// depending on, in addition to whatever the static extractor found.
    fn dynamic_dependencies(&self) -> HashMap<String, HashSet<String>> {
        HashMap::new()
    }

    /// Extra leaves to fold into the closure of the given MID, applied after the
    /// static graph is built (post-closure): any seed that transitively reaches the
    /// key also reaches every MID in its value set, and vice versa for `closure_in`.
    fn dynamic_dependencies_at_leaves(&self) -> HashMap<Mid, HashSet<Mid>> {
        HashMap::new()
    }
}

/// Reads every hook method from a loaded [`Config`]. `dynamic_dependencies` and
/// `dynamic_dependencies_at_leaves` have no TOML representation and stay empty here
/// — they exist for programmatic callers, not the config file.
pub struct ConfigHooks {
    config: Config,
}

impl ConfigHooks {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Hooks for ConfigHooks {
    fn source_roots(&self) -> Vec<String> {
        self.config.source_roots.clone()
    }

    fn ignore_patterns(&self) -> Vec<String> {
        self.config.ignore.clone()
    }

    fn include_typechecking(&self) -> bool {
        self.config.include_typechecking
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_hooks_reads_source_roots() {
        let mut config = Config::default();
        config.source_roots = vec!["src".to_string()];
        let hooks = ConfigHooks::new(config);
        assert_eq!(hooks.source_roots(), vec!["src".to_string()]);
    }

    #[test]
    fn test_config_hooks_dynamic_dependencies_default_empty() {
        let hooks = ConfigHooks::new(Config::default());
        assert!(hooks.dynamic_dependencies().is_empty());
        assert!(hooks.dynamic_dependencies_at_leaves().is_empty());
    }

    #[test]
    fn test_config_hooks_include_typechecking_defaults_false() {
        let hooks = ConfigHooks::new(Config::default());
        assert!(!hooks.include_typechecking());
    }
}
