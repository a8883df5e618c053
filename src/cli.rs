use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Static import-graph engine for test selection in Python repositories.
///
/// Builds a directed module graph from `import`/`from ... import` statements and
/// exposes it to test runners so they can select only the tests a change could
/// possibly affect, instead of running the whole suite.
#[derive(Parser, Debug)]
#[command(
    name = "prunegraph",
    version,
    about,
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Debug, ValueEnum, Default)]
pub enum ValidateModeArg {
    Strict,
    Warn,
    #[default]
    Disabled,
}

impl ValidateModeArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Warn => "warn",
            Self::Disabled => "disabled",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the module graph for a project, optionally persisting it.
    Graph {
        /// Path to the project root to walk and parse.
        path: PathBuf,

        /// Write the built graph to this path.
        #[arg(long, value_name = "PATH")]
        graph: Option<PathBuf>,

        /// Load a `prunegraph.toml`-equivalent hook file from here instead of
        /// `<path>/prunegraph.toml`.
        #[arg(long, value_name = "PATH")]
        hook: Option<PathBuf>,
    },

    /// Build the graph and run the dynamic validator against a recorded trace.
    Validate {
        /// Path to the project root to walk and parse.
        path: PathBuf,

        /// Failure policy for a missing dynamic edge.
        #[arg(long, value_enum, default_value_t = ValidateModeArg::default())]
        mode: ValidateModeArg,
    },
}
