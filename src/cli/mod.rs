//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "loreqa",
    version,
    about = "Corpus-grounded question answering with adaptive hybrid retrieval",
    long_about = "Loreqa answers natural-language questions over a document corpus by routing each \
                  query, gathering evidence from a local vector index (and optionally an external \
                  search endpoint), gating the evidence for sufficiency, and asking a language model \
                  only what the evidence supports."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/loreqa/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a single question and print the grounded answer
    Ask {
        /// Question to ask
        query: String,

        /// Restrict retrieval to one work (catalog identifier)
        #[arg(short, long)]
        work: Option<String>,

        /// Print turn diagnostics as JSON after the answer
        #[arg(long)]
        diagnostics: bool,
    },

    /// Interactive chat with conversation memory (type /clear to reset, /quit to leave)
    Chat,

    /// Show how a query would be routed and classified, without answering it
    Route {
        /// Query text to inspect
        query: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration and catalog templates
    Init {
        /// Force overwrite existing files
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
