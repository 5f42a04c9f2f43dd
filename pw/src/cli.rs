//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Planwizard - retrieval-augmented curriculum plan generator
#[derive(Parser)]
#[command(name = "pw", about = "Curriculum plan wizard for school districts", version)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Embed and ingest a corpus seed file into the document store
    Index {
        /// Seed file (JSON array of corpus records)
        seed: PathBuf,

        /// Clear existing documents before ingesting
        #[arg(long)]
        reseed: bool,
    },

    /// Run a retrieval query against the indexed corpus
    Search {
        /// Query text
        query: String,

        /// Filter by document type (standard, policy, curriculum)
        #[arg(short = 't', long)]
        doc_type: Option<String>,

        /// Maximum hits to show
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Generate a curriculum plan from a district profile file
    ///
    /// Streams generation events to stdout as newline-delimited JSON
    /// frames, then writes the exported plan.
    Plan {
        /// District profile (YAML or JSON)
        profile: PathBuf,

        /// Write the export here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export format (markdown, json)
        #[arg(short, long, default_value = "markdown")]
        format: String,
    },
}
