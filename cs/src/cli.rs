//! CLI argument parsing for corpusstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cs")]
#[command(author, version, about = "Vector store for the curriculum corpus", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show store statistics
    Stats,

    /// List document ids
    List {
        /// Restrict to one document type (standard, policy, curriculum)
        #[arg(short = 't', long)]
        doc_type: Option<String>,
    },

    /// Display a stored document
    Cat {
        /// Document id
        #[arg(required = true)]
        id: String,
    },

    /// Delete all documents of one type (re-seed preparation)
    Delete {
        /// Document type (standard, policy, curriculum)
        #[arg(required = true)]
        doc_type: String,
    },
}
