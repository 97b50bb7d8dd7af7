//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fintree",
    version,
    about = "Hierarchical retrieval-augmented generation for financial reports",
    long_about = "fintree chunks financial documents, builds a five-level metadata-aware \
                  summary tree over them, and answers questions by retrieving the most \
                  relevant tree nodes as context."
)]
pub struct Cli {
    /// Config file path (defaults are used when omitted)
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
    /// Build a summary tree from text documents and save the snapshot
    Build {
        /// Input text files, one document per file
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory receiving the tree snapshot
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Ask a question against a saved tree
    Query {
        /// The question to answer
        question: String,

        /// Directory holding the tree snapshot
        #[arg(short, long)]
        tree: PathBuf,

        /// Retrieval method: hierarchical or flattened
        #[arg(short, long)]
        method: Option<String>,

        /// Number of nodes to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the shape of a saved tree
    Stats {
        /// Directory holding the tree snapshot
        #[arg(short, long)]
        tree: PathBuf,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write the default configuration to a file
    Init { path: PathBuf },
    /// Print the effective configuration
    Show,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
