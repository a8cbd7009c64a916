//! CLI command definitions and parsing
use crate::chunking::ChunkingPolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "docqa",
    version,
    about = "Question answering over uploaded PDF documents",
    long_about = "docqa ingests PDF documents, splits their pages into overlapping chunks, embeds them \
                  into a vector index, and answers questions with dense retrieval followed by \
                  cross-encoder reranking."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/docqa/config.toml)
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
    /// Run the HTTP API
    Serve {
        /// Address to bind (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Index a single PDF document
    Upload {
        /// Path to the PDF file
        file: PathBuf,
    },

    /// Index every PDF in a directory
    Ingest {
        /// Directory containing PDF files
        dir: PathBuf,

        /// Chunking policy (defaults to chunking.batch_policy)
        #[arg(short, long)]
        policy: Option<ChunkingPolicy>,

        /// Replace the whole index with these documents
        #[arg(long)]
        rebuild: bool,
    },

    /// Ask a question against the indexed documents
    Query {
        /// Question text
        question: String,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Measure retrieval accuracy and latency over a question set
    Evaluate {
        /// JSON file of [{"question": ..., "relevant_pages": [...]}]
        questions: PathBuf,

        /// Show the report in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics
    Stats {
        /// Show statistics in JSON format
        #[arg(long)]
        json: bool,
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

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
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
