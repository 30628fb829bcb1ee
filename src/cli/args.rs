//! Command-line argument parsing for finops-retrieval
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// finops-retrieval - Two-stage retrieval over a cloud cost optimization knowledge base
#[derive(Parser, Debug)]
#[command(name = "finops-retrieval")]
#[command(author = "Jerome (Kubashen) Naidoo")]
#[command(version)]
#[command(about = "Semantic search + cross-encoder reranking for cloud cost optimization", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Retrieve ranked passages for a question
    Query {
        /// Natural-language question
        #[arg(value_name = "TEXT")]
        text: String,

        /// Number of results (1-20)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Return stage-1 order without cross-encoder reranking
        #[arg(long)]
        no_rerank: bool,

        /// Keep only these providers (repeatable, case-insensitive)
        #[arg(short, long = "provider", value_name = "PROVIDER")]
        providers: Vec<String>,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute Recall@5 and MRR over a JSON file of relevance judgments
    Evaluate {
        /// JSON array of {"query", "relevant_ids"} objects
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the configured backends are reachable
    Doctor,

    /// Display current configuration
    Config {
        /// Write the default configuration to the config path
        #[arg(long)]
        init: bool,
    },
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Log filter directive; `configured` applies at normal verbosity
    pub fn log_filter(&self, configured: &str) -> String {
        match self {
            Verbosity::Quiet => "error".to_string(),
            Verbosity::Normal => configured.to_string(),
            Verbosity::Verbose => "debug".to_string(),
            Verbosity::VeryVerbose => "trace".to_string(),
        }
    }

    /// Check if should show progress bars
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}
