//! CLI parse: clap types for ctxstore. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ctxstore CLI - import and inspect records in a ctxstore database
#[derive(Parser)]
#[command(name = "ctxstore")]
#[command(about = "Import JSON into a ctxstore database and inspect what it holds")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (where config/ is looked up)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Schema to open (defaults to `default_schema` from config)
    #[arg(long)]
    pub schema: Option<String>,

    /// Use an in-memory store instead of the on-disk one
    #[arg(long)]
    pub in_memory: bool,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a JSON object or array of objects, then save
    Import {
        /// JSON file to import
        file: PathBuf,
        /// Kind to import into
        #[arg(long)]
        kind: String,
        /// Identity attribute; pass an empty string to always create
        #[arg(long)]
        id_key: Option<String>,
    },
    /// Count records of exactly one kind
    Count {
        #[arg(long)]
        kind: String,
        /// Predicate, e.g. 'id < 3 AND title CONTAINS[c] "art"'
        #[arg(long = "where")]
        filter: Option<String>,
    },
    /// List records of a kind (sub-kinds included)
    List {
        #[arg(long)]
        kind: String,
        #[arg(long = "where")]
        filter: Option<String>,
        /// Attribute to sort by
        #[arg(long)]
        sort: Option<String>,
        /// Sort descending
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Delete every record of a kind, optionally keeping some, then save
    DeleteAll {
        #[arg(long)]
        kind: String,
        /// Attribute compared against --keep values
        #[arg(long, requires = "keep")]
        keep_attr: Option<String>,
        /// Values of --keep-attr to keep (repeatable)
        #[arg(long, requires = "keep_attr")]
        keep: Vec<String>,
    },
    /// Show registered schemas and their kinds
    Schemas,
    /// Print the effective configuration as TOML
    Config,
}
