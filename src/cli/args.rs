//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Repodex - artifact repository content index
///
/// Resolves content through hosted, remote and group repositories,
/// remembering where each path was found.
#[derive(Parser, Debug)]
#[command(name = "repodex")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "REPODEX_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a path in a store and print its content
    Get(GetArgs),

    /// Upload a file into a store
    Put(PutArgs),

    /// Remove a path from a store
    Delete(DeleteArgs),

    /// Inspect configured stores
    Stores(StoresArgs),

    /// Inspect and maintain the content index
    Index(IndexArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Store key, e.g. maven:group:public
    pub store: String,

    /// Path inside the store
    pub path: String,

    /// Write content to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct PutArgs {
    /// Store key
    pub store: String,

    /// Path inside the store
    pub path: String,

    /// Local file to upload
    pub file: PathBuf,
}

#[derive(Parser, Debug)]
pub struct DeleteArgs {
    /// Store key
    pub store: String,

    /// Path inside the store
    pub path: String,
}

#[derive(Parser, Debug)]
pub struct StoresArgs {
    #[command(subcommand)]
    pub action: StoresAction,
}

#[derive(Subcommand, Debug)]
pub enum StoresAction {
    /// List configured stores
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Parser, Debug)]
pub struct IndexArgs {
    #[command(subcommand)]
    pub action: IndexAction,
}

#[derive(Subcommand, Debug)]
pub enum IndexAction {
    /// List index entries of a store
    Show {
        /// Store key
        store: String,

        /// Page number, starting at 0
        #[arg(long, default_value = "0")]
        page: usize,

        /// Entries per page
        #[arg(long, default_value = "100")]
        page_size: usize,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show which store serves a path
    Lookup {
        /// Store key
        store: String,

        /// Path inside the store
        path: String,
    },

    /// Remove every index entry of a store
    Clear {
        /// Store key
        store: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Rebuild the index from storage
    Warm,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., index.page_size)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
