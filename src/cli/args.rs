//! CLI argument definitions using clap derive

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Stencil - database template cache
///
/// Creates fresh ERP databases, cloning a cached template whenever one was
/// already built from the same modules and sources.
#[derive(Parser, Debug)]
#[command(name = "stencil")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "STENCIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maintenance database URL (overrides [database] url)
    #[arg(long, global = true, env = "STENCIL_DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a database, reusing a cached template when possible
    Init(InitArgs),

    /// Evict templates by age and count
    Trim(TrimArgs),

    /// Drop every template in a cache namespace
    Purge(PurgeArgs),

    /// List cached templates, most recently used first
    List(ListArgs),

    /// Print the digest of a module set
    Digest(DigestArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Cache namespace selection shared by cache commands
#[derive(Args, Debug, Clone, Default)]
pub struct CacheSelector {
    /// Cache namespace (default: from config)
    #[arg(long = "cache-prefix", value_name = "PREFIX")]
    pub prefix: Option<String>,
}

/// Module selection shared by init and digest
#[derive(Args, Debug, Clone)]
pub struct ModuleArgs {
    /// Install module; repeat or separate with commas
    #[arg(
        short = 'i',
        long = "install",
        value_name = "MODULE",
        value_delimiter = ',',
        default_value = "base"
    )]
    pub modules: Vec<String>,

    /// Load demo data
    #[arg(long)]
    pub with_demo: bool,
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Name of the database to create
    pub database: String,

    /// SQL to run in the new database afterwards (never cached)
    pub rawsql: Option<String>,

    #[command(flatten)]
    pub modules: ModuleArgs,

    /// Build the database without the cache
    #[arg(long)]
    pub no_cache: bool,

    #[command(flatten)]
    pub cache: CacheSelector,

    /// Drop templates unused for N days afterwards; -1 disables
    #[arg(long = "cache-max-age", value_name = "DAYS", allow_negative_numbers = true)]
    pub max_age: Option<i64>,

    /// Keep the N most recently used templates afterwards; -1 disables
    #[arg(long = "cache-max-size", value_name = "N", allow_negative_numbers = true)]
    pub max_size: Option<i64>,
}

/// Arguments for the trim command
#[derive(Parser, Debug)]
pub struct TrimArgs {
    #[command(flatten)]
    pub cache: CacheSelector,

    /// Drop templates unused for N days; -1 disables (default: from config)
    #[arg(long, value_name = "DAYS", allow_negative_numbers = true)]
    pub max_age: Option<i64>,

    /// Keep the N most recently used templates; -1 disables, 0 empties
    /// (default: from config)
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub max_size: Option<i64>,
}

/// Arguments for the purge command
#[derive(Parser, Debug)]
pub struct PurgeArgs {
    #[command(flatten)]
    pub cache: CacheSelector,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub cache: CacheSelector,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the digest command
#[derive(Parser, Debug)]
pub struct DigestArgs {
    #[command(flatten)]
    pub modules: ModuleArgs,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
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
}

/// Output format for list command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
