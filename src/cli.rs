use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Resolve organism names to NCBI taxonomy IDs and genome assembly counts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to log file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Look up taxon IDs, scientific names and assembly counts
    Resolve(ResolveCommand),

    /// Inspect and manage the result cache
    Cache(CacheCommand),
}

#[derive(Parser, Debug)]
pub struct ResolveCommand {
    /// Organism names, e.g. "Homo sapiens" or "Anabaena sp."
    pub names: Vec<String>,

    /// Files with one name per line ("-" for stdin)
    #[arg(short, long)]
    pub input: Vec<PathBuf>,

    /// Contact email sent with every E-utilities request
    #[arg(short, long, env = "NCBI_EMAIL")]
    pub email: String,

    /// NCBI API key (raises the request rate limit)
    #[arg(long, env = "NCBI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Tool name reported to E-utilities
    #[arg(long, default_value = env!("CARGO_PKG_NAME"))]
    pub tool: String,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "tsv")]
    pub format: OutputFormat,

    /// Print a header line before TSV output
    #[arg(long)]
    pub header: bool,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// How the wait between retries grows
    #[arg(long, value_enum, default_value = "fixed")]
    pub backoff: BackoffStrategy,

    /// Give up immediately on names with no taxonomy match
    #[arg(long)]
    pub skip_unknown: bool,

    /// Do not fall back to a genus-only search
    #[arg(long)]
    pub no_genus_fallback: bool,

    /// SQLite cache of previously resolved names
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Ignore cached records but store fresh results
    #[arg(long, requires = "cache")]
    pub refresh: bool,
}

#[derive(Parser, Debug)]
pub struct CacheCommand {
    /// Path to the SQLite cache file
    #[arg(short, long, default_value = "taxon-cache.db")]
    pub database: PathBuf,

    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheSubcommand {
    /// List cached records
    List {
        /// Only records with at least one assembly
        #[arg(long)]
        with_assemblies: bool,
    },

    /// Show cache statistics
    Stats,

    /// Remove a cached record
    Remove {
        /// Name as originally resolved
        name: String,

        /// Force removal without confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Remove every cached record
    Clear {
        /// Force removal without confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Validate cache integrity
    Validate,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum OutputFormat {
    Tsv,
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum BackoffStrategy {
    Fixed,
    Exponential,
}

impl From<OutputFormat> for crate::io::RecordFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Tsv => Self::Tsv,
            OutputFormat::Json => Self::JsonLines,
        }
    }
}

impl From<BackoffStrategy> for crate::resolver::Backoff {
    fn from(strategy: BackoffStrategy) -> Self {
        match strategy {
            BackoffStrategy::Fixed => Self::Fixed,
            BackoffStrategy::Exponential => Self::Exponential,
        }
    }
}
