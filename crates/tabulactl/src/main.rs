//! Tabula Control - ask questions about a CSV dataset from the command line

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tabulactl::commands::{self, CommonArgs};

#[derive(Parser)]
#[command(name = "tabulactl")]
#[command(about = "Ask questions about tabular data through an LLM agent, with answer caching", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct SourceArgs {
    /// CSV file path or URL (URLs may carry `sep` and `encoding` query params)
    source: String,

    /// Field delimiter for local files
    #[arg(long, default_value = ",")]
    sep: char,

    /// Column descriptions: inline JSON object or URL to one
    #[arg(long)]
    columns: Option<String>,

    /// Base path for cache files (overrides config)
    #[arg(long)]
    cache_path: Option<PathBuf>,

    /// Bypass the answer cache entirely
    #[arg(long)]
    no_cache: bool,

    /// Model name (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// API key (defaults to the env var named in config)
    #[arg(long, env = "TABULA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question about the dataset
    Ask {
        #[command(flatten)]
        source: SourceArgs,

        question: String,
    },

    /// Show the code the agent used to answer a question
    Code {
        #[command(flatten)]
        source: SourceArgs,

        question: String,
    },

    /// Inspect or evict cached answers
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print the cached answers for a dataset
    Show {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Remove the cache for a dataset
    Clear {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Remove caches for every dataset under the base path
    ClearAll {
        /// Base path for cache files (overrides config)
        #[arg(long)]
        cache_path: Option<PathBuf>,
    },
}

impl From<SourceArgs> for CommonArgs {
    fn from(args: SourceArgs) -> Self {
        CommonArgs {
            source: args.source,
            sep: args.sep,
            columns: args.columns,
            cache_path: args.cache_path,
            no_cache: args.no_cache,
            model: args.model,
            api_key: args.api_key,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let verbose = cli.verbose;
    match cli.command {
        Commands::Ask { source, question } => commands::ask(source.into(), &question, verbose),
        Commands::Code { source, question } => commands::code(source.into(), &question, verbose),
        Commands::Cache { action } => match action {
            CacheAction::Show { source } => commands::cache_show(source.into(), verbose),
            CacheAction::Clear { source } => commands::cache_clear(source.into(), verbose),
            CacheAction::ClearAll { cache_path } => commands::cache_clear_all(cache_path),
        },
    }
}
