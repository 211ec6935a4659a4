//! Waystack CLI - Operational tooling for Waystack deployments
//!
//! # Commands
//! - `waystack inspect <token>` - Verify and print the state a token carries
//! - `waystack purge --database-url <url>` - Delete stored state older than a cutoff
//! - `waystack config [path]` - Print the effective navigation config
//! - `waystack keygen` - Print a fresh random key

mod config;
mod inspect;
mod keygen;
mod purge;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Waystack CLI
#[derive(Parser)]
#[command(name = "waystack")]
#[command(author, version, about = "Operational tooling for Waystack navigation state")]
struct Cli {
    /// Log to stderr (filter with RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a token and print the call stack and action it carries
    Inspect(inspect::InspectArgs),

    /// Delete stored state blobs older than a cutoff
    Purge {
        /// sqlite:... or postgres://... connection string
        #[arg(long, env = "WAYSTACK_DATABASE_URL")]
        database_url: String,

        /// Age in seconds beyond which blobs are removed
        #[arg(long, default_value_t = 86_400)]
        older_than_secs: i64,
    },

    /// Load a TOML config, apply WAYSTACK_* overrides, and print the result
    Config {
        /// Config file (default: built-in defaults)
        path: Option<String>,
    },

    /// Print 32 random bytes, base64url encoded
    Keygen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        waystack_core::telemetry::init_stderr_tracing();
    }

    match cli.command {
        Commands::Inspect(args) => inspect::run_inspect_command(args).await,
        Commands::Purge {
            database_url,
            older_than_secs,
        } => purge::run_purge_command(&database_url, older_than_secs).await,
        Commands::Config { path } => config::run_config_command(path.as_deref()),
        Commands::Keygen => keygen::run_keygen_command(),
    }
}
