//! Command-line host for the quality loop.
//!
//! A thin shell over the services: each invocation opens the session's
//! records, performs one call and persists the result, so a review can be
//! driven step by step from scripts.

pub mod commands;
pub mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;

use crate::adapters::sqlite::{PoolConfig, initialize_database};
use crate::adapters::{FileSessionStore, SqliteSessionStore};
use crate::domain::models::{Config, SessionId, StorageBackend};
use crate::domain::ports::SessionStore;
use crate::infrastructure::config::ConfigLoader;

use commands::check::CheckArgs;
use commands::learn::LearnArgs;
use commands::review::ReviewArgs;
use commands::score::ScoreArgs;

#[derive(Parser, Debug)]
#[command(name = "quality-loop")]
#[command(about = "Self-tuning review loop: check effectiveness, quality scores, convergence", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Session (project or document) the command applies to
    #[arg(long, global = true, env = "QUALITY_LOOP_SESSION", default_value = "default")]
    pub session: String,

    /// Configuration file (defaults to .quality-loop/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record and inspect check outcomes
    Check(CheckArgs),
    /// Score quality dimensions
    Score(ScoreArgs),
    /// Run meta-learning analysis
    Learn(LearnArgs),
    /// Drive the round-based review loop
    Review(ReviewArgs),
}

/// Everything a command needs: loaded configuration, the session key and
/// the store holding its records.
pub struct AppContext {
    pub config: Config,
    pub session: SessionId,
    pub store: Arc<dyn SessionStore>,
}

impl AppContext {
    pub async fn from_cli(cli: &Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load()?,
        };
        let session = SessionId::new(cli.session.as_str())?;
        let store = open_store(&config).await?;
        Ok(Self {
            config,
            session,
            store,
        })
    }
}

/// Build the configured storage backend.
pub async fn open_store(config: &Config) -> Result<Arc<dyn SessionStore>> {
    match config.storage.backend {
        StorageBackend::File => Ok(Arc::new(FileSessionStore::new(config.storage.root.clone()))),
        StorageBackend::Sqlite => {
            let pool_config = PoolConfig {
                max_connections: config.storage.max_connections,
                ..Default::default()
            };
            let pool = initialize_database(&config.storage.database_url, Some(pool_config))
                .await
                .with_context(|| {
                    format!("Failed to open database {}", config.storage.database_url)
                })?;
            Ok(Arc::new(SqliteSessionStore::new(pool)))
        }
    }
}

/// Dispatch a parsed command.
pub async fn run(cli: Cli, ctx: &AppContext) -> Result<()> {
    match cli.command {
        Commands::Check(args) => commands::check::execute(args, ctx, cli.json).await,
        Commands::Score(args) => commands::score::execute(args, ctx, cli.json).await,
        Commands::Learn(args) => commands::learn::execute(args, ctx, cli.json).await,
        Commands::Review(args) => commands::review::execute(args, ctx, cli.json).await,
    }
}

/// Print an error in the requested mode and exit non-zero.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", style("error:").red().bold());
    }
    std::process::exit(1);
}
