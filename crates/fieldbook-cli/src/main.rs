//! Fieldbook CLI - project authoring, bulk import and the upload server

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{completions, config as config_cmd, import, project, serve};
use config::Config;
use fieldbook_storage::SqliteStorage;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "fieldbook")]
#[command(author, version, about = "Data-collection backend: project definitions and entry uploads")]
pub struct Cli {
    /// Data directory
    #[arg(short, long, env = "FIELDBOOK_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Config file
    #[arg(short, long, env = "FIELDBOOK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, ignore_case = true, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(config::default_config_path)
    }

    /// Flag, then config file, then `~/.fieldbook`
    pub fn data_dir(&self, config: &Config) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| config.data_dir.clone())
            .unwrap_or_else(config::default_data_dir)
    }

    pub fn output(&self) -> OutputFormat {
        self.format
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage projects and their definitions
    Project(project::ProjectArgs),
    /// Import entries from a JSON-lines file through the private channel
    Import(import::ImportArgs),
    /// Start the HTTP upload server
    Serve(serve::ServeArgs),
    /// Manage CLI configuration
    Config(config_cmd::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Application context with storage backend
pub struct AppContext {
    pub storage: Arc<SqliteStorage>,
    pub config: Config,
}

impl AppContext {
    pub async fn new(cli: &Cli, config: Config) -> anyhow::Result<Self> {
        let data_dir = cli.data_dir(&config);
        std::fs::create_dir_all(&data_dir)?;

        let db_path = data_dir.join("fieldbook.db");
        tracing::debug!("Using database at: {:?}", db_path);

        let storage = SqliteStorage::open(&db_path)?;

        Ok(Self {
            storage: Arc::new(storage),
            config,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting fieldbook CLI");

    // Commands that need no storage
    match &cli.command {
        Commands::Config(args) => return config_cmd::run(args, &cli.config_path()),
        Commands::Completions(args) => return completions::run(args),
        _ => {}
    }

    let config = Config::load(&cli.config_path())?;
    let ctx = AppContext::new(&cli, config).await?;

    match &cli.command {
        Commands::Project(args) => project::run(args, &cli, &ctx).await?,
        Commands::Import(args) => import::run(args, &cli, &ctx).await?,
        Commands::Serve(args) => serve::run(args, &ctx).await?,
        Commands::Config(_) | Commands::Completions(_) => {}
    }

    Ok(())
}
