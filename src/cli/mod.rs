use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::dates::DateKey;
use crate::storage::{self, EntryStore, MemoryEntryStore};

pub mod commands;

use self::commands::{ExportArgs, LogArgs, ShowArgs};

#[derive(Parser, Debug)]
#[command(
    name = "painlog",
    version,
    about = "Log a daily pain level and notes on a colour-coded calendar"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over PAINLOG_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over PAINLOG_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// User whose entries are read and written (falls back to PAINLOG_USER, then config)
    #[arg(long)]
    pub user: Option<String>,

    /// Keep entries in memory only; nothing touches the database
    #[arg(long)]
    pub ephemeral: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive form (default)
    Tui,
    /// Record the pain level and/or notes for one day
    Log(LogArgs),
    /// Print a month's entries with their calendar colours
    Show(ShowArgs),
    /// Print a month's entries as JSON
    Export(ExportArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);
    let log_target = match command {
        Commands::Tui => LogTarget::File(&paths.log_dir),
        _ => LogTarget::Stderr,
    };
    init_tracing(&cli.log_level, log_target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let config = Arc::new(loader.load_or_init()?);
    let user_id = config.resolve_user(cli.user.as_deref());
    let store: Arc<dyn EntryStore> = if cli.ephemeral {
        tracing::info!("using in-memory store; entries are discarded on exit");
        Arc::new(MemoryEntryStore::new())
    } else {
        Arc::new(storage::init(&config.storage)?)
    };

    match command {
        Commands::Tui => {
            let mut app = App::new(config, store, user_id, DateKey::today());
            commands::run_tui(&mut app)
        }
        Commands::Log(args) => commands::log_entry(store.as_ref(), user_id.as_ref(), args),
        Commands::Show(args) => commands::show_month(store.as_ref(), user_id.as_ref(), args),
        Commands::Export(args) => commands::export_month(store.as_ref(), user_id.as_ref(), args),
    }
}

enum LogTarget<'a> {
    Stderr,
    File(&'a Path),
}

fn init_tracing(level: &str, target: LogTarget<'_>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match target {
            LogTarget::Stderr => fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init(),
            LogTarget::File(dir) => {
                let path = dir.join("painlog.log");
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
        }
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}
