//! CLI binary for chorewheel.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use chorewheel::channels::{self, Outbox};
use chorewheel::household::HouseholdFile;
use chorewheel::ledger::ScoreLedger;
use chorewheel::scheduler::TriggerKind;
use chorewheel::store::{ChoreStore, SqliteChoreStore};
use chorewheel::{ChoreConfig, ChoreEngine, CycleKey, messages};

/// Fair weekly chore rotation over chat messaging.
#[derive(Parser)]
#[command(name = "chorewheel", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run the service: webhook gateway, scheduler and engine.
    Run,

    /// Run one workflow trigger now against the current week.
    Trigger {
        /// Trigger name, e.g. `allocate-cycle`.
        name: String,
    },

    /// Print every participant's score per category.
    Report,

    /// Write a default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Import participants, categories, tasks and eligibility from a TOML file.
    Import {
        /// Household file.
        path: PathBuf,
    },
}

fn init_logging(config: &ChoreConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let default_filter = config
        .logging
        .filter
        .clone()
        .unwrap_or_else(|| "chorewheel=info".to_owned());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let console = tracing_subscriber::fmt::layer();
    match &config.logging.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "chorewheel.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .init();
            Ok(None)
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ChoreConfig> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(ChoreConfig::default_config_path);
    if path.exists() {
        ChoreConfig::from_file(&path)
            .with_context(|| format!("cannot load config {}", path.display()))
    } else {
        Ok(ChoreConfig::default())
    }
}

fn open_store(config: &ChoreConfig) -> anyhow::Result<Arc<dyn ChoreStore>> {
    let store = SqliteChoreStore::open(&config.store.path)
        .with_context(|| format!("cannot open store {}", config.store.path.display()))?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let _log_guard = init_logging(&config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => chorewheel::runtime::run(config).await,
        Command::Trigger { name } => run_trigger(config, &name).await,
        Command::Report => print_report(&config),
        Command::InitConfig { force } => init_config(cli.config.as_deref(), force),
        Command::Import { path } => import(&config, &path),
    }
}

async fn run_trigger(config: ChoreConfig, name: &str) -> anyhow::Result<()> {
    let kind = TriggerKind::parse(name).with_context(|| {
        let known: Vec<&str> = TriggerKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("unknown trigger `{name}`; expected one of {}", known.join(", "))
    })?;
    chorewheel::runtime::check_config(&config)?;

    let store = open_store(&config)?;
    let (gateway, _) = channels::build_transport(&config.messaging);
    let outbox = Arc::new(Outbox::new(
        gateway,
        config.messaging.rate_limit_per_minute,
        config.messaging.group.clone(),
    ));
    let engine = ChoreEngine::new(store, outbox, &config);

    let now = Utc::now();
    let outcome = engine.run_trigger(kind, now).await?;
    println!("{kind} for {}: {outcome}", CycleKey::containing(now));
    Ok(())
}

fn print_report(config: &ChoreConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let ledger = ScoreLedger::new(store.clone());
    let text = messages::score_report(
        &store.participants()?,
        &store.categories()?,
        &ledger.snapshot()?,
    );
    println!("{text}");
    Ok(())
}

fn init_config(path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(ChoreConfig::default_config_path);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    let mut config = ChoreConfig::default();
    config.logging.dir = Some(chorewheel::paths::logs_dir());
    config.save_to_file(&path)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn import(config: &ChoreConfig, path: &Path) -> anyhow::Result<()> {
    let household = HouseholdFile::from_file(path)
        .with_context(|| format!("cannot read household file {}", path.display()))?;
    let store = open_store(config)?;
    let report = household.import(store.as_ref())?;
    println!(
        "imported {} categories, {} participants, {} tasks, {} eligibility entries",
        report.categories, report.participants, report.tasks, report.eligibility
    );
    Ok(())
}
