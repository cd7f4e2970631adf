use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use signalbot::config::Settings;
use signalbot::execution::{LiveStatus, SignalCycle};
use signalbot::models::StateMap;
use signalbot::notify::telegram::CHAT_ID_ENV;
use signalbot::notify::{CommandBot, TelegramCredentials, TelegramNotifier, UpdateCursor};
use signalbot::persistence::{FileStateStore, RedisStateStore, StateStore};
use signalbot::report::{render_alerts, render_snapshot, write_reports};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "signalbot",
    version,
    about = "Scheduled crypto market-signal notifier"
)]
struct Cli {
    /// Config file (defaults to ./signalbot.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Evaluate and write reports, but send nothing
    #[arg(long, global = true, default_value_t = false)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// One full cycle: fetch, evaluate, persist state, write reports, notify
    Run,
    /// Print a fresh snapshot to stdout without touching state
    Snapshot,
    /// Answer pending chat commands once and exit
    Poll,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&settings, cli.dry_run).await,
        Commands::Snapshot => snapshot(&settings).await,
        Commands::Poll => poll(&settings).await,
    }
}

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("signalbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn open_state_store(settings: &Settings) -> Result<StateStore> {
    match &settings.state.redis_url {
        Some(url) => {
            let store = RedisStateStore::new(url, &settings.state.redis_key)
                .await
                .context("Failed to connect to Redis state store")?;
            Ok(StateStore::Redis(store))
        }
        None => Ok(StateStore::File(FileStateStore::new(&settings.state.path))),
    }
}

/// State for read-only commands; any failure falls back to an empty map
async fn load_states_readonly(settings: &Settings) -> StateMap {
    let mut store = match open_state_store(settings).await {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!("{:#}, showing phases without history", e);
            return StateMap::new();
        }
    };
    store.load_or_reset().await.unwrap_or_else(|e| {
        tracing::warn!("Failed to load state ({}), showing phases without history", e);
        StateMap::new()
    })
}

async fn run(settings: &Settings, dry_run: bool) -> Result<()> {
    tracing::info!("🚀 signalbot run starting");

    let cycle = SignalCycle::from_settings(settings)?;
    tracing::info!(
        "📊 {} assets, sources: {}, cooldown {} min",
        cycle.assets().len(),
        cycle.sources().join(" > "),
        settings.engine.cooldown_minutes
    );

    let mut store = open_state_store(settings).await?;
    let now = Utc::now();
    let report = cycle
        .run(&mut store, now)
        .await
        .context("State store failure")?;

    let snapshot = render_snapshot(&report.results, now);
    let alerts = render_alerts(&report.results, now);

    write_reports(
        &settings.output.snapshot_path(),
        &settings.output.alerts_path(),
        &snapshot,
        alerts.as_deref(),
    )
    .await?;

    match alerts {
        Some(text) if dry_run => {
            tracing::info!("Dry run: {} alert(s) not sent", report.fired());
            println!("{}", text);
        }
        Some(text) => deliver(settings, &text).await,
        None => tracing::info!("No alerts this cycle"),
    }

    Ok(())
}

/// Delivery problems are logged and never fail the run
async fn deliver(settings: &Settings, text: &str) {
    let Some(credentials) = TelegramCredentials::from_env() else {
        tracing::warn!("⚠️  Telegram token not set, skipping delivery");
        return;
    };
    let Some(chat_id) = credentials.chat_id.as_deref() else {
        tracing::warn!("⚠️  {} not set, skipping delivery", CHAT_ID_ENV);
        return;
    };

    let notifier = match TelegramNotifier::new(&settings.telegram.api_base, &credentials.token) {
        Ok(notifier) => notifier,
        Err(e) => {
            tracing::error!("Failed to set up Telegram client: {}", e);
            return;
        }
    };

    match notifier
        .send_report(chat_id, text, settings.telegram.max_message_chars)
        .await
    {
        Ok(sent) => tracing::info!("📨 Alerts delivered in {} message(s)", sent),
        Err(e) => tracing::error!("❌ Alert delivery failed: {}", e),
    }
}

async fn snapshot(settings: &Settings) -> Result<()> {
    let cycle = SignalCycle::from_settings(settings)?;
    let states = load_states_readonly(settings).await;

    let now = Utc::now();
    let results = cycle.snapshot(&states, now).await;
    println!("{}", render_snapshot(&results, now));

    Ok(())
}

async fn poll(settings: &Settings) -> Result<()> {
    let Some(credentials) = TelegramCredentials::from_env() else {
        tracing::warn!("⚠️  Telegram token not set, nothing to poll");
        return Ok(());
    };

    let owner_chat = credentials
        .chat_id
        .as_deref()
        .map(|id| id.parse::<i64>())
        .transpose()
        .with_context(|| format!("{} must be a numeric chat id", CHAT_ID_ENV))?;

    let notifier = TelegramNotifier::new(&settings.telegram.api_base, &credentials.token)?;
    let bot = CommandBot::new(
        notifier,
        UpdateCursor::new(&settings.telegram.update_id_file),
        owner_chat,
    )
    .with_max_message_chars(settings.telegram.max_message_chars);

    let cycle = SignalCycle::from_settings(settings)?;
    let status = LiveStatus::new(&cycle, load_states_readonly(settings).await);

    if let Err(e) = bot.poll_once(&status, Utc::now()).await {
        tracing::error!("❌ Poll failed: {:#}", e);
    }

    Ok(())
}
