mod telegram;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scorebot_core::{
    load_config, load_config_from_env, validate_config, Config, Dispatcher, JobSupervisor,
    LinkValidator, PromptDriver, QuotaTracker, SanitizedConfig, TokioLauncher, WorkspaceManager,
};

use telegram::TelegramClient;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default config file, used when present and `SCOREBOT_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Pause after a failed poll that may succeed on retry.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Pause after a failed poll that needs outside intervention.
const ERROR_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("scorebot {} starting", VERSION);

    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }

    let config = load()?;
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = SanitizedConfig::from(&config);
    let config_json = serde_json::to_string(&sanitized).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Configuration loaded (hash {})", &config_hash[..16]);
    info!(
        "Driver: {} {:?} ({:?} detection, {}s timeout)",
        config.driver.program, config.driver.args, config.driver.detection, config.driver.timeout_secs
    );
    info!(
        "Quota: {} concurrent jobs per requester",
        config.quota.max_concurrent_jobs
    );

    let workspaces = Arc::new(
        WorkspaceManager::init(&config.workspace.root)
            .await
            .with_context(|| format!("Failed to create workspace root {:?}", config.workspace.root))?,
    );

    let telegram = Arc::new(
        TelegramClient::new(&config.telegram).context("Failed to create Telegram client")?,
    );
    let bot_name = telegram
        .get_me()
        .await
        .context("Telegram rejected the bot token")?;
    info!("Authenticated as @{}", bot_name);

    let supervisor = Arc::new(JobSupervisor::new(
        LinkValidator::new(config.links.clone()),
        Arc::new(QuotaTracker::new(config.quota.max_concurrent_jobs)),
        workspaces.clone(),
        PromptDriver::new(config.driver.clone(), Arc::new(TokioLauncher)),
        telegram.clone(),
    ));
    let dispatcher = Dispatcher::new(supervisor);

    info!("Bot is running");
    tokio::select! {
        _ = poll_updates(&telegram, &dispatcher) => {},
        _ = shutdown_signal() => info!("Shutdown signal received"),
    }

    // In-flight jobs are abandoned; their workspaces go with the root.
    info!("Removing workspaces...");
    if let Err(e) = workspaces.destroy_root().await {
        warn!("Failed to remove workspace root: {}", e);
    }
    info!("Bot stopped");

    Ok(())
}

/// Loads configuration from `SCOREBOT_CONFIG`, `config.toml` or the
/// environment alone, in that order.
fn load() -> Result<Config> {
    let config_path = std::env::var("SCOREBOT_CONFIG")
        .map(PathBuf::from)
        .ok()
        .or_else(|| {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            default.exists().then_some(default)
        });

    match config_path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        None => {
            info!("No config file, loading configuration from environment");
            load_config_from_env().context("Failed to load config from environment")
        }
    }
}

/// Long-polls Telegram and hands every message to the dispatcher.
async fn poll_updates(telegram: &TelegramClient, dispatcher: &Dispatcher) {
    let mut offset = None;
    loop {
        let updates = match telegram.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                let delay = if e.is_retryable() {
                    RETRY_DELAY
                } else {
                    ERROR_DELAY
                };
                warn!("Polling failed, retrying in {:?}: {}", delay, e);
                tokio::time::sleep(delay).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            if let Some(message) = update.into_incoming() {
                // Jobs run detached; the dispatcher watches them.
                let _ = dispatcher.dispatch(message).await;
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
