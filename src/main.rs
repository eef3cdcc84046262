//! FARMBOT: opportunistic liquidity-farm agent
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the exchange client into the scanner, starts the periodic scan
//! driver, the optional dashboard and the Telegram front end, and runs
//! until Ctrl+C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use farmbot::commands::CommandHandler;
use farmbot::config;
use farmbot::dashboard::{self, routes::DashboardState};
use farmbot::engine::cache::PositionCache;
use farmbot::engine::driver::spawn_periodic_scan;
use farmbot::engine::registry::MonitorRegistry;
use farmbot::engine::scanner::FarmScanner;
use farmbot::engine::SystemClock;
use farmbot::exchange::ston::StonClient;
use farmbot::telegram;

const PLACEHOLDER_WALLET: &str = "your_wallet_address_here";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load_or_default("config.toml")?;

    init_logging();

    // Required settings: fail fast before anything starts.
    let rpc_url = cfg.rpc_url().context("RPC endpoint is required")?;
    let bot_token = cfg.bot_token().context("Bot token is required")?;

    info!(
        agent_name = %cfg.agent.name,
        check_interval_secs = cfg.agent.check_interval_secs,
        purchase_amount = %cfg.agent.purchase_amount,
        price_multiplier = %cfg.exit.price_multiplier,
        "FARMBOT starting up"
    );

    if cfg.exchange.wallet_address == PLACEHOLDER_WALLET {
        warn!("exchange.wallet_address is the placeholder; swap parameters will not be signable");
    }

    // -- Initialise components -------------------------------------------

    let client = Arc::new(
        StonClient::new(cfg.ston_settings(rpc_url)).context("Failed to build exchange client")?,
    );
    let cache = Arc::new(PositionCache::new(cfg.cooldown_window()));
    let registry = Arc::new(MonitorRegistry::new());

    let scanner = Arc::new(FarmScanner::new(
        client.clone(),
        client,
        cache,
        registry.clone(),
        Arc::new(SystemClock),
        cfg.scan_settings(),
    ));

    let driver = spawn_periodic_scan(scanner.clone(), cfg.check_interval());

    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(scanner.clone()));
        dashboard::spawn_dashboard(state, cfg.dashboard.port).await?;
    }

    let handler = Arc::new(CommandHandler::new(scanner));

    // -- Run until shutdown ----------------------------------------------

    info!("Entering main loop. Press Ctrl+C to stop.");

    tokio::select! {
        _ = telegram::run_bot(bot_token, handler) => {
            warn!("Telegram dispatcher stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    driver.abort();
    let abandoned = registry.cancel_all().await;
    info!(abandoned_positions = abandoned, "FARMBOT shut down.");

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("farmbot=info"));

    if std::env::var("FARMBOT_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
