// src/main.rs
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use trend_sniper::config::AppConfig;
use trend_sniper::connectors::binance::BinanceConnector;
use trend_sniper::connectors::settings::{
    ConfigSettingsStore, EnvCredentialProvider, InMemorySessionRecords,
};
use trend_sniper::strategies::build_strategy;
use trend_sniper::types::StatusEvent;
use trend_sniper::{BotSupervisor, EngineConfig};

fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily("logs", "trend_sniper.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    guard
}

async fn report_status(mut rx: mpsc::Receiver<StatusEvent>) {
    while let Some(event) = rx.recv().await {
        let state = event
            .state
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        match &event.order {
            Some(order) => info!(
                user_id = event.user_id,
                symbol = %event.symbol,
                order_id = %order.id,
                "[{}] {}",
                state,
                event.message
            ),
            None => info!(user_id = event.user_id, symbol = %event.symbol, "[{}] {}", state, event.message),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _log_guard = init_tracing();

    // 1. Load Configuration
    let config = AppConfig::new()?;

    info!("========================================");
    info!("       TREND SNIPER - v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Strategy: {:?}", config.strategy.kind);
    info!("Users:    {}", config.users.len());

    // 2. Initialize Components
    let strategy = build_strategy(&config.strategy)?;
    let engine_config = EngineConfig {
        kline_interval: config.strategy.kline_interval.clone(),
        kline_limit: config.strategy.kline_limit,
        indicators: config.strategy.indicator_params(),
        asset_pause: Duration::from_secs(config.scheduler.asset_pause_secs),
    };
    let settings = ConfigSettingsStore::new(&config);
    let credentials = EnvCredentialProvider;

    // 3. Create Channels
    let (status_tx, status_rx) = mpsc::channel(256);
    tokio::spawn(report_status(status_rx));

    let supervisor = BotSupervisor::new(
        Arc::new(BinanceConnector::new(config.binance.clone())),
        strategy,
        engine_config,
        Arc::new(InMemorySessionRecords::new()),
        config.strategy.default_investment_usdt,
    )
    .with_status_sender(status_tx);

    // 4. Start one session per configured user
    for user_id in settings.user_ids() {
        match supervisor.start_user(user_id, &credentials, &settings).await {
            Ok(handle) => info!(user_id, session_id = %handle.session_id, "Bot running"),
            Err(e) => error!(user_id, "Could not start bot: {}", e),
        }
    }

    if supervisor.active_sessions().await.is_empty() {
        warn!("No session is running, exiting");
        return Ok(());
    }

    // 5. Run until Ctrl+C
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, stopping sessions...");
    supervisor
        .shutdown(Duration::from_secs(config.scheduler.stop_timeout_secs))
        .await;

    Ok(())
}
