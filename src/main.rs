use anyhow::{Context, Result};
use log::{error, info, warn};
use std::sync::Arc;

use envsense_master::cli::{build_cli, handle_subcommands, registry_from_config};
use envsense_master::services::Collector;
use envsense_master::storage::DataStore;
use envsense_master::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(filters) = matches.get_one::<String>("log-level") {
        logger.parse_filters(filters);
    }
    logger.init();

    if handle_subcommands(&matches).await? {
        return Ok(());
    }

    let config = Config::from_matches(&matches).context("Invalid configuration")?;
    info!("🖥️  envsense_master v{}", envsense_master::VERSION);
    info!(
        "🔌 Bus: {} @ {} baud, {} ms timeout, {} ms polling interval",
        config.serial_port, config.baud_rate, config.timeout_ms, config.poll_interval_ms
    );

    let registry = Arc::new(registry_from_config(&config).context("Invalid sensor configuration")?);
    let store = Arc::new(DataStore::new());
    let collector = Arc::new(Collector::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        config.poll_interval(),
    ));

    let runner = Arc::clone(&collector);
    let collector_task = tokio::spawn(async move { runner.start().await });

    #[cfg(feature = "api")]
    let mut api = if config.api.enabled {
        use envsense_master::services::{ApiService, ApiServiceState};

        let state = ApiServiceState::new(Arc::clone(&registry), Arc::clone(&store), Arc::clone(&collector));
        let mut api = ApiService::new(state);
        api.start(&config.api.bind_address, config.api.port)
            .await
            .context("Failed to start HTTP API")?;
        Some(api)
    } else {
        info!("🌐 HTTP API disabled");
        None
    };

    info!("🛑 Press Ctrl+C to stop");
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    info!("🛑 Shutdown requested");

    collector.stop();

    #[cfg(feature = "api")]
    {
        if let Some(api) = api.as_mut() {
            if let Err(e) = api.stop().await {
                warn!("⚠️  HTTP API shutdown error: {}", e);
            }
        }
    }

    match collector_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("❌ Collector error: {}", e),
        Err(e) => error!("❌ Collector task failed: {}", e),
    }

    let status = collector.status();
    info!(
        "📊 Final statistics: {} iterations, {} readings stored, {} failed reads",
        status.iterations,
        store.total_readings(),
        registry.failed_reads()
    );

    if let Err(e) = registry.transport().close() {
        warn!("⚠️  Failed to close serial port: {}", e);
    }
    info!("👋 Goodbye!");
    Ok(())
}
