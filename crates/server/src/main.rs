//! Diyafa - Booking engine for home-hosted meals
//!
//! Process lifecycle: load configuration, open the store, seed the catalog,
//! serve the API, and tear everything down on Ctrl-C.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use diyafa_core::{CatalogFile, ConfigError, Database, ReservationService};
use diyafa_net::{BroadcastSink, Server};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod sweep;

use config::AppConfig;

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Core(#[from] diyafa_core::Error),

    #[error(transparent)]
    Net(#[from] diyafa_net::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not determine data directory")]
    NoDataDir,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Diyafa");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Diyafa stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let dirs = ProjectDirs::from("ma", "diyafa", "diyafa");

    let (config, config_path) = AppConfig::discover(dirs.as_ref().map(|d| d.config_dir()))?;
    match &config_path {
        Some(path) => info!(path = %path.display(), "Loaded configuration"),
        None => info!("No config file, using defaults"),
    }

    let db_path = database_path(&config, dirs.as_ref())?;
    info!(path = %db_path.display(), "Opening store");
    let db = Database::open(&db_path)?;

    let events = BroadcastSink::new();
    let service = Arc::new(
        ReservationService::new(db, config.engine.clone())?.with_events(Arc::new(events.clone())),
    );

    if let Some(path) = &config.server.seed_catalog {
        let catalog = CatalogFile::load(path)?;
        catalog.seed(&service)?;
    }

    let (shutdown_tx, _) = broadcast::channel(1);
    let event_log = tokio::spawn(sweep::log_events(
        events.subscribe(),
        shutdown_tx.subscribe(),
    ));
    let expiry = config.engine.pending_expiry_hours.map(|hours| {
        info!(hours, every_secs = config.server.sweep_interval_secs, "Pending expiry enabled");
        tokio::spawn(sweep::run_expiry_sweep(
            Arc::clone(&service),
            Duration::from_secs(config.server.sweep_interval_secs),
            shutdown_tx.subscribe(),
        ))
    });

    let server = Server::start(config.server.bind_addr, Arc::clone(&service)).await?;
    info!(addr = %server.addr(), "Accepting requests");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    // Teardown
    server.shutdown();
    server.join().await;
    let _ = shutdown_tx.send(());
    if let Some(handle) = expiry {
        let _ = handle.await;
    }
    let _ = event_log.await;

    // Let connection tasks drop their handles
    tokio::time::sleep(Duration::from_millis(100)).await;
    match Arc::try_unwrap(service) {
        Ok(service) => service.close()?,
        Err(_) => warn!("Store still in use at shutdown, closing on drop"),
    }

    info!("Diyafa stopped");
    Ok(())
}

/// Configured database file, or `diyafa.db` in the platform data dir
fn database_path(config: &AppConfig, dirs: Option<&ProjectDirs>) -> Result<PathBuf, AppError> {
    if let Some(path) = &config.server.database_path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        return Ok(path.clone());
    }

    let dirs = dirs.ok_or(AppError::NoDataDir)?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;
    Ok(data_dir.join("diyafa.db"))
}
