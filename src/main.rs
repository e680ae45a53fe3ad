// canvas-sync daemon
// Keeps Canvas course calendars in step with TimeEdit reservations

use anyhow::Context;
use canvas_sync::adapters::{CanvasClient, TimeEditClient};
use canvas_sync::config::Config;
use canvas_sync::database::Database;
use canvas_sync::http_config::HttpConfig;
use canvas_sync::sync::{scheduler, Reconciler};
use canvas_sync::utils::logging::init_logging;
use log::{error, info};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    info!("Starting canvas-sync");

    let db = Database::connect(&config.database_url)
        .await
        .context("Failed to initialize database")?;

    let source = TimeEditClient::new(config.timeedit.clone(), &HttpConfig::timeedit_soap())
        .context("Failed to create TimeEdit client")?;
    let sink = CanvasClient::new(config.canvas.clone(), &HttpConfig::canvas_api())
        .context("Failed to create Canvas client")?;

    let reconciler = Arc::new(Reconciler::new(db, Arc::new(source), Arc::new(sink), config.max_workers));

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, finishing current run");
            signal.cancel();
        }
    });

    scheduler::run(reconciler, config.interval, shutdown).await;
    info!("canvas-sync stopped");
    Ok(())
}
