use patrol_engine::command::CommandOutbox;
use patrol_engine::engine::{EngineNotice, EngineRuntime, MissionEngine};
use patrol_engine::persist::JsonFileStore;
use std::sync::Arc;
use tokio::sync::mpsc;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let data_path =
        std::env::var("PATROL_DATA_FILE").unwrap_or_else(|_| "patrol-state.json".into());
    info!("patrol engine starting, state file: {}", data_path);

    let store = Arc::new(JsonFileStore::open(&data_path).await);
    let (outbox, mut commands) = CommandOutbox::channel();
    let (notice_tx, mut notices) = mpsc::unbounded_channel();

    let mut engine = MissionEngine::new(outbox, notice_tx, store);
    engine.load().await;

    let (handle, engine_task) = EngineRuntime::spawn(engine);
    info!("engine task started");

    // Drain outbound commands toward the external command channel. The
    // channel adapter owns delivery; here we surface the payloads.
    tokio::spawn(async move {
        while let Some(cmd) = commands.recv().await {
            match serde_json::to_string(&cmd) {
                Ok(json) => info!(command = %json, "outbound"),
                Err(_) => info!(?cmd, "outbound"),
            }
        }
    });

    // Presentation notices: alerts, auto-pause, status changes
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            match notice {
                EngineNotice::Alert(alert) => info!(?alert, "alert"),
                EngineNotice::PausedOnDetection { target } => {
                    warn!("patrol paused by detection: {target}")
                }
                EngineNotice::StatusChanged { from, to } => {
                    info!(?from, ?to, "patrol status changed")
                }
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    warn!("shutdown requested, issuing emergency stop");
    handle.emergency_stop();

    drop(handle);
    engine_task.await?;
    Ok(())
}
