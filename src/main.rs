use std::sync::Arc;

use chrono::Local;
use tokio::sync::watch;
use tracing::info;

use hallenplan::calendar::Week;
use hallenplan::config::PlanConfig;
use hallenplan::refresh::{Planner, spawn_refresh_loop};
use hallenplan::store::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = PlanConfig::from_env();
    hallenplan::observability::init(config.metrics_port);

    let store = match &config.seed_path {
        Some(path) => {
            let store = MemoryStore::load_snapshot(path)?;
            info!("seeded record store from {}", path.display());
            store
        }
        None => MemoryStore::new(),
    };
    let store = Arc::new(store);

    info!("hallenplan planner starting");
    info!(
        "  grid: {:02}:00-{:02}:00, {} min resolution",
        config.grid.open_hour, config.grid.close_hour, config.grid.resolution_minutes
    );
    info!("  debounce: {} ms", config.debounce.as_millis());
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let week = Week::containing(Local::now().date_naive());
    let (week_tx, week_rx) = watch::channel(week);
    let planner = Arc::new(Planner::new(store, config));
    let mut plans = planner.plans();
    let refresh = spawn_refresh_loop(planner.clone(), week_rx);

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("failed to register SIGTERM handler: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = plans.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(plan) = plans.borrow_and_update().clone() else { continue };
                info!(
                    "week {} (KW {}): {} slots, {} freed, {} conflicting, {} closures",
                    plan.week.monday(),
                    plan.week.iso_week(),
                    plan.slots.len(),
                    plan.freed().count(),
                    plan.conflicts.len(),
                    plan.closures.len()
                );
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping refresh loop");
                break;
            }
        }
    }

    drop(week_tx);
    if let Err(e) = refresh.await {
        tracing::warn!("refresh loop ended abnormally: {e}");
    }
    if let Some(err) = planner.last_error().await {
        tracing::warn!("last refresh error: {err}");
    }
    info!("hallenplan stopped");
    Ok(())
}
