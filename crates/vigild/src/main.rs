use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod limiter;
mod store;

use dbus_interface::{AppState, VigilService};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("vigild starting");

    let config = config::Config::from_env();

    // Model provisioning is advisory: capture agents load the models
    // themselves, so a missing directory degrades to a warning and the
    // daemon keeps serving sessions.
    let detector_provisioned = match vigil_models::verify_models_dir(&config.model_dir) {
        Ok(()) => {
            tracing::info!(dir = %config.model_dir.display(), "detector models verified");
            true
        }
        Err(err) => {
            tracing::warn!(
                error = %err,
                "detector models not provisioned; run `vigil setup`"
            );
            false
        }
    };

    let store = store::AttendanceStore::open(&config.db_path).await?;
    tracing::info!(db = %config.db_path.display(), "attendance store opened");

    let engine = engine::spawn_engine(config.tuning.clone(), config.max_frame_age_ms);

    let session_bus = config.session_bus;
    let state = Arc::new(Mutex::new(AppState {
        config,
        engine,
        store,
        limiter: limiter::AttemptLimiter::new(),
        detector_provisioned,
    }));
    let service = VigilService { state };

    let builder = if session_bus {
        zbus::connection::Builder::session()?
    } else {
        zbus::connection::Builder::system()?
    };
    let _conn = builder
        .name("org.freedesktop.Vigil1")?
        .serve_at("/org/freedesktop/Vigil1", service)?
        .build()
        .await?;

    tracing::info!(session_bus, "vigild ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("vigild shutting down");

    Ok(())
}
