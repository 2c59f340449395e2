//! # presence-server
//!
//! Room-presence sensor host:
//! - scans BLE advertisements and feeds them into the fingerprint engine
//! - runs follow-up GATT queries, counting, reporting and expiry
//! - serves a read-only HTTP API with Swagger UI at `/docs`
//!
//! ## Running
//!
//! ```bash
//! # Development, no Bluetooth stack required
//! cargo run --package presence-server --no-default-features --features mock-bluetooth
//!
//! # Production
//! PRESENCE_CONFIG=/etc/presence/config.toml ./presence-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use presence_core::{BleRadio, PresenceError, QueryManager, Settings};
use presence_server::api::{create_router, openapi::ApiDoc};
use presence_server::state::{AppState, SharedState};
use presence_server::{logging, maintenance};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = Settings::config_path();
    let (settings, config_path) = if path.exists() {
        let settings = Settings::load_from(&path)
            .map_err(PresenceError::from)
            .with_context(|| format!("failed to load {}", path.display()))?;
        (settings, Some(path))
    } else {
        let settings = Settings::load()
            .map_err(PresenceError::from)
            .context("failed to load settings")?;
        (settings, None)
    };

    logging::init(settings.server.production)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        "starting presence-server"
    );

    let state: SharedState = Arc::new(AppState::new(&settings, config_path));
    let mut tasks = Vec::new();

    match open_radio().await {
        Ok(radio) => match radio.start_scan().await.map_err(PresenceError::from) {
            Ok(advertisements) => {
                state.set_bluetooth_available(true);
                tasks.push(tokio::spawn(maintenance::run_ingestion(
                    Arc::clone(&state),
                    advertisements,
                )));
                let manager = QueryManager::new(Arc::clone(state.registry()), radio);
                tasks.push(tokio::spawn(maintenance::run_queries(
                    Arc::clone(&state),
                    manager,
                )));
            }
            Err(e) => error!(
                error = %e,
                code = e.error_code(),
                recoverable = e.is_recoverable(),
                "failed to start scanning; serving API only"
            ),
        },
        Err(e) => error!(
            error = %e,
            code = e.error_code(),
            recoverable = e.is_recoverable(),
            "no radio available; serving API only"
        ),
    }

    tasks.push(tokio::spawn(maintenance::run_maintenance(
        Arc::clone(&state),
        Duration::from_millis(settings.server.maintenance_interval_ms),
    )));

    #[cfg(unix)]
    tasks.push(tokio::spawn(reload_on_hangup(Arc::clone(&state))));

    let app = create_router(Arc::clone(&state))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        );

    let listener = TcpListener::bind(&settings.server.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.bind_address))?;
    info!(address = %settings.server.bind_address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for task in tasks {
        task.abort();
    }
    info!("stopped");
    Ok(())
}

#[cfg(feature = "bluetooth")]
async fn open_radio() -> presence_core::Result<Arc<dyn BleRadio>> {
    let radio = presence_core::BluezRadio::new().await?;
    Ok(Arc::new(radio))
}

/// Mock backend. `PRESENCE_MOCK_ADVERTISEMENTS` may name a JSON file holding
/// an array of advertisements to replay.
#[cfg(not(feature = "bluetooth"))]
async fn open_radio() -> presence_core::Result<Arc<dyn BleRadio>> {
    use presence_core::{Advertisement, MockRadio};

    let mut radio = MockRadio::new();
    if let Ok(path) = std::env::var("PRESENCE_MOCK_ADVERTISEMENTS") {
        let text = tokio::fs::read_to_string(&path).await?;
        let script: Vec<Advertisement> = serde_json::from_str(&text)
            .map_err(|e| PresenceError::ConfigParseError(format!("{path}: {e}")))?;
        info!(path = %path, count = script.len(), "replaying mock advertisements");
        radio = radio.with_advertisements(script);
    } else {
        warn!("built without Bluetooth support; using an empty mock radio");
    }
    Ok(Arc::new(radio))
}

#[cfg(unix)]
async fn reload_on_hangup(state: SharedState) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGHUP; reload disabled");
            return;
        }
    };
    while hangups.recv().await.is_some() {
        match state.reload() {
            Ok(()) => info!("settings reloaded"),
            Err(e) => warn!(
                error = %e,
                code = e.error_code(),
                "settings reload failed; keeping current settings"
            ),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
