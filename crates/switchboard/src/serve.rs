// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard serve` command implementation.
//!
//! Starts the full conversation engine: SQLite store, push hub, queue
//! board, campaign manager, and the HTTP/WS gateway. Background sweeps
//! (starvation warnings, idle auto-close, stale connection pruning) run
//! on an interval until a shutdown signal lands.

use std::sync::Arc;
use std::time::Duration;

use switchboard_campaign::CampaignManager;
use switchboard_config::SwitchboardConfig;
use switchboard_core::SwitchboardError;
use switchboard_engine::ConversationEngine;
use switchboard_gateway::{AuthConfig, GatewaySettings, GatewayState, HealthState};
use switchboard_hub::PushHub;
use switchboard_metrics::PrometheusExporter;
use switchboard_store::SqliteStore;
use tracing::{debug, info, warn};

use crate::shutdown;

/// Runs the `switchboard serve` command.
///
/// Brings up storage, the engine, the campaign manager, and the gateway,
/// then blocks until SIGTERM/SIGINT. Shutdown drains campaign runners to
/// a clean cursor boundary and checkpoints the WAL before returning.
pub async fn run_serve(config: SwitchboardConfig) -> Result<(), SwitchboardError> {
    init_tracing(&config.server.log_level);

    info!("starting switchboard serve");

    // Install the Prometheus recorder before any subsystem records, so
    // nothing lands in the void. Metrics are optional; a failed install
    // leaves the no-op facade in place.
    let exporter = match PrometheusExporter::install() {
        Ok(exporter) => Some(exporter),
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    };

    let store = Arc::new(SqliteStore::new(config.storage.clone()));
    store.initialize().await?;

    let hub = Arc::new(PushHub::new());
    let engine = Arc::new(ConversationEngine::new(store.clone(), hub.clone(), &config));

    // Rebuild the in-memory queue board from persisted conversation rows
    // (crash recovery). Waiting conversations re-park in FIFO order and
    // assigned ones re-occupy their agent slots.
    engine.rebuild_board().await?;

    // Campaigns left `running` by a crash demote to `paused` with their
    // cursor intact; operators resume them explicitly.
    let campaigns = Arc::new(CampaignManager::new(store.clone(), engine.clone(), &config));
    let recovered = campaigns.recover().await?;
    if !recovered.is_empty() {
        info!(
            count = recovered.len(),
            "recovered interrupted campaigns to paused"
        );
    }

    let auth = AuthConfig {
        bearer_token: config.server.auth_token.clone(),
    };
    if config.server.auth_token.is_none() {
        warn!("server.auth_token not set; /v1 routes are unauthenticated (local development only)");
    }

    // Render hook for the gateway /metrics endpoint.
    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
        exporter.as_ref().map(|exporter| {
            let handle = exporter.handle().clone();
            Arc::new(move || handle.render()) as Arc<dyn Fn() -> String + Send + Sync>
        });

    let state = GatewayState {
        engine: engine.clone(),
        store: store.clone(),
        hub: hub.clone(),
        campaigns: campaigns.clone(),
        auth,
        health: HealthState {
            start_time: std::time::Instant::now(),
            prometheus_render,
        },
    };

    let cancel = shutdown::install_signal_handler();

    // Background sweep task.
    {
        let engine = engine.clone();
        let hub = hub.clone();
        let heartbeat_timeout = Duration::from_secs(config.engine.heartbeat_timeout_secs);
        let interval_secs = config.engine.sweep_interval_secs.max(1);
        let sweep_cancel = cancel.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            // interval fires immediately; burn that tick
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let starving = engine.starvation_sweep().await;
                        if starving > 0 {
                            debug!(starving, "starvation sweep flagged waiting conversations");
                        }
                        match engine.idle_sweep().await {
                            Ok(0) => {}
                            Ok(closed) => {
                                info!(closed, "idle sweep closed inactive conversations");
                            }
                            Err(e) => {
                                warn!(error = %e, "idle sweep failed (non-fatal)");
                            }
                        }
                        let pruned = hub.prune_stale(heartbeat_timeout);
                        if !pruned.is_empty() {
                            info!(count = pruned.len(), "pruned stale websocket connections");
                        }
                        switchboard_metrics::set_live_connections(hub.connection_count() as f64);
                    }
                    _ = sweep_cancel.cancelled() => {
                        info!("sweep task shutting down");
                        break;
                    }
                }
            }
        });

        info!(
            interval_secs,
            heartbeat_timeout_secs = config.engine.heartbeat_timeout_secs,
            idle_close_secs = config.engine.idle_close_secs,
            "background sweeps started"
        );
    }

    // Serve until the signal handler cancels the token.
    let settings = GatewaySettings {
        bind_address: config.server.bind_address.clone(),
        port: config.server.port,
    };
    switchboard_gateway::start_server(&settings, state, cancel.clone()).await?;

    // Gateway is down. Stop campaign runners at a clean cursor boundary,
    // then checkpoint and close the store.
    campaigns.shutdown().await;
    store.close().await?;

    info!("switchboard serve shutdown complete");
    Ok(())
}

/// Set up the tracing subscriber for the serve run.
///
/// The default filter raises every workspace crate to the configured
/// level and leaves dependencies at `warn`; `RUST_LOG` overrides it.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,switchboard={level},switchboard_core={level},switchboard_store={level},\
             switchboard_hub={level},switchboard_engine={level},switchboard_campaign={level},\
             switchboard_gateway={level},switchboard_metrics={level}",
            level = log_level
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
