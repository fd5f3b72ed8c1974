// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The axum HTTP surface of the gateway.
//!
//! Route setup, middleware, and shared state. The surface splits into
//! three routers: unauthenticated `/health` + `/metrics`, bearer-guarded
//! `/v1` REST routes, and the `/ws` push subscription whose auth happens
//! during the handshake.

use std::sync::Arc;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use switchboard_campaign::CampaignManager;
use switchboard_core::SwitchboardError;
use switchboard_engine::ConversationEngine;
use switchboard_hub::PushHub;
use switchboard_store::SqliteStore;

use crate::auth::{AuthConfig, auth_middleware};
use crate::campaigns;
use crate::handlers;
use crate::ws;

/// State for the unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// When the process came up; `/health` reports uptime from this.
    pub start_time: std::time::Instant,
    /// Renders the Prometheus exposition text, when metrics are installed.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Everything the request handlers need, cloned per route tree.
#[derive(Clone)]
pub struct GatewayState {
    /// Conversation state machine and queue assignment.
    pub engine: Arc<ConversationEngine>,
    /// Message store, for the read paths the engine does not mediate.
    pub store: Arc<SqliteStore>,
    /// Push hub for websocket subscriptions.
    pub hub: Arc<PushHub>,
    /// Campaign lifecycle manager.
    pub campaigns: Arc<CampaignManager>,
    /// Bearer-token policy for `/v1` and the websocket handshake.
    pub auth: AuthConfig,
    /// Backing data for the unauthenticated endpoints.
    pub health: HealthState,
}

/// Gateway bind configuration.
///
/// Mirrors the relevant `ServerConfig` fields from `switchboard-config`
/// so this crate stays free of the config dependency. The auth token
/// travels separately inside [`AuthConfig`], which redacts it from Debug
/// output.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Interface to listen on.
    pub bind_address: String,
    /// TCP port.
    pub port: u16,
}

/// Compose the full gateway router over the given state.
pub fn build_router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    // Unauthenticated public routes (health + metrics for systemd and
    // Prometheus).
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .route("/metrics", get(handlers::get_public_metrics))
        .with_state(state.clone());

    // Everything under /v1 sits behind the bearer check.
    let api_routes = Router::new()
        .route("/v1/inbound", post(handlers::post_inbound))
        .route("/v1/conversations", get(handlers::get_conversations))
        .route("/v1/conversations/{id}", get(handlers::get_conversation))
        .route(
            "/v1/conversations/{id}/messages",
            post(handlers::post_conversation_message).get(handlers::get_conversation_messages),
        )
        .route("/v1/conversations/{id}/claim", post(handlers::post_claim))
        .route("/v1/conversations/{id}/release", post(handlers::post_release))
        .route("/v1/conversations/{id}/transfer", post(handlers::post_transfer))
        .route("/v1/conversations/{id}/close", post(handlers::post_close))
        .route("/v1/queues", get(handlers::get_queues))
        .route(
            "/v1/campaigns",
            post(campaigns::post_campaign).get(campaigns::get_campaigns),
        )
        .route("/v1/campaigns/{id}", get(campaigns::get_campaign))
        .route("/v1/campaigns/{id}/launch", post(campaigns::post_launch))
        .route("/v1/campaigns/{id}/pause", post(campaigns::post_pause))
        .route("/v1/campaigns/{id}/resume", post(campaigns::post_resume))
        .route(
            "/v1/campaigns/{id}/requeue-failed",
            post(campaigns::post_requeue_failed),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state.clone());

    // WebSocket route. Auth happens during the handshake, not via
    // middleware, because browser clients cannot set headers on a
    // websocket upgrade; they pass the token as a query param instead.
    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve the gateway until the cancellation token fires.
pub async fn start_server(
    settings: &GatewaySettings,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), SwitchboardError> {
    let addr = format!("{}:{}", settings.bind_address, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SwitchboardError::Channel {
            message: format!("gateway could not bind {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");
    serve(listener, state, shutdown).await
}

/// Serve the gateway on an already-bound listener.
///
/// Split from [`start_server`] so tests can bind port 0 themselves and
/// read the real port back before serving.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), SwitchboardError> {
    let app = build_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| SwitchboardError::Channel {
            message: format!("gateway exited abnormally: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
