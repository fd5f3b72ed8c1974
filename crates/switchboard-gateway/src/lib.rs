// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for the Switchboard conversation engine.
//!
//! The gateway is a thin surface over the engine: tagged channel
//! payloads are normalized at the edge, every mutation goes through the
//! engine's conflict-checked operations, and push subscriptions ride the
//! hub. Routes split into an unauthenticated public pair (`/health`,
//! `/metrics`), bearer-guarded `/v1` REST routes, and `/ws`.

pub mod auth;
pub mod campaigns;
pub mod error;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::AuthConfig;
pub use error::{ApiError, ErrorResponse};
pub use server::{GatewaySettings, GatewayState, HealthState, build_router, serve, start_server};
