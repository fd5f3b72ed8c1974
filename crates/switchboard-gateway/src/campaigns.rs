// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for campaign control.
//!
//! Lifecycle routes return the refreshed [`CampaignReport`] so the
//! console sees status and progress in one round trip.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use switchboard_campaign::{CampaignReport, CampaignSpec};
use switchboard_core::Campaign;

use crate::error::ApiError;
use crate::server::GatewayState;

/// Response body for GET /v1/campaigns.
#[derive(Debug, Serialize)]
pub struct CampaignListResponse {
    pub campaigns: Vec<Campaign>,
}

/// Response body for POST /v1/campaigns/{id}/requeue-failed.
#[derive(Debug, Serialize)]
pub struct RequeueResponse {
    /// How many failed recipients went back to pending.
    pub requeued: u64,
}

/// POST /v1/campaigns
///
/// Creates a draft campaign with a frozen recipient snapshot. Invalid
/// specs (no recipients, blank template, zero rate) come back as 400.
pub async fn post_campaign(
    State(state): State<GatewayState>,
    Json(spec): Json<CampaignSpec>,
) -> Result<Json<Campaign>, ApiError> {
    let campaign = state.campaigns.create(spec).await?;
    Ok(Json(campaign))
}

/// GET /v1/campaigns
pub async fn get_campaigns(
    State(state): State<GatewayState>,
) -> Result<Json<CampaignListResponse>, ApiError> {
    let campaigns = state.campaigns.list().await?;
    Ok(Json(CampaignListResponse { campaigns }))
}

/// GET /v1/campaigns/{id}
pub async fn get_campaign(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<CampaignReport>, ApiError> {
    let report = state.campaigns.progress(&id).await?;
    Ok(Json(report))
}

/// POST /v1/campaigns/{id}/launch
pub async fn post_launch(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<CampaignReport>, ApiError> {
    state.campaigns.launch(&id).await?;
    let report = state.campaigns.progress(&id).await?;
    Ok(Json(report))
}

/// POST /v1/campaigns/{id}/pause
pub async fn post_pause(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<CampaignReport>, ApiError> {
    state.campaigns.pause(&id).await?;
    let report = state.campaigns.progress(&id).await?;
    Ok(Json(report))
}

/// POST /v1/campaigns/{id}/resume
pub async fn post_resume(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<CampaignReport>, ApiError> {
    state.campaigns.resume(&id).await?;
    let report = state.campaigns.progress(&id).await?;
    Ok(Json(report))
}

/// POST /v1/campaigns/{id}/requeue-failed
///
/// Flips this campaign's failed recipients back to pending. Refused
/// while the campaign is running, because the dispatch cursor only walks
/// forward.
pub async fn post_requeue_failed(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<RequeueResponse>, ApiError> {
    let requeued = state.campaigns.requeue_failed(&id).await?;
    Ok(Json(RequeueResponse { requeued }))
}
