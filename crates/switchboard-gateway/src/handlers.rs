// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for conversations, queues, and health.
//!
//! Channel-specific payload shapes end here: both ingestion routes
//! normalize their tagged bodies into one [`NewMessage`] before anything
//! touches the engine.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use switchboard_core::{
    ChannelKind, Conversation, ConversationState, Message, NewMessage, SwitchboardError,
};
use switchboard_engine::{IngestOutcome, QueueOccupancy};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Request body for POST /v1/inbound.
///
/// One variant per transport, in each transport's native vocabulary.
/// All of them normalize to a contact address plus a message body; the
/// conversation is resolved (or created) from the address.
#[derive(Debug, Deserialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum InboundRequest {
    /// Web widget payload, addressed by the widget's session token.
    Web { session_token: String, body: String },
    /// WhatsApp-style webhook payload.
    Whatsapp { wa_id: String, text: String },
    /// SMS webhook payload.
    Sms { from: String, text: String },
}

impl InboundRequest {
    /// Normalize to `(channel, contact_address, content)`.
    fn normalize(self) -> (ChannelKind, String, String) {
        match self {
            InboundRequest::Web { session_token, body } => {
                (ChannelKind::Web, session_token, body)
            }
            InboundRequest::Whatsapp { wa_id, text } => (ChannelKind::Whatsapp, wa_id, text),
            InboundRequest::Sms { from, text } => (ChannelKind::Sms, from, text),
        }
    }
}

/// Request body for POST /v1/conversations/{id}/messages.
#[derive(Debug, Deserialize)]
#[serde(tag = "sender_kind", rename_all = "lowercase")]
pub enum AppendMessageRequest {
    /// An inbound contact message.
    ///
    /// When `channel` and `contact_address` are both present, a first
    /// message may create the conversation under the path id. If the
    /// contact already owns a conversation on that channel, the existing
    /// thread wins over the path id; the response carries the
    /// authoritative `conversation_id`.
    Contact {
        content: String,
        #[serde(default)]
        channel: Option<ChannelKind>,
        #[serde(default)]
        contact_address: Option<String>,
    },
    /// A message authored by the named agent.
    Agent { agent_id: String, content: String },
    /// An automated bot reply.
    Bot { content: String },
}

/// Response body for the two ingestion routes.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Conversation the message actually landed in.
    pub conversation_id: String,
    /// Allocated per-conversation sequence number.
    pub seq: i64,
    /// Conversation state after any triggered transitions.
    pub state: ConversationState,
}

impl From<IngestOutcome> for IngestResponse {
    fn from(outcome: IngestOutcome) -> Self {
        IngestResponse {
            conversation_id: outcome.message.conversation_id.clone(),
            seq: outcome.message.seq,
            state: outcome.state,
        }
    }
}

/// Query params for GET /v1/conversations.
#[derive(Debug, Deserialize)]
pub struct ConversationFilter {
    /// Exact state encoding to filter on (`bot`, `waiting`,
    /// `agent:<id>`, `closed`). Absent means all conversations.
    #[serde(default)]
    pub state: Option<String>,
}

/// Response body for GET /v1/conversations.
#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<Conversation>,
}

/// Query params for GET /v1/conversations/{id}/messages.
#[derive(Debug, Deserialize)]
pub struct CatchUpQuery {
    /// Replay starts after this seq; 0 (the default) replays everything.
    #[serde(default)]
    pub since_seq: i64,
}

/// Response body for GET /v1/conversations/{id}/messages.
#[derive(Debug, Serialize)]
pub struct MessageHistoryResponse {
    pub messages: Vec<Message>,
}

/// Request body for POST /v1/conversations/{id}/claim.
#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    /// Agent taking the conversation.
    pub agent_id: String,
    /// The caller's last observed state; a mismatch is a 409.
    pub expected_state: ConversationState,
}

/// Request body for POST /v1/conversations/{id}/release.
#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    /// Agent giving the conversation back to the queue.
    pub agent_id: String,
}

/// Request body for POST /v1/conversations/{id}/transfer.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_agent: String,
    pub to_agent: String,
}

/// Request body for POST /v1/conversations/{id}/close.
#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    /// The caller's last observed state; a mismatch is a 409.
    pub expected_state: ConversationState,
    /// Who closed it, recorded in the audit trail.
    pub closed_by: String,
}

/// Response body for GET /v1/queues.
#[derive(Debug, Serialize)]
pub struct QueueListResponse {
    pub queues: Vec<QueueOccupancy>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"`; a wedged process simply stops answering.
    pub status: String,
    /// Crate version baked in at compile time.
    pub version: String,
    /// Seconds since the gateway started.
    pub uptime_secs: u64,
}

/// POST /v1/inbound
///
/// Webhook-style ingestion: resolves (or creates) the conversation from
/// the channel-specific contact address, then appends a contact message
/// through the engine.
pub async fn post_inbound(
    State(state): State<GatewayState>,
    Json(body): Json<InboundRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let (channel, contact_address, content) = body.normalize();
    let conversation = state
        .engine
        .ensure_conversation(channel, &contact_address, None)
        .await?;
    let outcome = state
        .engine
        .ingest_message(&conversation.id, NewMessage::contact(content))
        .await?;
    Ok(Json(IngestResponse::from(outcome)))
}

/// POST /v1/conversations/{id}/messages
///
/// Appends a message to a known conversation and runs the state machine
/// over it. Contact messages carrying channel + address may create the
/// conversation on first use.
pub async fn post_conversation_message(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<AppendMessageRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let (target, new_message) = match body {
        AppendMessageRequest::Contact {
            content,
            channel,
            contact_address,
        } => {
            let target = match (channel, contact_address) {
                (Some(channel), Some(address)) => {
                    state
                        .engine
                        .ensure_conversation(channel, &address, Some(&id))
                        .await?
                        .id
                }
                _ => id,
            };
            (target, NewMessage::contact(content))
        }
        AppendMessageRequest::Agent { agent_id, content } => {
            (id, NewMessage::agent(agent_id, content))
        }
        AppendMessageRequest::Bot { content } => (id, NewMessage::bot(content)),
    };

    let outcome = state.engine.ingest_message(&target, new_message).await?;
    Ok(Json(IngestResponse::from(outcome)))
}

/// GET /v1/conversations/{id}/messages?since_seq=N
///
/// Ordered catch-up replay; doubles as the initial history load with
/// the default `since_seq=0`.
pub async fn get_conversation_messages(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Query(query): Query<CatchUpQuery>,
) -> Result<Json<MessageHistoryResponse>, ApiError> {
    let messages = state.engine.catch_up(&id, query.since_seq).await?;
    Ok(Json(MessageHistoryResponse { messages }))
}

/// GET /v1/conversations?state=waiting
pub async fn get_conversations(
    State(state): State<GatewayState>,
    Query(filter): Query<ConversationFilter>,
) -> Result<Json<ConversationListResponse>, ApiError> {
    let conversations = state.store.list_conversations(filter.state.as_deref()).await?;
    Ok(Json(ConversationListResponse { conversations }))
}

/// GET /v1/conversations/{id}
pub async fn get_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    match state.store.get_conversation(&id).await? {
        Some(conversation) => Ok(Json(conversation)),
        None => Err(SwitchboardError::NotFound {
            kind: "conversation",
            id,
        }
        .into()),
    }
}

/// POST /v1/conversations/{id}/claim
pub async fn post_claim(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<ClaimRequest>,
) -> Result<Json<Conversation>, ApiError> {
    let conversation = state
        .engine
        .claim(&id, &body.agent_id, &body.expected_state)
        .await?;
    Ok(Json(conversation))
}

/// POST /v1/conversations/{id}/release
pub async fn post_release(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<ReleaseRequest>,
) -> Result<Json<Conversation>, ApiError> {
    let conversation = state.engine.release(&id, &body.agent_id).await?;
    Ok(Json(conversation))
}

/// POST /v1/conversations/{id}/transfer
pub async fn post_transfer(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<TransferRequest>,
) -> Result<Json<Conversation>, ApiError> {
    let conversation = state
        .engine
        .transfer(&id, &body.from_agent, &body.to_agent)
        .await?;
    Ok(Json(conversation))
}

/// POST /v1/conversations/{id}/close
pub async fn post_close(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<CloseRequest>,
) -> Result<Json<Conversation>, ApiError> {
    let conversation = state
        .engine
        .close(&id, &body.expected_state, &body.closed_by)
        .await?;
    Ok(Json(conversation))
}

/// GET /v1/queues
///
/// Live occupancy of every configured queue: active slots per agent and
/// waiting depth.
pub async fn get_queues(State(state): State<GatewayState>) -> Json<QueueListResponse> {
    Json(QueueListResponse {
        queues: state.engine.queue_occupancy().await,
    })
}

/// GET /health
pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics
///
/// Prometheus text exposition, rendered through the handle the bin
/// installs at startup.
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (StatusCode::OK, render()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            "metrics exporter not installed\n".to_string(),
        )
            .into_response(),
    }
}
