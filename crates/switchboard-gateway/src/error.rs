// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP error mapping for the gateway.
//!
//! Handlers return `Result<_, ApiError>`; the `?` operator converts any
//! [`SwitchboardError`] into a status code plus the standard JSON error
//! body. Conflict-class errors map to 409 so clients know to refetch and
//! retry; store failures map to 503 so clients know to back off.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use switchboard_core::SwitchboardError;

/// JSON body every failed request carries.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable description of what went wrong.
    pub error: String,
}

/// Wrapper that renders a [`SwitchboardError`] as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub SwitchboardError);

impl From<SwitchboardError> for ApiError {
    fn from(err: SwitchboardError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            SwitchboardError::StateConflict { .. }
            | SwitchboardError::CampaignConflict { .. }
            | SwitchboardError::CapacityExhausted { .. } => StatusCode::CONFLICT,
            SwitchboardError::NotFound { .. } => StatusCode::NOT_FOUND,
            SwitchboardError::Config(_) => StatusCode::BAD_REQUEST,
            SwitchboardError::Store { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SwitchboardError::Channel { .. } => StatusCode::BAD_GATEWAY,
            SwitchboardError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            SwitchboardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::{CampaignStatus, ConversationState};

    #[test]
    fn conflict_class_errors_map_to_409() {
        let stale = ApiError(SwitchboardError::StateConflict {
            conversation_id: "c1".to_string(),
            expected: ConversationState::Bot,
            actual: ConversationState::Closed,
        });
        assert_eq!(stale.status(), StatusCode::CONFLICT);

        let lifecycle = ApiError(SwitchboardError::CampaignConflict {
            campaign_id: "k1".to_string(),
            expected: CampaignStatus::Draft,
            actual: CampaignStatus::Finished,
        });
        assert_eq!(lifecycle.status(), StatusCode::CONFLICT);

        let full = ApiError(SwitchboardError::CapacityExhausted {
            queue_id: "support".to_string(),
        });
        assert_eq!(full.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn lookup_and_input_errors_map_to_client_codes() {
        let missing = ApiError(SwitchboardError::NotFound {
            kind: "conversation",
            id: "ghost".to_string(),
        });
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let bad_spec = ApiError(SwitchboardError::Config("rate must be positive".to_string()));
        assert_eq!(bad_spec.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn infrastructure_errors_map_to_server_codes() {
        let store = ApiError(SwitchboardError::Store {
            source: "disk full".into(),
        });
        assert_eq!(store.status(), StatusCode::SERVICE_UNAVAILABLE);

        let channel = ApiError(SwitchboardError::Channel {
            message: "provider unreachable".to_string(),
            source: None,
        });
        assert_eq!(channel.status(), StatusCode::BAD_GATEWAY);

        let internal = ApiError(SwitchboardError::Internal("bug".to_string()));
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn response_body_carries_the_error_display() {
        let response = ApiError(SwitchboardError::NotFound {
            kind: "campaign",
            id: "k9".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "campaign not found: k9");
    }
}
