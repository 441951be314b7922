//! Campaign message handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use cadence_core::CampaignError;
use cadence_storage::models::{CampaignMessage, MessageStatus};
use cadence_storage::repository::MessageRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::ErrorResponse;
use crate::AppState;

/// Query parameters for listing messages
#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Message list response
#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub data: Vec<CampaignMessage>,
    pub limit: i64,
    pub offset: i64,
}

/// Retry response
#[derive(Debug, Serialize)]
pub struct RetryResponse {
    /// Whether the message was actually reset (false for non-failed rows)
    pub reset: bool,
}

/// List messages of a campaign
///
/// GET /api/v1/campaigns/:id/messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<MessageListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let repo = MessageRepository::new(state.db_pool.pool().clone());

    let status = query.status.and_then(|s| s.parse::<MessageStatus>().ok());

    let data = repo
        .list_by_campaign(campaign_id, status, query.limit, query.offset)
        .await
        .map_err(|e| {
            error!("Failed to list messages: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("internal_error", "Failed to list messages")),
            )
        })?;

    Ok(Json(MessageListResponse {
        data,
        limit: query.limit,
        offset: query.offset,
    }))
}

/// Reset a failed message for another delivery attempt
///
/// POST /api/v1/messages/:id/retry
pub async fn retry_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RetryResponse>, (StatusCode, Json<ErrorResponse>)> {
    let reset = state.manager.retry_message(id).await.map_err(|e| {
        let status = match e {
            CampaignError::MessageNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorResponse::new("retry_error", e.to_string())))
    })?;

    Ok(Json(RetryResponse { reset }))
}
