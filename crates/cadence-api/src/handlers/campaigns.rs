//! Campaign handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use cadence_core::{CampaignError, NewCampaign};
use cadence_storage::models::{
    Campaign, CampaignStatus, CreateRecipient, MessageStatusCounts, PolicyConfig,
};
use cadence_storage::repository::{CampaignRepository, MessageRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::{ConflictInfo, ErrorResponse};
use crate::AppState;

/// Query parameters for listing campaigns
#[derive(Debug, Deserialize)]
pub struct ListCampaignsQuery {
    pub owner_id: Uuid,
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Campaign list response
#[derive(Debug, Serialize)]
pub struct CampaignListResponse {
    pub data: Vec<CampaignResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Campaign response
#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub status: String,
    pub total_messages: i32,
    pub sent_messages: i32,
    pub execution_time: i64,
    pub progress_percentage: f64,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config: PolicyConfig,
    pub created_at: DateTime<Utc>,
}

impl From<Campaign> for CampaignResponse {
    fn from(c: Campaign) -> Self {
        let progress = c.progress_percentage();
        let config = c.policy();
        Self {
            id: c.id,
            owner_id: c.owner_id,
            name: c.name,
            status: c.status,
            total_messages: c.total_messages,
            sent_messages: c.sent_messages,
            execution_time: c.execution_time,
            progress_percentage: progress,
            scheduled_at: c.scheduled_at,
            started_at: c.started_at,
            finished_at: c.finished_at,
            config,
            created_at: c.created_at,
        }
    }
}

/// Request body for creating a campaign
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub owner_id: Uuid,
    pub name: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Pacing policy; snake_case and camelCase field names both accepted
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub recipients: Vec<CreateRecipient>,
}

/// Request body for previewing a schedule
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub config: serde_json::Value,
    pub start_at: Option<DateTime<Utc>>,
    pub count: usize,
}

/// Expected send instants for a policy
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub planned: Vec<DateTime<Utc>>,
}

/// Campaign statistics response
#[derive(Debug, Serialize)]
pub struct CampaignStatsResponse {
    pub campaign_id: Uuid,
    pub status: String,
    pub total_messages: i32,
    pub sent_messages: i32,
    pub progress_percentage: f64,
    pub counts: MessageStatusCounts,
    pub execution_time: i64,
}

fn decode_policy(
    value: serde_json::Value,
) -> Result<PolicyConfig, (StatusCode, Json<ErrorResponse>)> {
    if value.is_null() {
        return Ok(PolicyConfig::default());
    }
    serde_json::from_value(value).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "validation_error",
                format!("Invalid policy config: {}", e),
            )),
        )
    })
}

fn command_error(e: CampaignError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        CampaignError::NotFound | CampaignError::MessageNotFound => StatusCode::NOT_FOUND,
        CampaignError::InvalidPolicy(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CampaignError::ScheduleConflict { .. } => StatusCode::CONFLICT,
        CampaignError::IllegalTransition { .. } => StatusCode::BAD_REQUEST,
        CampaignError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let mut response = ErrorResponse::new("command_error", e.to_string());
    if let CampaignError::ScheduleConflict {
        campaign_id,
        campaign_name,
        suggested_start,
    } = e
    {
        response.error = "schedule_conflict".to_string();
        response.conflict = Some(ConflictInfo {
            campaign_id,
            campaign_name,
            suggested_start_at: suggested_start,
        });
    }
    (status, Json(response))
}

/// List campaigns for an owner
///
/// GET /api/v1/campaigns?owner_id=...
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListCampaignsQuery>,
) -> Result<Json<CampaignListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let repo = CampaignRepository::new(state.db_pool.pool().clone());

    let status = query.status.and_then(|s| s.parse::<CampaignStatus>().ok());

    let campaigns = repo
        .list_by_owner(query.owner_id, status, query.limit, query.offset)
        .await
        .map_err(|e| {
            error!("Failed to list campaigns: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("internal_error", "Failed to list campaigns")),
            )
        })?;

    let total = repo.count_by_owner(query.owner_id, status).await.unwrap_or(0);

    let data = campaigns.into_iter().map(CampaignResponse::from).collect();

    Ok(Json(CampaignListResponse {
        data,
        total,
        limit: query.limit,
        offset: query.offset,
    }))
}

/// Create a new campaign and trigger an immediate dispatch
///
/// POST /api/v1/campaigns
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignResponse>), (StatusCode, Json<ErrorResponse>)> {
    if input.name.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "validation_error",
                "Campaign name is required",
            )),
        ));
    }

    if input.recipients.iter().any(|r| r.phone.is_empty()) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "validation_error",
                "Every recipient needs a phone number",
            )),
        ));
    }

    let config = decode_policy(input.config)?;

    let campaign = state
        .manager
        .create(NewCampaign {
            owner_id: input.owner_id,
            name: input.name,
            scheduled_at: input.scheduled_at,
            config,
            recipients: input.recipients,
        })
        .await
        .map_err(command_error)?;

    info!(
        "Created campaign {} for owner {}",
        campaign.id, campaign.owner_id
    );

    // Kick the dispatcher once so an immediate campaign starts without
    // waiting for the next scan.
    let dispatcher = state.dispatcher.clone();
    let campaign_id = campaign.id;
    tokio::spawn(async move {
        if let Err(e) = dispatcher.run_once(Some(campaign_id)).await {
            error!("Initial dispatch for campaign {} failed: {}", campaign_id, e);
        }
    });

    Ok((StatusCode::CREATED, Json(CampaignResponse::from(campaign))))
}

/// Get a campaign by ID
///
/// GET /api/v1/campaigns/:id
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let repo = CampaignRepository::new(state.db_pool.pool().clone());

    let campaign = repo
        .get(id)
        .await
        .map_err(|e| {
            error!("Failed to get campaign: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("internal_error", "Failed to get campaign")),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("not_found", "Campaign not found")),
            )
        })?;

    Ok(Json(CampaignResponse::from(campaign)))
}

/// Get campaign statistics
///
/// GET /api/v1/campaigns/:id/stats
pub async fn get_campaign_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignStatsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let campaigns = CampaignRepository::new(state.db_pool.pool().clone());
    let messages = MessageRepository::new(state.db_pool.pool().clone());

    let campaign = campaigns
        .get(id)
        .await
        .map_err(|e| {
            error!("Failed to get campaign: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("internal_error", "Failed to get campaign")),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("not_found", "Campaign not found")),
            )
        })?;

    let counts = messages.status_counts(id).await.map_err(|e| {
        error!("Failed to count messages: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(
                "internal_error",
                "Failed to get campaign statistics",
            )),
        )
    })?;

    Ok(Json(CampaignStatsResponse {
        campaign_id: campaign.id,
        status: campaign.status.clone(),
        total_messages: campaign.total_messages,
        sent_messages: campaign.sent_messages,
        progress_percentage: campaign.progress_percentage(),
        counts,
        execution_time: campaign.execution_time,
    }))
}

/// Pause a running campaign
///
/// POST /api/v1/campaigns/:id/pause
pub async fn pause_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let campaign = state.manager.pause(id).await.map_err(command_error)?;
    Ok(Json(CampaignResponse::from(campaign)))
}

/// Resume a paused campaign
///
/// POST /api/v1/campaigns/:id/resume
pub async fn resume_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let campaign = state.manager.resume(id).await.map_err(command_error)?;
    Ok(Json(CampaignResponse::from(campaign)))
}

/// Cancel a campaign
///
/// POST /api/v1/campaigns/:id/cancel
pub async fn cancel_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let campaign = state.manager.cancel(id).await.map_err(command_error)?;
    Ok(Json(CampaignResponse::from(campaign)))
}

/// Preview the expected schedule for a policy
///
/// POST /api/v1/campaigns/preview
pub async fn preview_schedule(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, (StatusCode, Json<ErrorResponse>)> {
    let config = decode_policy(input.config)?;
    let start = input.start_at.unwrap_or_else(Utc::now);

    let planned = state
        .manager
        .preview(&config, start, input.count)
        .map_err(command_error)?;

    Ok(Json(PreviewResponse { planned }))
}
