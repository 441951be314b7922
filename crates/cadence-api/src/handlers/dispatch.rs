//! Dispatcher trigger handler

use axum::{extract::State, Json};
use cadence_core::DispatchOutcome;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::AppState;

/// Optional trigger body: a campaign id makes the run targeted
#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    pub campaign_id: Option<Uuid>,
}

/// Trigger response; always returned with HTTP 200
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub results: Vec<DispatchOutcome>,
}

/// Run one dispatcher invocation.
///
/// POST /api/v1/dispatch
///
/// Always answers 200 so the external trigger never sees an error it would
/// retry-storm on; internal failure is reported as `success: false`.
pub async fn trigger_dispatch(
    State(state): State<Arc<AppState>>,
    body: Option<Json<TriggerRequest>>,
) -> Json<TriggerResponse> {
    let campaign_id = body.and_then(|Json(b)| b.campaign_id);

    match state.dispatcher.run_once(campaign_id).await {
        Ok(results) => Json(TriggerResponse {
            success: true,
            results,
        }),
        Err(e) => {
            error!("Dispatch trigger failed: {}", e);
            Json(TriggerResponse {
                success: false,
                results: Vec::new(),
            })
        }
    }
}
