//! API request handlers

pub mod campaigns;
pub mod dispatch;
pub mod health;
pub mod messages;

use serde::Serialize;

/// Error response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictInfo>,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            conflict: None,
        }
    }
}

/// Details of a schedule conflict reported at admission
#[derive(Debug, Clone, Serialize)]
pub struct ConflictInfo {
    pub campaign_id: uuid::Uuid,
    pub campaign_name: String,
    pub suggested_start_at: chrono::DateTime<chrono::Utc>,
}
