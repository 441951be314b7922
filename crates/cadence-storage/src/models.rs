//! Database models

use cadence_common::types::{CampaignId, MessageId, OwnerId, RecipientId, TimeOfDay};
use cadence_common::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Campaign lifecycle states.
///
/// `scheduled` and `pending` both mean "not yet started"; `active` is an
/// alias for `processing` and is coerced on dispatcher entry. `finished`,
/// `canceled` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Scheduled,
    Pending,
    Processing,
    Active,
    Paused,
    Finished,
    Canceled,
    Failed,
}

impl CampaignStatus {
    /// Terminal states never leave
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Finished | CampaignStatus::Canceled | CampaignStatus::Failed
        )
    }

    /// States the dispatcher coerces to `processing` on entry
    pub fn is_startable(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Scheduled | CampaignStatus::Pending | CampaignStatus::Active
        )
    }

    /// Running states (`active` is accepted as an alias for `processing`)
    pub fn is_running(&self) -> bool {
        matches!(self, CampaignStatus::Processing | CampaignStatus::Active)
    }

    /// Whether an operator command may move a campaign into `to`
    pub fn can_transition_to(&self, to: CampaignStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            CampaignStatus::Paused => true,
            CampaignStatus::Active => true,
            CampaignStatus::Canceled => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Pending => "pending",
            CampaignStatus::Processing => "processing",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Finished => "finished",
            CampaignStatus::Canceled => "canceled",
            CampaignStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "pending" => Ok(CampaignStatus::Pending),
            "processing" => Ok(CampaignStatus::Processing),
            "active" => Ok(CampaignStatus::Active),
            "paused" => Ok(CampaignStatus::Paused),
            "finished" => Ok(CampaignStatus::Finished),
            "canceled" => Ok(CampaignStatus::Canceled),
            "failed" => Ok(CampaignStatus::Failed),
            other => Err(Error::Validation(format!(
                "Unknown campaign status: {}",
                other
            ))),
        }
    }
}

/// Message row states. `waiting -> sending` is the claim; `sent` and
/// `failed` are terminal, except that a retry resets `failed -> waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Waiting,
    Sending,
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Sent | MessageStatus::Failed)
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageStatus::Waiting => "waiting",
            MessageStatus::Sending => "sending",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(MessageStatus::Waiting),
            "sending" => Ok(MessageStatus::Sending),
            "sent" => Ok(MessageStatus::Sent),
            "failed" => Ok(MessageStatus::Failed),
            other => Err(Error::Validation(format!(
                "Unknown message status: {}",
                other
            ))),
        }
    }
}

/// Business-hours handling for a campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusinessHoursStrategy {
    #[default]
    Ignore,
    Pause,
}

/// One-shot scheduled interruption: sending stops once the wall clock
/// passes `pause_at` (or the campaign crosses into a later day) and resumes
/// at the absolute `resume_at` instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomaticPause {
    #[serde(alias = "pauseAt")]
    pub pause_at: TimeOfDay,
    #[serde(alias = "resumeAt")]
    pub resume_at: DateTime<Utc>,
}

/// Pacing policy of a campaign.
///
/// The persisted JSON blob historically mixes snake_case and camelCase
/// field names; serde aliases normalize either spelling on read. Unknown
/// fields are ignored and missing fields fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Lower bound of the per-send delay, seconds
    #[serde(default = "default_min_interval", alias = "minInterval")]
    pub min_interval: u32,

    /// Upper bound of the per-send delay, seconds
    #[serde(default = "default_max_interval", alias = "maxInterval")]
    pub max_interval: u32,

    /// Insert a longer pause every `batch_size` sends
    #[serde(default, alias = "useBatching")]
    pub use_batching: bool,

    #[serde(default, alias = "batchSize")]
    pub batch_size: u32,

    /// Batch pause bounds, seconds
    #[serde(default, alias = "batchPauseMin")]
    pub batch_pause_min: u32,

    #[serde(default, alias = "batchPauseMax")]
    pub batch_pause_max: u32,

    #[serde(default, alias = "businessHoursStrategy", alias = "business_hours_strategy")]
    pub business_hours: BusinessHoursStrategy,

    /// Daily instant after which sending pauses (inclusive), `pause` strategy
    #[serde(default, alias = "pauseAt")]
    pub pause_at: Option<TimeOfDay>,

    /// Daily instant at which sending resumes (exclusive bound), `pause` strategy
    #[serde(default, alias = "resumeAt")]
    pub resume_at: Option<TimeOfDay>,

    #[serde(default, alias = "automaticPause")]
    pub automatic_pause: Option<AutomaticPause>,
}

fn default_min_interval() -> u32 {
    30
}

fn default_max_interval() -> u32 {
    40
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_interval: default_min_interval(),
            max_interval: default_max_interval(),
            use_batching: false,
            batch_size: 0,
            batch_pause_min: 0,
            batch_pause_max: 0,
            business_hours: BusinessHoursStrategy::Ignore,
            pause_at: None,
            resume_at: None,
            automatic_pause: None,
        }
    }
}

impl PolicyConfig {
    /// Validate the policy at admission time. Invalid policies are rejected
    /// with a descriptive reason and never persisted.
    pub fn validate(&self) -> Result<(), Error> {
        if self.min_interval < 5 {
            return Err(Error::Validation(
                "min_interval must be at least 5 seconds".to_string(),
            ));
        }
        if self.min_interval > self.max_interval {
            return Err(Error::Validation(
                "min_interval must not exceed max_interval".to_string(),
            ));
        }
        if self.use_batching {
            if self.batch_size < 1 {
                return Err(Error::Validation(
                    "batch_size must be at least 1 when batching is enabled".to_string(),
                ));
            }
            if self.batch_pause_min < 1 {
                return Err(Error::Validation(
                    "batch_pause_min must be at least 1 second".to_string(),
                ));
            }
            if self.batch_pause_min > self.batch_pause_max {
                return Err(Error::Validation(
                    "batch_pause_min must not exceed batch_pause_max".to_string(),
                ));
            }
        }
        if self.business_hours == BusinessHoursStrategy::Pause {
            let (pause_at, resume_at) = match (self.pause_at, self.resume_at) {
                (Some(p), Some(r)) => (p, r),
                _ => {
                    return Err(Error::Validation(
                        "pause strategy requires pause_at and resume_at".to_string(),
                    ));
                }
            };
            // Windows spanning midnight are not supported.
            if resume_at >= pause_at {
                return Err(Error::Validation(
                    "resume_at must be strictly before pause_at on the same day".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Campaign model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub owner_id: OwnerId,
    pub name: String,
    pub status: String,
    pub total_messages: i32,
    pub sent_messages: i32,
    /// Accumulated seconds the campaign spent in an active phase
    pub execution_time: i64,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Parse the persisted status string
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }

    /// Decode the policy blob, normalizing legacy field spellings and
    /// falling back to defaults when fields are missing.
    pub fn policy(&self) -> PolicyConfig {
        serde_json::from_value(self.config.clone()).unwrap_or_default()
    }

    /// Percentage of messages confirmed sent
    pub fn progress_percentage(&self) -> f64 {
        if self.total_messages <= 0 {
            return 0.0;
        }
        (self.sent_messages as f64 / self.total_messages as f64) * 100.0
    }
}

/// Recipient model. Read-only to the scheduler.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub campaign_id: CampaignId,
    pub name: String,
    pub phone: String,
    pub message_body: String,
}

/// Per-recipient message row; the smallest claim/commit unit
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignMessage {
    pub id: MessageId,
    pub campaign_id: CampaignId,
    pub recipient_id: RecipientId,
    pub status: String,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A message claimed for sending, joined with its recipient
#[derive(Debug, Clone, FromRow)]
pub struct ClaimedMessage {
    pub id: MessageId,
    pub campaign_id: CampaignId,
    pub recipient_id: RecipientId,
    pub name: String,
    pub phone: String,
    pub message_body: String,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Create campaign input
#[derive(Debug, Clone)]
pub struct CreateCampaign {
    pub owner_id: OwnerId,
    pub name: String,
    pub status: CampaignStatus,
    pub scheduled_at: DateTime<Utc>,
    pub config: PolicyConfig,
    pub recipients: Vec<CreateRecipient>,
}

/// Recipient row supplied at campaign creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecipient {
    pub name: String,
    pub phone: String,
    #[serde(alias = "message", alias = "messageBody")]
    pub message_body: String,
}

/// Per-status message counts for one campaign
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MessageStatusCounts {
    pub waiting: i64,
    pub sending: i64,
    pub sent: i64,
    pub failed: i64,
}

impl MessageStatusCounts {
    pub fn total(&self) -> i64 {
        self.waiting + self.sending + self.sent + self.failed
    }

    /// Rows that still need dispatcher attention
    pub fn remaining(&self) -> i64 {
        self.waiting + self.sending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            "scheduled",
            "pending",
            "processing",
            "active",
            "paused",
            "finished",
            "canceled",
            "failed",
        ] {
            let parsed: CampaignStatus = s.parse().unwrap();
            assert_eq!(parsed.to_string(), s);
        }
        assert!("draft".parse::<CampaignStatus>().is_err());
    }

    #[test]
    fn test_status_predicates() {
        assert!(CampaignStatus::Finished.is_terminal());
        assert!(CampaignStatus::Canceled.is_terminal());
        assert!(CampaignStatus::Scheduled.is_startable());
        assert!(CampaignStatus::Active.is_startable());
        assert!(!CampaignStatus::Paused.is_startable());
        assert!(CampaignStatus::Processing.is_running());
        assert!(!CampaignStatus::Canceled.can_transition_to(CampaignStatus::Active));
        assert!(CampaignStatus::Processing.can_transition_to(CampaignStatus::Paused));
        assert!(CampaignStatus::Paused.can_transition_to(CampaignStatus::Active));
        assert!(!CampaignStatus::Processing.can_transition_to(CampaignStatus::Finished));
    }

    #[test]
    fn test_policy_defaults() {
        let policy: PolicyConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(policy.min_interval, 30);
        assert_eq!(policy.max_interval, 40);
        assert!(!policy.use_batching);
        assert_eq!(policy.business_hours, BusinessHoursStrategy::Ignore);
    }

    #[test]
    fn test_policy_camel_case_aliases() {
        let policy: PolicyConfig = serde_json::from_value(serde_json::json!({
            "minInterval": 5,
            "maxInterval": 9,
            "useBatching": true,
            "batchSize": 10,
            "batchPauseMin": 60,
            "batchPauseMax": 120,
            "businessHoursStrategy": "pause",
            "pauseAt": "18:00",
            "resumeAt": "08:00",
            "legacy_field": "ignored"
        }))
        .unwrap();
        assert_eq!(policy.min_interval, 5);
        assert_eq!(policy.max_interval, 9);
        assert!(policy.use_batching);
        assert_eq!(policy.batch_size, 10);
        assert_eq!(policy.business_hours, BusinessHoursStrategy::Pause);
        assert_eq!(policy.pause_at.unwrap().to_string(), "18:00");
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_policy_validation() {
        let mut policy = PolicyConfig {
            min_interval: 3,
            max_interval: 10,
            ..Default::default()
        };
        assert!(policy.validate().is_err());

        policy.min_interval = 20;
        policy.max_interval = 10;
        assert!(policy.validate().is_err());

        policy.max_interval = 30;
        assert!(policy.validate().is_ok());

        policy.use_batching = true;
        assert!(policy.validate().is_err());

        policy.batch_size = 5;
        policy.batch_pause_min = 10;
        policy.batch_pause_max = 5;
        assert!(policy.validate().is_err());

        policy.batch_pause_max = 20;
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_policy_rejects_window_across_midnight() {
        let policy = PolicyConfig {
            business_hours: BusinessHoursStrategy::Pause,
            pause_at: TimeOfDay::parse("08:00"),
            resume_at: TimeOfDay::parse("22:00"),
            ..Default::default()
        };
        assert!(policy.validate().is_err());

        let policy = PolicyConfig {
            business_hours: BusinessHoursStrategy::Pause,
            pause_at: TimeOfDay::parse("18:00"),
            resume_at: TimeOfDay::parse("08:00"),
            ..Default::default()
        };
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_campaign_policy_fallback() {
        let campaign = Campaign {
            id: uuid::Uuid::new_v4(),
            owner_id: uuid::Uuid::new_v4(),
            name: "test".to_string(),
            status: "pending".to_string(),
            total_messages: 0,
            sent_messages: 0,
            execution_time: 0,
            scheduled_at: Utc::now(),
            started_at: None,
            finished_at: None,
            config: serde_json::json!("not an object"),
            created_at: Utc::now(),
        };
        assert_eq!(campaign.policy(), PolicyConfig::default());
    }
}
