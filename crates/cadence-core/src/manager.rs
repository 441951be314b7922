//! Campaign Manager - operator command surface
//!
//! Create runs policy validation and the admission planner before anything
//! is persisted; pause/resume/cancel/retry mutate the status fields the
//! dispatcher re-reads between messages, so they take effect no later than
//! the next claim attempt.

use cadence_storage::db::DatabasePool;
use cadence_storage::models::{
    Campaign, CampaignStatus, CreateCampaign, CreateRecipient, PolicyConfig,
};
use cadence_storage::repository::{CampaignRepository, MessageRepository};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Campaign manager errors
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Campaign not found")]
    NotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Planned window overlaps campaign \"{campaign_name}\"")]
    ScheduleConflict {
        campaign_id: Uuid,
        campaign_name: String,
        suggested_start: DateTime<Utc>,
    },

    #[error("Campaign is {status} and cannot be {verb}")]
    IllegalTransition { status: String, verb: &'static str },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Input for campaign creation
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub owner_id: Uuid,
    pub name: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub config: PolicyConfig,
    pub recipients: Vec<CreateRecipient>,
}

/// Campaign Manager - owns campaign lifecycle commands
pub struct CampaignManager {
    campaigns: CampaignRepository,
    messages: MessageRepository,
    timezone: Tz,
}

impl CampaignManager {
    /// Create a new campaign manager
    pub fn new(db_pool: DatabasePool, timezone: Tz) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            campaigns: CampaignRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
            timezone,
        }
    }

    /// Timezone HH:MM policy fields are interpreted in
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Admit and persist a new campaign with its recipient rows.
    ///
    /// Rejects invalid policies and planned windows that overlap another
    /// campaign of the same owner; nothing is persisted on rejection.
    pub async fn create(&self, input: NewCampaign) -> Result<Campaign, CampaignError> {
        input
            .config
            .validate()
            .map_err(|e| CampaignError::InvalidPolicy(e.to_string()))?;

        let now = Utc::now();
        let scheduled_at = input.scheduled_at.unwrap_or(now);
        let status = if scheduled_at > now {
            CampaignStatus::Scheduled
        } else {
            CampaignStatus::Pending
        };

        let candidate = crate::planner::campaign_window(
            &input.config,
            scheduled_at,
            input.recipients.len(),
            self.timezone,
        );
        let existing = self
            .campaigns
            .list_overlappable_by_owner(input.owner_id)
            .await?;
        let windows: Vec<crate::planner::CampaignWindow> = existing
            .iter()
            .map(|c| {
                let start = c.started_at.unwrap_or(c.scheduled_at);
                let (start, end) = crate::planner::campaign_window(
                    &c.policy(),
                    start,
                    c.total_messages.max(0) as usize,
                    self.timezone,
                );
                crate::planner::CampaignWindow {
                    id: c.id,
                    name: c.name.clone(),
                    start,
                    end,
                }
            })
            .collect();

        if let crate::planner::Admission::Conflict {
            campaign_id,
            campaign_name,
            suggested_start,
        } = crate::planner::check_conflicts(candidate, &windows)
        {
            return Err(CampaignError::ScheduleConflict {
                campaign_id,
                campaign_name,
                suggested_start,
            });
        }

        let campaign = self
            .campaigns
            .create(CreateCampaign {
                owner_id: input.owner_id,
                name: input.name,
                status,
                scheduled_at,
                config: input.config,
                recipients: input.recipients,
            })
            .await?;

        info!(
            "Campaign {} created with {} recipients, starting at {}",
            campaign.id, campaign.total_messages, scheduled_at
        );

        Ok(campaign)
    }

    /// Pause a campaign. Idempotent: pausing a paused campaign succeeds
    /// without effect.
    pub async fn pause(&self, id: Uuid) -> Result<Campaign, CampaignError> {
        let campaign = self.campaigns.get(id).await?.ok_or(CampaignError::NotFound)?;

        match campaign.status_enum() {
            Some(CampaignStatus::Paused) => return Ok(campaign),
            Some(s) if s.can_transition_to(CampaignStatus::Paused) => {}
            _ => {
                return Err(CampaignError::IllegalTransition {
                    status: campaign.status.clone(),
                    verb: "paused",
                });
            }
        }

        let updated = self
            .campaigns
            .set_status(id, CampaignStatus::Paused)
            .await?
            .ok_or(CampaignError::NotFound)?;

        info!("Campaign {} paused", id);
        Ok(updated)
    }

    /// Resume a paused campaign: it goes back to `active` and the next
    /// dispatch coerces it to `processing`. Idempotent.
    pub async fn resume(&self, id: Uuid) -> Result<Campaign, CampaignError> {
        let campaign = self.campaigns.get(id).await?.ok_or(CampaignError::NotFound)?;

        match campaign.status_enum() {
            Some(s) if s.is_running() => return Ok(campaign),
            Some(s) if s.can_transition_to(CampaignStatus::Active) => {}
            _ => {
                return Err(CampaignError::IllegalTransition {
                    status: campaign.status.clone(),
                    verb: "resumed",
                });
            }
        }

        let updated = self
            .campaigns
            .set_status(id, CampaignStatus::Active)
            .await?
            .ok_or(CampaignError::NotFound)?;

        info!("Campaign {} resumed", id);
        Ok(updated)
    }

    /// Cancel a campaign (terminal). Remaining waiting messages are failed
    /// so no claimable rows survive the terminal state; a message already
    /// in flight still commits its outcome.
    pub async fn cancel(&self, id: Uuid) -> Result<Campaign, CampaignError> {
        let campaign = self.campaigns.get(id).await?.ok_or(CampaignError::NotFound)?;

        match campaign.status_enum() {
            Some(CampaignStatus::Canceled) => return Ok(campaign),
            Some(s) if s.can_transition_to(CampaignStatus::Canceled) => {}
            _ => {
                return Err(CampaignError::IllegalTransition {
                    status: campaign.status.clone(),
                    verb: "canceled",
                });
            }
        }

        let updated = self
            .campaigns
            .set_status(id, CampaignStatus::Canceled)
            .await?
            .ok_or(CampaignError::NotFound)?;

        let failed = self.messages.fail_waiting(id, "campaign canceled").await?;

        info!(
            "Campaign {} canceled, {} waiting messages closed out",
            id, failed
        );
        Ok(updated)
    }

    /// Reset a failed message back to waiting. Returns whether the reset
    /// took effect; any non-failed source state is a no-op.
    pub async fn retry_message(&self, message_id: Uuid) -> Result<bool, CampaignError> {
        self.messages
            .get(message_id)
            .await?
            .ok_or(CampaignError::MessageNotFound)?;

        let reset = self.messages.retry(message_id).await?;
        if reset {
            info!("Message {} reset to waiting for retry", message_id);
        }
        Ok(reset)
    }

    /// Expected schedule for a policy, as shown to the operator. Shares its
    /// implementation with the dispatcher's pacing so preview and execution
    /// agree in expectation.
    pub fn preview(
        &self,
        config: &PolicyConfig,
        start: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<DateTime<Utc>>, CampaignError> {
        config
            .validate()
            .map_err(|e| CampaignError::InvalidPolicy(e.to_string()))?;
        Ok(crate::pacing::plan_schedule(config, start, count, self.timezone))
    }
}
