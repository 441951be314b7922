//! Campaign dispatcher
//!
//! The worker entry point. Each invocation has a hard wall-clock budget
//! shorter than the external trigger cadence, so a campaign whose next
//! delay does not fit is simply left where it is and picked up again by
//! the next invocation: all pacing state is derived from the store, never
//! held in memory.
//!
//! Multiple invocations may overlap. Message claims are compare-and-swap
//! updates and the sent counter is an atomic increment, so concurrent
//! workers never double-send; pacing under concurrent workers is
//! best-effort.

use cadence_common::config::SchedulerConfig;
use cadence_storage::db::DatabasePool;
use cadence_storage::models::{Campaign, CampaignStatus, MessageStatusCounts, PolicyConfig};
use cadence_storage::repository::{CampaignRepository, MessageRepository};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::time::Duration as StdDuration;
use tokio::time::{interval, sleep, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::gateway::SendGateway;
use crate::pacing;

/// How one campaign left a dispatcher invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Work remains; the next invocation continues
    Continued,
    /// All messages reached a terminal state
    Finished,
    /// A pause window (one-shot or business hours) suppressed sending
    PausedTemporarily,
}

/// Per-campaign result of a dispatcher invocation
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub id: Uuid,
    pub messages_sent: u32,
    pub status: RunStatus,
}

/// Campaign dispatcher
pub struct Dispatcher {
    campaigns: CampaignRepository,
    messages: MessageRepository,
    gateway: SendGateway,
    timezone: Tz,
    budget: StdDuration,
    poll_interval: StdDuration,
    stale_claim_secs: i64,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(
        db_pool: DatabasePool,
        gateway: SendGateway,
        timezone: Tz,
        config: &SchedulerConfig,
    ) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            campaigns: CampaignRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
            gateway,
            timezone,
            budget: StdDuration::from_secs(config.budget_secs),
            poll_interval: StdDuration::from_secs(config.poll_interval_secs),
            stale_claim_secs: config.stale_claim_secs as i64,
        }
    }

    /// Run the periodic scan loop
    pub async fn run(&self) {
        let mut ticker = interval(self.poll_interval);

        info!(
            "Campaign dispatcher started (budget: {}s, poll: {}s)",
            self.budget.as_secs(),
            self.poll_interval.as_secs()
        );

        loop {
            ticker.tick().await;

            match self.run_once(None).await {
                Ok(results) if !results.is_empty() => {
                    debug!("Dispatcher scan processed {} campaigns", results.len());
                }
                Ok(_) => {}
                Err(e) => error!("Dispatcher scan failed: {}", e),
            }
        }
    }

    /// One time-bounded dispatcher invocation.
    ///
    /// With `only` set the `scheduled_at` filter is skipped and just that
    /// campaign is processed. Store failures on a campaign abandon it for
    /// this invocation only.
    pub async fn run_once(&self, only: Option<Uuid>) -> Result<Vec<DispatchOutcome>, sqlx::Error> {
        let invocation_start = Instant::now();
        let now = Utc::now();

        if only.is_none() {
            self.sweep_stale_claims(now).await;
        }

        let campaigns = self.campaigns.list_eligible(now, only).await?;

        let mut results = Vec::new();
        for campaign in campaigns {
            if invocation_start.elapsed() > self.budget {
                debug!("Invocation budget exhausted, stopping scan");
                break;
            }

            match self.run_campaign(&campaign, invocation_start).await {
                Ok(outcome) => results.push(outcome),
                Err(e) => {
                    error!(
                        "Abandoning campaign {} for this invocation: {}",
                        campaign.id, e
                    );
                }
            }
        }

        Ok(results)
    }

    /// Reclaim messages whose terminal commit was lost so they become
    /// claimable again.
    async fn sweep_stale_claims(&self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(self.stale_claim_secs);
        match self.messages.release_stale_sending(cutoff).await {
            Ok(0) => {}
            Ok(released) => warn!("Released {} stale sending claims back to waiting", released),
            Err(e) => warn!("Failed to sweep stale claims: {}", e),
        }
    }

    async fn run_campaign(
        &self,
        campaign: &Campaign,
        invocation_start: Instant,
    ) -> Result<DispatchOutcome, sqlx::Error> {
        let policy = campaign.policy();

        if campaign.status_enum().is_some_and(|s| s.is_startable()) {
            let coerced = self.campaigns.mark_processing(campaign.id, Utc::now()).await?;
            if !coerced {
                // An operator command landed between the scan and here.
                debug!("Campaign {} changed state before coercion", campaign.id);
                return Ok(DispatchOutcome {
                    id: campaign.id,
                    messages_sent: 0,
                    status: RunStatus::Continued,
                });
            }
        }
        let started_at = campaign.started_at.unwrap_or_else(Utc::now);

        // Pause gates, one-shot first. Neither persists a status change;
        // the gate is re-evaluated on the next invocation.
        let now = Utc::now();
        if let Some(pause) = &policy.automatic_pause {
            if pacing::one_shot_pause_applies(pause, now, started_at, self.timezone) {
                debug!(
                    "Campaign {} inside one-shot pause until {}",
                    campaign.id, pause.resume_at
                );
                return Ok(DispatchOutcome {
                    id: campaign.id,
                    messages_sent: 0,
                    status: RunStatus::PausedTemporarily,
                });
            }
        }
        if pacing::outside_business_hours(&policy, now, self.timezone) {
            debug!("Campaign {} outside business hours", campaign.id);
            return Ok(DispatchOutcome {
                id: campaign.id,
                messages_sent: 0,
                status: RunStatus::PausedTemporarily,
            });
        }

        let counts = self.messages.status_counts(campaign.id).await?;
        if counts.remaining() == 0 {
            self.finalize(campaign.id, started_at, counts).await?;
            return Ok(DispatchOutcome {
                id: campaign.id,
                messages_sent: 0,
                status: RunStatus::Finished,
            });
        }

        let (messages_sent, finished) = self
            .send_loop(campaign.id, &policy, started_at, invocation_start)
            .await?;

        if !finished {
            let execution = (Utc::now() - started_at).num_seconds().max(0);
            self.campaigns
                .update_execution_time(campaign.id, execution)
                .await?;
        }

        Ok(DispatchOutcome {
            id: campaign.id,
            messages_sent,
            status: if finished {
                RunStatus::Finished
            } else {
                RunStatus::Continued
            },
        })
    }

    /// Serial claim-send-commit loop for one campaign. Returns the number
    /// of confirmed sends and whether the campaign finalized.
    async fn send_loop(
        &self,
        campaign_id: Uuid,
        policy: &PolicyConfig,
        started_at: DateTime<Utc>,
        invocation_start: Instant,
    ) -> Result<(u32, bool), sqlx::Error> {
        let mut messages_sent = 0u32;

        loop {
            if invocation_start.elapsed() > self.budget {
                return Ok((messages_sent, false));
            }

            // Operator commands land in the status field; re-reading here
            // bounds their latency to one message.
            let current = match self.campaigns.get(campaign_id).await? {
                Some(c) => c,
                None => return Ok((messages_sent, false)),
            };
            match current.status_enum() {
                Some(CampaignStatus::Paused) | Some(CampaignStatus::Canceled) => {
                    debug!(
                        "Campaign {} is {}, leaving send loop",
                        campaign_id, current.status
                    );
                    return Ok((messages_sent, false));
                }
                _ => {}
            }

            let last_sent_at = self.messages.last_sent_at(campaign_id).await?;
            if let Some(last_sent) = last_sent_at {
                // The very first message goes out immediately; afterwards
                // the sampled delay is measured from the last send.
                let required = pacing::sample_send_delay(policy, current.sent_messages);
                let since_last = (Utc::now() - last_sent)
                    .to_std()
                    .unwrap_or(StdDuration::ZERO);
                if required > since_last {
                    let wait = required - since_last;
                    if invocation_start.elapsed() + wait > self.budget {
                        debug!(
                            "Campaign {} next send in {}s does not fit the budget",
                            campaign_id,
                            wait.as_secs()
                        );
                        return Ok((messages_sent, false));
                    }
                    sleep(wait).await;
                }
            }

            let claimed = match self.messages.claim_next(campaign_id, Utc::now()).await? {
                Some(message) => message,
                None => {
                    // Nothing claimable. Either the campaign is done or
                    // another worker holds the remaining rows.
                    let counts = self.messages.status_counts(campaign_id).await?;
                    if counts.remaining() == 0 {
                        self.finalize(campaign_id, started_at, counts).await?;
                        return Ok((messages_sent, true));
                    }
                    return Ok((messages_sent, false));
                }
            };

            match self
                .gateway
                .send(&claimed.name, &claimed.phone, &claimed.message_body)
                .await
            {
                Ok(()) => {
                    // A lost commit leaves the row in `sending` for the
                    // stale-claim sweep; the counter is reconciled at
                    // finalization. The campaign is abandoned for this
                    // invocation rather than sending against a failing
                    // store.
                    if let Err(e) = self.messages.mark_sent(claimed.id, Utc::now()).await {
                        error!("Failed to commit sent message {}: {}", claimed.id, e);
                        return Ok((messages_sent, false));
                    }
                    if let Err(e) = self.campaigns.increment_sent(campaign_id).await {
                        error!(
                            "Failed to increment sent counter for campaign {}: {}",
                            campaign_id, e
                        );
                    }
                    messages_sent += 1;
                }
                Err(send_error) => {
                    warn!(
                        "Send failed for message {} (campaign {}): {}",
                        claimed.id, campaign_id, send_error
                    );
                    if let Err(e) = self
                        .messages
                        .mark_failed(claimed.id, &send_error.to_string())
                        .await
                    {
                        error!("Failed to commit failed message {}: {}", claimed.id, e);
                        return Ok((messages_sent, false));
                    }
                }
            }
        }
    }

    /// Reconcile the sent counter against the actual rows and stamp the
    /// terminal fields.
    async fn finalize(
        &self,
        campaign_id: Uuid,
        started_at: DateTime<Utc>,
        counts: MessageStatusCounts,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        let execution = (now - started_at).num_seconds().max(0);
        let finalized = self
            .campaigns
            .finalize(campaign_id, counts.sent, now, execution)
            .await?;
        if finalized {
            info!(
                "Campaign {} finished: {} sent, {} failed, ran {}s",
                campaign_id, counts.sent, counts.failed, execution
            );
        }
        Ok(())
    }
}
