//! Campaign message repository

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{CampaignMessage, ClaimedMessage, MessageStatus, MessageStatusCounts};

/// Longest error string persisted on a failed message
const MAX_ERROR_LEN: usize = 500;

/// Campaign message repository
#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    /// Create a new message repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a message by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<CampaignMessage>, sqlx::Error> {
        sqlx::query_as::<_, CampaignMessage>("SELECT * FROM campaign_messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List messages for a campaign
    pub async fn list_by_campaign(
        &self,
        campaign_id: Uuid,
        status: Option<MessageStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CampaignMessage>, sqlx::Error> {
        if let Some(status) = status {
            sqlx::query_as::<_, CampaignMessage>(
                r#"
                SELECT * FROM campaign_messages
                WHERE campaign_id = $1 AND status = $2
                ORDER BY created_at ASC
                LIMIT $3 OFFSET $4
                "#,
            )
            .bind(campaign_id)
            .bind(status.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, CampaignMessage>(
                r#"
                SELECT * FROM campaign_messages
                WHERE campaign_id = $1
                ORDER BY created_at ASC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(campaign_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
    }

    /// Claim the next waiting message of a campaign.
    ///
    /// Single-statement conditional update `waiting -> sending` with a
    /// provisional `sent_at`; `FOR UPDATE SKIP LOCKED` keeps concurrent
    /// workers from blocking on each other and the status predicate makes
    /// the claim a compare-and-swap: exactly one claimer gets the row.
    pub async fn claim_next(
        &self,
        campaign_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimedMessage>, sqlx::Error> {
        sqlx::query_as::<_, ClaimedMessage>(
            r#"
            UPDATE campaign_messages AS m
            SET status = 'sending', sent_at = $2
            FROM recipients AS r
            WHERE m.id = (
                SELECT id FROM campaign_messages
                WHERE campaign_id = $1 AND status = 'waiting'
                ORDER BY created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
              AND m.status = 'waiting'
              AND r.id = m.recipient_id
            RETURNING m.id, m.campaign_id, m.recipient_id,
                      r.name, r.phone, r.message_body, m.sent_at
            "#,
        )
        .bind(campaign_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
    }

    /// Commit a confirmed send: the claim-time `sent_at` is overwritten
    /// with the commit instant.
    pub async fn mark_sent(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE campaign_messages SET
                status = 'sent',
                sent_at = $2,
                error_message = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Commit a failed send. The claim-time `sent_at` is kept; the error is
    /// truncated to a storable length.
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE campaign_messages SET
                status = 'failed',
                error_message = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(truncate_error(error))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Reset a failed message back to waiting. Any other source state is a
    /// no-op; returns whether the reset took effect.
    pub async fn retry(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_messages SET
                status = 'waiting',
                error_message = NULL,
                sent_at = NULL
            WHERE id = $1 AND status = 'failed'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fail all waiting messages of a campaign (used by cancel so a
    /// terminal campaign keeps no claimable rows behind).
    pub async fn fail_waiting(&self, campaign_id: Uuid, reason: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_messages SET
                status = 'failed',
                error_message = $2
            WHERE campaign_id = $1 AND status = 'waiting'
            "#,
        )
        .bind(campaign_id)
        .bind(truncate_error(reason))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Sweep claims whose terminal commit was lost (worker crash, failed
    /// write) back to waiting so a later invocation can reclaim them.
    /// Terminal campaigns are left alone; nothing may become claimable
    /// there again.
    pub async fn release_stale_sending(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_messages AS m SET
                status = 'waiting',
                sent_at = NULL,
                error_message = NULL
            WHERE m.status = 'sending'
              AND m.sent_at < $1
              AND EXISTS (
                  SELECT 1 FROM campaigns c
                  WHERE c.id = m.campaign_id
                    AND c.status NOT IN ('finished', 'canceled', 'failed')
              )
            "#,
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Per-status counts for a campaign in one query
    pub async fn status_counts(
        &self,
        campaign_id: Uuid,
    ) -> Result<MessageStatusCounts, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'waiting') as waiting,
                COUNT(*) FILTER (WHERE status = 'sending') as sending,
                COUNT(*) FILTER (WHERE status = 'sent') as sent,
                COUNT(*) FILTER (WHERE status = 'failed') as failed
            FROM campaign_messages
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(MessageStatusCounts {
            waiting: row.get::<Option<i64>, _>("waiting").unwrap_or(0),
            sending: row.get::<Option<i64>, _>("sending").unwrap_or(0),
            sent: row.get::<Option<i64>, _>("sent").unwrap_or(0),
            failed: row.get::<Option<i64>, _>("failed").unwrap_or(0),
        })
    }

    /// Most recent confirmed or provisional send instant for a campaign
    pub async fn last_sent_at(
        &self,
        campaign_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        let row: (Option<DateTime<Utc>>,) = sqlx::query_as(
            "SELECT MAX(sent_at) FROM campaign_messages WHERE campaign_id = $1",
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }
}

fn truncate_error(error: &str) -> String {
    if error.len() <= MAX_ERROR_LEN {
        return error.to_string();
    }
    let mut end = MAX_ERROR_LEN;
    while !error.is_char_boundary(end) {
        end -= 1;
    }
    error[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_error_short() {
        assert_eq!(truncate_error("timeout"), "timeout");
    }

    #[test]
    fn test_truncate_error_long() {
        let long = "x".repeat(2000);
        assert_eq!(truncate_error(&long).len(), MAX_ERROR_LEN);
    }

    #[test]
    fn test_truncate_error_respects_char_boundary() {
        let long = "é".repeat(400);
        let truncated = truncate_error(&long);
        assert!(truncated.len() <= MAX_ERROR_LEN);
        assert!(truncated.chars().all(|c| c == 'é'));
    }
}
