//! Campaign repository

use chrono::{DateTime, Utc};
use cadence_common::types::OwnerId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Campaign, CampaignStatus, CreateCampaign};

/// Campaign repository
#[derive(Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    /// Create a new campaign repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a campaign together with its recipient and message rows.
    ///
    /// One transaction: `total_messages` equals the number of rows written
    /// and every message starts in `waiting`.
    pub async fn create(&self, input: CreateCampaign) -> Result<Campaign, sqlx::Error> {
        let id = Uuid::new_v4();
        let config = serde_json::to_value(&input.config).unwrap_or_default();
        let total = input.recipients.len() as i32;

        let mut tx = self.pool.begin().await?;

        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (
                id, owner_id, name, status, total_messages, scheduled_at, config
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.owner_id)
        .bind(&input.name)
        .bind(input.status.to_string())
        .bind(total)
        .bind(input.scheduled_at)
        .bind(&config)
        .fetch_one(&mut *tx)
        .await?;

        for recipient in input.recipients {
            let recipient_id = Uuid::new_v4();
            sqlx::query(
                r#"
                INSERT INTO recipients (id, campaign_id, name, phone, message_body)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(recipient_id)
            .bind(id)
            .bind(&recipient.name)
            .bind(&recipient.phone)
            .bind(&recipient.message_body)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO campaign_messages (id, campaign_id, recipient_id, status)
                VALUES ($1, $2, $3, 'waiting')
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(recipient_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(campaign)
    }

    /// Get a campaign by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List campaigns for an owner
    pub async fn list_by_owner(
        &self,
        owner_id: OwnerId,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        if let Some(status) = status {
            sqlx::query_as::<_, Campaign>(
                r#"
                SELECT * FROM campaigns
                WHERE owner_id = $1 AND status = $2
                ORDER BY created_at DESC
                LIMIT $3 OFFSET $4
                "#,
            )
            .bind(owner_id)
            .bind(status.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Campaign>(
                r#"
                SELECT * FROM campaigns
                WHERE owner_id = $1
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
    }

    /// Count campaigns for an owner
    pub async fn count_by_owner(
        &self,
        owner_id: OwnerId,
        status: Option<CampaignStatus>,
    ) -> Result<i64, sqlx::Error> {
        let count: (i64,) = if let Some(status) = status {
            sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE owner_id = $1 AND status = $2")
                .bind(owner_id)
                .bind(status.to_string())
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(count.0)
    }

    /// Campaigns of an owner whose planned windows matter for admission
    /// (anything not yet terminal).
    pub async fn list_overlappable_by_owner(
        &self,
        owner_id: OwnerId,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT * FROM campaigns
            WHERE owner_id = $1
              AND status IN ('scheduled', 'pending', 'processing', 'active', 'paused')
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Campaigns eligible for a dispatcher invocation.
    ///
    /// A targeted run (`only` set) skips the `scheduled_at` filter so an
    /// operator can force a future-scheduled campaign through.
    pub async fn list_eligible(
        &self,
        now: DateTime<Utc>,
        only: Option<Uuid>,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        if let Some(id) = only {
            sqlx::query_as::<_, Campaign>(
                r#"
                SELECT * FROM campaigns
                WHERE id = $1
                  AND status IN ('scheduled', 'pending', 'processing', 'active')
                "#,
            )
            .bind(id)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Campaign>(
                r#"
                SELECT * FROM campaigns
                WHERE status IN ('scheduled', 'pending', 'processing', 'active')
                  AND scheduled_at <= $1
                "#,
            )
            .bind(now)
            .fetch_all(&self.pool)
            .await
        }
    }

    /// Coerce a campaign to `processing` on dispatcher entry; `started_at`
    /// is written once and kept thereafter. Conditional so a cancel that
    /// raced the scan is not overwritten.
    pub async fn mark_processing(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = 'processing',
                started_at = COALESCE(started_at, $2)
            WHERE id = $1
              AND status IN ('scheduled', 'pending', 'processing', 'active')
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update campaign status; terminal statuses also stamp `finished_at`
    pub async fn set_status(
        &self,
        id: Uuid,
        status: CampaignStatus,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let finished_at = if status.is_terminal() {
            Some(Utc::now())
        } else {
            None
        };

        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                status = $2,
                finished_at = COALESCE($3, finished_at)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(finished_at)
        .fetch_optional(&self.pool)
        .await
    }

    /// Finalize a finished campaign: reconcile the sent counter against the
    /// actual row count and stamp the terminal fields. A campaign that went
    /// terminal in the meantime stays terminal.
    pub async fn finalize(
        &self,
        id: Uuid,
        sent_count: i64,
        finished_at: DateTime<Utc>,
        execution_time: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = 'finished',
                sent_messages = $2,
                finished_at = $3,
                execution_time = $4
            WHERE id = $1
              AND status NOT IN ('finished', 'canceled', 'failed')
            "#,
        )
        .bind(id)
        .bind(sent_count as i32)
        .bind(finished_at)
        .bind(execution_time)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update accumulated execution time
    pub async fn update_execution_time(
        &self,
        id: Uuid,
        execution_time: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE campaigns SET execution_time = $2 WHERE id = $1")
            .bind(id)
            .bind(execution_time)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Monotone counter increment, atomic under concurrent workers
    pub async fn increment_sent(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE campaigns SET sent_messages = sent_messages + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
