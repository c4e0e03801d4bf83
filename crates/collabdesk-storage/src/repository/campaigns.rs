//! Campaign repository

use chrono::{DateTime, Utc};
use collabdesk_common::types::{CampaignId, CampaignStats, CampaignStatus, UserId};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{
    Campaign, CampaignActivity, CampaignRecipient, CreateCampaign, NewRecipient, UpdateCampaign,
};
use crate::repository::recipients::insert_recipient;

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

    /// Create a draft campaign together with its initial recipients
    pub async fn create(
        &self,
        input: CreateCampaign,
        recipients: Vec<NewRecipient>,
    ) -> Result<(Campaign, Vec<CampaignRecipient>), sqlx::Error> {
        let id = Uuid::now_v7();
        let stats = CampaignStats::initial(recipients.len() as i32);
        let template_variables =
            serde_json::to_value(&input.template_variables).unwrap_or_else(|_| serde_json::json!({}));

        let mut tx = self.pool.begin().await?;

        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (
                id, user_id, name, subject, content, status,
                stats_total, stats_sent, stats_failed, stats_pending,
                template_id, template_variables
            )
            VALUES ($1, $2, $3, $4, $5, 'draft', $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.user_id)
        .bind(&input.name)
        .bind(&input.subject)
        .bind(&input.content)
        .bind(stats.total)
        .bind(stats.sent)
        .bind(stats.failed)
        .bind(stats.pending)
        .bind(&input.template_id)
        .bind(&template_variables)
        .fetch_one(&mut *tx)
        .await?;

        let mut created = Vec::with_capacity(recipients.len());
        for recipient in &recipients {
            created.push(insert_recipient(&mut *tx, id, recipient).await?);
        }

        tx.commit().await?;
        Ok((campaign, created))
    }

    /// Get a campaign owned by a user
    pub async fn get(&self, user_id: UserId, id: CampaignId) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List campaigns of a user, newest first
    pub async fn list(
        &self,
        user_id: UserId,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        if let Some(status) = status {
            sqlx::query_as::<_, Campaign>(
                r#"
                SELECT * FROM campaigns
                WHERE user_id = $1 AND status = $2
                ORDER BY created_at DESC
                LIMIT $3 OFFSET $4
                "#,
            )
            .bind(user_id)
            .bind(status.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Campaign>(
                r#"
                SELECT * FROM campaigns
                WHERE user_id = $1
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
    }

    /// Count campaigns of a user
    pub async fn count(
        &self,
        user_id: UserId,
        status: Option<CampaignStatus>,
    ) -> Result<i64, sqlx::Error> {
        let count: (i64,) = if let Some(status) = status {
            sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE user_id = $1 AND status = $2")
                .bind(user_id)
                .bind(status.to_string())
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(count.0)
    }

    /// Update a draft campaign. Returns `None` when the campaign is missing
    /// or has already left draft.
    pub async fn update(
        &self,
        user_id: UserId,
        id: CampaignId,
        input: UpdateCampaign,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let template_variables = input
            .template_variables
            .map(|vars| serde_json::to_value(vars).unwrap_or_else(|_| serde_json::json!({})));

        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                name = COALESCE($3, name),
                subject = COALESCE($4, subject),
                content = COALESCE($5, content),
                template_id = COALESCE($6, template_id),
                template_variables = COALESCE($7, template_variables),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND status = 'draft'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&input.name)
        .bind(&input.subject)
        .bind(&input.content)
        .bind(&input.template_id)
        .bind(&template_variables)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete a campaign and, through the foreign key, its recipients.
    /// A campaign in the middle of a dispatch run is never deleted.
    pub async fn delete(&self, user_id: UserId, id: CampaignId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM campaigns WHERE id = $1 AND user_id = $2 AND status <> 'sending'",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Atomically move a campaign from draft to sending.
    ///
    /// Returns `false` when the campaign was no longer in draft, which is how
    /// a second concurrent dispatch of the same campaign loses the race.
    pub async fn begin_sending(&self, id: CampaignId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = 'sending',
                updated_at = NOW()
            WHERE id = $1 AND status = 'draft'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record the outcome of a dispatch run. Only a campaign still in
    /// `sending` is closed; returns `false` when it was already closed.
    pub async fn finish(
        &self,
        id: CampaignId,
        status: CampaignStatus,
        stats: CampaignStats,
        sent_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = $2,
                stats_total = $3,
                stats_sent = $4,
                stats_failed = $5,
                stats_pending = $6,
                sent_at = $7,
                updated_at = NOW()
            WHERE id = $1 AND status = 'sending'
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(stats.total)
        .bind(stats.sent)
        .bind(stats.failed)
        .bind(stats.pending)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Force a sending campaign into failed, leaving its stats untouched.
    /// Returns `false` when it was no longer sending.
    pub async fn mark_failed(&self, id: CampaignId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = 'failed',
                updated_at = NOW()
            WHERE id = $1 AND status = 'sending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Every campaign in `sending` with the time of its latest write, counting
    /// writes to its recipient rows
    pub async fn list_sending_activity(&self) -> Result<Vec<CampaignActivity>, sqlx::Error> {
        sqlx::query_as::<_, CampaignActivity>(
            r#"
            SELECT
                c.id,
                GREATEST(c.updated_at, COALESCE(MAX(r.updated_at), c.updated_at)) AS last_activity
            FROM campaigns c
            LEFT JOIN campaign_recipients r ON r.campaign_id = c.id
            WHERE c.status = 'sending'
            GROUP BY c.id, c.updated_at
            ORDER BY last_activity ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Shift the total/pending counters of a draft campaign by `delta`.
    /// Returns `false` when the campaign is not in draft.
    pub(crate) async fn adjust_pending(
        conn: &mut PgConnection,
        id: CampaignId,
        delta: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                stats_total = stats_total + $2,
                stats_pending = stats_pending + $2,
                updated_at = NOW()
            WHERE id = $1 AND status = 'draft'
            "#,
        )
        .bind(id)
        .bind(delta)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
