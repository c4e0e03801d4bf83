//! Campaign recipient repository

use chrono::{DateTime, Utc};
use collabdesk_common::types::{
    CampaignId, CampaignStatus, Platform, RecipientId, RecipientType, UserId,
};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{CampaignRecipient, NewRecipient, RecipientCounts, UpdateRecipient};
use crate::repository::campaigns::CampaignRepository;

/// Filters for the flat recipient listing
#[derive(Debug, Clone, Default)]
pub struct RecipientFilter {
    pub platform: Option<Platform>,
    pub recipient_type: Option<RecipientType>,
    pub category: Option<String>,
    pub campaign_id: Option<CampaignId>,
}

/// Outcome of a recipient delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientRemoval {
    Removed,
    NotFound,
    /// The owning campaign is being dispatched
    CampaignSending,
}

impl RecipientRemoval {
    fn for_campaign_status(status: &str) -> Self {
        match status.parse::<CampaignStatus>() {
            Ok(CampaignStatus::Sending) => RecipientRemoval::CampaignSending,
            _ => RecipientRemoval::Removed,
        }
    }
}

/// Insert one recipient row for a campaign
pub(crate) async fn insert_recipient(
    conn: &mut PgConnection,
    campaign_id: CampaignId,
    input: &NewRecipient,
) -> Result<CampaignRecipient, sqlx::Error> {
    let id = Uuid::now_v7();
    let tags = serde_json::to_value(&input.tags).unwrap_or_else(|_| serde_json::json!([]));
    let custom_fields = serde_json::Value::Object(input.custom_fields.clone());

    sqlx::query_as::<_, CampaignRecipient>(
        r#"
        INSERT INTO campaign_recipients (
            id, campaign_id, name, email, platform, followers, category,
            tags, custom_fields, recipient_type, tiktok, instagram, youtube, ugc,
            status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 'pending')
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(campaign_id)
    .bind(&input.name)
    .bind(input.email.trim())
    .bind(&input.platform)
    .bind(input.followers)
    .bind(&input.category)
    .bind(&tags)
    .bind(&custom_fields)
    .bind(input.recipient_type.to_string())
    .bind(input.tiktok)
    .bind(input.instagram)
    .bind(input.youtube)
    .bind(input.ugc)
    .fetch_one(conn)
    .await
}

/// Campaign recipient repository
#[derive(Clone)]
pub struct RecipientRepository {
    pool: PgPool,
}

impl RecipientRepository {
    /// Create a new recipient repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add a recipient to a draft campaign, bumping its total and pending
    /// counters in the same transaction. Returns `None` when the campaign
    /// is no longer in draft.
    pub async fn add_to_campaign(
        &self,
        campaign_id: CampaignId,
        input: &NewRecipient,
    ) -> Result<Option<CampaignRecipient>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        if !CampaignRepository::adjust_pending(&mut *tx, campaign_id, 1).await? {
            tx.rollback().await?;
            return Ok(None);
        }

        let recipient = insert_recipient(&mut *tx, campaign_id, input).await?;
        tx.commit().await?;

        Ok(Some(recipient))
    }

    /// Get a recipient whose campaign belongs to the user
    pub async fn get(
        &self,
        user_id: UserId,
        id: RecipientId,
    ) -> Result<Option<CampaignRecipient>, sqlx::Error> {
        sqlx::query_as::<_, CampaignRecipient>(
            r#"
            SELECT r.* FROM campaign_recipients r
            JOIN campaigns c ON c.id = r.campaign_id
            WHERE r.id = $1 AND c.user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List the recipients of a campaign in dispatch order (creation order)
    pub async fn list_by_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<CampaignRecipient>, sqlx::Error> {
        sqlx::query_as::<_, CampaignRecipient>(
            r#"
            SELECT * FROM campaign_recipients
            WHERE campaign_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Flat scan of every recipient row across a user's campaigns
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        filter: &RecipientFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CampaignRecipient>, sqlx::Error> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT r.* FROM campaign_recipients r \
             JOIN campaigns c ON c.id = r.campaign_id \
             WHERE c.user_id = ",
        );
        query.push_bind(user_id);

        if let Some(platform) = filter.platform {
            // Column names come from a closed enum, never from input
            query.push(" AND r.").push(platform.column()).push(" = TRUE");
        }
        if let Some(recipient_type) = filter.recipient_type {
            query
                .push(" AND r.recipient_type = ")
                .push_bind(recipient_type.to_string());
        }
        if let Some(category) = &filter.category {
            query
                .push(" AND LOWER(r.category) = LOWER(")
                .push_bind(category.clone())
                .push(")");
        }
        if let Some(campaign_id) = filter.campaign_id {
            query.push(" AND r.campaign_id = ").push_bind(campaign_id);
        }

        query
            .push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        query
            .build_query_as::<CampaignRecipient>()
            .fetch_all(&self.pool)
            .await
    }

    /// Update contact metadata of a recipient
    pub async fn update(
        &self,
        id: RecipientId,
        input: UpdateRecipient,
    ) -> Result<Option<CampaignRecipient>, sqlx::Error> {
        let tags = input
            .tags
            .map(|tags| serde_json::to_value(tags).unwrap_or_else(|_| serde_json::json!([])));
        let custom_fields = input.custom_fields.map(serde_json::Value::Object);

        sqlx::query_as::<_, CampaignRecipient>(
            r#"
            UPDATE campaign_recipients SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                platform = COALESCE($4, platform),
                followers = COALESCE($5, followers),
                category = COALESCE($6, category),
                tags = COALESCE($7, tags),
                custom_fields = COALESCE($8, custom_fields),
                recipient_type = COALESCE($9, recipient_type),
                tiktok = COALESCE($10, tiktok),
                instagram = COALESCE($11, instagram),
                youtube = COALESCE($12, youtube),
                ugc = COALESCE($13, ugc),
                updated_at = clock_timestamp()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.email.as_deref().map(str::trim))
        .bind(&input.platform)
        .bind(input.followers)
        .bind(&input.category)
        .bind(&tags)
        .bind(&custom_fields)
        .bind(input.recipient_type.map(|t| t.to_string()))
        .bind(input.tiktok)
        .bind(input.instagram)
        .bind(input.youtube)
        .bind(input.ugc)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete a recipient. When its campaign is still a draft the campaign's
    /// total and pending counters shrink accordingly. Recipients of a campaign
    /// in the middle of a dispatch run are never removed.
    pub async fn delete(&self, id: RecipientId) -> Result<RecipientRemoval, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Lock the campaign row so a concurrent begin_sending waits for us
        let owner: Option<(CampaignId, String)> = sqlx::query_as(
            r#"
            SELECT r.campaign_id, c.status
            FROM campaign_recipients r
            JOIN campaigns c ON c.id = r.campaign_id
            WHERE r.id = $1
            FOR UPDATE OF c, r
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((campaign_id, status)) = owner else {
            tx.rollback().await?;
            return Ok(RecipientRemoval::NotFound);
        };

        let removal = RecipientRemoval::for_campaign_status(&status);
        if removal != RecipientRemoval::Removed {
            tx.rollback().await?;
            return Ok(removal);
        }

        sqlx::query("DELETE FROM campaign_recipients WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        CampaignRepository::adjust_pending(&mut *tx, campaign_id, -1).await?;
        tx.commit().await?;

        Ok(RecipientRemoval::Removed)
    }

    /// Mark a pending recipient as sent. Returns `false` if it was not pending.
    pub async fn mark_sent(
        &self,
        id: RecipientId,
        sent_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_recipients SET
                status = 'sent',
                sent_at = $2,
                error_message = NULL,
                updated_at = clock_timestamp()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a pending recipient as failed. Returns `false` if it was not pending.
    pub async fn mark_failed(&self, id: RecipientId, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_recipients SET
                status = 'failed',
                error_message = $2,
                updated_at = clock_timestamp()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count the recipients of a campaign per delivery status
    pub async fn count_by_status(
        &self,
        campaign_id: CampaignId,
    ) -> Result<RecipientCounts, sqlx::Error> {
        let (pending, sent, failed): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending'),
                COUNT(*) FILTER (WHERE status = 'sent'),
                COUNT(*) FILTER (WHERE status = 'failed')
            FROM campaign_recipients
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(RecipientCounts {
            pending,
            sent,
            failed,
        })
    }
}
