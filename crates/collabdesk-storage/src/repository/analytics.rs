//! Dashboard aggregates

use collabdesk_common::types::{Platform, UserId};
use sqlx::PgPool;

use crate::models::AnalyticsSummary;

/// Read-only aggregate queries over a user's data
#[derive(Clone)]
pub struct AnalyticsRepository {
    pool: PgPool,
}

impl AnalyticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build the dashboard summary for one user
    pub async fn summary(&self, user_id: UserId) -> Result<AnalyticsSummary, sqlx::Error> {
        let mut summary = AnalyticsSummary::default();

        let by_status: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM campaigns WHERE user_id = $1 GROUP BY status",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        summary.total_campaigns = by_status.iter().map(|(_, n)| n).sum();
        summary.campaigns_by_status = by_status.into_iter().collect();

        let (total, sent, failed, pending): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE r.status = 'sent'),
                COUNT(*) FILTER (WHERE r.status = 'failed'),
                COUNT(*) FILTER (WHERE r.status = 'pending')
            FROM campaign_recipients r
            JOIN campaigns c ON c.id = r.campaign_id
            WHERE c.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        summary.emails_total = total;
        summary.emails_sent = sent;
        summary.emails_failed = failed;
        summary.emails_pending = pending;

        let by_type: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT r.recipient_type, COUNT(*)
            FROM campaign_recipients r
            JOIN campaigns c ON c.id = r.campaign_id
            WHERE c.user_id = $1
            GROUP BY r.recipient_type
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        summary.recipients_by_type = by_type.into_iter().collect();

        let (tiktok, instagram, youtube, ugc): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE r.tiktok),
                COUNT(*) FILTER (WHERE r.instagram),
                COUNT(*) FILTER (WHERE r.youtube),
                COUNT(*) FILTER (WHERE r.ugc)
            FROM campaign_recipients r
            JOIN campaigns c ON c.id = r.campaign_id
            WHERE c.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        for (platform, count) in Platform::ALL.iter().zip([tiktok, instagram, youtube, ugc]) {
            summary
                .recipients_by_platform
                .insert(platform.column().to_string(), count);
        }

        let (open, overdue): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE NOT completed),
                COUNT(*) FILTER (WHERE NOT completed AND due_at < NOW())
            FROM reminders
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        summary.open_reminders = open;
        summary.overdue_reminders = overdue;

        Ok(summary)
    }
}
