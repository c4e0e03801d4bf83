//! Reminder repository

use chrono::{DateTime, Utc};
use collabdesk_common::types::{ReminderId, UserId};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{CreateReminder, Reminder, UpdateReminder};

/// Filters for listing reminders
#[derive(Debug, Clone, Default)]
pub struct ReminderFilter {
    pub completed: Option<bool>,
    pub due_before: Option<DateTime<Utc>>,
}

/// Reminder repository
#[derive(Clone)]
pub struct ReminderRepository {
    pool: PgPool,
}

impl ReminderRepository {
    /// Create a new reminder repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a reminder
    pub async fn create(&self, input: CreateReminder) -> Result<Reminder, sqlx::Error> {
        sqlx::query_as::<_, Reminder>(
            r#"
            INSERT INTO reminders (id, user_id, title, notes, due_at, campaign_id, recipient_email)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.user_id)
        .bind(&input.title)
        .bind(&input.notes)
        .bind(input.due_at)
        .bind(input.campaign_id)
        .bind(&input.recipient_email)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a reminder of a user
    pub async fn get(&self, user_id: UserId, id: ReminderId) -> Result<Option<Reminder>, sqlx::Error> {
        sqlx::query_as::<_, Reminder>("SELECT * FROM reminders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List reminders of a user, soonest due first
    pub async fn list(
        &self,
        user_id: UserId,
        filter: &ReminderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Reminder>, sqlx::Error> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM reminders WHERE user_id = ");
        query.push_bind(user_id);

        if let Some(completed) = filter.completed {
            query.push(" AND completed = ").push_bind(completed);
        }
        if let Some(due_before) = filter.due_before {
            query.push(" AND due_at < ").push_bind(due_before);
        }

        query
            .push(" ORDER BY due_at ASC, id ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        query.build_query_as::<Reminder>().fetch_all(&self.pool).await
    }

    /// Update a reminder
    pub async fn update(
        &self,
        user_id: UserId,
        id: ReminderId,
        input: UpdateReminder,
    ) -> Result<Option<Reminder>, sqlx::Error> {
        sqlx::query_as::<_, Reminder>(
            r#"
            UPDATE reminders SET
                title = COALESCE($3, title),
                notes = COALESCE($4, notes),
                due_at = COALESCE($5, due_at),
                completed = COALESCE($6, completed),
                campaign_id = COALESCE($7, campaign_id),
                recipient_email = COALESCE($8, recipient_email),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&input.title)
        .bind(&input.notes)
        .bind(input.due_at)
        .bind(input.completed)
        .bind(input.campaign_id)
        .bind(&input.recipient_email)
        .fetch_optional(&self.pool)
        .await
    }

    /// Mark a reminder done
    pub async fn complete(&self, user_id: UserId, id: ReminderId) -> Result<Option<Reminder>, sqlx::Error> {
        self.update(
            user_id,
            id,
            UpdateReminder {
                completed: Some(true),
                ..UpdateReminder::default()
            },
        )
        .await
    }

    /// Delete a reminder
    pub async fn delete(&self, user_id: UserId, id: ReminderId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
