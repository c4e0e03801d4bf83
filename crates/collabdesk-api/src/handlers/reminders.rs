//! Reminder handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use collabdesk_storage::models::{CreateReminder, Reminder, UpdateReminder};
use collabdesk_storage::repository::{CampaignRepository, ReminderFilter, ReminderRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{AppState, AuthContext};
use crate::error::{db_error, not_found, validation, ApiError, ErrorResponse};

/// Reminder response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReminderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub notes: Option<String>,
    pub due_at: DateTime<Utc>,
    pub completed: bool,
    pub overdue: bool,
    pub campaign_id: Option<Uuid>,
    pub recipient_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Reminder> for ReminderResponse {
    fn from(r: Reminder) -> Self {
        let overdue = r.is_overdue(Utc::now());
        Self {
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            notes: r.notes,
            due_at: r.due_at,
            completed: r.completed,
            overdue,
            campaign_id: r.campaign_id,
            recipient_email: r.recipient_email,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Query parameters for listing reminders
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ListRemindersQuery {
    pub completed: Option<bool>,
    pub due_before: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

/// Request body for creating a reminder
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReminderRequest {
    pub title: String,
    pub notes: Option<String>,
    pub due_at: DateTime<Utc>,
    pub campaign_id: Option<Uuid>,
    pub recipient_email: Option<String>,
}

/// Request body for updating a reminder
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReminderRequest {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub completed: Option<bool>,
    pub campaign_id: Option<Uuid>,
    pub recipient_email: Option<String>,
}

fn require_title(title: &str) -> Result<String, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(validation("Reminder title is required"));
    }
    Ok(title.to_string())
}

fn require_known_campaign(found: bool) -> Result<(), ApiError> {
    if !found {
        return Err(validation("Unknown campaign"));
    }
    Ok(())
}

/// A linked campaign must exist and belong to the caller
async fn check_linked_campaign(
    state: &AppState,
    user_id: Uuid,
    campaign_id: Option<Uuid>,
) -> Result<(), ApiError> {
    let Some(campaign_id) = campaign_id else {
        return Ok(());
    };

    let found = CampaignRepository::new(state.db_pool.pool().clone())
        .get(user_id, campaign_id)
        .await
        .map_err(db_error("Failed to get campaign"))?
        .is_some();
    require_known_campaign(found)
}

/// List reminders, soonest due first
#[utoipa::path(
    get,
    path = "/api/v1/reminders",
    tag = "reminders",
    params(ListRemindersQuery),
    responses(
        (status = 200, description = "Reminders", body = Vec<ReminderResponse>)
    ),
    security(("api_key" = []))
)]
pub async fn list_reminders(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListRemindersQuery>,
) -> Result<Json<Vec<ReminderResponse>>, ApiError> {
    let repo = ReminderRepository::new(state.db_pool.pool().clone());
    let filter = ReminderFilter {
        completed: query.completed,
        due_before: query.due_before,
    };

    let reminders = repo
        .list(auth.user_id, &filter, query.limit.clamp(1, 500), query.offset.max(0))
        .await
        .map_err(db_error("Failed to list reminders"))?;

    Ok(Json(reminders.into_iter().map(ReminderResponse::from).collect()))
}

/// Create a reminder
#[utoipa::path(
    post,
    path = "/api/v1/reminders",
    tag = "reminders",
    request_body = CreateReminderRequest,
    responses(
        (status = 201, description = "Reminder created", body = ReminderResponse),
        (status = 422, description = "Invalid reminder", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn create_reminder(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CreateReminderRequest>,
) -> Result<(StatusCode, Json<ReminderResponse>), ApiError> {
    let title = require_title(&input.title)?;
    check_linked_campaign(&state, auth.user_id, input.campaign_id).await?;
    let repo = ReminderRepository::new(state.db_pool.pool().clone());

    let reminder = repo
        .create(CreateReminder {
            user_id: auth.user_id,
            title,
            notes: input.notes,
            due_at: input.due_at,
            campaign_id: input.campaign_id,
            recipient_email: input.recipient_email,
        })
        .await
        .map_err(db_error("Failed to create reminder"))?;

    info!(reminder_id = %reminder.id, "Created reminder");

    Ok((StatusCode::CREATED, Json(ReminderResponse::from(reminder))))
}

/// Get a reminder
#[utoipa::path(
    get,
    path = "/api/v1/reminders/{reminder_id}",
    tag = "reminders",
    params(("reminder_id" = Uuid, Path, description = "Reminder ID")),
    responses(
        (status = 200, description = "Reminder", body = ReminderResponse),
        (status = 404, description = "Reminder not found", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn get_reminder(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(reminder_id): Path<Uuid>,
) -> Result<Json<ReminderResponse>, ApiError> {
    let repo = ReminderRepository::new(state.db_pool.pool().clone());

    let reminder = repo
        .get(auth.user_id, reminder_id)
        .await
        .map_err(db_error("Failed to get reminder"))?
        .ok_or_else(|| not_found("Reminder"))?;

    Ok(Json(ReminderResponse::from(reminder)))
}

/// Update a reminder
#[utoipa::path(
    put,
    path = "/api/v1/reminders/{reminder_id}",
    tag = "reminders",
    params(("reminder_id" = Uuid, Path, description = "Reminder ID")),
    request_body = UpdateReminderRequest,
    responses(
        (status = 200, description = "Reminder updated", body = ReminderResponse),
        (status = 404, description = "Reminder not found", body = ErrorResponse),
        (status = 422, description = "Invalid reminder", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn update_reminder(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(reminder_id): Path<Uuid>,
    Json(input): Json<UpdateReminderRequest>,
) -> Result<Json<ReminderResponse>, ApiError> {
    let title = input.title.as_deref().map(require_title).transpose()?;
    check_linked_campaign(&state, auth.user_id, input.campaign_id).await?;
    let repo = ReminderRepository::new(state.db_pool.pool().clone());

    let reminder = repo
        .update(
            auth.user_id,
            reminder_id,
            UpdateReminder {
                title,
                notes: input.notes,
                due_at: input.due_at,
                completed: input.completed,
                campaign_id: input.campaign_id,
                recipient_email: input.recipient_email,
            },
        )
        .await
        .map_err(db_error("Failed to update reminder"))?
        .ok_or_else(|| not_found("Reminder"))?;

    Ok(Json(ReminderResponse::from(reminder)))
}

/// Mark a reminder as done
#[utoipa::path(
    post,
    path = "/api/v1/reminders/{reminder_id}/complete",
    tag = "reminders",
    params(("reminder_id" = Uuid, Path, description = "Reminder ID")),
    responses(
        (status = 200, description = "Reminder completed", body = ReminderResponse),
        (status = 404, description = "Reminder not found", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn complete_reminder(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(reminder_id): Path<Uuid>,
) -> Result<Json<ReminderResponse>, ApiError> {
    let repo = ReminderRepository::new(state.db_pool.pool().clone());

    let reminder = repo
        .complete(auth.user_id, reminder_id)
        .await
        .map_err(db_error("Failed to complete reminder"))?
        .ok_or_else(|| not_found("Reminder"))?;

    Ok(Json(ReminderResponse::from(reminder)))
}

/// Delete a reminder
#[utoipa::path(
    delete,
    path = "/api/v1/reminders/{reminder_id}",
    tag = "reminders",
    params(("reminder_id" = Uuid, Path, description = "Reminder ID")),
    responses(
        (status = 204, description = "Reminder deleted"),
        (status = 404, description = "Reminder not found", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn delete_reminder(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(reminder_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = ReminderRepository::new(state.db_pool.pool().clone());

    let deleted = repo
        .delete(auth.user_id, reminder_id)
        .await
        .map_err(db_error("Failed to delete reminder"))?;

    if !deleted {
        return Err(not_found("Reminder"));
    }

    Ok(StatusCode::NO_CONTENT)
}
