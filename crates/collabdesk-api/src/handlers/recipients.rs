//! Campaign recipient handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use collabdesk_common::types::{EmailAddress, Platform, RecipientType};
use collabdesk_storage::models::{CampaignRecipient, NewRecipient, UpdateRecipient};
use collabdesk_storage::repository::{
    CampaignRepository, RecipientFilter, RecipientRemoval, RecipientRepository,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{AppState, AuthContext};
use crate::error::{db_error, invalid_state, not_found, validation, ApiError, ErrorResponse};

/// Recipient response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipientResponse {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub name: String,
    pub email: String,
    pub platform: Option<String>,
    pub followers: Option<i64>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    #[schema(value_type = Object)]
    pub custom_fields: Value,
    #[serde(rename = "type")]
    pub recipient_type: String,
    pub tiktok: bool,
    pub instagram: bool,
    pub youtube: bool,
    pub ugc: bool,
    pub status: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CampaignRecipient> for RecipientResponse {
    fn from(r: CampaignRecipient) -> Self {
        let tags = r.tags_vec();
        Self {
            id: r.id,
            campaign_id: r.campaign_id,
            name: r.name,
            email: r.email,
            platform: r.platform,
            followers: r.followers,
            category: r.category,
            tags,
            custom_fields: r.custom_fields,
            recipient_type: r.recipient_type,
            tiktok: r.tiktok,
            instagram: r.instagram,
            youtube: r.youtube,
            ugc: r.ugc,
            status: r.status,
            sent_at: r.sent_at,
            error_message: r.error_message,
            created_at: r.created_at,
        }
    }
}

/// Request body for adding a recipient
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipientRequest {
    pub name: String,
    pub email: String,
    pub platform: Option<String>,
    pub followers: Option<i64>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub custom_fields: Map<String, Value>,
    #[serde(rename = "type", default)]
    #[schema(value_type = String)]
    pub recipient_type: RecipientType,
    #[serde(default)]
    pub tiktok: bool,
    #[serde(default)]
    pub instagram: bool,
    #[serde(default)]
    pub youtube: bool,
    #[serde(default)]
    pub ugc: bool,
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    EmailAddress::parse(email)
        .map(|_| ())
        .ok_or_else(|| validation(format!("Invalid email address: {}", email)))
}

impl RecipientRequest {
    /// Validate and convert into a storage input
    pub fn into_new_recipient(self) -> Result<NewRecipient, ApiError> {
        if self.name.trim().is_empty() {
            return Err(validation("Recipient name is required"));
        }
        validate_email(&self.email)?;

        Ok(NewRecipient {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            platform: self.platform,
            followers: self.followers,
            category: self.category,
            tags: self.tags,
            custom_fields: self.custom_fields,
            recipient_type: self.recipient_type,
            tiktok: self.tiktok,
            instagram: self.instagram,
            youtube: self.youtube,
            ugc: self.ugc,
        })
    }
}

/// Request body for editing a recipient's contact metadata
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecipientRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub platform: Option<String>,
    pub followers: Option<i64>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    #[schema(value_type = Option<Object>)]
    pub custom_fields: Option<Map<String, Value>>,
    #[serde(rename = "type")]
    #[schema(value_type = Option<String>)]
    pub recipient_type: Option<RecipientType>,
    pub tiktok: Option<bool>,
    pub instagram: Option<bool>,
    pub youtube: Option<bool>,
    pub ugc: Option<bool>,
}

impl UpdateRecipientRequest {
    fn into_update(self) -> Result<UpdateRecipient, ApiError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(validation("Recipient name cannot be empty"));
            }
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }

        Ok(UpdateRecipient {
            name: self.name.map(|n| n.trim().to_string()),
            email: self.email,
            platform: self.platform,
            followers: self.followers,
            category: self.category,
            tags: self.tags,
            custom_fields: self.custom_fields,
            recipient_type: self.recipient_type,
            tiktok: self.tiktok,
            instagram: self.instagram,
            youtube: self.youtube,
            ugc: self.ugc,
        })
    }
}

/// Query parameters for the flat recipient listing
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListRecipientsQuery {
    pub platform: Option<String>,
    #[serde(rename = "type")]
    pub recipient_type: Option<String>,
    pub category: Option<String>,
    pub campaign_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

/// Recipient list response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecipientListResponse {
    pub data: Vec<RecipientResponse>,
    pub limit: i64,
    pub offset: i64,
}

impl ListRecipientsQuery {
    fn filter(&self) -> Result<RecipientFilter, ApiError> {
        let platform = self
            .platform
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(str::parse::<Platform>)
            .transpose()
            .map_err(validation)?;
        let recipient_type = self
            .recipient_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(str::parse::<RecipientType>)
            .transpose()
            .map_err(validation)?;

        Ok(RecipientFilter {
            platform,
            recipient_type,
            category: self.category.clone().filter(|c| !c.is_empty()),
            campaign_id: self.campaign_id,
        })
    }
}

/// List every recipient across the user's campaigns
#[utoipa::path(
    get,
    path = "/api/v1/recipients",
    tag = "recipients",
    params(ListRecipientsQuery),
    responses(
        (status = 200, description = "Recipients", body = RecipientListResponse),
        (status = 422, description = "Invalid filter", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn list_recipients(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListRecipientsQuery>,
) -> Result<Json<RecipientListResponse>, ApiError> {
    let filter = query.filter()?;
    let limit = query.limit.clamp(1, 500);
    let offset = query.offset.max(0);

    let repo = RecipientRepository::new(state.db_pool.pool().clone());
    let recipients = repo
        .list_for_user(auth.user_id, &filter, limit, offset)
        .await
        .map_err(db_error("Failed to list recipients"))?;

    Ok(Json(RecipientListResponse {
        data: recipients.into_iter().map(RecipientResponse::from).collect(),
        limit,
        offset,
    }))
}

/// List the recipients of one campaign in dispatch order
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{campaign_id}/recipients",
    tag = "recipients",
    params(("campaign_id" = Uuid, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Recipients", body = [RecipientResponse]),
        (status = 404, description = "Campaign not found", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn list_campaign_recipients(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<Vec<RecipientResponse>>, ApiError> {
    let pool = state.db_pool.pool().clone();

    CampaignRepository::new(pool.clone())
        .get(auth.user_id, campaign_id)
        .await
        .map_err(db_error("Failed to get campaign"))?
        .ok_or_else(|| not_found("Campaign"))?;

    let recipients = RecipientRepository::new(pool)
        .list_by_campaign(campaign_id)
        .await
        .map_err(db_error("Failed to list campaign recipients"))?;

    Ok(Json(
        recipients.into_iter().map(RecipientResponse::from).collect(),
    ))
}

/// Add a recipient to a draft campaign
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{campaign_id}/recipients",
    tag = "recipients",
    params(("campaign_id" = Uuid, Path, description = "Campaign ID")),
    request_body = RecipientRequest,
    responses(
        (status = 201, description = "Recipient added", body = RecipientResponse),
        (status = 404, description = "Campaign not found", body = ErrorResponse),
        (status = 409, description = "Campaign is not a draft", body = ErrorResponse),
        (status = 422, description = "Invalid recipient", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn add_recipient(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
    Json(input): Json<RecipientRequest>,
) -> Result<(StatusCode, Json<RecipientResponse>), ApiError> {
    let new_recipient = input.into_new_recipient()?;
    let pool = state.db_pool.pool().clone();

    CampaignRepository::new(pool.clone())
        .get(auth.user_id, campaign_id)
        .await
        .map_err(db_error("Failed to get campaign"))?
        .ok_or_else(|| not_found("Campaign"))?;

    let recipient = RecipientRepository::new(pool)
        .add_to_campaign(campaign_id, &new_recipient)
        .await
        .map_err(db_error("Failed to add recipient"))?
        .ok_or_else(|| invalid_state("Recipients can only be added to draft campaigns"))?;

    info!(campaign_id = %campaign_id, recipient_id = %recipient.id, "Added recipient");

    Ok((StatusCode::CREATED, Json(RecipientResponse::from(recipient))))
}

/// Edit a recipient's contact metadata
#[utoipa::path(
    put,
    path = "/api/v1/recipients/{recipient_id}",
    tag = "recipients",
    params(("recipient_id" = Uuid, Path, description = "Recipient ID")),
    request_body = UpdateRecipientRequest,
    responses(
        (status = 200, description = "Recipient updated", body = RecipientResponse),
        (status = 404, description = "Recipient not found", body = ErrorResponse),
        (status = 422, description = "Invalid recipient", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn update_recipient(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(recipient_id): Path<Uuid>,
    Json(input): Json<UpdateRecipientRequest>,
) -> Result<Json<RecipientResponse>, ApiError> {
    let update = input.into_update()?;
    let repo = RecipientRepository::new(state.db_pool.pool().clone());

    repo.get(auth.user_id, recipient_id)
        .await
        .map_err(db_error("Failed to get recipient"))?
        .ok_or_else(|| not_found("Recipient"))?;

    let recipient = repo
        .update(recipient_id, update)
        .await
        .map_err(db_error("Failed to update recipient"))?
        .ok_or_else(|| not_found("Recipient"))?;

    Ok(Json(RecipientResponse::from(recipient)))
}

/// Delete a recipient
#[utoipa::path(
    delete,
    path = "/api/v1/recipients/{recipient_id}",
    tag = "recipients",
    params(("recipient_id" = Uuid, Path, description = "Recipient ID")),
    responses(
        (status = 204, description = "Recipient deleted"),
        (status = 404, description = "Recipient not found", body = ErrorResponse),
        (status = 409, description = "Campaign is sending", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn delete_recipient(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(recipient_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = RecipientRepository::new(state.db_pool.pool().clone());

    repo.get(auth.user_id, recipient_id)
        .await
        .map_err(db_error("Failed to get recipient"))?
        .ok_or_else(|| not_found("Recipient"))?;

    let removal = repo
        .delete(recipient_id)
        .await
        .map_err(db_error("Failed to delete recipient"))?;
    removal_status(removal)?;

    info!(recipient_id = %recipient_id, "Deleted recipient");

    Ok(StatusCode::NO_CONTENT)
}

fn removal_status(removal: RecipientRemoval) -> Result<(), ApiError> {
    match removal {
        RecipientRemoval::Removed => Ok(()),
        RecipientRemoval::NotFound => Err(not_found("Recipient")),
        RecipientRemoval::CampaignSending => Err(invalid_state(
            "Recipients cannot be removed while the campaign is sending",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(name: &str, email: &str) -> RecipientRequest {
        RecipientRequest {
            name: name.to_string(),
            email: email.to_string(),
            ..RecipientRequest::default()
        }
    }

    #[test]
    fn test_recipient_request_defaults() {
        let input: RecipientRequest = serde_json::from_value(serde_json::json!({
            "name": "Jane",
            "email": "jane@example.com",
            "customFields": {"discountCode": "JANE10"},
            "instagram": true
        }))
        .unwrap();

        let new_recipient = input.into_new_recipient().unwrap();
        assert_eq!(new_recipient.recipient_type, RecipientType::Creator);
        assert!(new_recipient.instagram);
        assert!(!new_recipient.tiktok);
        assert_eq!(new_recipient.custom_fields["discountCode"], "JANE10");
    }

    #[test]
    fn test_recipient_type_wire_name() {
        let input: RecipientRequest = serde_json::from_value(serde_json::json!({
            "name": "Studio",
            "email": "hello@studio.example",
            "type": "creator_agency"
        }))
        .unwrap();
        assert_eq!(input.recipient_type, RecipientType::CreatorAgency);
    }

    #[test]
    fn test_recipient_request_validation() {
        assert!(request("Jane", "jane@example.com").into_new_recipient().is_ok());

        let (status, Json(body)) = request("Jane", "jane.example.com")
            .into_new_recipient()
            .unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.code, "VALIDATION_ERROR");

        assert!(request("  ", "jane@example.com").into_new_recipient().is_err());
    }

    #[test]
    fn test_update_rejects_bad_email() {
        let update = UpdateRecipientRequest {
            email: Some("nope".to_string()),
            ..UpdateRecipientRequest::default()
        };
        assert!(update.into_update().is_err());
    }

    #[test]
    fn test_recipient_of_sending_campaign_is_conflict() {
        assert!(removal_status(RecipientRemoval::Removed).is_ok());

        let (status, Json(body)) = removal_status(RecipientRemoval::CampaignSending).unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.code, "INVALID_STATE");

        let (status, _) = removal_status(RecipientRemoval::NotFound).unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_list_filter_parsing() {
        let query = ListRecipientsQuery {
            platform: Some("TikTok".to_string()),
            recipient_type: Some("brand".to_string()),
            category: Some(String::new()),
            campaign_id: None,
            limit: 10,
            offset: 0,
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.platform, Some(Platform::Tiktok));
        assert_eq!(filter.recipient_type, Some(RecipientType::Brand));
        assert_eq!(filter.category, None);

        let bad = ListRecipientsQuery {
            platform: Some("myspace".to_string()),
            ..query
        };
        assert!(bad.filter().is_err());
    }
}
