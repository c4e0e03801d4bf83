//! Campaign handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use collabdesk_common::types::{CampaignStats, CampaignStatus};
use collabdesk_common::Error;
use collabdesk_core::templates;
use collabdesk_storage::models::{Campaign, CreateCampaign, UpdateCampaign};
use collabdesk_storage::repository::{CampaignRepository, RecipientRepository};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_scope, AppState, AuthContext};
use crate::error::{
    db_error, error_response, invalid_state, not_found, validation, ApiError, ErrorResponse,
};
use crate::handlers::recipients::{RecipientRequest, RecipientResponse};

/// Scope needed to dispatch a campaign
pub const SEND_SCOPE: &str = "campaigns:send";

/// Aggregate delivery counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CampaignStatsResponse {
    pub total: i32,
    pub sent: i32,
    pub failed: i32,
    pub pending: i32,
}

impl From<CampaignStats> for CampaignStatsResponse {
    fn from(s: CampaignStats) -> Self {
        Self {
            total: s.total,
            sent: s.sent,
            failed: s.failed,
            pending: s.pending,
        }
    }
}

/// Campaign response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CampaignResponse {
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    pub content: String,
    pub status: String,
    pub stats: CampaignStatsResponse,
    pub sent_at: Option<DateTime<Utc>>,
    pub template_id: Option<String>,
    pub template_variables: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Campaign> for CampaignResponse {
    fn from(c: Campaign) -> Self {
        let stats = c.stats().into();
        let template_variables = c.template_variables_map();
        Self {
            id: c.id,
            name: c.name,
            subject: c.subject,
            content: c.content,
            status: c.status,
            stats,
            sent_at: c.sent_at,
            template_id: c.template_id,
            template_variables,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Campaign with its recipients
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CampaignDetailResponse {
    #[serde(flatten)]
    pub campaign: CampaignResponse,
    pub recipients: Vec<RecipientResponse>,
}

/// Query parameters for listing campaigns
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCampaignsQuery {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Campaign list response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CampaignListResponse {
    pub data: Vec<CampaignResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Request body for creating a campaign
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub name: String,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub template_id: Option<String>,
    #[serde(default)]
    pub template_variables: HashMap<String, String>,
    #[serde(default)]
    pub recipients: Vec<RecipientRequest>,
}

/// Request body for updating a draft campaign
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub template_id: Option<String>,
    pub template_variables: Option<HashMap<String, String>>,
}

/// Request body for dispatching a campaign
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendCampaignRequest {
    /// Outbound mail access token
    pub mail_credential: Option<String>,
}

/// Dispatch outcome
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendCampaignResponse {
    pub success: bool,
    pub stats: CampaignStatsResponse,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl CreateCampaignRequest {
    /// Apply the template pre-fill and validate
    fn into_create(self, user_id: Uuid) -> Result<(CreateCampaign, Vec<RecipientRequest>), ApiError> {
        let mut subject = non_empty(self.subject);
        let mut content = non_empty(self.content);

        if let Some(template_id) = &self.template_id {
            let template = templates::find(template_id)
                .ok_or_else(|| validation(format!("Unknown template: {}", template_id)))?;
            subject.get_or_insert_with(|| template.subject.to_string());
            content.get_or_insert_with(|| template.content.to_string());
        }

        if self.name.trim().is_empty() {
            return Err(validation("Campaign name is required"));
        }
        let subject = subject.ok_or_else(|| validation("Subject is required"))?;
        let content = content.ok_or_else(|| validation("Content is required"))?;

        Ok((
            CreateCampaign {
                user_id,
                name: self.name.trim().to_string(),
                subject,
                content,
                template_id: self.template_id,
                template_variables: self.template_variables,
            },
            self.recipients,
        ))
    }
}

/// List campaigns
#[utoipa::path(
    get,
    path = "/api/v1/campaigns",
    tag = "campaigns",
    params(ListCampaignsQuery),
    responses(
        (status = 200, description = "Campaigns, newest first", body = CampaignListResponse),
        (status = 422, description = "Unknown status filter", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListCampaignsQuery>,
) -> Result<Json<CampaignListResponse>, ApiError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<CampaignStatus>)
        .transpose()
        .map_err(validation)?;
    let limit = query.limit.clamp(1, 200);
    let offset = query.offset.max(0);

    let repo = CampaignRepository::new(state.db_pool.pool().clone());

    let campaigns = repo
        .list(auth.user_id, status, limit, offset)
        .await
        .map_err(db_error("Failed to list campaigns"))?;

    let total = repo
        .count(auth.user_id, status)
        .await
        .map_err(db_error("Failed to count campaigns"))?;

    Ok(Json(CampaignListResponse {
        data: campaigns.into_iter().map(CampaignResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// Create a draft campaign with its initial recipients
#[utoipa::path(
    post,
    path = "/api/v1/campaigns",
    tag = "campaigns",
    request_body = CreateCampaignRequest,
    responses(
        (status = 201, description = "Campaign created", body = CampaignDetailResponse),
        (status = 422, description = "Invalid campaign", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignDetailResponse>), ApiError> {
    let (create_input, recipients) = input.into_create(auth.user_id)?;
    let recipients = recipients
        .into_iter()
        .map(RecipientRequest::into_new_recipient)
        .collect::<Result<Vec<_>, _>>()?;

    let repo = CampaignRepository::new(state.db_pool.pool().clone());
    let (campaign, recipients) = repo
        .create(create_input, recipients)
        .await
        .map_err(db_error("Failed to create campaign"))?;

    info!(
        campaign_id = %campaign.id,
        user_id = %auth.user_id,
        recipients = recipients.len(),
        "Created campaign"
    );

    Ok((
        StatusCode::CREATED,
        Json(CampaignDetailResponse {
            campaign: CampaignResponse::from(campaign),
            recipients: recipients.into_iter().map(RecipientResponse::from).collect(),
        }),
    ))
}

/// Get a campaign with its recipients
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{campaign_id}",
    tag = "campaigns",
    params(("campaign_id" = Uuid, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Campaign", body = CampaignDetailResponse),
        (status = 404, description = "Campaign not found", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignDetailResponse>, ApiError> {
    let pool = state.db_pool.pool().clone();

    let campaign = CampaignRepository::new(pool.clone())
        .get(auth.user_id, campaign_id)
        .await
        .map_err(db_error("Failed to get campaign"))?
        .ok_or_else(|| not_found("Campaign"))?;

    let recipients = RecipientRepository::new(pool)
        .list_by_campaign(campaign_id)
        .await
        .map_err(db_error("Failed to list campaign recipients"))?;

    Ok(Json(CampaignDetailResponse {
        campaign: CampaignResponse::from(campaign),
        recipients: recipients.into_iter().map(RecipientResponse::from).collect(),
    }))
}

/// Update a draft campaign
#[utoipa::path(
    put,
    path = "/api/v1/campaigns/{campaign_id}",
    tag = "campaigns",
    params(("campaign_id" = Uuid, Path, description = "Campaign ID")),
    request_body = UpdateCampaignRequest,
    responses(
        (status = 200, description = "Campaign updated", body = CampaignResponse),
        (status = 404, description = "Campaign not found", body = ErrorResponse),
        (status = 409, description = "Campaign is not a draft", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn update_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
    Json(input): Json<UpdateCampaignRequest>,
) -> Result<Json<CampaignResponse>, ApiError> {
    if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(validation("Campaign name cannot be empty"));
    }
    if let Some(template_id) = &input.template_id {
        if templates::find(template_id).is_none() {
            return Err(validation(format!("Unknown template: {}", template_id)));
        }
    }

    let repo = CampaignRepository::new(state.db_pool.pool().clone());

    let update_input = UpdateCampaign {
        name: input.name.map(|n| n.trim().to_string()),
        subject: non_empty(input.subject),
        content: non_empty(input.content),
        template_id: input.template_id,
        template_variables: input.template_variables,
    };

    match repo
        .update(auth.user_id, campaign_id, update_input)
        .await
        .map_err(db_error("Failed to update campaign"))?
    {
        Some(campaign) => {
            info!(campaign_id = %campaign_id, "Updated campaign");
            Ok(Json(CampaignResponse::from(campaign)))
        }
        None => {
            repo.get(auth.user_id, campaign_id)
                .await
                .map_err(db_error("Failed to get campaign"))?
                .ok_or_else(|| not_found("Campaign"))?;
            Err(invalid_state("Only draft campaigns can be edited"))
        }
    }
}

/// Delete a campaign and its recipients
#[utoipa::path(
    delete,
    path = "/api/v1/campaigns/{campaign_id}",
    tag = "campaigns",
    params(("campaign_id" = Uuid, Path, description = "Campaign ID")),
    responses(
        (status = 204, description = "Campaign deleted"),
        (status = 404, description = "Campaign not found", body = ErrorResponse),
        (status = 409, description = "Campaign is sending", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn delete_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = CampaignRepository::new(state.db_pool.pool().clone());

    let deleted = repo
        .delete(auth.user_id, campaign_id)
        .await
        .map_err(db_error("Failed to delete campaign"))?;

    if !deleted {
        repo.get(auth.user_id, campaign_id)
            .await
            .map_err(db_error("Failed to get campaign"))?
            .ok_or_else(|| not_found("Campaign"))?;
        return Err(invalid_state("A campaign cannot be deleted while it is sending"));
    }

    info!(campaign_id = %campaign_id, "Deleted campaign");

    Ok(StatusCode::NO_CONTENT)
}

/// Dispatch a draft campaign to all of its recipients.
///
/// The response is sent once every recipient has been attempted. The run
/// continues to completion if the client disconnects first.
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{campaign_id}/send",
    tag = "campaigns",
    params(("campaign_id" = Uuid, Path, description = "Campaign ID")),
    request_body = SendCampaignRequest,
    responses(
        (status = 200, description = "Campaign dispatched", body = SendCampaignResponse),
        (status = 400, description = "Missing mail credential", body = ErrorResponse),
        (status = 404, description = "Campaign not found", body = ErrorResponse),
        (status = 409, description = "Already sent or no recipients", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn send_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
    body: Option<Json<SendCampaignRequest>>,
) -> Result<Json<SendCampaignResponse>, ApiError> {
    require_scope(&auth, SEND_SCOPE).map_err(|_| {
        error_response(Error::PermissionDenied(format!(
            "API key lacks scope '{}'",
            SEND_SCOPE
        )))
    })?;

    let credential = body.and_then(|Json(b)| b.mail_credential);

    let stats = state
        .engine
        .dispatch_detached(auth.user_id, campaign_id, credential)
        .await
        .map_err(|e| error_response(e.into()))?;

    Ok(Json(SendCampaignResponse {
        success: true,
        stats: stats.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(json: serde_json::Value) -> CreateCampaignRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_create_prefills_from_template() {
        let (create, recipients) = request(serde_json::json!({
            "name": "Seeding wave 1",
            "templateId": "product-seeding",
            "templateVariables": {"productName": "Glow Serum"},
            "recipients": [{"name": "Jane", "email": "jane@example.com"}]
        }))
        .into_create(Uuid::new_v4())
        .unwrap();

        let template = templates::find("product-seeding").unwrap();
        assert_eq!(create.subject, template.subject);
        assert_eq!(create.content, template.content);
        assert_eq!(create.template_variables["productName"], "Glow Serum");
        assert_eq!(recipients.len(), 1);
    }

    #[test]
    fn test_explicit_subject_wins_over_template() {
        let (create, _) = request(serde_json::json!({
            "name": "Seeding",
            "subject": "Hi {influencerName}",
            "templateId": "product-seeding"
        }))
        .into_create(Uuid::new_v4())
        .unwrap();
        assert_eq!(create.subject, "Hi {influencerName}");
    }

    #[test]
    fn test_create_requires_subject_and_content() {
        let err = request(serde_json::json!({"name": "Empty", "subject": "Hi"}))
            .into_create(Uuid::new_v4())
            .unwrap_err();
        assert_eq!(err.1.error, "Validation error: Content is required");

        let err = request(serde_json::json!({"name": " ", "subject": "a", "content": "b"}))
            .into_create(Uuid::new_v4())
            .unwrap_err();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_unknown_template_is_rejected() {
        let err = request(serde_json::json!({"name": "x", "templateId": "nope"}))
            .into_create(Uuid::new_v4())
            .unwrap_err();
        assert_eq!(err.1.code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_send_request_wire_format() {
        let body: SendCampaignRequest =
            serde_json::from_value(serde_json::json!({"mailCredential": "ya29.token"})).unwrap();
        assert_eq!(body.mail_credential.as_deref(), Some("ya29.token"));

        let response = SendCampaignResponse {
            success: true,
            stats: CampaignStats::finished(2, 1).into(),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({
                "success": true,
                "stats": {"total": 3, "sent": 2, "failed": 1, "pending": 0}
            })
        );
    }
}
