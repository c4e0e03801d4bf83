//! Email template catalog handlers

use axum::{extract::Path, Json};
use collabdesk_core::templates::{self, EmailTemplate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{not_found, ApiError, ErrorResponse};

/// Template response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TemplateResponse {
    pub id: String,
    pub category: String,
    pub name: String,
    pub subject: String,
    pub content: String,
    /// Placeholders used by subject and content, first-seen order
    pub variables: Vec<String>,
}

impl From<&EmailTemplate> for TemplateResponse {
    fn from(t: &EmailTemplate) -> Self {
        Self {
            id: t.id.to_string(),
            category: t.category.to_string(),
            name: t.name.to_string(),
            subject: t.subject.to_string(),
            content: t.content.to_string(),
            variables: t.variables(),
        }
    }
}

/// List built-in templates
#[utoipa::path(
    get,
    path = "/api/v1/templates",
    tag = "templates",
    responses(
        (status = 200, description = "Template catalog", body = Vec<TemplateResponse>)
    ),
    security(("api_key" = []))
)]
pub async fn list_templates() -> Json<Vec<TemplateResponse>> {
    Json(templates::all().iter().map(TemplateResponse::from).collect())
}

/// Get one built-in template
#[utoipa::path(
    get,
    path = "/api/v1/templates/{template_id}",
    tag = "templates",
    params(("template_id" = String, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Template", body = TemplateResponse),
        (status = 404, description = "Template not found", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn get_template(Path(template_id): Path<String>) -> Result<Json<TemplateResponse>, ApiError> {
    templates::find(&template_id)
        .map(|t| Json(TemplateResponse::from(t)))
        .ok_or_else(|| not_found("Template"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_list_includes_variables() {
        let Json(list) = list_templates().await;
        assert!(!list.is_empty());
        let invite = list
            .iter()
            .find(|t| t.id == "collaboration-invite")
            .unwrap();
        assert!(invite.variables.contains(&"influencerName".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_template() {
        let (status, _) = get_template(Path("missing".to_string())).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
