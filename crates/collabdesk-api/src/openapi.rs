//! OpenAPI documentation
//!
//! The document is assembled from the `#[utoipa::path]` annotations on the
//! handlers and served next to a Swagger UI page.

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::ErrorResponse;
use crate::handlers::{analytics, campaigns, health, recipients, reminders, templates};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Collabdesk API",
        description = "Influencer outreach CRM.\n\nAll `/api/v1` endpoints require an API key sent as `X-API-Key: <key>` or `Authorization: Bearer <key>`."
    ),
    paths(
        health::health,
        health::liveness,
        health::readiness,
        health::health_detailed,
        campaigns::list_campaigns,
        campaigns::create_campaign,
        campaigns::get_campaign,
        campaigns::update_campaign,
        campaigns::delete_campaign,
        campaigns::send_campaign,
        recipients::list_recipients,
        recipients::list_campaign_recipients,
        recipients::add_recipient,
        recipients::update_recipient,
        recipients::delete_recipient,
        templates::list_templates,
        templates::get_template,
        reminders::list_reminders,
        reminders::create_reminder,
        reminders::get_reminder,
        reminders::update_reminder,
        reminders::complete_reminder,
        reminders::delete_reminder,
        analytics::get_summary,
    ),
    components(schemas(
        ErrorResponse,
        health::HealthResponse,
        health::ComponentHealth,
        health::DetailedHealthResponse,
        campaigns::CampaignStatsResponse,
        campaigns::CampaignResponse,
        campaigns::CampaignDetailResponse,
        campaigns::CampaignListResponse,
        campaigns::CreateCampaignRequest,
        campaigns::UpdateCampaignRequest,
        campaigns::SendCampaignRequest,
        campaigns::SendCampaignResponse,
        recipients::RecipientResponse,
        recipients::RecipientRequest,
        recipients::UpdateRecipientRequest,
        recipients::RecipientListResponse,
        templates::TemplateResponse,
        reminders::ReminderResponse,
        reminders::CreateReminderRequest,
        reminders::UpdateReminderRequest,
        analytics::EmailTotals,
        analytics::AnalyticsSummaryResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "campaigns", description = "Campaign management and dispatch"),
        (name = "recipients", description = "Campaign recipients"),
        (name = "templates", description = "Built-in email templates"),
        (name = "reminders", description = "Follow-up reminders"),
        (name = "analytics", description = "Dashboard figures")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
        );
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

/// Create OpenAPI routes
pub fn create_openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

async fn swagger_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Collabdesk API Documentation</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui.css" />
    <style>
        body { margin: 0; padding: 0; }
        .swagger-ui .topbar { display: none; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {
            SwaggerUIBundle({
                url: "/openapi.json",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIBundle.SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_send_endpoint() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert!(doc["paths"]["/api/v1/campaigns/{campaign_id}/send"]["post"].is_object());
        assert!(doc["components"]["securitySchemes"]["api_key"].is_object());
        assert_eq!(doc["info"]["title"], "Collabdesk API");
    }
}
