//! API routes

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use collabdesk_common::config::ApiConfig;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::{auth_middleware, AppState};
use crate::handlers::{analytics, campaigns, health, recipients, reminders, templates};
use crate::openapi::create_openapi_routes;

/// Create the API router
pub fn create_router(state: Arc<AppState>, config: &ApiConfig) -> Router {
    // Health check routes (no auth required)
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness))
        .route("/detailed", get(health::health_detailed));

    // Campaign routes
    let campaign_routes = Router::new()
        .route(
            "/",
            get(campaigns::list_campaigns).post(campaigns::create_campaign),
        )
        .route(
            "/:campaign_id",
            get(campaigns::get_campaign)
                .put(campaigns::update_campaign)
                .delete(campaigns::delete_campaign),
        )
        .route("/:campaign_id/send", post(campaigns::send_campaign))
        .route(
            "/:campaign_id/recipients",
            get(recipients::list_campaign_recipients).post(recipients::add_recipient),
        );

    // Recipient routes
    let recipient_routes = Router::new()
        .route("/", get(recipients::list_recipients))
        .route(
            "/:recipient_id",
            put(recipients::update_recipient).delete(recipients::delete_recipient),
        );

    // Template routes
    let template_routes = Router::new()
        .route("/", get(templates::list_templates))
        .route("/:template_id", get(templates::get_template));

    // Reminder routes
    let reminder_routes = Router::new()
        .route(
            "/",
            get(reminders::list_reminders).post(reminders::create_reminder),
        )
        .route(
            "/:reminder_id",
            get(reminders::get_reminder)
                .put(reminders::update_reminder)
                .delete(reminders::delete_reminder),
        )
        .route("/:reminder_id/complete", post(reminders::complete_reminder));

    // API v1 routes with authentication
    let api_v1 = Router::new()
        .nest("/campaigns", campaign_routes)
        .nest("/recipients", recipient_routes)
        .nest("/templates", template_routes)
        .nest("/reminders", reminder_routes)
        .route("/analytics/summary", get(analytics::get_summary))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let mut router = Router::new()
        .nest("/health", health_routes)
        .nest("/api/v1", api_v1);

    if config.enable_docs {
        router = router.merge(create_openapi_routes());
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.cors_origins)),
        )
        .with_state(state)
}

/// CORS for the configured origins; "*" allows any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ]);

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use collabdesk_core::{DispatchEngine, FixedIntervalPacer};
    use collabdesk_common::config::MailConfig;
    use collabdesk_storage::{DatabasePool, DbDispatchStore};
    use sqlx::postgres::PgPoolOptions;

    fn test_server(enable_docs: bool) -> TestServer {
        // Lazy pool: nothing connects unless a handler touches the database
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://collabdesk@localhost/collabdesk_test")
            .unwrap();
        let mailer = collabdesk_core::mailer::from_config(&MailConfig::default()).unwrap();
        let engine = DispatchEngine::new(
            Arc::new(DbDispatchStore::new(pool.clone())),
            mailer,
            Arc::new(FixedIntervalPacer::from_millis(0)),
        );
        let state = Arc::new(AppState {
            db_pool: DatabasePool::from_pool(pool),
            engine: Arc::new(engine),
        });
        let config = ApiConfig {
            enable_docs,
            ..ApiConfig::default()
        };
        TestServer::new(create_router(state, &config)).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let server = test_server(true);
        let response = server.get("/health").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_api_requires_key() {
        let server = test_server(true);
        let response = server.get("/api/v1/campaigns").await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let response = server.post("/api/v1/campaigns/00000000-0000-0000-0000-000000000000/send").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_docs_toggle() {
        test_server(true).get("/openapi.json").await.assert_status_ok();
        test_server(false)
            .get("/openapi.json")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_cors_ignores_invalid_origins() {
        let _ = cors_layer(&["https://app.example".to_string(), "bad\norigin".to_string()]);
        let _ = cors_layer(&["*".to_string()]);
    }
}
