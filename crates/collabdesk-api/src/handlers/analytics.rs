//! Analytics dashboard handlers

use axum::{extract::State, Extension, Json};
use collabdesk_storage::models::AnalyticsSummary;
use collabdesk_storage::repository::AnalyticsRepository;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{AppState, AuthContext};
use crate::error::{db_error, ApiError};

/// Email totals across all campaigns
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmailTotals {
    pub total: i64,
    pub sent: i64,
    pub failed: i64,
    pub pending: i64,
}

/// Dashboard summary
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummaryResponse {
    pub total_campaigns: i64,
    pub campaigns_by_status: HashMap<String, i64>,
    pub emails: EmailTotals,
    /// Delivered share of attempted emails, in percent
    pub delivery_rate: f64,
    pub recipients_by_type: HashMap<String, i64>,
    pub recipients_by_platform: HashMap<String, i64>,
    pub open_reminders: i64,
    pub overdue_reminders: i64,
}

impl From<AnalyticsSummary> for AnalyticsSummaryResponse {
    fn from(s: AnalyticsSummary) -> Self {
        let delivery_rate = s.delivery_rate();
        Self {
            total_campaigns: s.total_campaigns,
            campaigns_by_status: s.campaigns_by_status,
            emails: EmailTotals {
                total: s.emails_total,
                sent: s.emails_sent,
                failed: s.emails_failed,
                pending: s.emails_pending,
            },
            delivery_rate,
            recipients_by_type: s.recipients_by_type,
            recipients_by_platform: s.recipients_by_platform,
            open_reminders: s.open_reminders,
            overdue_reminders: s.overdue_reminders,
        }
    }
}

/// Dashboard summary for the acting user
#[utoipa::path(
    get,
    path = "/api/v1/analytics/summary",
    tag = "analytics",
    responses(
        (status = 200, description = "Summary", body = AnalyticsSummaryResponse)
    ),
    security(("api_key" = []))
)]
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<AnalyticsSummaryResponse>, ApiError> {
    let repo = AnalyticsRepository::new(state.db_pool.pool().clone());

    let summary = repo
        .summary(auth.user_id)
        .await
        .map_err(db_error("Failed to build analytics summary"))?;

    Ok(Json(summary.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_summary_response_shape() {
        let summary = AnalyticsSummary {
            total_campaigns: 2,
            emails_total: 10,
            emails_sent: 6,
            emails_failed: 2,
            emails_pending: 2,
            open_reminders: 1,
            ..AnalyticsSummary::default()
        };

        let json = serde_json::to_value(AnalyticsSummaryResponse::from(summary)).unwrap();
        assert_eq!(json["totalCampaigns"], 2);
        assert_eq!(json["emails"]["sent"], 6);
        assert_eq!(json["deliveryRate"], 75.0);
        assert_eq!(json["openReminders"], 1);
    }
}
