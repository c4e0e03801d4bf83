//! Database models

use chrono::{DateTime, Utc};
use collabdesk_common::types::{
    CampaignId, CampaignStatus, RecipientId, RecipientStatus, RecipientType, ReminderId, UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::collections::HashMap;

pub use collabdesk_common::types::CampaignStats;

/// Render a JSON scalar the way it should appear inside an email
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_object_to_strings(value: &Value) -> HashMap<String, String> {
    value
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(key, value)| (key.clone(), value_to_string(value)))
                .collect()
        })
        .unwrap_or_default()
}

/// User model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Campaigns
// ============================================================================

/// Campaign model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub user_id: UserId,
    pub name: String,
    pub subject: String,
    pub content: String,
    pub status: String,
    pub stats_total: i32,
    pub stats_sent: i32,
    pub stats_failed: i32,
    pub stats_pending: i32,
    pub template_id: Option<String>,
    pub template_variables: Value,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Get status enum
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }

    /// Whether the campaign can still be edited and dispatched
    pub fn is_draft(&self) -> bool {
        self.status_enum() == Some(CampaignStatus::Draft)
    }

    /// Aggregate delivery counts
    pub fn stats(&self) -> CampaignStats {
        CampaignStats {
            total: self.stats_total,
            sent: self.stats_sent,
            failed: self.stats_failed,
            pending: self.stats_pending,
        }
    }

    /// Campaign-level template variables as plain strings
    pub fn template_variables_map(&self) -> HashMap<String, String> {
        json_object_to_strings(&self.template_variables)
    }
}

/// Create campaign input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub user_id: UserId,
    pub name: String,
    pub subject: String,
    pub content: String,
    pub template_id: Option<String>,
    pub template_variables: HashMap<String, String>,
}

/// Update campaign input
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateCampaign {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub template_id: Option<String>,
    pub template_variables: Option<HashMap<String, String>>,
}

/// Latest write time of a campaign in `sending`
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CampaignActivity {
    pub id: CampaignId,
    pub last_activity: DateTime<Utc>,
}

// ============================================================================
// Campaign recipients
// ============================================================================

/// Campaign recipient model
///
/// One contact inside one campaign, carrying both the personalization
/// inputs and the outcome of the campaign's dispatch run.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignRecipient {
    pub id: RecipientId,
    pub campaign_id: CampaignId,
    pub name: String,
    pub email: String,
    pub platform: Option<String>,
    pub followers: Option<i64>,
    pub category: Option<String>,
    pub tags: Value,
    pub custom_fields: Value,
    pub recipient_type: String,
    pub tiktok: bool,
    pub instagram: bool,
    pub youtube: bool,
    pub ugc: bool,
    pub status: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignRecipient {
    /// Get status enum
    pub fn status_enum(&self) -> Option<RecipientStatus> {
        self.status.parse().ok()
    }

    /// Get recipient type enum
    pub fn type_enum(&self) -> Option<RecipientType> {
        self.recipient_type.parse().ok()
    }

    /// Get tags as a vector
    pub fn tags_vec(&self) -> Vec<String> {
        serde_json::from_value(self.tags.clone()).unwrap_or_default()
    }

    /// Per-recipient personalization values as plain strings
    pub fn custom_fields_map(&self) -> HashMap<String, String> {
        json_object_to_strings(&self.custom_fields)
    }
}

/// New recipient input, used both at campaign creation and when adding later
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NewRecipient {
    pub name: String,
    pub email: String,
    pub platform: Option<String>,
    pub followers: Option<i64>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub custom_fields: serde_json::Map<String, Value>,
    pub recipient_type: RecipientType,
    pub tiktok: bool,
    pub instagram: bool,
    pub youtube: bool,
    pub ugc: bool,
}

/// Update recipient input; delivery status is never editable
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateRecipient {
    pub name: Option<String>,
    pub email: Option<String>,
    pub platform: Option<String>,
    pub followers: Option<i64>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<serde_json::Map<String, Value>>,
    pub recipient_type: Option<RecipientType>,
    pub tiktok: Option<bool>,
    pub instagram: Option<bool>,
    pub youtube: Option<bool>,
    pub ugc: Option<bool>,
}

/// Per-status recipient counts of one campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecipientCounts {
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
}

impl RecipientCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.sent + self.failed
    }

    /// Campaign stats derived from the recipient rows
    pub fn to_stats(&self) -> CampaignStats {
        CampaignStats {
            total: self.total() as i32,
            sent: self.sent as i32,
            failed: self.failed as i32,
            pending: self.pending as i32,
        }
    }
}

// ============================================================================
// Reminders
// ============================================================================

/// Reminder model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub user_id: UserId,
    pub title: String,
    pub notes: Option<String>,
    pub due_at: DateTime<Utc>,
    pub completed: bool,
    pub campaign_id: Option<CampaignId>,
    pub recipient_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reminder {
    /// Open and past its due time
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_at < now
    }
}

/// Create reminder input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReminder {
    pub user_id: UserId,
    pub title: String,
    pub notes: Option<String>,
    pub due_at: DateTime<Utc>,
    pub campaign_id: Option<CampaignId>,
    pub recipient_email: Option<String>,
}

/// Update reminder input
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateReminder {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub completed: Option<bool>,
    pub campaign_id: Option<CampaignId>,
    pub recipient_email: Option<String>,
}

// ============================================================================
// Analytics
// ============================================================================

/// Dashboard summary for one user
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalyticsSummary {
    pub campaigns_by_status: HashMap<String, i64>,
    pub total_campaigns: i64,
    pub emails_total: i64,
    pub emails_sent: i64,
    pub emails_failed: i64,
    pub emails_pending: i64,
    pub recipients_by_type: HashMap<String, i64>,
    pub recipients_by_platform: HashMap<String, i64>,
    pub open_reminders: i64,
    pub overdue_reminders: i64,
}

impl AnalyticsSummary {
    /// Share of attempted emails that were delivered, in percent
    pub fn delivery_rate(&self) -> f64 {
        let attempted = self.emails_sent + self.emails_failed;
        if attempted == 0 {
            0.0
        } else {
            (self.emails_sent as f64 / attempted as f64) * 100.0
        }
    }
}
