//! Common types for Collabdesk

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for users
pub type UserId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for campaign recipients
pub type RecipientId = Uuid;

/// Unique identifier for reminders
pub type ReminderId = Uuid;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// Email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress {
    pub local: String,
    pub domain: String,
}

impl EmailAddress {
    /// Create a new email address
    pub fn new(local: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            domain: domain.into(),
        }
    }

    /// Parse an email address from a string
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (local, domain) = s.split_once('@')?;
        if local.is_empty()
            || domain.is_empty()
            || domain.contains('@')
            || s.chars().any(char::is_whitespace)
        {
            return None;
        }
        Some(Self::new(local, domain))
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

impl std::str::FromStr for EmailAddress {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::Error::Validation(format!("Invalid email address: {}", s)))
    }
}

/// Campaign status
///
/// Transitions only ever go `draft -> sending -> {sent, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Sending,
    Sent,
    Failed,
}

impl CampaignStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [CampaignStatus; 4] = [
        CampaignStatus::Draft,
        CampaignStatus::Sending,
        CampaignStatus::Sent,
        CampaignStatus::Failed,
    ];

    /// Final status of a finished dispatch run.
    ///
    /// A run with at least one delivered email counts as `sent`, even when
    /// some recipients failed. Only a run where nothing got through is `failed`.
    pub fn from_outcome(sent: i32, failed: i32) -> Self {
        if failed == 0 {
            CampaignStatus::Sent
        } else if sent == 0 {
            CampaignStatus::Failed
        } else {
            CampaignStatus::Sent
        }
    }

    /// Whether the campaign has finished its single dispatch run
    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Sent | CampaignStatus::Failed)
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "draft"),
            CampaignStatus::Sending => write!(f, "sending"),
            CampaignStatus::Sent => write!(f, "sent"),
            CampaignStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "sending" => Ok(CampaignStatus::Sending),
            "sent" => Ok(CampaignStatus::Sent),
            "failed" => Ok(CampaignStatus::Failed),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// Per-recipient delivery status within one campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Failed,
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipientStatus::Pending => write!(f, "pending"),
            RecipientStatus::Sent => write!(f, "sent"),
            RecipientStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RecipientStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecipientStatus::Pending),
            "sent" => Ok(RecipientStatus::Sent),
            "failed" => Ok(RecipientStatus::Failed),
            _ => Err(format!("Invalid recipient status: {}", s)),
        }
    }
}

/// Kind of contact a recipient is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecipientType {
    Brand,
    #[default]
    Creator,
    CreatorAgency,
    BrandAgency,
}

impl RecipientType {
    pub const ALL: [RecipientType; 4] = [
        RecipientType::Brand,
        RecipientType::Creator,
        RecipientType::CreatorAgency,
        RecipientType::BrandAgency,
    ];
}

impl std::fmt::Display for RecipientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipientType::Brand => write!(f, "brand"),
            RecipientType::Creator => write!(f, "creator"),
            RecipientType::CreatorAgency => write!(f, "creator_agency"),
            RecipientType::BrandAgency => write!(f, "brand_agency"),
        }
    }
}

impl std::str::FromStr for RecipientType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brand" => Ok(RecipientType::Brand),
            "creator" => Ok(RecipientType::Creator),
            "creator_agency" => Ok(RecipientType::CreatorAgency),
            "brand_agency" => Ok(RecipientType::BrandAgency),
            _ => Err(format!("Invalid recipient type: {}", s)),
        }
    }
}

/// Platforms a recipient can be flagged for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Tiktok,
    Instagram,
    Youtube,
    Ugc,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Tiktok,
        Platform::Instagram,
        Platform::Youtube,
        Platform::Ugc,
    ];

    /// Column holding the flag for this platform
    pub fn column(&self) -> &'static str {
        match self {
            Platform::Tiktok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Youtube => "youtube",
            Platform::Ugc => "ugc",
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tiktok" => Ok(Platform::Tiktok),
            "instagram" => Ok(Platform::Instagram),
            "youtube" => Ok(Platform::Youtube),
            "ugc" => Ok(Platform::Ugc),
            _ => Err(format!("Invalid platform: {}", s)),
        }
    }
}

/// Aggregate delivery counts of a campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CampaignStats {
    pub total: i32,
    pub sent: i32,
    pub failed: i32,
    pub pending: i32,
}

impl CampaignStats {
    /// Stats of a freshly created campaign with `total` recipients
    pub fn initial(total: i32) -> Self {
        Self {
            total,
            sent: 0,
            failed: 0,
            pending: total,
        }
    }

    /// Stats of a finished dispatch run; nothing is left pending
    pub fn finished(sent: i32, failed: i32) -> Self {
        Self {
            total: sent + failed,
            sent,
            failed,
            pending: 0,
        }
    }
}
