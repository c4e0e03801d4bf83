//! Repository layer for data access

pub mod analytics;
pub mod api_keys;
pub mod campaigns;
pub mod dispatch;
pub mod recipients;
pub mod reminders;
pub mod users;

pub use analytics::AnalyticsRepository;
pub use campaigns::CampaignRepository;
pub use dispatch::{DbDispatchStore, DispatchStore, SweepStore};
pub use recipients::{RecipientFilter, RecipientRemoval, RecipientRepository};
pub use reminders::{ReminderFilter, ReminderRepository};

// Re-export concrete repository implementations with simple names
pub use api_keys::DbApiKeyRepository as ApiKeyRepository;
pub use users::DbUserRepository as UserRepository;

// Re-export repository traits
pub use api_keys::ApiKeyRepository as ApiKeyRepositoryTrait;
pub use users::UserRepository as UserRepositoryTrait;

pub use api_keys::{ApiKey, ApiKeyId, CreateApiKey};
