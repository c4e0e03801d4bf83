//! Store operations consumed by the campaign dispatch engine and the
//! stuck-campaign sweeper

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use collabdesk_common::types::{CampaignId, CampaignStats, CampaignStatus, RecipientId, UserId};
use collabdesk_common::{Error, Result};
use sqlx::PgPool;

use crate::models::{Campaign, CampaignActivity, CampaignRecipient, RecipientCounts};
use crate::repository::campaigns::CampaignRepository;
use crate::repository::recipients::RecipientRepository;

/// The narrow store surface the dispatch engine depends on.
///
/// Every write is a single-row, individually committed statement. There is
/// no transaction spanning a whole dispatch run.
#[async_trait]
pub trait DispatchStore: Send + Sync {
    /// Load a campaign owned by `owner`
    async fn get_campaign(&self, owner: UserId, id: CampaignId) -> Result<Option<Campaign>>;

    /// Recipients of a campaign in dispatch order
    async fn list_recipients(&self, campaign_id: CampaignId) -> Result<Vec<CampaignRecipient>>;

    /// Move a campaign from draft to sending. `false` if it was not draft.
    async fn begin_sending(&self, id: CampaignId) -> Result<bool>;

    /// Record a delivered recipient. `false` if it was not pending.
    async fn set_recipient_sent(&self, id: RecipientId, sent_at: DateTime<Utc>) -> Result<bool>;

    /// Record a failed recipient. `false` if it was not pending.
    async fn set_recipient_failed(&self, id: RecipientId, error: &str) -> Result<bool>;

    /// Persist the final status and stats of a run. `false` if the campaign
    /// was no longer sending.
    async fn finish_campaign(
        &self,
        id: CampaignId,
        status: CampaignStatus,
        stats: CampaignStats,
        sent_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Force a sending campaign into failed. `false` if it was not sending.
    async fn fail_campaign(&self, id: CampaignId) -> Result<bool>;
}

/// Store surface of the stuck-campaign sweeper
#[async_trait]
pub trait SweepStore: Send + Sync {
    /// Campaigns in `sending` with their latest write time
    async fn sending_activity(&self) -> Result<Vec<CampaignActivity>>;

    /// Per-status recipient counts of a campaign
    async fn count_recipients(&self, campaign_id: CampaignId) -> Result<RecipientCounts>;

    /// Close a sending campaign. `false` if it was no longer sending.
    async fn close_campaign(
        &self,
        id: CampaignId,
        status: CampaignStatus,
        stats: CampaignStats,
        closed_at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// PostgreSQL-backed dispatch store
#[derive(Clone)]
pub struct DbDispatchStore {
    campaigns: CampaignRepository,
    recipients: RecipientRepository,
}

impl DbDispatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            campaigns: CampaignRepository::new(pool.clone()),
            recipients: RecipientRepository::new(pool),
        }
    }
}

fn db_err(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

#[async_trait]
impl DispatchStore for DbDispatchStore {
    async fn get_campaign(&self, owner: UserId, id: CampaignId) -> Result<Option<Campaign>> {
        self.campaigns.get(owner, id).await.map_err(db_err)
    }

    async fn list_recipients(&self, campaign_id: CampaignId) -> Result<Vec<CampaignRecipient>> {
        self.recipients
            .list_by_campaign(campaign_id)
            .await
            .map_err(db_err)
    }

    async fn begin_sending(&self, id: CampaignId) -> Result<bool> {
        self.campaigns.begin_sending(id).await.map_err(db_err)
    }

    async fn set_recipient_sent(&self, id: RecipientId, sent_at: DateTime<Utc>) -> Result<bool> {
        self.recipients.mark_sent(id, sent_at).await.map_err(db_err)
    }

    async fn set_recipient_failed(&self, id: RecipientId, error: &str) -> Result<bool> {
        self.recipients.mark_failed(id, error).await.map_err(db_err)
    }

    async fn finish_campaign(
        &self,
        id: CampaignId,
        status: CampaignStatus,
        stats: CampaignStats,
        sent_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.campaigns
            .finish(id, status, stats, sent_at)
            .await
            .map_err(db_err)
    }

    async fn fail_campaign(&self, id: CampaignId) -> Result<bool> {
        self.campaigns.mark_failed(id).await.map_err(db_err)
    }
}

#[async_trait]
impl SweepStore for DbDispatchStore {
    async fn sending_activity(&self) -> Result<Vec<CampaignActivity>> {
        self.campaigns.list_sending_activity().await.map_err(db_err)
    }

    async fn count_recipients(&self, campaign_id: CampaignId) -> Result<RecipientCounts> {
        self.recipients
            .count_by_status(campaign_id)
            .await
            .map_err(db_err)
    }

    async fn close_campaign(
        &self,
        id: CampaignId,
        status: CampaignStatus,
        stats: CampaignStats,
        closed_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.campaigns
            .finish(id, status, stats, closed_at)
            .await
            .map_err(db_err)
    }
}
