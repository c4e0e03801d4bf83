//! Stuck-campaign sweeper
//!
//! A dispatch that dies mid-run (process crash, lost database connection
//! during the recovery write) leaves its campaign in `sending` forever.
//! The sweeper finds such campaigns by the absence of any recent write to
//! the campaign or its recipients and closes them out as `failed`.

use chrono::{DateTime, Utc};
use collabdesk_common::config::DispatchConfig;
use collabdesk_common::types::CampaignStatus;
use collabdesk_common::Result;
use collabdesk_storage::repository::SweepStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Oldest activity timestamp still considered alive
pub fn stale_cutoff(now: DateTime<Utc>, stale_after: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(stale_after)
        .ok()
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Background worker repairing campaigns stuck in `sending`
pub struct StuckCampaignSweeper {
    store: Arc<dyn SweepStore>,
    stale_after: Duration,
    sweep_interval: Duration,
}

impl StuckCampaignSweeper {
    pub fn new(store: Arc<dyn SweepStore>, config: &DispatchConfig) -> Self {
        Self {
            store,
            stale_after: Duration::from_secs(config.stale_after_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
        }
    }

    /// Run forever
    pub async fn run(&self) {
        let mut ticker = interval(self.sweep_interval);

        info!(
            "Stuck-campaign sweeper started (interval: {}s, stale after: {}s)",
            self.sweep_interval.as_secs(),
            self.stale_after.as_secs()
        );

        loop {
            ticker.tick().await;

            if let Err(e) = self.sweep_once().await {
                error!("Error sweeping stuck campaigns: {}", e);
            }
        }
    }

    /// Close out every stale `sending` campaign. Returns how many were repaired.
    pub async fn sweep_once(&self) -> Result<usize> {
        self.sweep_at(Utc::now()).await
    }

    async fn sweep_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = stale_cutoff(now, self.stale_after);

        let stale: Vec<_> = self
            .store
            .sending_activity()
            .await?
            .into_iter()
            .filter(|c| c.last_activity < cutoff)
            .collect();

        let mut repaired = 0;
        for campaign in stale {
            let counts = match self.store.count_recipients(campaign.id).await {
                Ok(counts) => counts,
                Err(e) => {
                    warn!(campaign_id = %campaign.id, "Failed to count recipients: {}", e);
                    continue;
                }
            };

            let stats = counts.to_stats();
            match self
                .store
                .close_campaign(campaign.id, CampaignStatus::Failed, stats, now)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    debug!(campaign_id = %campaign.id, "Campaign left sending before it was swept");
                    continue;
                }
                Err(e) => {
                    warn!(campaign_id = %campaign.id, "Failed to close stuck campaign: {}", e);
                    continue;
                }
            }

            warn!(
                campaign_id = %campaign.id,
                sent = stats.sent,
                failed = stats.failed,
                pending = stats.pending,
                "Stuck campaign marked failed"
            );
            repaired += 1;
        }

        Ok(repaired)
    }
}
