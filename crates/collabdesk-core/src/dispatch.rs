//! Campaign dispatch engine
//!
//! Sends one draft campaign to all of its recipients, one at a time:
//!
//! 1. Preconditions (campaign exists, is draft, has recipients, a credential
//!    was supplied) are checked before anything is written.
//! 2. The campaign moves to `sending` with a conditional update, so a second
//!    concurrent dispatch of the same campaign is rejected.
//! 3. Each recipient gets a personalized subject and body, one send call,
//!    and a write-once status update. A failed send is recorded and the loop
//!    moves on.
//! 4. The final status and stats are persisted and returned.
//!
//! A store error anywhere after step 2 triggers a best-effort write that
//! forces the campaign to `failed`. Closing writes only apply while the
//! campaign is still `sending`, so a campaign the sweeper already closed
//! keeps its status.

use chrono::Utc;
use collabdesk_common::types::{CampaignId, CampaignStats, CampaignStatus, UserId};
use collabdesk_storage::models::{Campaign, CampaignRecipient};
use collabdesk_storage::repository::DispatchStore;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::mailer::{MailCredential, MailSender, OutboundEmail};
use crate::pacer::SendPacer;
use crate::template::substitute;

/// Variable carrying the recipient's display name
pub const INFLUENCER_NAME_VAR: &str = "influencerName";

/// Dispatch errors
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Campaign not found: {0}")]
    NotFound(CampaignId),

    #[error("Campaign already sent")]
    AlreadySent,

    #[error("Campaign has no recipients")]
    NoRecipients,

    #[error("Mail credential is required")]
    MissingCredential,

    #[error(transparent)]
    Store(#[from] collabdesk_common::Error),
}

impl From<DispatchError> for collabdesk_common::Error {
    fn from(e: DispatchError) -> Self {
        use collabdesk_common::Error;
        let message = e.to_string();
        match e {
            DispatchError::NotFound(id) => Error::NotFound(format!("Campaign {}", id)),
            DispatchError::AlreadySent | DispatchError::NoRecipients => Error::InvalidState(message),
            DispatchError::MissingCredential => Error::BadRequest(message),
            DispatchError::Store(inner) => inner,
        }
    }
}

/// Merge campaign-level variables, the recipient name and the recipient's
/// custom fields. Later sources win on key collisions.
pub fn personalization_variables(
    campaign_variables: &HashMap<String, String>,
    recipient: &CampaignRecipient,
) -> HashMap<String, String> {
    let mut variables = campaign_variables.clone();
    variables.insert(INFLUENCER_NAME_VAR.to_string(), recipient.name.clone());
    variables.extend(recipient.custom_fields_map());
    variables
}

/// Personalized email for one recipient
pub fn personalize(
    campaign: &Campaign,
    campaign_variables: &HashMap<String, String>,
    recipient: &CampaignRecipient,
) -> OutboundEmail {
    let variables = personalization_variables(campaign_variables, recipient);
    OutboundEmail {
        to: recipient.email.clone(),
        to_name: Some(recipient.name.clone()).filter(|n| !n.trim().is_empty()),
        subject: substitute(&campaign.subject, &variables),
        html_body: substitute(&campaign.content, &variables),
    }
}

/// Campaign dispatch engine
pub struct DispatchEngine {
    store: Arc<dyn DispatchStore>,
    mailer: Arc<dyn MailSender>,
    pacer: Arc<dyn SendPacer>,
}

impl DispatchEngine {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        mailer: Arc<dyn MailSender>,
        pacer: Arc<dyn SendPacer>,
    ) -> Self {
        Self {
            store,
            mailer,
            pacer,
        }
    }

    /// Send a draft campaign owned by `owner` to all of its recipients and
    /// return the final stats. Runs until every recipient was attempted.
    pub async fn dispatch(
        &self,
        owner: UserId,
        campaign_id: CampaignId,
        credential: Option<&str>,
    ) -> Result<CampaignStats, DispatchError> {
        let campaign = self
            .store
            .get_campaign(owner, campaign_id)
            .await?
            .ok_or(DispatchError::NotFound(campaign_id))?;

        if !campaign.is_draft() {
            return Err(DispatchError::AlreadySent);
        }

        let recipients = self.store.list_recipients(campaign_id).await?;
        if recipients.is_empty() {
            return Err(DispatchError::NoRecipients);
        }

        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(MailCredential::new)
            .ok_or(DispatchError::MissingCredential)?;

        if !self.store.begin_sending(campaign_id).await? {
            warn!(campaign_id = %campaign_id, "Campaign left draft before dispatch could start");
            return Err(DispatchError::AlreadySent);
        }

        match self.run(&campaign, &credential).await {
            Ok(stats) => Ok(stats),
            Err(e) => {
                error!(campaign_id = %campaign_id, error = %e, "Campaign dispatch aborted");
                match self.store.fail_campaign(campaign_id).await {
                    Ok(true) => {}
                    Ok(false) => warn!(campaign_id = %campaign_id, "Campaign was already closed"),
                    Err(recovery) => error!(
                        campaign_id = %campaign_id,
                        error = %recovery,
                        "Failed to mark campaign failed, it stays in sending"
                    ),
                }
                Err(e)
            }
        }
    }

    /// Run [`dispatch`](Self::dispatch) on its own task. Dropping the
    /// returned future does not cancel the run.
    pub async fn dispatch_detached(
        self: &Arc<Self>,
        owner: UserId,
        campaign_id: CampaignId,
        credential: Option<String>,
    ) -> Result<CampaignStats, DispatchError> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine
                .dispatch(owner, campaign_id, credential.as_deref())
                .await
        })
        .await
        .map_err(|e| {
            error!(campaign_id = %campaign_id, "Dispatch task did not complete: {}", e);
            DispatchError::Store(collabdesk_common::Error::Internal(e.to_string()))
        })?
    }

    async fn run(
        &self,
        campaign: &Campaign,
        credential: &MailCredential,
    ) -> Result<CampaignStats, DispatchError> {
        // Recipients removed before the campaign left draft are not sent.
        let recipients = self.store.list_recipients(campaign.id).await?;

        info!(
            campaign_id = %campaign.id,
            recipients = recipients.len(),
            "Campaign dispatch started"
        );

        let campaign_variables = campaign.template_variables_map();
        let mut sent = 0;
        let mut failed = 0;

        for (index, recipient) in recipients.iter().enumerate() {
            if index > 0 {
                self.pacer.pause().await;
            }

            let email = personalize(campaign, &campaign_variables, recipient);

            let recorded = match self.mailer.send(&email, credential).await {
                Ok(()) => {
                    sent += 1;
                    debug!(campaign_id = %campaign.id, recipient_id = %recipient.id, "Email sent");
                    self.store
                        .set_recipient_sent(recipient.id, Utc::now())
                        .await?
                }
                Err(e) => {
                    failed += 1;
                    warn!(
                        campaign_id = %campaign.id,
                        recipient_id = %recipient.id,
                        error = %e,
                        "Email send failed"
                    );
                    self.store
                        .set_recipient_failed(recipient.id, &e.to_string())
                        .await?
                }
            };

            if !recorded {
                warn!(
                    recipient_id = %recipient.id,
                    "Recipient was no longer pending, status left unchanged"
                );
            }
        }

        let status = CampaignStatus::from_outcome(sent, failed);
        let stats = CampaignStats::finished(sent, failed);

        if !self
            .store
            .finish_campaign(campaign.id, status, stats, Utc::now())
            .await?
        {
            warn!(
                campaign_id = %campaign.id,
                status = %status,
                sent,
                failed,
                "Campaign was closed while sending, final status left unchanged"
            );
            return Ok(stats);
        }

        info!(
            campaign_id = %campaign.id,
            status = %status,
            sent,
            failed,
            "Campaign dispatch finished"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::MailError;
    use crate::pacer::FixedIntervalPacer;
    use async_trait::async_trait;
    use chrono::DateTime;
    use collabdesk_common::types::{RecipientId, RecipientStatus};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq)]
    enum Write {
        BeginSending(CampaignId),
        RecipientSent(RecipientId),
        RecipientFailed(RecipientId, String),
        Finish(CampaignId, CampaignStatus, CampaignStats),
        FailCampaign(CampaignId),
    }

    #[derive(Default)]
    struct MemoryStore {
        campaigns: Mutex<HashMap<CampaignId, Campaign>>,
        recipients: Mutex<Vec<CampaignRecipient>>,
        writes: Mutex<Vec<Write>>,
        fail_finish: bool,
        /// Close the campaign as failed after this many recipient writes
        closed_after: Option<usize>,
        /// Remove the recipient at this index when the campaign leaves draft
        removed_on_begin: Option<usize>,
    }

    impl MemoryStore {
        fn writes(&self) -> Vec<Write> {
            self.writes.lock().unwrap().clone()
        }

        fn campaign(&self, id: CampaignId) -> Campaign {
            self.campaigns.lock().unwrap()[&id].clone()
        }

        fn recipient_statuses(&self) -> Vec<String> {
            self.recipients
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.status.clone())
                .collect()
        }

        fn set_recipient(&self, id: RecipientId, status: RecipientStatus, error: Option<&str>) -> bool {
            let recipient_writes = self
                .writes()
                .iter()
                .filter(|w| matches!(w, Write::RecipientSent(_) | Write::RecipientFailed(..)))
                .count();
            if self.closed_after == Some(recipient_writes) {
                for campaign in self.campaigns.lock().unwrap().values_mut() {
                    campaign.status = "failed".to_string();
                }
            }

            let mut recipients = self.recipients.lock().unwrap();
            match recipients.iter_mut().find(|r| r.id == id) {
                Some(r) if r.status == "pending" => {
                    r.status = status.to_string();
                    r.error_message = error.map(str::to_string);
                    true
                }
                _ => false,
            }
        }
    }

    #[async_trait]
    impl DispatchStore for MemoryStore {
        async fn get_campaign(
            &self,
            owner: UserId,
            id: CampaignId,
        ) -> collabdesk_common::Result<Option<Campaign>> {
            Ok(self
                .campaigns
                .lock()
                .unwrap()
                .get(&id)
                .filter(|c| c.user_id == owner)
                .cloned())
        }

        async fn list_recipients(
            &self,
            campaign_id: CampaignId,
        ) -> collabdesk_common::Result<Vec<CampaignRecipient>> {
            Ok(self
                .recipients
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.campaign_id == campaign_id)
                .cloned()
                .collect())
        }

        async fn begin_sending(&self, id: CampaignId) -> collabdesk_common::Result<bool> {
            let mut campaigns = self.campaigns.lock().unwrap();
            let campaign = campaigns.get_mut(&id).unwrap();
            if campaign.status != "draft" {
                return Ok(false);
            }
            campaign.status = "sending".to_string();
            self.writes.lock().unwrap().push(Write::BeginSending(id));
            if let Some(index) = self.removed_on_begin {
                self.recipients.lock().unwrap().remove(index);
            }
            Ok(true)
        }

        async fn set_recipient_sent(
            &self,
            id: RecipientId,
            _sent_at: DateTime<Utc>,
        ) -> collabdesk_common::Result<bool> {
            self.writes.lock().unwrap().push(Write::RecipientSent(id));
            Ok(self.set_recipient(id, RecipientStatus::Sent, None))
        }

        async fn set_recipient_failed(
            &self,
            id: RecipientId,
            error: &str,
        ) -> collabdesk_common::Result<bool> {
            self.writes
                .lock()
                .unwrap()
                .push(Write::RecipientFailed(id, error.to_string()));
            Ok(self.set_recipient(id, RecipientStatus::Failed, Some(error)))
        }

        async fn finish_campaign(
            &self,
            id: CampaignId,
            status: CampaignStatus,
            stats: CampaignStats,
            _sent_at: DateTime<Utc>,
        ) -> collabdesk_common::Result<bool> {
            if self.fail_finish {
                return Err(collabdesk_common::Error::Database("connection reset".to_string()));
            }
            self.writes.lock().unwrap().push(Write::Finish(id, status, stats));
            let mut campaigns = self.campaigns.lock().unwrap();
            let campaign = campaigns.get_mut(&id).unwrap();
            if campaign.status != "sending" {
                return Ok(false);
            }
            campaign.status = status.to_string();
            campaign.stats_total = stats.total;
            campaign.stats_sent = stats.sent;
            campaign.stats_failed = stats.failed;
            campaign.stats_pending = stats.pending;
            Ok(true)
        }

        async fn fail_campaign(&self, id: CampaignId) -> collabdesk_common::Result<bool> {
            self.writes.lock().unwrap().push(Write::FailCampaign(id));
            let mut campaigns = self.campaigns.lock().unwrap();
            let campaign = campaigns.get_mut(&id).unwrap();
            if campaign.status != "sending" {
                return Ok(false);
            }
            campaign.status = "failed".to_string();
            Ok(true)
        }
    }

    /// Fails sends to the listed addresses and records every email it sees
    #[derive(Default)]
    struct ScriptedSender {
        failing: Vec<String>,
        sent: Mutex<Vec<OutboundEmail>>,
    }

    impl ScriptedSender {
        fn failing(addresses: &[&str]) -> Self {
            Self {
                failing: addresses.iter().map(|a| a.to_string()).collect(),
                sent: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl MailSender for ScriptedSender {
        async fn send(
            &self,
            email: &OutboundEmail,
            _credential: &MailCredential,
        ) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(email.clone());
            if self.failing.contains(&email.to) {
                return Err(MailError::Rejected {
                    status: 400,
                    body: "Invalid To header".to_string(),
                });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingPacer {
        pauses: AtomicUsize,
    }

    #[async_trait]
    impl SendPacer for CountingPacer {
        async fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn campaign(owner: UserId, status: &str) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            user_id: owner,
            name: "Spring launch".to_string(),
            subject: "Hi {influencerName}".to_string(),
            content: "From {companyName}".to_string(),
            status: status.to_string(),
            stats_total: 0,
            stats_sent: 0,
            stats_failed: 0,
            stats_pending: 0,
            template_id: None,
            template_variables: json!({"companyName": "Acme"}),
            sent_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn recipient(campaign_id: CampaignId, name: &str, email: &str) -> CampaignRecipient {
        CampaignRecipient {
            id: Uuid::new_v4(),
            campaign_id,
            name: name.to_string(),
            email: email.to_string(),
            platform: Some("instagram".to_string()),
            followers: Some(12_000),
            category: Some("beauty".to_string()),
            tags: json!([]),
            custom_fields: json!({}),
            recipient_type: "creator".to_string(),
            tiktok: false,
            instagram: true,
            youtube: false,
            ugc: false,
            status: "pending".to_string(),
            sent_at: None,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    struct Fixture {
        owner: UserId,
        campaign_id: CampaignId,
        store: Arc<MemoryStore>,
        sender: Arc<ScriptedSender>,
        pacer: Arc<CountingPacer>,
        engine: DispatchEngine,
    }

    fn fixture(status: &str, emails: &[&str], sender: ScriptedSender, store: MemoryStore) -> Fixture {
        let owner = Uuid::new_v4();
        let campaign = campaign(owner, status);
        let campaign_id = campaign.id;
        store.campaigns.lock().unwrap().insert(campaign_id, campaign);
        {
            let mut recipients = store.recipients.lock().unwrap();
            for (i, email) in emails.iter().enumerate() {
                recipients.push(recipient(campaign_id, &format!("Creator {}", i + 1), email));
            }
        }

        let store = Arc::new(store);
        let sender = Arc::new(sender);
        let pacer = Arc::new(CountingPacer::default());
        let engine = DispatchEngine::new(store.clone(), sender.clone(), pacer.clone());

        Fixture {
            owner,
            campaign_id,
            store,
            sender,
            pacer,
            engine,
        }
    }

    #[tokio::test]
    async fn test_missing_campaign_is_not_found() {
        let f = fixture("draft", &["a@x.com"], ScriptedSender::default(), MemoryStore::default());
        let err = f
            .engine
            .dispatch(f.owner, Uuid::new_v4(), Some("token"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(_)));
        assert!(f.store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_other_users_campaign_is_not_found() {
        let f = fixture("draft", &["a@x.com"], ScriptedSender::default(), MemoryStore::default());
        let err = f
            .engine
            .dispatch(Uuid::new_v4(), f.campaign_id, Some("token"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(_)));
        assert!(f.store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_non_draft_campaign_is_rejected_without_writes() {
        for status in ["sending", "sent", "failed"] {
            let f = fixture(status, &["a@x.com"], ScriptedSender::default(), MemoryStore::default());
            let err = f
                .engine
                .dispatch(f.owner, f.campaign_id, Some("token"))
                .await
                .unwrap_err();
            assert!(matches!(err, DispatchError::AlreadySent));
            assert!(f.store.writes().is_empty());
            assert!(f.sender.sent.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_no_recipients_is_rejected_without_writes() {
        let f = fixture("draft", &[], ScriptedSender::default(), MemoryStore::default());
        let err = f
            .engine
            .dispatch(f.owner, f.campaign_id, Some("token"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoRecipients));
        assert!(f.store.writes().is_empty());
        assert_eq!(f.store.campaign(f.campaign_id).status, "draft");
    }

    #[tokio::test]
    async fn test_missing_credential_is_bad_request() {
        for credential in [None, Some(""), Some("   ")] {
            let f = fixture("draft", &["a@x.com"], ScriptedSender::default(), MemoryStore::default());
            let err = f
                .engine
                .dispatch(f.owner, f.campaign_id, credential)
                .await
                .unwrap_err();
            assert!(matches!(err, DispatchError::MissingCredential));
            assert!(f.store.writes().is_empty());

            let common: collabdesk_common::Error = err.into();
            assert_eq!(common.status_code(), 400);
        }
    }

    #[tokio::test]
    async fn test_all_sent() {
        let f = fixture(
            "draft",
            &["a@x.com", "b@x.com"],
            ScriptedSender::default(),
            MemoryStore::default(),
        );
        let stats = f
            .engine
            .dispatch(f.owner, f.campaign_id, Some("token"))
            .await
            .unwrap();

        assert_eq!(stats, CampaignStats { total: 2, sent: 2, failed: 0, pending: 0 });
        assert_eq!(f.store.campaign(f.campaign_id).status, "sent");
        assert_eq!(f.store.recipient_statuses(), vec!["sent", "sent"]);
    }

    #[tokio::test]
    async fn test_partial_failure_continues_and_finishes_sent() {
        let f = fixture(
            "draft",
            &["a@x.com", "b@x.com", "c@x.com"],
            ScriptedSender::failing(&["b@x.com"]),
            MemoryStore::default(),
        );
        let stats = f
            .engine
            .dispatch(f.owner, f.campaign_id, Some("token"))
            .await
            .unwrap();

        assert_eq!(stats, CampaignStats { total: 3, sent: 2, failed: 1, pending: 0 });
        assert_eq!(f.store.recipient_statuses(), vec!["sent", "failed", "sent"]);

        let campaign = f.store.campaign(f.campaign_id);
        assert_eq!(campaign.status, "sent");
        assert_eq!(campaign.stats(), stats);

        let failed = f.store.recipients.lock().unwrap()[1].clone();
        assert_eq!(
            failed.error_message.as_deref(),
            Some("Provider rejected message (400): Invalid To header")
        );
    }

    #[tokio::test]
    async fn test_all_failures_finish_failed() {
        let emails = ["a@x.com", "b@x.com", "c@x.com", "d@x.com"];
        let f = fixture(
            "draft",
            &emails,
            ScriptedSender::failing(&emails),
            MemoryStore::default(),
        );
        let stats = f
            .engine
            .dispatch(f.owner, f.campaign_id, Some("token"))
            .await
            .unwrap();

        assert_eq!(stats.sent, 0);
        assert_eq!(stats.failed, 4);
        assert_eq!(stats.pending, 0);
        assert_eq!(f.store.campaign(f.campaign_id).status, "failed");
    }

    #[tokio::test]
    async fn test_personalizes_each_recipient_in_order() {
        let f = fixture(
            "draft",
            &["jane@x.com", "omar@x.com"],
            ScriptedSender::default(),
            MemoryStore::default(),
        );
        {
            let mut recipients = f.store.recipients.lock().unwrap();
            recipients[0].name = "Jane".to_string();
            recipients[1].name = "Omar".to_string();
            recipients[1].custom_fields = json!({"companyName": "Acme Studio"});
        }

        f.engine
            .dispatch(f.owner, f.campaign_id, Some("token"))
            .await
            .unwrap();

        let sent = f.sender.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "jane@x.com");
        assert_eq!(sent[0].subject, "Hi Jane");
        assert_eq!(sent[0].html_body, "From Acme");
        assert_eq!(sent[1].subject, "Hi Omar");
        assert_eq!(sent[1].html_body, "From Acme Studio");
    }

    #[tokio::test]
    async fn test_pacer_runs_between_recipients_only() {
        let f = fixture(
            "draft",
            &["a@x.com", "b@x.com", "c@x.com"],
            ScriptedSender::failing(&["a@x.com"]),
            MemoryStore::default(),
        );
        f.engine
            .dispatch(f.owner, f.campaign_id, Some("token"))
            .await
            .unwrap();
        assert_eq!(f.pacer.pauses.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_dispatch_is_rejected_and_statuses_stay() {
        let f = fixture(
            "draft",
            &["a@x.com", "b@x.com"],
            ScriptedSender::failing(&["b@x.com"]),
            MemoryStore::default(),
        );
        f.engine
            .dispatch(f.owner, f.campaign_id, Some("token"))
            .await
            .unwrap();
        let writes_after_first = f.store.writes().len();

        let err = f
            .engine
            .dispatch(f.owner, f.campaign_id, Some("token"))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::AlreadySent));
        assert_eq!(f.store.writes().len(), writes_after_first);
        assert_eq!(f.store.recipient_statuses(), vec!["sent", "failed"]);
        assert_eq!(f.sender.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_write_sequence() {
        let f = fixture("draft", &["a@x.com"], ScriptedSender::default(), MemoryStore::default());
        let recipient_id = f.store.recipients.lock().unwrap()[0].id;

        f.engine
            .dispatch(f.owner, f.campaign_id, Some("token"))
            .await
            .unwrap();

        assert_eq!(
            f.store.writes(),
            vec![
                Write::BeginSending(f.campaign_id),
                Write::RecipientSent(recipient_id),
                Write::Finish(
                    f.campaign_id,
                    CampaignStatus::Sent,
                    CampaignStats { total: 1, sent: 1, failed: 0, pending: 0 }
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_store_failure_forces_campaign_failed() {
        let store = MemoryStore {
            fail_finish: true,
            ..MemoryStore::default()
        };
        let f = fixture("draft", &["a@x.com"], ScriptedSender::default(), store);

        let err = f
            .engine
            .dispatch(f.owner, f.campaign_id, Some("token"))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Store(_)));
        assert_eq!(f.store.writes().last(), Some(&Write::FailCampaign(f.campaign_id)));
        assert_eq!(f.store.campaign(f.campaign_id).status, "failed");
    }

    #[tokio::test]
    async fn test_campaign_closed_mid_run_keeps_its_status() {
        let store = MemoryStore {
            closed_after: Some(1),
            ..MemoryStore::default()
        };
        let f = fixture("draft", &["a@x.com", "b@x.com", "c@x.com"], ScriptedSender::default(), store);

        let stats = f
            .engine
            .dispatch(f.owner, f.campaign_id, Some("token"))
            .await
            .unwrap();

        assert_eq!(stats, CampaignStats { total: 3, sent: 3, failed: 0, pending: 0 });
        let campaign = f.store.campaign(f.campaign_id);
        assert_eq!(campaign.status, "failed");
        assert_eq!(campaign.stats_sent, 0);
        assert!(matches!(f.store.writes().last(), Some(Write::Finish(..))));
    }

    #[tokio::test]
    async fn test_recipient_removed_before_sending_is_skipped() {
        let store = MemoryStore {
            removed_on_begin: Some(1),
            ..MemoryStore::default()
        };
        let f = fixture("draft", &["a@x.com", "b@x.com", "c@x.com"], ScriptedSender::default(), store);

        let stats = f
            .engine
            .dispatch(f.owner, f.campaign_id, Some("token"))
            .await
            .unwrap();

        let sent: Vec<String> = f.sender.sent.lock().unwrap().iter().map(|e| e.to.clone()).collect();
        assert_eq!(sent, vec!["a@x.com", "c@x.com"]);
        assert_eq!(stats, CampaignStats { total: 2, sent: 2, failed: 0, pending: 0 });
        assert_eq!(f.store.campaign(f.campaign_id).stats_total, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_dispatch_outlives_its_caller() {
        let owner = Uuid::new_v4();
        let campaign = campaign(owner, "draft");
        let campaign_id = campaign.id;
        let store = Arc::new(MemoryStore::default());
        store.campaigns.lock().unwrap().insert(campaign_id, campaign);
        for email in ["a@x.com", "b@x.com", "c@x.com"] {
            store
                .recipients
                .lock()
                .unwrap()
                .push(recipient(campaign_id, "Creator", email));
        }
        let engine = Arc::new(DispatchEngine::new(
            store.clone(),
            Arc::new(ScriptedSender::default()),
            Arc::new(FixedIntervalPacer::from_millis(1000)),
        ));

        // The caller gives up after the first send, halfway through a pause.
        let abandoned = tokio::time::timeout(
            Duration::from_millis(1500),
            engine.dispatch_detached(owner, campaign_id, Some("token".to_string())),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(store.campaign(campaign_id).status, "sending");

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(store.campaign(campaign_id).status, "sent");
        assert_eq!(store.recipient_statuses(), vec!["sent", "sent", "sent"]);
    }

    #[tokio::test]
    async fn test_detached_dispatch_returns_engine_errors() {
        let f = fixture("draft", &["a@x.com"], ScriptedSender::default(), MemoryStore::default());
        let engine = Arc::new(f.engine);
        let err = engine
            .dispatch_detached(f.owner, f.campaign_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::MissingCredential));
    }

    #[test]
    fn test_custom_fields_override_campaign_variables() {
        let campaign_id = Uuid::new_v4();
        let mut r = recipient(campaign_id, "Jane", "jane@x.com");
        r.custom_fields = json!({"discount": 20, "influencerName": "Janie"});

        let base: HashMap<String, String> =
            [("discount".to_string(), "10".to_string()), ("companyName".to_string(), "Acme".to_string())]
                .into_iter()
                .collect();
        let vars = personalization_variables(&base, &r);

        assert_eq!(vars["discount"], "20");
        assert_eq!(vars["companyName"], "Acme");
        assert_eq!(vars[INFLUENCER_NAME_VAR], "Janie");
    }
}
