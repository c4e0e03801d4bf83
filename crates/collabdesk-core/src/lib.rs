//! Collabdesk Core - Campaign dispatch
//!
//! This crate provides template substitution, the static email template
//! catalog, the mail-sending collaborators, send pacing, the campaign
//! dispatch engine and the stuck-campaign sweeper.

pub mod dispatch;
pub mod mailer;
pub mod pacer;
pub mod sweeper;
pub mod template;
pub mod templates;

pub use dispatch::{DispatchEngine, DispatchError};
pub use mailer::{GmailSender, MailCredential, MailError, MailSender, OutboundEmail, SmtpSender};
pub use pacer::{FixedIntervalPacer, SendPacer};
pub use sweeper::StuckCampaignSweeper;
pub use template::{extract_variables, substitute};
pub use templates::EmailTemplate;
