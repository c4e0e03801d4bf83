//! Mail-sending collaborators used by the dispatch engine

mod gmail;
mod smtp;

pub use gmail::GmailSender;
pub use smtp::SmtpSender;

use async_trait::async_trait;
use collabdesk_common::config::{MailConfig, MailProvider};
use lettre::message::{header::ContentType, Mailbox};
use lettre::{Address, Message};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Failure of a single send call
#[derive(Error, Debug)]
pub enum MailError {
    #[error("Provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

impl From<MailError> for collabdesk_common::Error {
    fn from(e: MailError) -> Self {
        collabdesk_common::Error::Mail(e.to_string())
    }
}

/// Outbound access token supplied by the caller of a dispatch
#[derive(Clone)]
pub struct MailCredential(String);

impl MailCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for handing to the provider
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for MailCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MailCredential(***)")
    }
}

/// One personalized email ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html_body: String,
}

/// Sends a single email. Any error is a per-recipient failure to the caller.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, email: &OutboundEmail, credential: &MailCredential)
        -> Result<(), MailError>;
}

/// From mailbox built from the mail configuration
pub(crate) fn sender_mailbox(config: &MailConfig) -> Result<Mailbox, MailError> {
    let address: Address = config
        .from_address
        .parse()
        .map_err(|e| MailError::InvalidMessage(format!("Invalid from address: {}", e)))?;
    Ok(Mailbox::new(config.from_name.clone(), address))
}

/// Build an RFC 5322 HTML message
pub(crate) fn build_message(from: &Mailbox, email: &OutboundEmail) -> Result<Message, MailError> {
    let address: Address = email
        .to
        .trim()
        .parse()
        .map_err(|e| MailError::InvalidMessage(format!("Invalid to address: {}", e)))?;
    let to = Mailbox::new(email.to_name.clone(), address);

    let message_id = format!("<{}@{}>", Uuid::new_v4(), from.email.domain());

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.as_str())
        .message_id(Some(message_id))
        .header(ContentType::TEXT_HTML)
        .body(email.html_body.clone())
        .map_err(|e| MailError::InvalidMessage(format!("Failed to build email: {}", e)))
}

/// Build the sender selected by `mail.provider`
pub fn from_config(config: &MailConfig) -> collabdesk_common::Result<Arc<dyn MailSender>> {
    let sender: Arc<dyn MailSender> = match config.provider {
        MailProvider::Gmail => Arc::new(GmailSender::new(config)?),
        MailProvider::Smtp => Arc::new(SmtpSender::new(config)?),
    };

    info!(
        provider = ?config.provider,
        from = %config.from_address,
        "Mail sender configured"
    );

    Ok(sender)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> OutboundEmail {
        OutboundEmail {
            to: to.to_string(),
            to_name: Some("Jane".to_string()),
            subject: "Hi Jane".to_string(),
            html_body: "<p>From Acme</p>".to_string(),
        }
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = MailCredential::new("ya29.secret-token");
        assert_eq!(format!("{:?}", credential), "MailCredential(***)");
        assert_eq!(credential.expose(), "ya29.secret-token");
    }

    #[test]
    fn test_build_message() {
        let config = MailConfig {
            from_address: "team@agency.example".to_string(),
            from_name: Some("Agency".to_string()),
            ..MailConfig::default()
        };
        let from = sender_mailbox(&config).unwrap();
        let raw = String::from_utf8(build_message(&from, &email("jane@example.com")).unwrap().formatted()).unwrap();

        assert!(raw.contains("Subject: Hi Jane"));
        assert!(raw.contains("jane@example.com"));
        assert!(raw.contains("team@agency.example"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_build_message_rejects_bad_recipient() {
        let from = sender_mailbox(&MailConfig::default()).unwrap();
        let err = build_message(&from, &email("not-an-address")).unwrap_err();
        assert!(matches!(err, MailError::InvalidMessage(_)));
    }

    #[test]
    fn test_mail_error_maps_to_common() {
        let err: collabdesk_common::Error = MailError::Transport("timed out".to_string()).into();
        assert_eq!(err.code(), "MAIL_ERROR");
    }
}
