//! SMTP relay sender authenticated with XOAUTH2

use async_trait::async_trait;
use collabdesk_common::config::MailConfig;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::time::Duration;
use tracing::debug;

use super::{build_message, sender_mailbox, MailCredential, MailError, MailSender, OutboundEmail};

/// Sends through an SMTP relay with STARTTLS. The credential is used as the
/// XOAUTH2 token for the configured from address.
pub struct SmtpSender {
    host: String,
    port: u16,
    timeout: Duration,
    from: Mailbox,
}

impl SmtpSender {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        Ok(Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            timeout: Duration::from_secs(config.timeout_secs),
            from: sender_mailbox(config)?,
        })
    }
}

#[async_trait]
impl MailSender for SmtpSender {
    async fn send(
        &self,
        email: &OutboundEmail,
        credential: &MailCredential,
    ) -> Result<(), MailError> {
        let message = build_message(&self.from, email)?;

        // Credentials differ per dispatch, so the transport is built per send
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .map_err(|e| MailError::Transport(format!("Failed to create SMTP transport: {}", e)))?
            .port(self.port)
            .credentials(Credentials::new(
                self.from.email.to_string(),
                credential.expose().to_string(),
            ))
            .authentication(vec![Mechanism::Xoauth2])
            .timeout(Some(self.timeout))
            .build();

        match transport.send(message).await {
            Ok(response) => {
                debug!(to = %email.to, code = %response.code(), "SMTP relay accepted message");
                Ok(())
            }
            Err(e) => match e.status() {
                Some(code) => Err(MailError::Rejected {
                    status: code.to_string().parse().unwrap_or_default(),
                    body: e.to_string(),
                }),
                None => Err(MailError::Transport(e.to_string())),
            },
        }
    }
}
