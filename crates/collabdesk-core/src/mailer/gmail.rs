//! Gmail REST API sender

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE, Engine};
use collabdesk_common::config::MailConfig;
use lettre::message::Mailbox;
use std::time::Duration;
use tracing::debug;

use super::{build_message, sender_mailbox, MailCredential, MailError, MailSender, OutboundEmail};

/// Longest provider error body kept on a failed recipient
const MAX_ERROR_BODY: usize = 500;

/// Sends through `users.messages.send`, the credential being an OAuth
/// access token for the sending account
pub struct GmailSender {
    client: reqwest::Client,
    endpoint: String,
    from: Mailbox,
}

impl GmailSender {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MailError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/gmail/v1/users/me/messages/send",
                config.gmail_api_url.trim_end_matches('/')
            ),
            from: sender_mailbox(config)?,
        })
    }
}

#[async_trait]
impl MailSender for GmailSender {
    async fn send(
        &self,
        email: &OutboundEmail,
        credential: &MailCredential,
    ) -> Result<(), MailError> {
        let message = build_message(&self.from, email)?;
        let raw = URL_SAFE.encode(message.formatted());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential.expose())
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(to = %email.to, "Gmail accepted message");
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }

        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> MailConfig {
        MailConfig {
            from_address: "team@agency.example".to_string(),
            gmail_api_url: server.uri(),
            ..MailConfig::default()
        }
    }

    fn email() -> OutboundEmail {
        OutboundEmail {
            to: "jane@example.com".to_string(),
            to_name: None,
            subject: "Hi Jane".to_string(),
            html_body: "<p>From Acme</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_posts_raw_message_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .and(header("authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "m1"})))
            .expect(1)
            .mount(&server)
            .await;

        let sender = GmailSender::new(&config(&server)).unwrap();
        sender
            .send(&email(), &MailCredential::new("token-123"))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let raw = URL_SAFE.decode(body["raw"].as_str().unwrap()).unwrap();
        let raw = String::from_utf8(raw).unwrap();
        assert!(raw.contains("Subject: Hi Jane"));
        assert!(raw.contains("<p>From Acme</p>"));
    }

    #[tokio::test]
    async fn test_non_success_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
            .mount(&server)
            .await;

        let sender = GmailSender::new(&config(&server)).unwrap();
        let err = sender
            .send(&email(), &MailCredential::new("expired"))
            .await
            .unwrap_err();

        match err {
            MailError::Rejected { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid credentials");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_recipient_never_reaches_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let sender = GmailSender::new(&config(&server)).unwrap();
        let mut bad = email();
        bad.to = "nobody".to_string();
        let err = sender.send(&bad, &MailCredential::new("t")).await.unwrap_err();
        assert!(matches!(err, MailError::InvalidMessage(_)));
    }
}
