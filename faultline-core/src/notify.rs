//! Operator-channel notifications.
//!
//! Provides a `Notifier` trait with one concrete transport:
//! - **Webhook**: POSTs a chat-webhook embed (Discord/Slack-compatible
//!   `embeds` payload) to a configured URL
//!
//! Sends are attempted once. Callers decide what a failure means; the
//! capture pipeline logs and moves on.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const EMBED_COLOR: u32 = 0xf04747;

/// What the operator sees for one captured failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub context_label: String,
    pub user_id: Option<String>,
    pub command: Option<String>,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing webhook URL")]
    MissingUrl,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Transport name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Webhook payload structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct WebhookPayload {
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    color: u32,
    fields: Vec<EmbedField>,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: &'static str,
    value: String,
    inline: bool,
}

fn field(name: &'static str, value: String) -> EmbedField {
    EmbedField {
        name,
        value,
        inline: true,
    }
}

fn build_payload(n: &Notification) -> WebhookPayload {
    let fields = vec![
        field("Error ID", n.id.clone()),
        field("Context", n.context_label.clone()),
        field(
            "User",
            n.user_id
                .as_ref()
                .map(|u| format!("<@{}>", u))
                .unwrap_or_else(|| "Unknown".to_string()),
        ),
        field(
            "Command",
            n.command.clone().unwrap_or_else(|| "Unknown".to_string()),
        ),
        field(
            "Guild",
            n.guild_id.clone().unwrap_or_else(|| "DM/Unknown".to_string()),
        ),
        field(
            "Channel",
            n.channel_id
                .as_ref()
                .map(|c| format!("<#{}>", c))
                .unwrap_or_else(|| "Unknown".to_string()),
        ),
    ];

    WebhookPayload {
        embeds: vec![Embed {
            title: "Error Captured".to_string(),
            color: EMBED_COLOR,
            fields,
            timestamp: Utc::now().to_rfc3339(),
        }],
    }
}

// ============================================================================
// WebhookNotifier
// ============================================================================

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(NotifyError::MissingUrl);
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = build_payload(notification);
        let response = self.client.post(&self.url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                code: status.as_u16(),
                message,
            });
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notification() -> Notification {
        Notification {
            id: "0aa4671e".to_string(),
            context_label: "command:pay".to_string(),
            user_id: Some("42".to_string()),
            command: None,
            guild_id: None,
            channel_id: Some("7".to_string()),
        }
    }

    #[test]
    fn test_payload_fallbacks() {
        let payload = serde_json::to_value(build_payload(&notification())).unwrap();
        let fields = payload["embeds"][0]["fields"].as_array().unwrap();
        let value = |name: &str| {
            fields
                .iter()
                .find(|f| f["name"] == name)
                .and_then(|f| f["value"].as_str())
                .unwrap()
                .to_string()
        };
        assert_eq!(value("Error ID"), "0aa4671e");
        assert_eq!(value("User"), "<@42>");
        assert_eq!(value("Command"), "Unknown");
        assert_eq!(value("Guild"), "DM/Unknown");
        assert_eq!(value("Channel"), "<#7>");
    }

    #[test]
    fn test_empty_url_rejected() {
        match WebhookNotifier::new("  ", Duration::from_secs(1)) {
            Err(NotifyError::MissingUrl) => {}
            other => panic!("Expected MissingUrl, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_webhook_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({
                "embeds": [{"title": "Error Captured"}]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier =
            WebhookNotifier::new(format!("{}/hook", mock_server.uri()), Duration::from_secs(5))
                .unwrap();
        notifier.notify(&notification()).await.unwrap();
        assert_eq!(notifier.name(), "webhook");
    }

    #[tokio::test]
    async fn test_webhook_server_error_is_reported_once() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = WebhookNotifier::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
        match notifier.notify(&notification()).await {
            Err(NotifyError::Api { code, message }) => {
                assert_eq!(code, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }
}
