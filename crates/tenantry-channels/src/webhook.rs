//! Push delivery through a JSON webhook.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tenantry_core::error::{Result, TenantryError};
use tenantry_core::{Message, MessageChannel, MessengerType};

use crate::client::MessengerClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
}

#[derive(Serialize)]
struct PushPayload<'a> {
    token: &'a str,
    title: &'a str,
    body: &'a str,
}

/// Posts push notifications as JSON to a relay service.
pub struct WebhookPushClient {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookPushClient {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        reqwest::Url::parse(&config.url)
            .map_err(|e| TenantryError::config(format!("invalid webhook url {}: {e}", config.url)))?;
        Ok(Self { config: config.clone(), client: reqwest::Client::new() })
    }
}

#[async_trait]
impl MessengerClient for WebhookPushClient {
    fn messenger_type(&self) -> MessengerType { MessengerType::Webhook }

    async fn send_message(&self, message: &Message) -> Result<()> {
        message.validate_for(MessageChannel::Push)?;
        let payload = PushPayload {
            token: message.push_token.as_deref().unwrap_or_default(),
            title: &message.title,
            body: &message.body,
        };

        let mut req = self.client.post(&self.config.url).json(&payload);
        if let Some(ref token) = self.config.bearer_token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await
            .map_err(|e| TenantryError::delivery(MessageChannel::Push, format!("request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(TenantryError::delivery(MessageChannel::Push, format!("webhook {status}: {text}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_posts_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer relay-secret"))
            .and(body_json(serde_json_payload()))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let client = WebhookPushClient::new(&WebhookConfig {
            url: format!("{}/push", server.uri()),
            bearer_token: Some("relay-secret".into()),
        })
        .unwrap();

        let msg = Message { push_token: Some("device-1".into()), title: "Hi".into(), body: "Ready".into(), ..Message::default() };
        client.send_message(&msg).await.unwrap();
    }

    fn serde_json_payload() -> serde_json::Value {
        serde_json::json!({ "token": "device-1", "title": "Hi", "body": "Ready" })
    }

    #[tokio::test]
    async fn test_missing_push_token_is_rejected() {
        let client = WebhookPushClient::new(&WebhookConfig { url: "http://localhost:9/push".into(), bearer_token: None }).unwrap();
        let msg = Message::email("owner@example.com", "Hi", "Ready");
        assert!(matches!(client.send_message(&msg).await, Err(TenantryError::Validation(_))));
    }
}
