//! SMS delivery through an HTTP messaging API.
//!
//! The gateway receives a form-encoded `To`/`From`/`Body` POST authenticated
//! with HTTP basic auth, the shape most hosted SMS APIs accept.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tenantry_core::error::{Result, TenantryError};
use tenantry_core::{Message, MessageChannel, MessengerType};

use crate::client::MessengerClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSmsConfig {
    /// Full URL of the messages endpoint.
    pub endpoint: String,
    pub account_id: String,
    pub auth_token: String,
    /// Sending phone number in E.164 format.
    pub sender_number: String,
}

pub struct HttpSmsClient {
    config: HttpSmsConfig,
    client: reqwest::Client,
}

impl HttpSmsClient {
    pub fn new(config: &HttpSmsConfig) -> Result<Self> {
        reqwest::Url::parse(&config.endpoint)
            .map_err(|e| TenantryError::config(format!("invalid SMS endpoint {}: {e}", config.endpoint)))?;
        if config.account_id.is_empty() || config.auth_token.is_empty() {
            return Err(TenantryError::config("SMS account id and auth token are required"));
        }
        Ok(Self {
            config: config.clone(),
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl MessengerClient for HttpSmsClient {
    fn messenger_type(&self) -> MessengerType { MessengerType::HttpSms }

    async fn send_message(&self, message: &Message) -> Result<()> {
        message.validate_for(MessageChannel::Sms)?;
        let to = message.to_phone_number.as_deref().unwrap_or_default();
        let body = if message.title.is_empty() {
            message.body.clone()
        } else {
            format!("{}\n\n{}", message.title, message.body)
        };

        let resp = self.client.post(&self.config.endpoint)
            .basic_auth(&self.config.account_id, Some(&self.config.auth_token))
            .form(&[("To", to), ("From", self.config.sender_number.as_str()), ("Body", body.as_str())])
            .send().await
            .map_err(|e| TenantryError::delivery(MessageChannel::Sms, format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(TenantryError::delivery(MessageChannel::Sms, format!("gateway {status}: {text}")));
        }

        tracing::debug!(%status, "SMS accepted by gateway");
        Ok(())
    }
}
