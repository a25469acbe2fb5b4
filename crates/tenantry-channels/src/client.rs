//! The messenger client seam and the factory that builds clients from config.

use std::sync::Arc;

use async_trait::async_trait;
use tenantry_core::error::{Result, TenantryError};
use tenantry_core::{Message, MessageChannel, MessengerType};

use crate::config::ChannelSenderConfig;
use crate::dry_run::DryRunClient;
use crate::email::SmtpEmailClient;
use crate::sms::HttpSmsClient;
use crate::webhook::WebhookPushClient;

/// A client able to deliver a [`Message`] over one transport.
#[async_trait]
pub trait MessengerClient: Send + Sync {
    fn messenger_type(&self) -> MessengerType;

    async fn send_message(&self, message: &Message) -> Result<()>;
}

/// Build the client configured for `channel`.
pub fn create_client(
    channel: MessageChannel,
    config: &ChannelSenderConfig,
) -> Result<Arc<dyn MessengerClient>> {
    if !config.sender_type.serves(channel) {
        return Err(TenantryError::config(format!(
            "sender type {} cannot deliver on channel {channel}",
            config.sender_type
        )));
    }

    match config.sender_type {
        MessengerType::DryRun => Ok(Arc::new(DryRunClient::new(channel))),
        MessengerType::Smtp => {
            let smtp = config
                .smtp
                .as_ref()
                .ok_or_else(|| TenantryError::config("smtp sender requires an [smtp] section"))?;
            Ok(Arc::new(SmtpEmailClient::new(smtp)?))
        }
        MessengerType::HttpSms => {
            let sms = config
                .http_sms
                .as_ref()
                .ok_or_else(|| TenantryError::config("http_sms sender requires an [http_sms] section"))?;
            Ok(Arc::new(HttpSmsClient::new(sms)?))
        }
        MessengerType::Webhook => {
            let webhook = config
                .webhook
                .as_ref()
                .ok_or_else(|| TenantryError::config("webhook sender requires a [webhook] section"))?;
            Ok(Arc::new(WebhookPushClient::new(webhook)?))
        }
    }
}
