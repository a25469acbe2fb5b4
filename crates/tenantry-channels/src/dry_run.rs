//! Dry-run client: logs messages instead of sending them.

use async_trait::async_trait;
use tenantry_core::error::Result;
use tenantry_core::{Message, MessageChannel, MessengerType};

use crate::client::MessengerClient;

/// Logs every message it is asked to deliver. Used for local and test setups.
pub struct DryRunClient {
    channel: MessageChannel,
}

impl DryRunClient {
    pub fn new(channel: MessageChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl MessengerClient for DryRunClient {
    fn messenger_type(&self) -> MessengerType { MessengerType::DryRun }

    async fn send_message(&self, message: &Message) -> Result<()> {
        message.validate_for(self.channel)?;
        let recipient = message.recipient_for(self.channel).unwrap_or_default();

        tracing::info!(
            channel = %self.channel,
            to = recipient,
            title = %message.title,
            "dry-run message: {}",
            message.body
        );
        Ok(())
    }
}
