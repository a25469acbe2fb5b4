//! Priority message dispatcher: first channel that delivers wins.

use std::sync::Arc;

use tenantry_core::error::{Result, TenantryError};
use tenantry_core::{AttemptFailure, ChannelAttempt, Message, MessageChannel, RequestContext};

use crate::client::MessengerClient;
use crate::registry::ChannelRegistry;

/// Sends messages through the registered clients in caller-given order.
///
/// Attempts are strictly sequential: a channel is only tried after every
/// channel before it was skipped or failed, so a message is delivered at
/// most once per call.
#[derive(Clone)]
pub struct MessageDispatcher {
    registry: Arc<ChannelRegistry>,
}

impl MessageDispatcher {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn register_client(&self, channel: MessageChannel, client: Arc<dyn MessengerClient>) {
        self.registry.register_client(channel, client);
    }

    pub fn get_client(&self, channel: MessageChannel) -> Result<Arc<dyn MessengerClient>> {
        self.registry.get_client(channel)
    }

    /// Deliver `message` on the first channel in `channel_priority` that succeeds.
    ///
    /// Unregistered channels are skipped. When nothing delivers, the error
    /// lists every channel tried and why it did not deliver. Repeated
    /// channels in the list are tried once.
    pub async fn send_message(
        &self,
        ctx: &RequestContext,
        message: &Message,
        channel_priority: &[MessageChannel],
    ) -> Result<MessageChannel> {
        let mut attempts: Vec<ChannelAttempt> = Vec::with_capacity(channel_priority.len());

        for &channel in channel_priority {
            if attempts.iter().any(|a| a.channel == channel) {
                continue;
            }
            ctx.ensure_active()?;

            let client = match self.registry.get_client(channel) {
                Ok(client) => client,
                Err(TenantryError::ChannelNotRegistered(_)) => {
                    tracing::debug!(%channel, "no client registered, skipping channel");
                    attempts.push(ChannelAttempt { channel, failure: AttemptFailure::NotRegistered });
                    continue;
                }
                Err(e) => return Err(e),
            };

            match client.send_message(message).await {
                Ok(()) => {
                    tracing::info!(%channel, messenger = %client.messenger_type(), "message delivered");
                    return Ok(channel);
                }
                Err(e) => {
                    tracing::warn!(%channel, messenger = %client.messenger_type(), error = %e, "delivery failed, trying next channel");
                    attempts.push(ChannelAttempt { channel, failure: AttemptFailure::Failed(e.to_string()) });
                }
            }
        }

        Err(TenantryError::DispatchExhausted(attempts))
    }
}
