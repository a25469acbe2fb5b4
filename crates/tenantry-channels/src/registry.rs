//! Channel registry: at most one client per delivery channel.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tenantry_core::MessageChannel;
use tenantry_core::error::{Result, TenantryError};

use crate::client::MessengerClient;

/// Maps each channel to the client that delivers on it.
///
/// Shared by reference (usually behind an `Arc`); reads during dispatch are
/// safe against a concurrent registration, and the last registration wins.
#[derive(Default)]
pub struct ChannelRegistry {
    clients: RwLock<HashMap<MessageChannel, Arc<dyn MessengerClient>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `client` with `channel`, replacing any earlier client.
    pub fn register_client(&self, channel: MessageChannel, client: Arc<dyn MessengerClient>) {
        let messenger = client.messenger_type();
        if !messenger.serves(channel) {
            tracing::warn!(%channel, %messenger, "registered client does not serve this channel");
        }

        let previous = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel, client);

        match previous {
            Some(old) => tracing::debug!(%channel, old = %old.messenger_type(), new = %messenger, "replaced channel client"),
            None => tracing::debug!(%channel, %messenger, "registered channel client"),
        }
    }

    pub fn get_client(&self, channel: MessageChannel) -> Result<Arc<dyn MessengerClient>> {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
            .cloned()
            .ok_or(TenantryError::ChannelNotRegistered(channel))
    }

    /// Registered channels, in declaration order.
    pub fn registered_channels(&self) -> Vec<MessageChannel> {
        let mut channels: Vec<_> = self
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        channels.sort();
        channels
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}
