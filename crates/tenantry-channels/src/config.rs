//! Sender configuration for each delivery channel.

use serde::{Deserialize, Serialize};
use tenantry_core::{MessageChannel, MessengerType};

use crate::email::SmtpConfig;
use crate::sms::HttpSmsConfig;
use crate::webhook::WebhookConfig;

/// How one channel sends: which transport, and that transport's settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSenderConfig {
    #[serde(default = "default_sender_type")]
    pub sender_type: MessengerType,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub http_sms: Option<HttpSmsConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

fn default_sender_type() -> MessengerType { MessengerType::DryRun }

impl Default for ChannelSenderConfig {
    fn default() -> Self {
        Self {
            sender_type: MessengerType::DryRun,
            smtp: None,
            http_sms: None,
            webhook: None,
        }
    }
}

impl ChannelSenderConfig {
    pub fn dry_run() -> Self {
        Self::default()
    }
}

/// The `[channels]` table: per-channel senders plus the delivery priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default = "default_email")]
    pub email: Option<ChannelSenderConfig>,
    #[serde(default)]
    pub sms: Option<ChannelSenderConfig>,
    #[serde(default)]
    pub push: Option<ChannelSenderConfig>,
    /// Channels tried in order when notifying a user.
    #[serde(default = "default_priority")]
    pub priority: Vec<MessageChannel>,
}

fn default_priority() -> Vec<MessageChannel> { vec![MessageChannel::Email] }
fn default_email() -> Option<ChannelSenderConfig> { Some(ChannelSenderConfig::dry_run()) }

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            email: default_email(),
            sms: None,
            push: None,
            priority: default_priority(),
        }
    }
}

impl ChannelsConfig {
    pub fn sender_for(&self, channel: MessageChannel) -> Option<&ChannelSenderConfig> {
        match channel {
            MessageChannel::Email => self.email.as_ref(),
            MessageChannel::Sms => self.sms.as_ref(),
            MessageChannel::Push => self.push.as_ref(),
        }
    }

    pub fn sender_for_mut(&mut self, channel: MessageChannel) -> &mut Option<ChannelSenderConfig> {
        match channel {
            MessageChannel::Email => &mut self.email,
            MessageChannel::Sms => &mut self.sms,
            MessageChannel::Push => &mut self.push,
        }
    }
}
