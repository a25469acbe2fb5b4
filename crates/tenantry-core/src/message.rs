//! Channel-agnostic message model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TenantryError};

/// Supported delivery channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageChannel {
    Email,
    Sms,
    Push,
}

impl MessageChannel {
    pub const ALL: [MessageChannel; 3] = [MessageChannel::Email, MessageChannel::Sms, MessageChannel::Push];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Push => "push",
        }
    }
}

impl fmt::Display for MessageChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageChannel {
    type Err = TenantryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "sms" => Ok(Self::Sms),
            "push" => Ok(Self::Push),
            other => Err(TenantryError::validation(format!("unknown message channel {other:?}"))),
        }
    }
}

/// The transport implementation behind a registered client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessengerType {
    DryRun,
    Smtp,
    HttpSms,
    Webhook,
}

impl MessengerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DryRun => "dry_run",
            Self::Smtp => "smtp",
            Self::HttpSms => "http_sms",
            Self::Webhook => "webhook",
        }
    }

    /// Whether this transport can deliver on `channel`.
    pub fn serves(&self, channel: MessageChannel) -> bool {
        match self {
            Self::DryRun => true,
            Self::Smtp => channel == MessageChannel::Email,
            Self::HttpSms => channel == MessageChannel::Sms,
            Self::Webhook => channel == MessageChannel::Push,
        }
    }
}

impl fmt::Display for MessengerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessengerType {
    type Err = TenantryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "dry_run" => Ok(Self::DryRun),
            "smtp" => Ok(Self::Smtp),
            "http_sms" => Ok(Self::HttpSms),
            "webhook" => Ok(Self::Webhook),
            other => Err(TenantryError::validation(format!("unknown sender type {other:?}"))),
        }
    }
}

/// A notification addressed to one recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub to_email: Option<String>,
    pub to_phone_number: Option<String>,
    /// Device or subscription token for push delivery.
    pub push_token: Option<String>,
    pub title: String,
    pub body: String,
}

impl Message {
    pub fn email(to: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to_email: Some(to.into()),
            to_phone_number: None,
            push_token: None,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn with_phone_number(mut self, phone: impl Into<String>) -> Self {
        self.to_phone_number = Some(phone.into());
        self
    }

    pub fn with_push_token(mut self, token: impl Into<String>) -> Self {
        self.push_token = Some(token.into());
        self
    }

    /// The address this message uses on `channel`, if it has one.
    pub fn recipient_for(&self, channel: MessageChannel) -> Option<&str> {
        match channel {
            MessageChannel::Email => self.to_email.as_deref(),
            MessageChannel::Sms => self.to_phone_number.as_deref(),
            MessageChannel::Push => self.push_token.as_deref(),
        }
    }

    /// Check the message carries an address usable on `channel`.
    pub fn validate_for(&self, channel: MessageChannel) -> Result<()> {
        match self.recipient_for(channel) {
            Some(a) if !a.trim().is_empty() => {}
            _ => {
                return Err(TenantryError::validation(format!(
                    "message has no recipient for channel {channel}"
                )));
            }
        }
        if self.body.trim().is_empty() {
            return Err(TenantryError::validation("message body is empty"));
        }
        Ok(())
    }
}

/// Why one channel in a priority list did not deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    NotRegistered,
    Failed(String),
}

/// The outcome of trying a single channel during dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAttempt {
    pub channel: MessageChannel,
    pub failure: AttemptFailure,
}

impl fmt::Display for ChannelAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure {
            AttemptFailure::NotRegistered => write!(f, "{}: not registered", self.channel),
            AttemptFailure::Failed(reason) => write!(f, "{}: {}", self.channel, reason),
        }
    }
}
