//! Error types shared across Tenantry crates.

use std::fmt;

use thiserror::Error;

use crate::message::{ChannelAttempt, MessageChannel};

/// Result alias used throughout Tenantry.
pub type Result<T> = std::result::Result<T, TenantryError>;

/// The provisioning step that produced an infrastructure failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStage {
    CreateTenant,
    CreateNamespace,
    ProvisionDistributionAccount,
    SeedReferenceData,
    CreateOwner,
    ActivateTenant,
}

impl fmt::Display for ProvisioningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::CreateTenant => "create tenant",
            Self::CreateNamespace => "create namespace",
            Self::ProvisionDistributionAccount => "provision distribution account",
            Self::SeedReferenceData => "seed reference data",
            Self::CreateOwner => "create owner",
            Self::ActivateTenant => "activate tenant",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Error)]
pub enum TenantryError {
    #[error("{0}")]
    Validation(String),

    #[error("tenant {0} already exists")]
    DuplicateTenant(String),

    #[error("{stage}: {source}")]
    Provisioning {
        stage: ProvisioningStage,
        #[source]
        source: Box<TenantryError>,
    },

    #[error("database error: {0}")]
    Database(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid token")]
    InvalidToken,

    #[error("invalid key: {0}")]
    Key(String),

    #[error("signing token: {0}")]
    Signing(String),

    #[error("hashing password: {0}")]
    PasswordHash(String),

    #[error("channel {0} is not registered")]
    ChannelNotRegistered(MessageChannel),

    #[error("delivery over {channel} failed: {reason}")]
    Delivery {
        channel: MessageChannel,
        reason: String,
    },

    #[error("no channel delivered the message: {}", describe_attempts(.0))]
    DispatchExhausted(Vec<ChannelAttempt>),

    #[error("operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_attempts(attempts: &[ChannelAttempt]) -> String {
    if attempts.is_empty() {
        return "no channels were given".into();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl TenantryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn delivery(channel: MessageChannel, reason: impl Into<String>) -> Self {
        Self::Delivery {
            channel,
            reason: reason.into(),
        }
    }

    /// Wrap an error with the provisioning stage it came from.
    ///
    /// Validation, conflict, and cancellation errors pass through unwrapped
    /// so callers can match on them directly.
    pub fn stage(stage: ProvisioningStage, err: TenantryError) -> Self {
        match err {
            err @ (Self::Validation(_)
            | Self::DuplicateTenant(_)
            | Self::Cancelled
            | Self::Provisioning { .. }) => err,
            other => Self::Provisioning {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The failing stage, if this error was raised during provisioning.
    pub fn failed_stage(&self) -> Option<ProvisioningStage> {
        match self {
            Self::Provisioning { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_duplicate_tenant(&self) -> bool {
        matches!(self, Self::DuplicateTenant(_))
    }

    pub fn is_invalid_token(&self) -> bool {
        matches!(self, Self::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::AttemptFailure;

    #[test]
    fn test_stage_wraps_infrastructure_errors() {
        let err = TenantryError::stage(
            ProvisioningStage::CreateNamespace,
            TenantryError::Migration("disk full".into()),
        );
        assert_eq!(err.failed_stage(), Some(ProvisioningStage::CreateNamespace));
        assert_eq!(err.to_string(), "create namespace: migration error: disk full");
    }

    #[test]
    fn test_stage_wraps_password_hash_errors() {
        let err = TenantryError::stage(
            ProvisioningStage::CreateOwner,
            TenantryError::PasswordHash("cost 3 out of range".into()),
        );
        assert_eq!(err.failed_stage(), Some(ProvisioningStage::CreateOwner));
        assert_eq!(err.to_string(), "create owner: hashing password: cost 3 out of range");
    }

    #[test]
    fn test_stage_passes_conflicts_through() {
        let err = TenantryError::stage(
            ProvisioningStage::CreateTenant,
            TenantryError::DuplicateTenant("myorg".into()),
        );
        assert!(err.is_duplicate_tenant());
        assert_eq!(err.failed_stage(), None);
    }

    #[test]
    fn test_exhausted_names_every_channel() {
        let err = TenantryError::DispatchExhausted(vec![
            ChannelAttempt {
                channel: MessageChannel::Sms,
                failure: AttemptFailure::NotRegistered,
            },
            ChannelAttempt {
                channel: MessageChannel::Email,
                failure: AttemptFailure::Failed("smtp timeout".into()),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "no channel delivered the message: sms: not registered; email: smtp timeout"
        );
    }

    #[test]
    fn test_exhausted_without_channels() {
        let err = TenantryError::DispatchExhausted(vec![]);
        assert_eq!(err.to_string(), "no channel delivered the message: no channels were given");
    }
}
