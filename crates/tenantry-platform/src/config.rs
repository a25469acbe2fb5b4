//! Platform configuration loaded from `tenantry.toml`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tenantry_channels::{ChannelRegistry, ChannelsConfig, create_client};
use tenantry_core::error::{Result, TenantryError};
use tenantry_core::{MessageChannel, MessengerType};

use crate::auth::AuthConfig;
use crate::network::{MIN_TENANT_DISTRIBUTION_ACCOUNT_AMOUNT, Network};
use crate::provisioning::ProvisioningOptions;

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tenantry")
}

fn default_ui_base_url() -> String { "http://localhost:3000".into() }
fn default_bootstrap_amount() -> i64 { MIN_TENANT_DISTRIBUTION_ACCOUNT_AMOUNT }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Holds the tenant directory and the per-tenant namespaces.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub network: Network,
    #[serde(default = "default_ui_base_url")]
    pub ui_base_url: String,
    #[serde(default = "default_bootstrap_amount")]
    pub tenant_bootstrap_amount: i64,
    #[serde(default)]
    pub distribution_public_key: Option<String>,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            network: Network::default(),
            ui_base_url: default_ui_base_url(),
            tenant_bootstrap_amount: default_bootstrap_amount(),
            distribution_public_key: None,
            channels: ChannelsConfig::default(),
            auth: None,
        }
    }
}

impl PlatformConfig {
    /// `<config dir>/tenantry/tenantry.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tenantry")
            .join("tenantry.toml")
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| TenantryError::config(format!("parsing {}: {e}", path.display())))
    }

    pub fn directory_path(&self) -> PathBuf {
        self.data_dir.join("platform.db")
    }

    pub fn namespaces_dir(&self) -> PathBuf {
        self.data_dir.join("tenants")
    }

    fn sender_type(&self, channel: MessageChannel) -> Option<MessengerType> {
        self.channels.sender_for(channel).map(|s| s.sender_type)
    }

    pub fn provisioning_options(&self) -> ProvisioningOptions {
        ProvisioningOptions {
            network: self.network,
            bootstrap_amount: self.tenant_bootstrap_amount,
            ui_base_url: self.ui_base_url.clone(),
            channel_priority: self.channels.priority.clone(),
            email_sender_type: self.sender_type(MessageChannel::Email).unwrap_or(MessengerType::DryRun),
            sms_sender_type: self.sender_type(MessageChannel::Sms),
            ..ProvisioningOptions::default()
        }
    }

    /// Build a registry with one client per configured channel.
    pub fn build_registry(&self) -> Result<ChannelRegistry> {
        let registry = ChannelRegistry::new();
        for channel in MessageChannel::ALL {
            if let Some(sender) = self.channels.sender_for(channel) {
                registry.register_client(channel, create_client(channel, sender)?);
            }
        }
        Ok(registry)
    }

    pub fn shared_registry(&self) -> Result<Arc<ChannelRegistry>> {
        self.build_registry().map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlatformConfig::default();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.tenant_bootstrap_amount, 5);
        assert!(config.directory_path().ends_with("tenantry/platform.db"));
        assert_eq!(config.channels.priority, vec![MessageChannel::Email]);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            data_dir = "/var/lib/tenantry"
            network = "pubnet"
            ui_base_url = "https://sdp.example.org"
            tenant_bootstrap_amount = 10
            distribution_public_key = "GDAZUHI4ARV73G3FI4JEZP57MPQTJ5I6BW7VZLNVHQJPANKPUGY2SDUY"

            [channels]
            priority = ["sms", "email"]

            [channels.email]
            sender_type = "dry_run"

            [channels.sms]
            sender_type = "dry_run"
        "#;
        let config: PlatformConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.network, Network::Pubnet);
        assert_eq!(config.namespaces_dir(), PathBuf::from("/var/lib/tenantry/tenants"));

        let opts = config.provisioning_options();
        assert_eq!(opts.bootstrap_amount, 10);
        assert_eq!(opts.channel_priority, vec![MessageChannel::Sms, MessageChannel::Email]);
        assert_eq!(opts.sms_sender_type, Some(MessengerType::DryRun));

        let registry = config.build_registry().unwrap();
        assert_eq!(registry.registered_channels(), vec![MessageChannel::Email, MessageChannel::Sms]);
    }

    #[test]
    fn test_priority_only_channels_still_register_email() {
        let toml_str = r#"
            [channels]
            priority = ["email"]
        "#;
        let config: PlatformConfig = toml::from_str(toml_str).unwrap();
        let registry = config.build_registry().unwrap();
        assert_eq!(registry.registered_channels(), vec![MessageChannel::Email]);
        assert_eq!(config.provisioning_options().email_sender_type, MessengerType::DryRun);
    }

    #[test]
    fn test_mismatched_sender_is_rejected() {
        let toml_str = r#"
            [channels.sms]
            sender_type = "smtp"
        "#;
        let config: PlatformConfig = toml::from_str(toml_str).unwrap();
        assert!(config.build_registry().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlatformConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.ui_base_url, "http://localhost:3000");
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "network = 42").unwrap();
        assert!(matches!(PlatformConfig::load_from(&path), Err(TenantryError::Config(_))));
    }
}
