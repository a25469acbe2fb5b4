//! Distribution accounts: the ledger account a tenant disburses from.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tenantry_core::RequestContext;
use tenantry_core::error::{Result, TenantryError};

use crate::db::Tenant;
use crate::network::{MIN_TENANT_DISTRIBUTION_ACCOUNT_AMOUNT, Network};

/// Ed25519 account id in strkey form: `G` followed by 55 base32 characters.
static PUBLIC_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^G[A-Z2-7]{55}$").expect("valid public key regex"));

/// The account a tenant's disbursements are paid from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionAccount {
    pub address: String,
    pub network: Network,
    pub network_passphrase: String,
    /// Native units the account was bootstrapped with.
    pub bootstrap_amount: i64,
}

/// Check that `key` looks like an account public key.
pub fn validate_public_key(key: &str) -> Result<()> {
    if PUBLIC_KEY_RE.is_match(key) {
        Ok(())
    } else {
        Err(TenantryError::validation(format!("invalid distribution account public key {key:?}")))
    }
}

/// Provisions (or assigns) a distribution account for a tenant.
#[async_trait]
pub trait DistributionAccountProvisioner: Send + Sync {
    async fn provision(
        &self,
        ctx: &RequestContext,
        tenant: &Tenant,
        network: Network,
        bootstrap_amount: i64,
    ) -> Result<DistributionAccount>;
}

/// Every tenant shares the host's distribution account.
#[derive(Debug, Clone)]
pub struct HostDistributionAccount {
    public_key: String,
}

impl HostDistributionAccount {
    pub fn new(public_key: impl Into<String>) -> Result<Self> {
        let public_key = public_key.into();
        validate_public_key(&public_key)?;
        Ok(Self { public_key })
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }
}

#[async_trait]
impl DistributionAccountProvisioner for HostDistributionAccount {
    async fn provision(
        &self,
        ctx: &RequestContext,
        tenant: &Tenant,
        network: Network,
        bootstrap_amount: i64,
    ) -> Result<DistributionAccount> {
        ctx.ensure_active()?;
        if bootstrap_amount < MIN_TENANT_DISTRIBUTION_ACCOUNT_AMOUNT {
            return Err(TenantryError::validation(format!(
                "the tenant distribution account bootstrap amount must be at least {MIN_TENANT_DISTRIBUTION_ACCOUNT_AMOUNT}"
            )));
        }

        tracing::info!(
            tenant = %tenant.name,
            account = %self.public_key,
            %network,
            "assigning host distribution account"
        );
        Ok(DistributionAccount {
            address: self.public_key.clone(),
            network,
            network_passphrase: network.passphrase().into(),
            bootstrap_amount,
        })
    }
}
