//! # Tenantry Platform
//!
//! Multi-tenant management: the tenant directory and audit log, per-tenant
//! namespaces, ledger distribution accounts, session tokens, and the
//! provisioning workflow that ties them together.

pub mod auth;
pub mod config;
pub mod db;
pub mod ledger;
pub mod namespace;
pub mod network;
pub mod provisioning;

pub use auth::{AuthConfig, SessionClaims, SessionUser, TokenManager, TokenState};
pub use config::PlatformConfig;
pub use db::{PlatformDb, Tenant, TenantStatus};
pub use ledger::{DistributionAccount, DistributionAccountProvisioner, HostDistributionAccount};
pub use namespace::{NamespaceStore, NewOwner, TenantDb, TenantUser};
pub use network::Network;
pub use provisioning::{NewTenant, ProvisioningManager, ProvisioningOptions};
