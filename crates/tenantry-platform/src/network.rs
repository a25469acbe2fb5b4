//! Ledger networks and the reference data each one seeds into a new tenant.

use std::fmt;
use std::str::FromStr;

use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use tenantry_core::error::{Result, TenantryError};

/// Smallest native-asset amount a tenant distribution account is bootstrapped with.
pub const MIN_TENANT_DISTRIBUTION_ACCOUNT_AMOUNT: i64 = 5;

/// An asset a tenant can disburse, identified by code and issuer.
/// The native asset has an empty issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetSpec {
    pub code: &'static str,
    pub issuer: &'static str,
}

impl fmt::Display for AssetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.code, self.issuer)
    }
}

/// A wallet provider recipients can receive funds with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletSpec {
    pub name: &'static str,
    pub homepage: &'static str,
    pub deep_link_schema: &'static str,
    pub sep_10_client_domain: &'static str,
    /// Codes of the seeded assets this wallet supports.
    pub assets: &'static [&'static str],
}

const XLM: AssetSpec = AssetSpec { code: "XLM", issuer: "" };

const TESTNET_ASSETS: &[AssetSpec] = &[
    AssetSpec { code: "USDC", issuer: "GBBD47IF6LWK7P7MDEVSCWR7DPUWV3NY3DTQEVFL4NAT4AQH3ZLLFLA5" },
    XLM,
];

const PUBNET_ASSETS: &[AssetSpec] = &[
    AssetSpec { code: "USDC", issuer: "GA5ZSEJYB37JRC5AVCIA5MOP4RHTM335X2KGX3IHOJAPP5RE34K4KZVN" },
    XLM,
];

const TESTNET_WALLETS: &[WalletSpec] = &[
    WalletSpec {
        name: "Demo Wallet",
        homepage: "https://demo-wallet.stellar.org",
        deep_link_schema: "https://demo-wallet.stellar.org",
        sep_10_client_domain: "demo-wallet-server.stellar.org",
        assets: &["USDC", "XLM"],
    },
    WalletSpec {
        name: "Vibrant Assist",
        homepage: "https://vibrantapp.com/assist",
        deep_link_schema: "https://vibrantapp.com/sdp-dev",
        sep_10_client_domain: "api-dev.vibrantapp.com",
        assets: &["USDC"],
    },
];

const PUBNET_WALLETS: &[WalletSpec] = &[
    WalletSpec {
        name: "Freedom Wallet",
        homepage: "https://freedom-public-uat.bpventures.us",
        deep_link_schema: "https://freedom-public-uat.bpventures.us/disbursement/create",
        sep_10_client_domain: "freedom-public-uat.bpventures.us",
        assets: &["USDC", "XLM"],
    },
    WalletSpec {
        name: "Vibrant Assist RC",
        homepage: "vibrantapp.com/assist",
        deep_link_schema: "https://vibrantapp.com/sdp-rc",
        sep_10_client_domain: "vibrantapp.com",
        assets: &["USDC"],
    },
    WalletSpec {
        name: "Vibrant Assist",
        homepage: "https://vibrantapp.com/assist",
        deep_link_schema: "https://vibrantapp.com/sdp",
        sep_10_client_domain: "api.vibrantapp.com",
        assets: &["USDC"],
    },
];

/// The ledger network a tenant operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Pubnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Testnet => "testnet",
            Self::Pubnet => "pubnet",
        }
    }

    pub fn passphrase(&self) -> &'static str {
        match self {
            Self::Testnet => "Test SDF Network ; September 2015",
            Self::Pubnet => "Public Global Stellar Network ; September 2015",
        }
    }

    pub fn horizon_url(&self) -> &'static str {
        match self {
            Self::Testnet => "https://horizon-testnet.stellar.org",
            Self::Pubnet => "https://horizon.stellar.org",
        }
    }

    pub fn default_assets(&self) -> &'static [AssetSpec] {
        match self {
            Self::Testnet => TESTNET_ASSETS,
            Self::Pubnet => PUBNET_ASSETS,
        }
    }

    pub fn default_wallets(&self) -> &'static [WalletSpec] {
        match self {
            Self::Testnet => TESTNET_WALLETS,
            Self::Pubnet => PUBNET_WALLETS,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = TenantryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "testnet" => Ok(Self::Testnet),
            "pubnet" => Ok(Self::Pubnet),
            other => Err(TenantryError::validation(format!(
                "invalid network type {other:?}, expected testnet or pubnet"
            ))),
        }
    }
}

impl ToSql for Network {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Network {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|_| FromSqlError::InvalidType)
    }
}
