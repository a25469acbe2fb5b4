//! Explicit request context: the tenant a call acts for, plus cancellation.
//!
//! Nothing in Tenantry reads tenant identity from thread-locals or task
//! locals. Callers build a [`RequestContext`] once per request (or per
//! administrative run) and pass it by reference to every operation.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TenantryError};

/// Identifier of a provisioned tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which tenant, if any, the current call is bound to.
///
/// `Absent` is the legacy mode: sessions minted under it carry an empty
/// tenant claim and resolve back to `Absent` when read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TenantContext {
    Bound(TenantId),
    #[default]
    Absent,
}

impl TenantContext {
    /// Interpret a raw claim value; the empty string means no binding.
    pub fn from_claim(raw: &str) -> Self {
        if raw.is_empty() {
            Self::Absent
        } else {
            Self::Bound(TenantId::new(raw))
        }
    }

    /// The claim value for this binding (empty when absent).
    pub fn as_claim(&self) -> &str {
        match self {
            Self::Bound(id) => id.as_str(),
            Self::Absent => "",
        }
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        match self {
            Self::Bound(id) => Some(id),
            Self::Absent => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }
}

/// Per-call context threaded through every Tenantry operation.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub tenant: TenantContext,
    pub cancel: CancellationToken,
}

impl RequestContext {
    /// No tenant binding and a token nobody will cancel.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn for_tenant(id: TenantId) -> Self {
        Self {
            tenant: TenantContext::Bound(id),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_tenant(mut self, tenant: TenantContext) -> Self {
        self.tenant = tenant;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail with [`TenantryError::Cancelled`] once the caller gave up.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(TenantryError::Cancelled);
        }
        Ok(())
    }
}
