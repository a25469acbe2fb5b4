//! # Tenantry Core
//!
//! Types shared by every Tenantry crate: the error taxonomy, the explicit
//! request context that carries tenant identity and cancellation, and the
//! channel-agnostic message model.

pub mod context;
pub mod error;
pub mod message;

pub use context::{RequestContext, TenantContext, TenantId};
pub use error::{ProvisioningStage, Result, TenantryError};
pub use message::{AttemptFailure, ChannelAttempt, Message, MessageChannel, MessengerType};
