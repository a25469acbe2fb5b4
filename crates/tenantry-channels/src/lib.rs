//! # Tenantry Channels
//!
//! Notification delivery: the [`MessengerClient`] seam, the process-wide
//! [`ChannelRegistry`], and the [`MessageDispatcher`] that walks a priority
//! list of channels until one delivers.

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod dry_run;
pub mod email;
pub mod registry;
pub mod sms;
pub mod webhook;

pub use client::{MessengerClient, create_client};
pub use config::{ChannelSenderConfig, ChannelsConfig};
pub use dispatcher::MessageDispatcher;
pub use registry::ChannelRegistry;
