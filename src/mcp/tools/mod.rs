//! The operation catalog.
//!
//! Each submodule registers its descriptors and handlers on the shared
//! builder; [`build_registry`] assembles the full table once at startup.

pub mod device;
pub mod media;
pub mod plugin;
pub mod screen;
pub mod session;
pub mod workflow;

use std::time::Duration;

use crate::backend::{Device, Session};
use crate::mcp::context::ToolContext;
use crate::mcp::registry::{ToolRegistry, ToolRegistryBuilder};
use crate::BridgeError;

/// Default and ceiling for a timeout, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub default_secs: u64,
    pub max_secs: u64,
}

pub const DEVICE_COMMAND_TIMEOUT: TimeoutPolicy = TimeoutPolicy {
    default_secs: 30,
    max_secs: 300,
};

pub const MEDIA_TOOL_TIMEOUT: TimeoutPolicy = TimeoutPolicy {
    default_secs: 120,
    max_secs: 600,
};

pub const RECORDING_TIME_LIMIT: TimeoutPolicy = TimeoutPolicy {
    default_secs: 180,
    max_secs: 180,
};

/// Absent or non-positive requests fall back to the default; anything else
/// is capped at the maximum.
pub fn clamp_timeout(requested: Option<i64>, policy: TimeoutPolicy) -> Duration {
    let secs = match requested {
        Some(s) if s > 0 => (s as u64).min(policy.max_secs),
        _ => policy.default_secs,
    };
    Duration::from_secs(secs)
}

pub fn build_registry() -> Result<ToolRegistry, BridgeError> {
    let builder: ToolRegistryBuilder = ToolRegistry::builder();
    let builder = device::register(builder);
    let builder = media::register(builder);
    let builder = screen::register(builder);
    let builder = session::register(builder);
    let builder = workflow::register(builder);
    let builder = plugin::register(builder);
    builder.build()
}

/// Look up a device before any action touches it.
pub(crate) async fn resolve_device(ctx: &ToolContext, device_id: &str) -> Result<Device, BridgeError> {
    ctx.backend
        .get_device(device_id)
        .await?
        .ok_or_else(|| BridgeError::not_found("Device", device_id))
}

pub(crate) async fn resolve_session(ctx: &ToolContext, session_id: &str) -> Result<Session, BridgeError> {
    ctx.backend
        .get_session(session_id)
        .await?
        .ok_or_else(|| BridgeError::not_found("Session", session_id))
}
