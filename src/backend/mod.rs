//! Automation backend collaborator.
//!
//! The backend owns devices, sessions, workflows and plugins. This crate only
//! talks to it through [`AutomationBackend`]; storage, hardware access and
//! script execution all live on the other side of this trait.

pub mod archive;
pub mod http;
pub mod memory;
pub mod models;

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::services::event_query::EventQuery;
use crate::BridgeError;

pub use http::HttpBackend;
pub use memory::InMemoryBackend;
pub use models::*;

/// Narrow async interface to the automation backend.
///
/// Lookups return `Ok(None)` for unknown ids so callers decide whether the
/// miss is a request-level `NotFound`. Failures of an attempted action are
/// `BridgeError::Backend`.
#[async_trait]
pub trait AutomationBackend: Send + Sync {
    // Devices
    async fn list_devices(&self) -> Result<Vec<Device>, BridgeError>;
    async fn get_device(&self, device_id: &str) -> Result<Option<Device>, BridgeError>;
    async fn connect_device(&self, address: &str) -> Result<Device, BridgeError>;
    async fn disconnect_device(&self, device_id: &str) -> Result<(), BridgeError>;
    async fn run_device_command(
        &self,
        device_id: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, BridgeError>;

    // Media tools
    async fn run_media_tool(
        &self,
        tool: MediaTool,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, BridgeError>;

    // Screen
    /// Write a PNG screenshot of the device screen to `dest`.
    async fn capture_screenshot(&self, device_id: &str, dest: &Path) -> Result<(), BridgeError>;
    async fn start_recording(
        &self,
        device_id: &str,
        options: RecordingOptions,
    ) -> Result<RecordingInfo, BridgeError>;
    async fn stop_recording(
        &self,
        device_id: &str,
        save_path: Option<&Path>,
    ) -> Result<RecordingInfo, BridgeError>;

    // Sessions
    async fn create_session(&self, request: NewSession) -> Result<Session, BridgeError>;
    async fn end_session(&self, session_id: &str) -> Result<Session, BridgeError>;
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, BridgeError>;
    /// `None` means uncapped.
    async fn list_sessions(&self, limit: Option<usize>) -> Result<Vec<SessionSummary>, BridgeError>;
    async fn delete_session(&self, session_id: &str) -> Result<(), BridgeError>;
    async fn query_events(&self, query: &EventQuery) -> Result<EventPage, BridgeError>;
    async fn update_session_config(
        &self,
        session_id: &str,
        patch: SessionConfigPatch,
    ) -> Result<SessionConfig, BridgeError>;
    async fn export_session(
        &self,
        session_id: &str,
        output_path: &Path,
    ) -> Result<ArchiveSummary, BridgeError>;
    async fn import_session(&self, archive_path: &Path) -> Result<Session, BridgeError>;
    async fn session_stats(&self, session_id: &str) -> Result<SessionStats, BridgeError>;

    // Workflows
    async fn list_workflows(&self) -> Result<Vec<Workflow>, BridgeError>;
    async fn get_workflow(&self, workflow_id: &str) -> Result<Option<Workflow>, BridgeError>;
    /// Runs to completion; callers that must not block spawn this.
    async fn run_workflow(
        &self,
        workflow_id: &str,
        device_id: &str,
    ) -> Result<WorkflowRunReport, BridgeError>;
    async fn stop_workflow(&self, device_id: &str) -> Result<(), BridgeError>;

    // Plugins
    async fn list_plugins(&self) -> Result<Vec<Plugin>, BridgeError>;
    async fn get_plugin(&self, plugin_id: &str) -> Result<Option<Plugin>, BridgeError>;
    async fn create_plugin(&self, draft: PluginDraft) -> Result<Plugin, BridgeError>;
    async fn update_plugin(&self, plugin_id: &str, patch: PluginPatch)
        -> Result<Plugin, BridgeError>;
    async fn delete_plugin(&self, plugin_id: &str) -> Result<(), BridgeError>;
    async fn set_plugin_enabled(&self, plugin_id: &str, enabled: bool)
        -> Result<Plugin, BridgeError>;
    async fn test_plugin(&self, plugin_id: &str, event: Value)
        -> Result<PluginTestReport, BridgeError>;
}
