//! JSON-over-HTTP client for a running automation backend.
//!
//! Every call is `POST {base_url}/api/{method}` with a JSON params object.
//! The backend replies with either
//!
//! ```json
//! { "ok": true, "result": ... }
//! { "ok": false, "error": "message", "kind": "not_found" | "backend", "output": "..." }
//! ```

use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

use crate::backend::*;
use crate::services::event_query::EventQuery;
use crate::BridgeError;

/// Upper bound for calls that run a whole workflow.
const WORKFLOW_RUN_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Deserialize)]
struct Reply {
    ok: bool,
    #[serde(default)]
    result: Value,
    error: Option<String>,
    kind: Option<String>,
    /// Entity type for `not_found` replies
    entity: Option<String>,
    id: Option<String>,
    /// Output collected before a failure
    output: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScreenshotReply {
    png_base64: String,
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    request_timeout: Duration,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>, request_timeout: Duration) -> Result<Self, BridgeError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|e| BridgeError::Config(format!("invalid backend URL '{}': {}", base_url, e)))?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("autobridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url,
            token,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, method: &str, params: Value, extra: Duration) -> Result<Reply, BridgeError> {
        let url = format!("{}/api/{}", self.base_url, method);
        let mut request = self
            .client
            .post(&url)
            .timeout(self.request_timeout + extra)
            .json(&params);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        tracing::debug!(method, "backend request");
        let response = request
            .send()
            .await
            .map_err(|e| BridgeError::backend(method, format!("request to {} failed: {}", url, e)))?;
        let status = response.status();
        response.json::<Reply>().await.map_err(|e| {
            BridgeError::backend(method, format!("unreadable reply (HTTP {}): {}", status, e))
        })
    }

    /// Call a method and decode its result.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        extra: Duration,
    ) -> Result<T, BridgeError> {
        let reply = self.send(method, params, extra).await?;
        if !reply.ok {
            return Err(reply_error(method, reply));
        }
        serde_json::from_value(reply.result)
            .map_err(|e| BridgeError::backend(method, format!("unexpected result shape: {}", e)))
    }

    /// Like [`HttpBackend::call`] but a `not_found` reply is `Ok(None)`.
    async fn lookup<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>, BridgeError> {
        match self.call(method, params, Duration::ZERO).await {
            Ok(value) => Ok(Some(value)),
            Err(BridgeError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn call_unit(&self, method: &str, params: Value) -> Result<(), BridgeError> {
        let reply = self.send(method, params, Duration::ZERO).await?;
        if reply.ok {
            Ok(())
        } else {
            Err(reply_error(method, reply))
        }
    }
}

fn reply_error(method: &str, reply: Reply) -> BridgeError {
    let message = reply.error.unwrap_or_else(|| "unknown backend error".into());
    match reply.kind.as_deref() {
        Some("not_found") => BridgeError::not_found(
            reply.entity.unwrap_or_else(|| "Resource".into()),
            reply.id.unwrap_or(message),
        ),
        _ => BridgeError::backend_with_output(method, message, reply.output.unwrap_or_default()),
    }
}

#[async_trait]
impl AutomationBackend for HttpBackend {
    async fn list_devices(&self) -> Result<Vec<Device>, BridgeError> {
        self.call("list_devices", json!({}), Duration::ZERO).await
    }

    async fn get_device(&self, device_id: &str) -> Result<Option<Device>, BridgeError> {
        self.lookup("get_device", json!({ "device_id": device_id })).await
    }

    async fn connect_device(&self, address: &str) -> Result<Device, BridgeError> {
        self.call("connect_device", json!({ "address": address }), Duration::ZERO)
            .await
    }

    async fn disconnect_device(&self, device_id: &str) -> Result<(), BridgeError> {
        self.call_unit("disconnect_device", json!({ "device_id": device_id }))
            .await
    }

    async fn run_device_command(
        &self,
        device_id: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, BridgeError> {
        self.call(
            "run_device_command",
            json!({ "device_id": device_id, "command": command, "timeout_secs": timeout.as_secs() }),
            timeout,
        )
        .await
    }

    async fn run_media_tool(
        &self,
        tool: MediaTool,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, BridgeError> {
        self.call(
            "run_media_tool",
            json!({ "tool": tool, "args": args, "timeout_secs": timeout.as_secs() }),
            timeout,
        )
        .await
    }

    async fn capture_screenshot(&self, device_id: &str, dest: &Path) -> Result<(), BridgeError> {
        let reply: ScreenshotReply = self
            .call(
                "capture_screenshot",
                json!({ "device_id": device_id }),
                Duration::ZERO,
            )
            .await?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(reply.png_base64.as_bytes())
            .map_err(|e| BridgeError::backend("capture_screenshot", format!("bad image data: {}", e)))?;
        tokio::fs::write(dest, bytes).await?;
        Ok(())
    }

    async fn start_recording(
        &self,
        device_id: &str,
        options: RecordingOptions,
    ) -> Result<RecordingInfo, BridgeError> {
        self.call(
            "start_recording",
            json!({ "device_id": device_id, "options": options }),
            Duration::ZERO,
        )
        .await
    }

    async fn stop_recording(
        &self,
        device_id: &str,
        save_path: Option<&Path>,
    ) -> Result<RecordingInfo, BridgeError> {
        self.call(
            "stop_recording",
            json!({ "device_id": device_id, "save_path": save_path.map(|p| p.display().to_string()) }),
            Duration::ZERO,
        )
        .await
    }

    async fn create_session(&self, request: NewSession) -> Result<Session, BridgeError> {
        self.call("create_session", serde_json::to_value(request)?, Duration::ZERO)
            .await
    }

    async fn end_session(&self, session_id: &str) -> Result<Session, BridgeError> {
        self.call("end_session", json!({ "session_id": session_id }), Duration::ZERO)
            .await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, BridgeError> {
        self.lookup("get_session", json!({ "session_id": session_id }))
            .await
    }

    async fn list_sessions(&self, limit: Option<usize>) -> Result<Vec<SessionSummary>, BridgeError> {
        self.call("list_sessions", json!({ "limit": limit }), Duration::ZERO)
            .await
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), BridgeError> {
        self.call_unit("delete_session", json!({ "session_id": session_id }))
            .await
    }

    async fn query_events(&self, query: &EventQuery) -> Result<EventPage, BridgeError> {
        self.call("query_events", serde_json::to_value(query)?, Duration::ZERO)
            .await
    }

    async fn update_session_config(
        &self,
        session_id: &str,
        patch: SessionConfigPatch,
    ) -> Result<SessionConfig, BridgeError> {
        self.call(
            "update_session_config",
            json!({ "session_id": session_id, "patch": patch }),
            Duration::ZERO,
        )
        .await
    }

    async fn export_session(
        &self,
        session_id: &str,
        output_path: &Path,
    ) -> Result<ArchiveSummary, BridgeError> {
        self.call(
            "export_session",
            json!({ "session_id": session_id, "output_path": output_path.display().to_string() }),
            Duration::ZERO,
        )
        .await
    }

    async fn import_session(&self, archive_path: &Path) -> Result<Session, BridgeError> {
        self.call(
            "import_session",
            json!({ "archive_path": archive_path.display().to_string() }),
            Duration::ZERO,
        )
        .await
    }

    async fn session_stats(&self, session_id: &str) -> Result<SessionStats, BridgeError> {
        self.call("session_stats", json!({ "session_id": session_id }), Duration::ZERO)
            .await
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, BridgeError> {
        self.call("list_workflows", json!({}), Duration::ZERO).await
    }

    async fn get_workflow(&self, workflow_id: &str) -> Result<Option<Workflow>, BridgeError> {
        self.lookup("get_workflow", json!({ "workflow_id": workflow_id }))
            .await
    }

    async fn run_workflow(
        &self,
        workflow_id: &str,
        device_id: &str,
    ) -> Result<WorkflowRunReport, BridgeError> {
        self.call(
            "run_workflow",
            json!({ "workflow_id": workflow_id, "device_id": device_id }),
            WORKFLOW_RUN_TIMEOUT,
        )
        .await
    }

    async fn stop_workflow(&self, device_id: &str) -> Result<(), BridgeError> {
        self.call_unit("stop_workflow", json!({ "device_id": device_id }))
            .await
    }

    async fn list_plugins(&self) -> Result<Vec<Plugin>, BridgeError> {
        self.call("list_plugins", json!({}), Duration::ZERO).await
    }

    async fn get_plugin(&self, plugin_id: &str) -> Result<Option<Plugin>, BridgeError> {
        self.lookup("get_plugin", json!({ "plugin_id": plugin_id }))
            .await
    }

    async fn create_plugin(&self, draft: PluginDraft) -> Result<Plugin, BridgeError> {
        self.call("create_plugin", serde_json::to_value(draft)?, Duration::ZERO)
            .await
    }

    async fn update_plugin(&self, plugin_id: &str, patch: PluginPatch) -> Result<Plugin, BridgeError> {
        self.call(
            "update_plugin",
            json!({ "plugin_id": plugin_id, "patch": patch }),
            Duration::ZERO,
        )
        .await
    }

    async fn delete_plugin(&self, plugin_id: &str) -> Result<(), BridgeError> {
        self.call_unit("delete_plugin", json!({ "plugin_id": plugin_id }))
            .await
    }

    async fn set_plugin_enabled(&self, plugin_id: &str, enabled: bool) -> Result<Plugin, BridgeError> {
        self.call(
            "set_plugin_enabled",
            json!({ "plugin_id": plugin_id, "enabled": enabled }),
            Duration::ZERO,
        )
        .await
    }

    async fn test_plugin(&self, plugin_id: &str, event: Value) -> Result<PluginTestReport, BridgeError> {
        self.call(
            "test_plugin",
            json!({ "plugin_id": plugin_id, "event": event }),
            Duration::ZERO,
        )
        .await
    }
}
