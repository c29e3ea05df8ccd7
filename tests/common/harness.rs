//! Test harness for server lifecycle management.
//!
//! Each harness wires a fresh in-memory backend into a `BridgeServer`, with
//! scratch and export directories inside an isolated temp directory.

use std::path::Path;
use std::sync::Arc;

use autobridge::backend::{AutomationBackend, InMemoryBackend};
use autobridge::mcp::{BridgeServer, ToolContext};
use rmcp::model::{CallToolResult, ErrorData, JsonObject, RawContent};
use serde_json::Value;
use tempfile::TempDir;

/// Test harness that owns the backend and the server under test.
///
/// The temp directory is removed when the harness is dropped.
pub struct TestHarness {
    /// Concrete backend, kept for call-log and fixture assertions
    pub backend: Arc<InMemoryBackend>,
    pub server: BridgeServer,
    /// Temporary directory (kept alive while harness exists)
    pub temp_dir: TempDir,
}

impl TestHarness {
    /// Harness over the seeded demo fixtures.
    pub fn new() -> Self {
        Self::with_backend(InMemoryBackend::seeded())
    }

    /// Harness over a backend with no devices, sessions, workflows or plugins.
    pub fn empty() -> Self {
        Self::with_backend(InMemoryBackend::new())
    }

    pub fn with_backend(backend: InMemoryBackend) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory for test harness");
        let backend = Arc::new(backend);
        let shared: Arc<dyn AutomationBackend> = backend.clone();
        let ctx = ToolContext::new(
            shared,
            temp_dir.path().join("scratch"),
            temp_dir.path().join("exports"),
        );
        let server = BridgeServer::new(ctx).expect("Failed to build server");
        Self {
            backend,
            server,
            temp_dir,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub async fn call(&self, name: &str, arguments: Value) -> Result<CallToolResult, ErrorData> {
        self.server.call(name, args(arguments)).await
    }

    /// Call that must produce a result envelope (flagged or not).
    pub async fn call_ok(&self, name: &str, arguments: Value) -> CallToolResult {
        match self.call(name, arguments).await {
            Ok(result) => result,
            Err(e) => panic!("{} returned a protocol error: {}", name, e.message),
        }
    }

    /// Call that must abort with a protocol error.
    pub async fn call_err(&self, name: &str, arguments: Value) -> ErrorData {
        match self.call(name, arguments).await {
            Ok(result) => panic!("{} unexpectedly succeeded: {:?}", name, texts(&result)),
            Err(e) => e,
        }
    }

    /// Files currently in the scratch directory.
    pub fn scratch_files(&self) -> Vec<String> {
        let dir = self.temp_path().join("scratch");
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Convert a `json!` object literal into tool arguments.
pub fn args(value: Value) -> Option<JsonObject> {
    match value {
        Value::Object(map) => Some(map),
        Value::Null => None,
        other => panic!("tool arguments must be an object, got {other}"),
    }
}

/// Text of every text block, in order.
pub fn texts(result: &CallToolResult) -> Vec<String> {
    result
        .content
        .iter()
        .filter_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.clone()),
            _ => None,
        })
        .collect()
}

pub fn first_text(result: &CallToolResult) -> String {
    texts(result).into_iter().next().unwrap_or_default()
}
