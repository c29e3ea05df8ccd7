//! Shared initialization logic for MCP and CLI modes.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{AutomationBackend, HttpBackend, InMemoryBackend};
use crate::config::{load_config, BackendConfig, BridgeConfig};
use crate::mcp::ToolContext;

/// Application context holding the backend handle and resolved paths.
///
/// Shared between MCP server and CLI commands.
pub struct AppContext {
    pub data_path: PathBuf,
    pub config: BridgeConfig,
    pub backend: Arc<dyn AutomationBackend>,
    pub backend_label: String,
}

impl AppContext {
    /// Initialize application context.
    ///
    /// Data path priority: explicit path > AUTOBRIDGE_DATA_PATH env > ./.autobridge (if exists) > ~/.autobridge
    pub async fn new(explicit_path: Option<PathBuf>) -> Result<Self> {
        let data_path = resolve_data_path(explicit_path);
        tracing::info!("Using data path: {}", data_path.display());

        tokio::fs::create_dir_all(&data_path).await?;
        let config = load_config(&data_path);
        Self::with_config(data_path, config)
    }

    /// Build a context from an already loaded config.
    pub fn with_config(data_path: PathBuf, config: BridgeConfig) -> Result<Self> {
        let backend: Arc<dyn AutomationBackend> = match &config.backend {
            BackendConfig::Http {
                url,
                token,
                request_timeout_secs,
            } => Arc::new(HttpBackend::new(
                url,
                token.clone(),
                Duration::from_secs(*request_timeout_secs),
            )?),
            BackendConfig::Memory { seeded: true } => Arc::new(InMemoryBackend::seeded()),
            BackendConfig::Memory { seeded: false } => Arc::new(InMemoryBackend::new()),
        };
        let backend_label = config.backend.label();
        tracing::info!("Backend: {}", backend_label);

        Ok(Self {
            data_path,
            config,
            backend,
            backend_label,
        })
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.config
            .scratch_dir
            .clone()
            .unwrap_or_else(|| self.data_path.join("scratch"))
    }

    pub fn export_dir(&self) -> PathBuf {
        self.config
            .export_dir
            .clone()
            .unwrap_or_else(|| self.data_path.join("exports"))
    }

    /// Handle given to tool handlers. Each call starts a fresh run table.
    pub fn tool_context(&self) -> ToolContext {
        ToolContext::new(self.backend.clone(), self.scratch_dir(), self.export_dir())
    }
}

fn resolve_data_path(explicit_path: Option<PathBuf>) -> PathBuf {
    explicit_path
        .or_else(|| std::env::var("AUTOBRIDGE_DATA_PATH").ok().map(PathBuf::from))
        .or_else(|| {
            let local_path = Path::new(".autobridge");
            if local_path.exists() && local_path.is_dir() {
                Some(local_path.to_path_buf())
            } else {
                None
            }
        })
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".autobridge"))
                .unwrap_or_else(|| PathBuf::from(".autobridge"))
        })
}
