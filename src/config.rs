use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:17321";
pub const CONFIG_FILE: &str = "bridge.toml";

fn default_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_seeded() -> bool {
    true
}

/// How to reach the automation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BackendConfig {
    /// A backend process speaking JSON over HTTP.
    Http {
        #[serde(default = "default_url")]
        url: String,
        /// Bearer token (can also be set via `AUTOBRIDGE_BACKEND_TOKEN`)
        #[serde(default)]
        token: Option<String>,
        /// Base timeout for one request. Long-running calls add their own.
        #[serde(default = "default_request_timeout")]
        request_timeout_secs: u64,
    },
    /// In-process fake, useful for demos and client development.
    Memory {
        /// Start with a demo device, workflow and session
        #[serde(default = "default_seeded")]
        seeded: bool,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Http {
            url: default_url(),
            token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl BackendConfig {
    /// Short human label for logs.
    pub fn label(&self) -> String {
        match self {
            Self::Http { url, .. } => format!("http {}", url),
            Self::Memory { seeded: true } => "memory (seeded)".to_string(),
            Self::Memory { seeded: false } => "memory".to_string(),
        }
    }
}

/// Contents of `{data_path}/bridge.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    /// Where screenshots are staged (default: `{data_path}/scratch`)
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    /// Default export directory (default: `{data_path}/exports`)
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
}

/// Load bridge config with priority:
/// 1. `{data_path}/bridge.toml` file
/// 2. `AUTOBRIDGE_BACKEND_URL` env var → `Http` backend at that URL
/// 3. Default → `Http` backend at [`DEFAULT_BACKEND_URL`]
pub fn load_config(data_path: &Path) -> BridgeConfig {
    let config_path = data_path.join(CONFIG_FILE);
    if config_path.exists() {
        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<BridgeConfig>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded bridge config from {}", config_path.display());
                    return config;
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse {}: {}. Using default.",
                        config_path.display(),
                        e
                    );
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read {}: {}. Using default.",
                    config_path.display(),
                    e
                );
            }
        }
    }

    config_from_env(
        std::env::var("AUTOBRIDGE_BACKEND_URL").ok(),
        std::env::var("AUTOBRIDGE_BACKEND_TOKEN").ok(),
    )
}

fn config_from_env(url: Option<String>, token: Option<String>) -> BridgeConfig {
    let backend = match url {
        Some(url) => {
            tracing::info!("Loaded backend URL from AUTOBRIDGE_BACKEND_URL env");
            BackendConfig::Http {
                url,
                token,
                request_timeout_secs: default_request_timeout(),
            }
        }
        None => BackendConfig::Http {
            url: default_url(),
            token,
            request_timeout_secs: default_request_timeout(),
        },
    };
    BridgeConfig {
        backend,
        ..Default::default()
    }
}
