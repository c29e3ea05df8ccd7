use thiserror::Error;

/// Error type for autobridge operations.
///
/// Variants map onto two failure classes: request-level failures abort before
/// (or without) a meaningful backend attempt, result-level failures happen
/// after the backend was invoked. See [`BridgeError::is_request_level`].
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No operation is registered under this name.
    #[error("Unknown operation: {name}")]
    UnknownOperation {
        name: String,
        suggestion: Option<String>,
    },

    /// No resource pattern claims this URI.
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// URI was claimed by a pattern but could not be bound.
    #[error("Invalid URI format: {uri} ({reason})")]
    InvalidUri { uri: String, reason: String },

    /// Parameter missing, mistyped, or carrying malformed embedded JSON.
    #[error("Invalid parameter '{field}': {message}")]
    Validation { field: String, message: String },

    /// Referenced device/session/workflow/plugin does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },

    /// The backend was invoked and reported a failure.
    #[error("{operation} failed: {message}")]
    Backend {
        operation: String,
        message: String,
        partial_output: Option<String>,
    },

    /// A detached task is already active for this target.
    #[error("{what} is already running: {detail}")]
    AlreadyRunning { what: String, detail: String },

    /// Operation or resource table could not be built.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
            partial_output: None,
        }
    }

    /// Backend failure carrying whatever output was collected before it failed.
    pub fn backend_with_output(
        operation: impl Into<String>,
        message: impl Into<String>,
        partial_output: impl Into<String>,
    ) -> Self {
        let partial = partial_output.into();
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
            partial_output: (!partial.trim().is_empty()).then_some(partial),
        }
    }

    /// True when the caller should fix its input and retry.
    ///
    /// `Backend` and `AlreadyRunning` are the only variants that reach the
    /// caller inside a well-formed result envelope.
    pub fn is_request_level(&self) -> bool {
        !matches!(self, Self::Backend { .. } | Self::AlreadyRunning { .. })
    }

    /// Stable machine-readable code used in structured error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownOperation { .. } => "UNKNOWN_OPERATION",
            Self::UnknownResource(_) => "UNKNOWN_RESOURCE",
            Self::InvalidUri { .. } => "INVALID_URI",
            Self::Validation { .. } => "INVALID_PARAMS",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Backend { .. } => "BACKEND_ERROR",
            Self::AlreadyRunning { .. } => "ALREADY_RUNNING",
            Self::Registry(_) => "REGISTRY_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::backend("JSON serialization", err.to_string())
    }
}
