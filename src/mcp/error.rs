//! Error mapping between handler outcomes and the MCP surface.
//!
//! Request-level failures become protocol errors (`ErrorData`) so the caller
//! knows to fix its input. Result-level failures become a well-formed
//! `CallToolResult` flagged `is_error`.

use rmcp::model::{CallToolResult, ErrorCode, ErrorData};
use serde_json::json;
use std::borrow::Cow;

use crate::mcp::result::ToolOutput;
use crate::BridgeError;

/// Where a failure surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Abort with a protocol error; no meaningful backend attempt happened.
    Request,
    /// The backend was invoked and failed; flagged envelope.
    Result,
    /// Not a failure from the caller's perspective; plain informational result.
    Informational,
}

pub fn classify(err: &BridgeError) -> FailureClass {
    match err {
        BridgeError::Backend { .. } => FailureClass::Result,
        BridgeError::AlreadyRunning { .. } => FailureClass::Informational,
        _ => FailureClass::Request,
    }
}

/// Route a handler outcome into the tool-call response.
pub fn map_outcome(outcome: Result<ToolOutput, BridgeError>) -> Result<CallToolResult, ErrorData> {
    match outcome {
        Ok(output) => Ok(output.into_call_result()),
        Err(err) => match classify(&err) {
            FailureClass::Request => Err(err.into()),
            FailureClass::Result => Ok(result_level_output(err).into_call_result()),
            FailureClass::Informational => Ok(ToolOutput::text(err.to_string()).into_call_result()),
        },
    }
}

fn result_level_output(err: BridgeError) -> ToolOutput {
    match err {
        BridgeError::Backend {
            operation,
            message,
            partial_output,
        } => ToolOutput::failed(format!("{} failed: {}", operation, message), partial_output),
        other => ToolOutput::failed(other.to_string(), None),
    }
}

fn suggestion(err: &BridgeError) -> &'static str {
    match err {
        BridgeError::UnknownOperation { .. } => "List available tools and retry with a registered name.",
        BridgeError::UnknownResource(_) => "List resources and resource templates for valid URIs.",
        BridgeError::InvalidUri { .. } => "Check the URI against the advertised resource templates.",
        BridgeError::Validation { .. } => "Check the parameter name, type, and required fields.",
        BridgeError::NotFound { .. } => "Check the id; list the collection to find valid ids.",
        BridgeError::Registry(_) | BridgeError::Config(_) => "Server misconfiguration; check server logs.",
        BridgeError::Io(_) => "Check the path exists and is accessible.",
        BridgeError::Backend { .. } | BridgeError::AlreadyRunning { .. } => {
            "Inspect the backend state and retry."
        }
    }
}

impl From<BridgeError> for ErrorData {
    fn from(err: BridgeError) -> Self {
        let mut data = json!({
            "error_code": err.code(),
            "suggestion": suggestion(&err),
        });
        match &err {
            BridgeError::Validation { field, .. } => {
                data["field"] = json!(field);
            }
            BridgeError::NotFound { kind, id } => {
                data["entity_type"] = json!(kind);
                data["id"] = json!(id);
            }
            BridgeError::UnknownOperation {
                suggestion: Some(closest),
                ..
            } => {
                data["did_you_mean"] = json!(closest);
            }
            BridgeError::InvalidUri { uri, .. } => {
                data["uri"] = json!(uri);
            }
            _ => {}
        }

        let code = match &err {
            BridgeError::UnknownOperation { .. } => ErrorCode::METHOD_NOT_FOUND,
            BridgeError::UnknownResource(_) => ErrorCode::RESOURCE_NOT_FOUND,
            BridgeError::Validation { .. }
            | BridgeError::NotFound { .. }
            | BridgeError::InvalidUri { .. } => ErrorCode::INVALID_PARAMS,
            _ => ErrorCode::INTERNAL_ERROR,
        };

        let message = match &err {
            BridgeError::UnknownOperation {
                suggestion: Some(closest),
                ..
            } => format!("{} (did you mean '{}'?)", err, closest),
            _ => err.to_string(),
        };

        ErrorData {
            code,
            message: Cow::Owned(message),
            data: Some(data),
        }
    }
}

/// Resource reads report unknown ids as `resource_not_found`.
pub fn resource_error(err: BridgeError) -> ErrorData {
    match err {
        BridgeError::NotFound { .. } | BridgeError::UnknownResource(_) => {
            let data = json!({ "error_code": err.code(), "suggestion": suggestion(&err) });
            ErrorData::resource_not_found(err.to_string(), Some(data))
        }
        other => other.into(),
    }
}
