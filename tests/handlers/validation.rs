//! Cross-cutting validation tests for MCP handlers.
//!
//! Request-level failures must abort before the backend is reached and must
//! name the offending parameter. Uses insta inline snapshots for message
//! stability.

use crate::common::harness::TestHarness;

use autobridge::mcp::ParamKind;
use insta::assert_snapshot;
use rmcp::model::ErrorCode;
use serde_json::{json, Map, Value};

fn placeholder(kind: ParamKind) -> Value {
    match kind {
        ParamKind::Text => json!("placeholder"),
        ParamKind::Integer => json!(1),
        ParamKind::Number => json!(1.5),
        ParamKind::Boolean => json!(true),
    }
}

// ============================================================================
// MISSING REQUIRED PARAMETERS
// ============================================================================

/// Every operation, every required parameter: omitting it fails before the
/// backend is called and the error names it.
#[tokio::test]
async fn test_every_missing_required_parameter_is_named() {
    let harness = TestHarness::empty();
    let descriptors: Vec<_> = harness.server.registry().descriptors().cloned().collect();
    let mut checked = 0;

    for descriptor in &descriptors {
        let required: Vec<_> = descriptor.params.iter().filter(|p| p.required).collect();
        for omitted in &required {
            let mut arguments = Map::new();
            for spec in &required {
                if spec.name != omitted.name {
                    arguments.insert(spec.name.to_string(), placeholder(spec.kind));
                }
            }

            let err = harness
                .call_err(descriptor.name, Value::Object(arguments))
                .await;
            assert_eq!(err.code, ErrorCode::INVALID_PARAMS, "{}", descriptor.name);
            assert!(
                err.message.contains(omitted.name),
                "{}: error '{}' should name '{}'",
                descriptor.name,
                err.message,
                omitted.name
            );
            checked += 1;
        }
    }

    assert!(checked >= 25, "only {} required parameters checked", checked);
    assert!(
        harness.backend.calls().is_empty(),
        "backend was called: {:?}",
        harness.backend.calls()
    );
}

#[tokio::test]
async fn test_missing_parameter_message() {
    let harness = TestHarness::empty();
    let err = harness.call_err("get_device", json!({})).await;
    assert_snapshot!(
        err.message,
        @"Invalid parameter 'device_id': missing required parameter (expected string)"
    );
}

#[tokio::test]
async fn test_null_arguments_treated_as_empty() {
    let harness = TestHarness::empty();
    let err = harness.call_err("get_session", Value::Null).await;
    assert!(err.message.contains("session_id"));
}

// ============================================================================
// TYPE MISMATCHES
// ============================================================================

#[tokio::test]
async fn test_wrong_type_names_parameter() {
    let harness = TestHarness::new();
    let err = harness
        .call_err("get_device", json!({ "device_id": 5554 }))
        .await;
    assert_snapshot!(err.message, @"Invalid parameter 'device_id': expected string, got number");

    let err = harness
        .call_err(
            "toggle_plugin",
            json!({ "plugin_id": "p1", "enabled": "yes" }),
        )
        .await;
    assert!(err.message.contains("enabled"));
    assert!(harness.backend.calls().is_empty());
}

#[tokio::test]
async fn test_blank_required_text_rejected() {
    let harness = TestHarness::new();
    let err = harness
        .call_err("get_session", json!({ "session_id": "   " }))
        .await;
    assert_snapshot!(err.message, @"Invalid parameter 'session_id': must be a non-empty string");
    assert!(harness.backend.calls().is_empty());
}

// ============================================================================
// UNKNOWN OPERATIONS
// ============================================================================

#[tokio::test]
async fn test_unknown_operation_suggests_closest() {
    let harness = TestHarness::new();
    let err = harness.call_err("list_device", json!({})).await;
    assert_eq!(err.code, ErrorCode::METHOD_NOT_FOUND);
    assert!(err.message.contains("did you mean 'list_devices'"));
}

#[tokio::test]
async fn test_unknown_operation_without_close_match() {
    let harness = TestHarness::new();
    let err = harness.call_err("reticulate_splines", json!({})).await;
    assert_snapshot!(err.message, @"Unknown operation: reticulate_splines");
}

// ============================================================================
// NOT FOUND
// ============================================================================

#[tokio::test]
async fn test_unknown_ids_are_request_level() {
    let harness = TestHarness::new();
    for (tool, arguments, id) in [
        ("get_device", json!({ "device_id": "ghost" }), "ghost"),
        ("get_session", json!({ "session_id": "s-404" }), "s-404"),
        ("get_plugin", json!({ "plugin_id": "p-404" }), "p-404"),
        (
            "run_workflow",
            json!({ "workflow_id": "wf-404", "device_id": "emulator-5554" }),
            "wf-404",
        ),
    ] {
        let err = harness.call_err(tool, arguments).await;
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS, "{}", tool);
        assert!(err.message.contains(id), "{}: {}", tool, err.message);
        let data = err.data.expect("structured error data");
        assert_eq!(data["error_code"], "NOT_FOUND");
    }
}
