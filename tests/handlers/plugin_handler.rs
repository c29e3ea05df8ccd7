//! Plugin handler tests, including embedded JSON parameters.

use crate::common::builders::PluginBuilder;
use crate::common::harness::{first_text, texts, TestHarness};

use autobridge::backend::InMemoryBackend;
use insta::assert_snapshot;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn with_plugins() -> TestHarness {
    TestHarness::with_backend(
        InMemoryBackend::new()
            .with_plugin(PluginBuilder::new("p-net", "Network tap").types(&["network"]).build())
            .with_plugin(
                PluginBuilder::new("p-bad", "Broken")
                    .script("throw new Error('boom')")
                    .build(),
            ),
    )
}

#[tokio::test]
async fn test_list_plugins_empty() {
    let harness = TestHarness::empty();
    let result = harness.call_ok("list_plugins", json!({})).await;
    assert_eq!(texts(&result), vec!["No plugins found.".to_string()]);
}

#[tokio::test]
async fn test_create_plugin_parses_embedded_json() {
    let harness = TestHarness::empty();
    let result = harness
        .call_ok(
            "create_plugin",
            json!({
                "name": "Error catcher",
                "script": "export default (e) => e",
                "filters": r#"{"levels": ["error"], "url_pattern": "/api/"}"#,
                "config": r#"{"threshold": 3}"#,
            }),
        )
        .await;
    assert_eq!(result.is_error, Some(false));
    assert!(first_text(&result).starts_with("Created plugin "));

    let plugin: Value = serde_json::from_str(&texts(&result)[1]).unwrap();
    assert_eq!(plugin["filters"]["levels"], json!(["error"]));
    assert_eq!(plugin["filters"]["url_pattern"], "/api/");
    assert_eq!(plugin["config"]["threshold"], 3);
}

#[tokio::test]
async fn test_malformed_embedded_json_names_field() {
    let harness = TestHarness::empty();
    let err = harness
        .call_err(
            "create_plugin",
            json!({ "name": "x", "script": "y", "config": "{not json" }),
        )
        .await;
    assert!(err.message.starts_with("Invalid parameter 'config': invalid JSON"));
    assert!(harness.backend.calls().is_empty());
}

#[tokio::test]
async fn test_duplicate_plugin_name_is_backend_failure() {
    let harness = with_plugins();
    let result = harness
        .call_ok(
            "create_plugin",
            json!({ "name": "Broken", "script": "noop" }),
        )
        .await;
    assert_eq!(result.is_error, Some(true));
    assert!(first_text(&result).contains("already exists"));
}

#[tokio::test]
async fn test_update_plugin_requires_a_field() {
    let harness = with_plugins();
    let err = harness
        .call_err("update_plugin", json!({ "plugin_id": "p-net" }))
        .await;
    assert!(err.message.contains("name"));

    let result = harness
        .call_ok(
            "update_plugin",
            json!({ "plugin_id": "p-net", "description": "Taps network events" }),
        )
        .await;
    let plugin: Value = serde_json::from_str(&texts(&result)[1]).unwrap();
    assert_eq!(plugin["description"], "Taps network events");
    assert_eq!(plugin["name"], "Network tap");
}

#[tokio::test]
async fn test_toggle_plugin() {
    let harness = with_plugins();
    let result = harness
        .call_ok(
            "toggle_plugin",
            json!({ "plugin_id": "p-net", "enabled": false }),
        )
        .await;
    assert_snapshot!(first_text(&result), @"Plugin Network tap is now disabled");
}

#[tokio::test]
async fn test_delete_unknown_plugin() {
    let harness = with_plugins();
    harness
        .call_err("delete_plugin", json!({ "plugin_id": "p-gone" }))
        .await;
    assert_eq!(harness.backend.call_count("delete_plugin"), 0);

    let result = harness
        .call_ok("delete_plugin", json!({ "plugin_id": "p-net" }))
        .await;
    assert_eq!(first_text(&result), "Deleted plugin p-net (Network tap)");
}

#[tokio::test]
async fn test_test_plugin_match_and_miss() {
    let harness = with_plugins();
    let hit = harness
        .call_ok(
            "test_plugin",
            json!({ "plugin_id": "p-net", "event": r#"{"type": "network", "url": "/api/login"}"# }),
        )
        .await;
    assert_eq!(first_text(&hit), "Plugin Network tap matched the event in 1ms");

    let miss = harness
        .call_ok(
            "test_plugin",
            json!({ "plugin_id": "p-net", "event": r#"{"type": "touch"}"# }),
        )
        .await;
    assert_eq!(first_text(&miss), "Plugin Network tap did not match the event in 1ms");
}

#[tokio::test]
async fn test_test_plugin_script_error_is_flagged_with_logs() {
    let harness = with_plugins();
    let result = harness
        .call_ok(
            "test_plugin",
            json!({ "plugin_id": "p-bad", "event": r#"{"type": "log"}"# }),
        )
        .await;
    assert_eq!(result.is_error, Some(true));
    let blocks = texts(&result);
    assert_eq!(
        blocks[0],
        "Plugin 'Broken' test failed: uncaught exception in plugin script"
    );
    assert!(blocks[1].contains("script raised an exception"));
}

#[tokio::test]
async fn test_test_plugin_event_must_be_object() {
    let harness = with_plugins();
    let err = harness
        .call_err(
            "test_plugin",
            json!({ "plugin_id": "p-net", "event": "[1, 2, 3]" }),
        )
        .await;
    assert_snapshot!(err.message, @"Invalid parameter 'event': expected a JSON object");
    assert!(harness.backend.calls().is_empty());
}
