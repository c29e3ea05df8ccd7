//! Device and media tool handler tests.

use crate::common::builders::DeviceBuilder;
use crate::common::harness::{first_text, texts, TestHarness};

use autobridge::backend::{CommandOutput, InMemoryBackend};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_list_devices_empty_is_explicit() {
    let harness = TestHarness::empty();
    let result = harness.call_ok("list_devices", json!({})).await;
    assert_eq!(result.is_error, Some(false));
    assert_eq!(texts(&result), vec!["No devices found.".to_string()]);
}

#[tokio::test]
async fn test_list_devices_narrative_and_json() {
    let harness = TestHarness::with_backend(
        InMemoryBackend::new()
            .with_device(DeviceBuilder::new("pixel-7").model("Pixel 7").android("14").build())
            .with_device(DeviceBuilder::new("emulator-5556").build()),
    );
    let result = harness.call_ok("list_devices", json!({})).await;
    let blocks = texts(&result);
    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].starts_with("Found 2 devices:"));
    assert!(blocks[0].contains("pixel-7 (device) - Pixel 7, Android 14"));

    let parsed: serde_json::Value = serde_json::from_str(&blocks[1]).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_connect_device_requires_port() {
    let harness = TestHarness::empty();
    let err = harness
        .call_err("connect_device", json!({ "address": "192.168.1.20" }))
        .await;
    assert!(err.message.contains("address"));
    assert_eq!(harness.backend.call_count("connect_device"), 0);

    let result = harness
        .call_ok("connect_device", json!({ "address": "192.168.1.20:5555" }))
        .await;
    assert!(first_text(&result).starts_with("Connected to 192.168.1.20:5555"));
}

#[tokio::test]
async fn test_disconnect_unknown_device_never_reaches_backend_action() {
    let harness = TestHarness::new();
    harness
        .call_err("disconnect_device", json!({ "device_id": "ghost" }))
        .await;
    assert_eq!(harness.backend.call_count("disconnect_device"), 0);
}

#[tokio::test]
async fn test_run_device_command_success() {
    let harness = TestHarness::with_backend(
        InMemoryBackend::seeded().with_command_result(
            "getprop ro.build.version.release",
            CommandOutput {
                exit_code: 0,
                stdout: "14\n".into(),
                ..Default::default()
            },
        ),
    );
    let result = harness
        .call_ok(
            "run_device_command",
            json!({ "device_id": "emulator-5554", "command": "getprop ro.build.version.release" }),
        )
        .await;
    assert_eq!(result.is_error, Some(false));
    assert_eq!(first_text(&result), "Command completed on emulator-5554:\n14\n");
}

#[tokio::test]
async fn test_run_device_command_failure_keeps_partial_output() {
    let harness = TestHarness::with_backend(InMemoryBackend::seeded().with_command_result(
        "pm clear com.example",
        CommandOutput {
            exit_code: 1,
            stdout: "Clearing data\n".into(),
            stderr: "Error: package not found".into(),
            timed_out: false,
        },
    ));
    let result = harness
        .call_ok(
            "run_device_command",
            json!({ "device_id": "emulator-5554", "command": "pm clear com.example" }),
        )
        .await;

    assert_eq!(result.is_error, Some(true));
    let blocks = texts(&result);
    assert_eq!(
        blocks[0],
        "Command 'pm clear com.example' on emulator-5554 failed: exited with code 1"
    );
    assert!(blocks[1].starts_with("Partial output:\n"));
    assert!(blocks[1].contains("package not found"));
}

#[tokio::test]
async fn test_run_device_command_timeout_is_flagged() {
    let harness = TestHarness::with_backend(InMemoryBackend::seeded().with_command_result(
        "logcat",
        CommandOutput {
            exit_code: -1,
            stdout: "I/ActivityManager: start".into(),
            stderr: String::new(),
            timed_out: true,
        },
    ));
    let result = harness
        .call_ok(
            "run_device_command",
            json!({ "device_id": "emulator-5554", "command": "logcat", "timeout": 5000 }),
        )
        .await;
    assert_eq!(result.is_error, Some(true));
    // Requested timeout is capped at 300s.
    assert!(first_text(&result).contains("timed out after 300s"));
}

#[tokio::test]
async fn test_run_ffmpeg_splits_quoted_arguments() {
    let harness = TestHarness::empty();
    let result = harness
        .call_ok(
            "run_ffmpeg",
            json!({ "args": "-i 'my clip.mp4' -vf scale=640:-1 out.mp4" }),
        )
        .await;
    assert_eq!(result.is_error, Some(false));
    assert!(first_text(&result).contains("-i my clip.mp4 -vf scale=640:-1 out.mp4"));
}

#[tokio::test]
async fn test_run_ffprobe_unbalanced_quote_is_validation_error() {
    let harness = TestHarness::empty();
    let err = harness
        .call_err("run_ffprobe", json!({ "args": "-i \"broken.mp4" }))
        .await;
    assert!(err.message.contains("args"));
    assert!(harness.backend.calls().is_empty());
}

#[tokio::test]
async fn test_run_ffmpeg_failure_is_flagged_envelope() {
    let harness = TestHarness::with_backend(InMemoryBackend::new().with_media_result(CommandOutput {
        exit_code: 1,
        stdout: String::new(),
        stderr: "in.mp4: No such file or directory".into(),
        timed_out: false,
    }));
    let result = harness
        .call_ok("run_ffmpeg", json!({ "args": "-i in.mp4 out.webm" }))
        .await;
    assert_eq!(result.is_error, Some(true));
    assert!(texts(&result).iter().any(|t| t.contains("No such file")));
}
