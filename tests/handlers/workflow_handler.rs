//! Workflow handler tests: detached runs and their status.

use std::time::Duration;

use crate::common::builders::{DeviceBuilder, WorkflowBuilder};
use crate::common::harness::{first_text, texts, TestHarness};

use autobridge::backend::InMemoryBackend;
use serde_json::json;

/// Poll `workflow_status` until its narrative contains `needle`.
async fn wait_for_status(harness: &TestHarness, device_id: &str, needle: &str) -> String {
    for _ in 0..200 {
        let result = harness
            .call_ok("workflow_status", json!({ "device_id": device_id }))
            .await;
        let text = first_text(&result);
        if text.contains(needle) {
            return text;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("workflow status on {} never contained '{}'", device_id, needle);
}

async fn wait_for_backend_call(harness: &TestHarness, method: &str) {
    for _ in 0..200 {
        if harness.backend.call_count(method) > 0 {
            // Let the run reach the gate.
            tokio::time::sleep(Duration::from_millis(20)).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("backend never received {}", method);
}

#[tokio::test]
async fn test_list_workflows() {
    let harness = TestHarness::new();
    let result = harness.call_ok("list_workflows", json!({})).await;
    assert!(first_text(&result).contains("wf-login | Login | 4 steps"));
}

#[tokio::test]
async fn test_run_acknowledges_before_completion_and_rejects_second_start() {
    let harness = TestHarness::new();
    harness.backend.hold_workflows();

    let ack = harness
        .call_ok(
            "run_workflow",
            json!({ "workflow_id": "wf-login", "device_id": "emulator-5554" }),
        )
        .await;
    assert_eq!(ack.is_error, Some(false));
    assert_eq!(
        first_text(&ack),
        "Started workflow 'Login' (4 steps) on emulator-5554. Use workflow_status to check progress."
    );
    wait_for_backend_call(&harness, "run_workflow").await;

    let running = wait_for_status(&harness, "emulator-5554", "running").await;
    assert!(running.contains("(4 steps)"));

    let again = harness
        .call_ok(
            "run_workflow",
            json!({ "workflow_id": "wf-login", "device_id": "emulator-5554" }),
        )
        .await;
    assert_eq!(again.is_error, Some(false));
    assert!(first_text(&again).contains("already running"));
    assert_eq!(harness.backend.call_count("run_workflow"), 1);

    harness.backend.release_workflows();
    let done = wait_for_status(&harness, "emulator-5554", "completed").await;
    assert!(done.ends_with("after 4/4 steps"));
}

#[tokio::test]
async fn test_new_run_allowed_after_completion() {
    let harness = TestHarness::new();
    let run = json!({ "workflow_id": "wf-login", "device_id": "emulator-5554" });

    harness.call_ok("run_workflow", run.clone()).await;
    wait_for_status(&harness, "emulator-5554", "completed").await;

    let second = harness.call_ok("run_workflow", run).await;
    assert!(first_text(&second).starts_with("Started workflow 'Login'"));
}

#[tokio::test]
async fn test_failed_run_reported_through_status() {
    let harness = TestHarness::with_backend(
        InMemoryBackend::seeded().with_workflow(
            WorkflowBuilder::new("wf-broken", "Broken")
                .step("launch")
                .step("fail")
                .step("tap")
                .build(),
        ),
    );
    harness
        .call_ok(
            "run_workflow",
            json!({ "workflow_id": "wf-broken", "device_id": "emulator-5554" }),
        )
        .await;

    let status = wait_for_status(&harness, "emulator-5554", "failed").await;
    assert!(status.contains("step 'step 2' failed"));
}

#[tokio::test]
async fn test_stop_workflow_ends_held_run() {
    let harness = TestHarness::new();
    harness.backend.hold_workflows();
    harness
        .call_ok(
            "run_workflow",
            json!({ "workflow_id": "wf-login", "device_id": "emulator-5554" }),
        )
        .await;
    wait_for_backend_call(&harness, "run_workflow").await;

    let stop = harness
        .call_ok("stop_workflow", json!({ "device_id": "emulator-5554" }))
        .await;
    assert_eq!(
        texts(&stop),
        vec!["Stop requested for workflow 'Login' on emulator-5554".to_string()]
    );

    harness.backend.release_workflows();
    let status = wait_for_status(&harness, "emulator-5554", "stopped").await;
    assert!(status.ends_with("after 0/4 steps"));
}

#[tokio::test]
async fn test_status_without_runs() {
    let harness = TestHarness::new();
    let result = harness
        .call_ok("workflow_status", json!({ "device_id": "emulator-5554" }))
        .await;
    assert_eq!(
        first_text(&result),
        "No workflow has been started on emulator-5554."
    );
}

#[tokio::test]
async fn test_status_follows_canonical_device_id() {
    let harness = TestHarness::with_backend(
        InMemoryBackend::seeded().with_device(
            DeviceBuilder::new("R58M123ABC")
                .model("Pixel 8")
                .address("192.168.1.40:5555")
                .build(),
        ),
    );
    harness.backend.hold_workflows();
    let ack = harness
        .call_ok(
            "run_workflow",
            json!({ "workflow_id": "wf-login", "device_id": "192.168.1.40:5555" }),
        )
        .await;
    assert!(first_text(&ack).ends_with(
        "on R58M123ABC. Use workflow_status to check progress."
    ));
    wait_for_backend_call(&harness, "run_workflow").await;

    for alias in ["192.168.1.40:5555", "R58M123ABC"] {
        let status = harness
            .call_ok("workflow_status", json!({ "device_id": alias }))
            .await;
        assert!(first_text(&status).contains("on device R58M123ABC: running"), "{}", alias);
    }
    harness.backend.release_workflows();
}

#[tokio::test]
async fn test_status_on_unknown_device_is_request_level() {
    let harness = TestHarness::new();
    let err = harness
        .call_err("workflow_status", json!({ "device_id": "ghost" }))
        .await;
    assert!(err.message.contains("ghost"));
}

#[tokio::test]
async fn test_run_on_unknown_device_is_request_level() {
    let harness = TestHarness::new();
    let err = harness
        .call_err(
            "run_workflow",
            json!({ "workflow_id": "wf-login", "device_id": "ghost" }),
        )
        .await;
    assert!(err.message.contains("ghost"));
    assert_eq!(harness.backend.call_count("run_workflow"), 0);
}
