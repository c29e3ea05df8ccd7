//! Screenshot and recording handler tests.

use crate::common::harness::{texts, TestHarness};

use autobridge::backend::InMemoryBackend;
use base64::Engine;
use rmcp::model::RawContent;
use serde_json::json;

const SHOT: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 1, 2, 3, 4];

#[tokio::test]
async fn test_screenshot_returns_image_and_cleans_scratch() {
    let harness =
        TestHarness::with_backend(InMemoryBackend::seeded().with_screenshot_bytes(SHOT.to_vec()));
    let result = harness
        .call_ok("take_screenshot", json!({ "device_id": "emulator-5554" }))
        .await;

    assert_eq!(result.is_error, Some(false));
    match &result.content[0].raw {
        RawContent::Image(image) => {
            assert_eq!(image.mime_type, "image/png");
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(&image.data)
                .unwrap();
            assert_eq!(decoded, SHOT);
        }
        other => panic!("expected image block, got {other:?}"),
    }
    assert_eq!(texts(&result), vec![format!("Screenshot of emulator-5554 ({} bytes)", SHOT.len())]);

    let scratch = harness.backend.last_screenshot_path().await.unwrap();
    assert!(!scratch.exists(), "scratch file {} left behind", scratch.display());
    assert!(harness.scratch_files().is_empty());
}

#[tokio::test]
async fn test_screenshot_save_path_gets_exact_bytes() {
    let harness =
        TestHarness::with_backend(InMemoryBackend::seeded().with_screenshot_bytes(SHOT.to_vec()));
    let target = harness.temp_path().join("shots/nested/home.png");

    let result = harness
        .call_ok(
            "take_screenshot",
            json!({ "device_id": "emulator-5554", "save_path": target.display().to_string() }),
        )
        .await;

    assert!(texts(&result)[0].contains("saved to"));
    assert_eq!(std::fs::read(&target).unwrap(), SHOT);
    assert!(harness.scratch_files().is_empty());
}

#[tokio::test]
async fn test_screenshot_failure_still_cleans_scratch() {
    let harness = TestHarness::with_backend(InMemoryBackend::seeded().with_failing_screenshots());
    let result = harness
        .call_ok("take_screenshot", json!({ "device_id": "emulator-5554" }))
        .await;

    assert_eq!(result.is_error, Some(true));
    assert!(texts(&result)[0].contains("screencap failed"));
    let scratch = harness.backend.last_screenshot_path().await.unwrap();
    assert!(!scratch.exists());
    assert!(harness.scratch_files().is_empty());
}

#[tokio::test]
async fn test_unwritable_save_path_is_a_note_not_a_failure() {
    let harness = TestHarness::new();
    let blocker = harness.temp_path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();
    let target = blocker.join("shot.png");

    let result = harness
        .call_ok(
            "take_screenshot",
            json!({ "device_id": "emulator-5554", "save_path": target.display().to_string() }),
        )
        .await;

    assert_eq!(result.is_error, Some(false));
    let blocks = texts(&result);
    assert_eq!(blocks.len(), 2);
    assert!(blocks[1].starts_with("Could not save a copy to"));
    assert!(harness.scratch_files().is_empty());
}

#[tokio::test]
async fn test_screenshot_unknown_device_is_request_level() {
    let harness = TestHarness::new();
    harness
        .call_err("take_screenshot", json!({ "device_id": "ghost" }))
        .await;
    assert_eq!(harness.backend.call_count("capture_screenshot"), 0);
}

#[tokio::test]
async fn test_recording_round_trip() {
    let harness = TestHarness::new();
    let started = harness
        .call_ok(
            "start_recording",
            json!({ "device_id": "emulator-5554", "time_limit": 900 }),
        )
        .await;
    assert_eq!(
        texts(&started)[0],
        "Recording started on emulator-5554 (time limit 180s)"
    );

    let again = harness
        .call_ok("start_recording", json!({ "device_id": "emulator-5554" }))
        .await;
    assert_eq!(again.is_error, Some(true));

    let save = harness.temp_path().join("rec.mp4");
    let stopped = harness
        .call_ok(
            "stop_recording",
            json!({ "device_id": "emulator-5554", "save_path": save.display().to_string() }),
        )
        .await;
    assert_eq!(stopped.is_error, Some(false));
    assert!(texts(&stopped)[0].contains(&format!("saved to {}", save.display())));
}

#[tokio::test]
async fn test_non_positive_bit_rate_rejected() {
    let harness = TestHarness::new();
    let err = harness
        .call_err(
            "start_recording",
            json!({ "device_id": "emulator-5554", "bit_rate": 0 }),
        )
        .await;
    assert!(err.message.contains("bit_rate"));
    assert_eq!(harness.backend.call_count("start_recording"), 0);
}
