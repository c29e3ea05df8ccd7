//! Session handler tests: lifecycle, listing, event queries, archives.

use crate::common::builders::{EventBuilder, SessionBuilder};
use crate::common::harness::{first_text, texts, TestHarness};

use autobridge::backend::{InMemoryBackend, SessionEvent};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn backend_with_sessions(count: usize) -> InMemoryBackend {
    (0..count).fold(InMemoryBackend::new(), |backend, i| {
        backend.with_session(
            SessionBuilder::new(format!("s{:02}", i))
                .name(format!("Run {}", i))
                .minutes_ago(i as i64)
                .completed()
                .build(),
            Vec::new(),
        )
    })
}

fn item_lines(text: &str) -> usize {
    text.lines().filter(|l| l.starts_with("- ")).count()
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[tokio::test]
async fn test_create_get_end_delete() {
    let harness = TestHarness::new();
    let created = harness
        .call_ok(
            "create_session",
            json!({ "name": "Checkout", "device_id": "emulator-5554" }),
        )
        .await;
    let session: Value = serde_json::from_str(&texts(&created)[1]).unwrap();
    let id = session["id"].as_str().unwrap().to_string();
    assert_eq!(session["type"], "manual");
    assert_eq!(session["status"], "active");

    let fetched = harness.call_ok("get_session", json!({ "session_id": id })).await;
    assert!(first_text(&fetched).starts_with(&format!("Found session {} (Checkout): active", id)));

    let ended = harness.call_ok("end_session", json!({ "session_id": id })).await;
    assert!(first_text(&ended).contains("completed"));

    // Ending twice is a backend failure, not a protocol error.
    let twice = harness.call_ok("end_session", json!({ "session_id": id })).await;
    assert_eq!(twice.is_error, Some(true));

    let deleted = harness.call_ok("delete_session", json!({ "session_id": id })).await;
    assert!(first_text(&deleted).starts_with(&format!("Deleted session {}", id)));
    harness
        .call_err("get_session", json!({ "session_id": id }))
        .await;
}

#[tokio::test]
async fn test_create_session_rejects_unknown_type() {
    let harness = TestHarness::new();
    let err = harness
        .call_err("create_session", json!({ "session_type": "exploratory" }))
        .await;
    assert!(err.message.contains("session_type"));
    assert_eq!(harness.backend.call_count("create_session"), 0);
}

#[tokio::test]
async fn test_create_session_with_unknown_device() {
    let harness = TestHarness::new();
    harness
        .call_err("create_session", json!({ "device_id": "ghost" }))
        .await;
    assert_eq!(harness.backend.call_count("create_session"), 0);
}

#[tokio::test]
async fn test_configure_session_requires_a_toggle() {
    let harness = TestHarness::new();
    let err = harness
        .call_err("configure_session", json!({ "session_id": "sess-demo" }))
        .await;
    assert!(err.message.contains("capture_logs"));

    let result = harness
        .call_ok(
            "configure_session",
            json!({ "session_id": "sess-demo", "capture_logs": true, "enable_proxy": false }),
        )
        .await;
    assert_eq!(
        first_text(&result),
        "Updated session sess-demo: capture_logs=on, record_screen=off, enable_proxy=off, monitor_performance=off"
    );
}

// ============================================================================
// LISTING
// ============================================================================

#[tokio::test]
async fn test_list_sessions_non_positive_cap_returns_all() {
    let harness = TestHarness::with_backend(backend_with_sessions(25));
    for limit in [0, -1] {
        let result = harness.call_ok("list_sessions", json!({ "limit": limit })).await;
        let text = first_text(&result);
        assert!(text.starts_with("Found 25 sessions (all)"), "{}", text);
        assert_eq!(item_lines(&text), 25);
    }
}

#[tokio::test]
async fn test_list_sessions_full_page_may_have_more() {
    let harness = TestHarness::with_backend(backend_with_sessions(25));
    let result = harness.call_ok("list_sessions", json!({ "limit": 20 })).await;
    let text = first_text(&result);
    assert!(text.starts_with("Found 20 sessions (limit: 20, may have more)"));
    assert_eq!(item_lines(&text), 20);

    // Newest first.
    assert!(text.lines().nth(1).unwrap().starts_with("- s00 |"));
}

#[tokio::test]
async fn test_list_sessions_short_page_has_no_qualifier() {
    let harness = TestHarness::with_backend(backend_with_sessions(10));
    let result = harness.call_ok("list_sessions", json!({})).await;
    let text = first_text(&result);
    assert!(text.starts_with("Found 10 sessions\n"));
    assert_eq!(item_lines(&text), 10);
}

#[tokio::test]
async fn test_list_sessions_empty() {
    let harness = TestHarness::empty();
    let result = harness.call_ok("list_sessions", json!({})).await;
    assert_eq!(texts(&result), vec!["No sessions found.".to_string()]);
}

// ============================================================================
// EVENT QUERIES
// ============================================================================

fn mixed_events(session_id: &str) -> Vec<SessionEvent> {
    [
        ("A", "X", "info", "open settings"),
        ("B", "X", "error", "crash dialog"),
        ("A", "Y", "info", "open menu"),
        ("C", "X", "info", "scroll list"),
        ("B", "X", "info", "open login"),
    ]
    .iter()
    .enumerate()
    .map(|(i, (t, s, l, title))| {
        EventBuilder::new(session_id, *t)
            .source(*s)
            .level(*l)
            .title(*title)
            .at(i as i64 * 100)
            .build()
    })
    .collect()
}

#[tokio::test]
async fn test_event_filters_and_across_dimensions() {
    let harness = TestHarness::with_backend(
        InMemoryBackend::new().with_session(SessionBuilder::new("s1").build(), mixed_events("s1")),
    );

    let result = harness
        .call_ok(
            "get_session_events",
            json!({ "session_id": "s1", "types": "A, B", "sources": "X" }),
        )
        .await;
    let text = first_text(&result);
    assert!(text.starts_with("Events for session s1: 3 total, 3 returned"));
    assert!(text.contains("[A] open settings"));
    assert!(text.contains("[B] crash dialog"));
    assert!(text.contains("[B] open login"));
    assert!(!text.contains("open menu"));

    // Each extra filter narrows further.
    let result = harness
        .call_ok(
            "get_session_events",
            json!({ "session_id": "s1", "types": "A,B", "sources": "X", "levels": "info", "search": "OPEN" }),
        )
        .await;
    let text = first_text(&result);
    assert!(text.starts_with("Events for session s1: 2 total, 2 returned"));
    assert!(!text.contains("crash dialog"));
}

#[tokio::test]
async fn test_event_digest_caps_rendered_lines() {
    let events: Vec<SessionEvent> = (0..75)
        .map(|i| EventBuilder::new("s1", "touch").title(format!("tap {}", i)).build())
        .collect();
    let harness = TestHarness::with_backend(
        InMemoryBackend::new().with_session(SessionBuilder::new("s1").build(), events),
    );

    let result = harness
        .call_ok("get_session_events", json!({ "session_id": "s1" }))
        .await;
    let text = first_text(&result);
    let items = text
        .lines()
        .filter(|l| l.starts_with(|c: char| c.is_ascii_digit()))
        .count();
    assert_eq!(items, 50);
    assert_eq!(text.lines().last().unwrap(), "... and 25 more events (not shown)");
    assert!(!text.contains("tap 60"));

    // Events past the rendered prefix still reach the caller.
    let blocks = texts(&result);
    assert_eq!(blocks.len(), 2);
    let page: Value = serde_json::from_str(&blocks[1]).unwrap();
    assert_eq!(page["total"], 75);
    let events = page["events"].as_array().unwrap();
    assert_eq!(events.len(), 75);
    assert!(events.iter().any(|e| e["title"] == "tap 60"));
}

#[tokio::test]
async fn test_event_query_empty_results() {
    let harness = TestHarness::new();
    let result = harness
        .call_ok(
            "get_session_events",
            json!({ "session_id": "sess-demo", "types": "gesture" }),
        )
        .await;
    assert_eq!(
        texts(&result),
        vec!["No events found for session sess-demo matching the filters.".to_string()]
    );
}

#[tokio::test]
async fn test_event_query_zero_cap_forwarded_as_is() {
    let harness = TestHarness::new();
    let result = harness
        .call_ok(
            "get_session_events",
            json!({ "session_id": "sess-demo", "limit": 0 }),
        )
        .await;
    // Matches exist; the cap just returned none of them.
    assert_eq!(
        first_text(&result),
        "Events for session sess-demo: 3 total, 0 returned\n"
    );
    let page: Value = serde_json::from_str(&texts(&result)[1]).unwrap();
    assert_eq!(page["events"], json!([]));
}

#[tokio::test]
async fn test_event_query_unknown_session() {
    let harness = TestHarness::new();
    harness
        .call_err("get_session_events", json!({ "session_id": "nope" }))
        .await;
    assert_eq!(harness.backend.call_count("query_events"), 0);
}

// ============================================================================
// STATS AND ARCHIVES
// ============================================================================

#[tokio::test]
async fn test_session_stats_breakdown() {
    let harness = TestHarness::new();
    let result = harness
        .call_ok("get_session_stats", json!({ "session_id": "sess-demo" }))
        .await;
    let text = first_text(&result);
    assert!(text.starts_with("Session sess-demo: 3 events over 0.5s"));
    assert!(text.contains("By type: log=1, network=1, touch=1"));
    assert!(text.contains("By level: error=1, info=2"));
}

#[tokio::test]
async fn test_export_then_import_gets_new_identity() {
    let harness = TestHarness::new();
    let exported = harness
        .call_ok("export_session", json!({ "session_id": "sess-demo" }))
        .await;
    assert_eq!(exported.is_error, Some(false));
    let summary: Value = serde_json::from_str(&texts(&exported)[1]).unwrap();
    let path = summary["path"].as_str().unwrap().to_string();
    assert!(path.ends_with("session-sess-demo.autobridge.tar"));
    assert!(path.starts_with(&harness.temp_path().join("exports").display().to_string()));

    let imported = harness
        .call_ok("import_session", json!({ "archive_path": path }))
        .await;
    let session: Value = serde_json::from_str(&texts(&imported)[1]).unwrap();
    assert_ne!(session["id"], "sess-demo");
    assert_eq!(session["imported_from"], "sess-demo");
    assert_eq!(session["event_count"], 3);

    let events = harness
        .call_ok(
            "get_session_events",
            json!({ "session_id": session["id"].as_str().unwrap() }),
        )
        .await;
    assert!(first_text(&events).contains("3 total"));
}

#[tokio::test]
async fn test_import_missing_archive_is_not_found() {
    let harness = TestHarness::new();
    let missing = harness.temp_path().join("absent.tar");
    let err = harness
        .call_err(
            "import_session",
            json!({ "archive_path": missing.display().to_string() }),
        )
        .await;
    assert!(err.message.contains("absent.tar"));
    assert_eq!(harness.backend.call_count("import_session"), 0);
}

#[tokio::test]
async fn test_import_corrupt_archive_is_flagged() {
    let harness = TestHarness::new();
    let corrupt = harness.temp_path().join("corrupt.tar");
    std::fs::write(&corrupt, b"definitely not a tar archive").unwrap();
    let result = harness
        .call_ok(
            "import_session",
            json!({ "archive_path": corrupt.display().to_string() }),
        )
        .await;
    assert_eq!(result.is_error, Some(true));
    assert!(first_text(&result).starts_with("import_session failed"));
}
