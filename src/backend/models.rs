//! Records exchanged with the automation backend.
//!
//! These mirror the backend's JSON shapes. Fields the backend may omit are
//! `Option` and skipped on output so pretty-printed views stay compact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;

// ============================================================================
// Devices
// ============================================================================

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    /// Connection state reported by the bridge (`device`, `offline`, `unauthorized`)
    pub state: String,
    pub model: Option<String>,
    pub product: Option<String>,
    pub android_version: Option<String>,
    /// Network address for wireless connections
    pub address: Option<String>,
}

/// Captured output of a command the backend executed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// stdout and stderr joined for display, skipping empty streams.
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (false, false) => format!("{}\n[stderr]\n{}", self.stdout.trim_end(), self.stderr),
            (false, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (true, true) => String::new(),
        }
    }
}

/// External media binaries the backend can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaTool {
    Ffmpeg,
    Ffprobe,
}

impl MediaTool {
    pub fn binary_name(self) -> &'static str {
        match self {
            MediaTool::Ffmpeg => "ffmpeg",
            MediaTool::Ffprobe => "ffprobe",
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub device_id: String,
    /// Backend-side file holding the recording, once stopped
    pub path: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: Option<i64>,
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingOptions {
    pub time_limit_secs: u64,
    pub bit_rate: Option<u64>,
}

// ============================================================================
// Sessions
// ============================================================================

/// Capture toggles attached to a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub capture_logs: bool,
    pub record_screen: bool,
    pub enable_proxy: bool,
    pub monitor_performance: bool,
}

/// Partial update of [`SessionConfig`]; `None` leaves a toggle unchanged.
#[skip_serializing_none]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfigPatch {
    pub capture_logs: Option<bool>,
    pub record_screen: Option<bool>,
    pub enable_proxy: Option<bool>,
    pub monitor_performance: Option<bool>,
}

impl SessionConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.capture_logs.is_none()
            && self.record_screen.is_none()
            && self.enable_proxy.is_none()
            && self.monitor_performance.is_none()
    }

    pub fn apply(&self, config: &mut SessionConfig) {
        if let Some(v) = self.capture_logs {
            config.capture_logs = v;
        }
        if let Some(v) = self.record_screen {
            config.record_screen = v;
        }
        if let Some(v) = self.enable_proxy {
            config.enable_proxy = v;
        }
        if let Some(v) = self.monitor_performance {
            config.monitor_performance = v;
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub session_type: String,
    pub status: String,
    pub device_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub event_count: usize,
    /// Recording asset attached to the session
    pub recording: Option<String>,
    #[serde(default)]
    pub config: SessionConfig,
    /// Original session id when this session came from an archive import
    pub imported_from: Option<String>,
}

impl Session {
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            session_type: self.session_type.clone(),
            status: self.status.clone(),
            event_count: self.event_count,
            recording: self.recording.clone(),
        }
    }
}

/// List-style view of a session.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub session_type: String,
    pub status: String,
    #[serde(default)]
    pub event_count: usize,
    pub recording: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub name: Option<String>,
    pub device_id: Option<String>,
    pub session_type: Option<String>,
}

/// One recorded event in a session stream.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: String,
    pub session_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub level: String,
    pub title: Option<String>,
    pub content: Option<String>,
    /// Absolute time, unix milliseconds
    pub timestamp: Option<i64>,
    /// Milliseconds since session start
    pub relative_time: Option<i64>,
    pub data: Option<Map<String, Value>>,
}

/// One backend page of filtered events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<SessionEvent>,
    /// Matching events before the cap was applied
    pub total: usize,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,
    pub event_count: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
    pub by_level: BTreeMap<String, usize>,
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub label: String,
    pub relative_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveSummary {
    pub path: String,
    pub session_id: String,
    pub event_count: usize,
    pub has_bookmarks: bool,
    pub has_recording: bool,
}

// ============================================================================
// Workflows
// ============================================================================

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub name: String,
    /// Step kind understood by the backend (`tap`, `swipe`, `wait`, `shell`, ...)
    pub action: String,
    pub params: Option<Map<String, Value>>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

/// Outcome the backend reports when a workflow run ends.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRunReport {
    pub workflow_id: String,
    pub device_id: String,
    pub completed_steps: usize,
    pub stopped: bool,
    pub error: Option<String>,
}

// ============================================================================
// Plugins
// ============================================================================

/// Event filter a plugin subscribes with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginFilters {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub levels: Vec<String>,
    #[serde(default)]
    pub url_pattern: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    pub enabled: bool,
    pub script: String,
    #[serde(default)]
    pub filters: PluginFilters,
    #[serde(default)]
    pub config: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginDraft {
    pub name: String,
    pub script: String,
    pub description: Option<String>,
    pub filters: Option<PluginFilters>,
    pub config: Option<Map<String, Value>>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginPatch {
    pub name: Option<String>,
    pub script: Option<String>,
    pub description: Option<String>,
    pub filters: Option<PluginFilters>,
    pub config: Option<Map<String, Value>>,
}

impl PluginPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.script.is_none()
            && self.description.is_none()
            && self.filters.is_none()
            && self.config.is_none()
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginTestReport {
    pub matched: bool,
    pub output: Option<Value>,
    #[serde(default)]
    pub logs: Vec<String>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
}
