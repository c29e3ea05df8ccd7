//! In-process backend.
//!
//! Keeps devices, sessions, workflows and plugins in memory and simulates the
//! side effects (screenshots, command output, workflow runs) well enough to
//! exercise the bridge end to end. Every trait call is appended to a call
//! log so tests can assert the backend was, or was not, reached.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

use crate::backend::archive::{RecordingAsset, SessionArchive};
use crate::backend::*;
use crate::services::event_query::EventQuery;
use crate::BridgeError;

/// Minimal PNG header; enough for clients that sniff the format.
pub const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Debug, Clone)]
struct StoredSession {
    session: Session,
    events: Vec<SessionEvent>,
    bookmarks: Vec<Bookmark>,
    recording: Option<RecordingAsset>,
}

#[derive(Debug, Default)]
struct State {
    devices: BTreeMap<String, Device>,
    sessions: BTreeMap<String, StoredSession>,
    workflows: BTreeMap<String, Workflow>,
    plugins: BTreeMap<String, Plugin>,
    recordings: HashMap<String, RecordingInfo>,
    command_results: HashMap<String, CommandOutput>,
    media_result: Option<CommandOutput>,
    stop_requests: HashSet<String>,
    screenshot_bytes: Option<Vec<u8>>,
    fail_screenshots: bool,
    last_screenshot_path: Option<PathBuf>,
}

pub struct InMemoryBackend {
    state: RwLock<State>,
    calls: Mutex<Vec<String>>,
    /// `true` lets workflow runs proceed
    workflow_gate: watch::Sender<bool>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let (workflow_gate, _) = watch::channel(true);
        Self {
            state: RwLock::new(State::default()),
            calls: Mutex::new(Vec::new()),
            workflow_gate,
        }
    }

    /// A small fixture set for local trials: one emulator, one workflow, one
    /// finished session with a few events.
    pub fn seeded() -> Self {
        let now = Utc::now();
        let events = [
            ("touch", "app", "info", "Tap login", json!({"x": 540, "y": 1200, "action": "tap"})),
            ("network", "proxy", "info", "POST /api/login", json!({"duration": 182})),
            ("log", "system", "error", "Login failed", json!({})),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (kind, source, level, title, data))| SessionEvent {
            id: format!("evt-{}", i + 1),
            session_id: "sess-demo".into(),
            event_type: kind.into(),
            source: source.into(),
            level: level.into(),
            title: Some(title.into()),
            relative_time: Some(i as i64 * 250),
            data: data.as_object().cloned().filter(|m| !m.is_empty()),
            ..Default::default()
        })
        .collect();

        Self::new()
            .with_device(Device {
                id: "emulator-5554".into(),
                state: "device".into(),
                model: Some("sdk_gphone64_x86_64".into()),
                product: Some("sdk_gphone64".into()),
                android_version: Some("14".into()),
                address: None,
            })
            .with_workflow(Workflow {
                id: "wf-login".into(),
                name: "Login".into(),
                description: Some("Open the app and sign in".into()),
                steps: ["launch", "tap", "type", "tap"]
                    .iter()
                    .enumerate()
                    .map(|(i, action)| WorkflowStep {
                        name: format!("step {}", i + 1),
                        action: action.to_string(),
                        params: None,
                    })
                    .collect(),
            })
            .with_session(
                Session {
                    id: "sess-demo".into(),
                    name: "Demo".into(),
                    session_type: "manual".into(),
                    status: "completed".into(),
                    device_id: Some("emulator-5554".into()),
                    created_at: now,
                    ended_at: Some(now),
                    event_count: 0,
                    recording: None,
                    config: SessionConfig::default(),
                    imported_from: None,
                },
                events,
            )
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.state.get_mut().devices.insert(device.id.clone(), device);
        self
    }

    pub fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.state
            .get_mut()
            .workflows
            .insert(workflow.id.clone(), workflow);
        self
    }

    pub fn with_session(mut self, mut session: Session, events: Vec<SessionEvent>) -> Self {
        session.event_count = events.len();
        self.state.get_mut().sessions.insert(
            session.id.clone(),
            StoredSession {
                session,
                events,
                bookmarks: Vec::new(),
                recording: None,
            },
        );
        self
    }

    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.state.get_mut().plugins.insert(plugin.id.clone(), plugin);
        self
    }

    /// Output returned for an exact device command.
    pub fn with_command_result(mut self, command: &str, output: CommandOutput) -> Self {
        self.state
            .get_mut()
            .command_results
            .insert(command.to_string(), output);
        self
    }

    /// Output returned for every media tool run.
    pub fn with_media_result(mut self, output: CommandOutput) -> Self {
        self.state.get_mut().media_result = Some(output);
        self
    }

    pub fn with_screenshot_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.state.get_mut().screenshot_bytes = Some(bytes);
        self
    }

    /// Make `capture_screenshot` fail after touching the destination file.
    pub fn with_failing_screenshots(mut self) -> Self {
        self.state.get_mut().fail_screenshots = true;
        self
    }

    /// Block workflow runs until [`InMemoryBackend::release_workflows`].
    pub fn hold_workflows(&self) {
        self.workflow_gate.send_replace(false);
    }

    pub fn release_workflows(&self) {
        self.workflow_gate.send_replace(true);
    }

    /// Names of the trait methods called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == method).count()
    }

    pub async fn last_screenshot_path(&self) -> Option<PathBuf> {
        self.state.read().await.last_screenshot_path.clone()
    }

    fn record(&self, method: &str) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(method.to_string());
    }

    async fn require_device(&self, device_id: &str) -> Result<(), BridgeError> {
        if self.state.read().await.devices.contains_key(device_id) {
            Ok(())
        } else {
            Err(BridgeError::not_found("Device", device_id))
        }
    }
}

fn missing_session(id: &str) -> BridgeError {
    BridgeError::not_found("Session", id)
}

fn missing_plugin(id: &str) -> BridgeError {
    BridgeError::not_found("Plugin", id)
}

fn session_duration(stored: &StoredSession) -> Option<i64> {
    stored
        .events
        .iter()
        .filter_map(|e| e.relative_time)
        .max()
        .or_else(|| {
            stored
                .session
                .ended_at
                .map(|end| (end - stored.session.created_at).num_milliseconds())
        })
}

fn filters_match(filters: &PluginFilters, event: &Value) -> bool {
    let field = |name: &str| event.get(name).and_then(Value::as_str).unwrap_or_default();
    let allowed = |list: &[String], value: &str| list.is_empty() || list.iter().any(|v| v == value);
    let url_ok = match &filters.url_pattern {
        Some(pattern) => field("url").contains(pattern.as_str()),
        None => true,
    };
    allowed(&filters.types, field("type"))
        && allowed(&filters.sources, field("source"))
        && allowed(&filters.levels, field("level"))
        && url_ok
}

#[async_trait]
impl AutomationBackend for InMemoryBackend {
    async fn list_devices(&self) -> Result<Vec<Device>, BridgeError> {
        self.record("list_devices");
        Ok(self.state.read().await.devices.values().cloned().collect())
    }

    async fn get_device(&self, device_id: &str) -> Result<Option<Device>, BridgeError> {
        self.record("get_device");
        // Wireless devices are also addressable by their `host:port`.
        let state = self.state.read().await;
        let device = state.devices.get(device_id).or_else(|| {
            state
                .devices
                .values()
                .find(|d| d.address.as_deref() == Some(device_id))
        });
        Ok(device.cloned())
    }

    async fn connect_device(&self, address: &str) -> Result<Device, BridgeError> {
        self.record("connect_device");
        let device = Device {
            id: address.to_string(),
            state: "device".into(),
            model: None,
            product: None,
            android_version: None,
            address: Some(address.to_string()),
        };
        self.state
            .write()
            .await
            .devices
            .insert(device.id.clone(), device.clone());
        Ok(device)
    }

    async fn disconnect_device(&self, device_id: &str) -> Result<(), BridgeError> {
        self.record("disconnect_device");
        let mut state = self.state.write().await;
        let device = state
            .devices
            .get_mut(device_id)
            .ok_or_else(|| BridgeError::not_found("Device", device_id))?;
        device.state = "offline".into();
        Ok(())
    }

    async fn run_device_command(
        &self,
        device_id: &str,
        command: &str,
        _timeout: Duration,
    ) -> Result<CommandOutput, BridgeError> {
        self.record("run_device_command");
        self.require_device(device_id).await?;
        let state = self.state.read().await;
        Ok(state
            .command_results
            .get(command)
            .cloned()
            .unwrap_or_else(|| CommandOutput {
                exit_code: 0,
                stdout: format!("{}\n", command),
                ..Default::default()
            }))
    }

    async fn run_media_tool(
        &self,
        tool: MediaTool,
        args: &[String],
        _timeout: Duration,
    ) -> Result<CommandOutput, BridgeError> {
        self.record("run_media_tool");
        let state = self.state.read().await;
        Ok(state.media_result.clone().unwrap_or_else(|| CommandOutput {
            exit_code: 0,
            stdout: format!("{} {}\n", tool.binary_name(), args.join(" ")),
            ..Default::default()
        }))
    }

    async fn capture_screenshot(&self, device_id: &str, dest: &Path) -> Result<(), BridgeError> {
        self.record("capture_screenshot");
        self.require_device(device_id).await?;
        let (bytes, fail) = {
            let mut state = self.state.write().await;
            state.last_screenshot_path = Some(dest.to_path_buf());
            (
                state.screenshot_bytes.clone().unwrap_or_else(|| FAKE_PNG.to_vec()),
                state.fail_screenshots,
            )
        };
        if fail {
            tokio::fs::write(dest, b"partial").await?;
            return Err(BridgeError::backend(
                "capture_screenshot",
                format!("screencap failed on {}", device_id),
            ));
        }
        tokio::fs::write(dest, bytes).await?;
        Ok(())
    }

    async fn start_recording(
        &self,
        device_id: &str,
        options: RecordingOptions,
    ) -> Result<RecordingInfo, BridgeError> {
        self.record("start_recording");
        self.require_device(device_id).await?;
        let mut state = self.state.write().await;
        if state.recordings.contains_key(device_id) {
            return Err(BridgeError::backend(
                "start_recording",
                format!("{} is already recording", device_id),
            ));
        }
        let info = RecordingInfo {
            device_id: device_id.to_string(),
            path: None,
            started_at: Utc::now(),
            duration_ms: None,
            size_bytes: None,
        };
        tracing::debug!(device = device_id, limit = options.time_limit_secs, "recording started");
        state.recordings.insert(device_id.to_string(), info.clone());
        Ok(info)
    }

    async fn stop_recording(
        &self,
        device_id: &str,
        save_path: Option<&Path>,
    ) -> Result<RecordingInfo, BridgeError> {
        self.record("stop_recording");
        let mut info = self
            .state
            .write()
            .await
            .recordings
            .remove(device_id)
            .ok_or_else(|| {
                BridgeError::backend("stop_recording", format!("{} is not recording", device_id))
            })?;
        let path = save_path.map(Path::to_path_buf).unwrap_or_else(|| {
            PathBuf::from(format!(
                "/sdcard/autobridge-{}.mp4",
                info.started_at.timestamp()
            ))
        });
        info.duration_ms = Some((Utc::now() - info.started_at).num_milliseconds());
        info.size_bytes = Some(0);
        info.path = Some(path.display().to_string());
        Ok(info)
    }

    async fn create_session(&self, request: NewSession) -> Result<Session, BridgeError> {
        self.record("create_session");
        let now = Utc::now();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            name: request
                .name
                .unwrap_or_else(|| format!("Session {}", now.format("%Y-%m-%d %H:%M"))),
            session_type: request.session_type.unwrap_or_else(|| "manual".into()),
            status: "active".into(),
            device_id: request.device_id,
            created_at: now,
            ended_at: None,
            event_count: 0,
            recording: None,
            config: SessionConfig::default(),
            imported_from: None,
        };
        self.state.write().await.sessions.insert(
            session.id.clone(),
            StoredSession {
                session: session.clone(),
                events: Vec::new(),
                bookmarks: Vec::new(),
                recording: None,
            },
        );
        Ok(session)
    }

    async fn end_session(&self, session_id: &str) -> Result<Session, BridgeError> {
        self.record("end_session");
        let mut state = self.state.write().await;
        let stored = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| missing_session(session_id))?;
        if stored.session.status != "active" {
            return Err(BridgeError::backend(
                "end_session",
                format!("session {} is already {}", session_id, stored.session.status),
            ));
        }
        stored.session.status = "completed".into();
        stored.session.ended_at = Some(Utc::now());
        Ok(stored.session.clone())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, BridgeError> {
        self.record("get_session");
        Ok(self
            .state
            .read()
            .await
            .sessions
            .get(session_id)
            .map(|s| s.session.clone()))
    }

    async fn list_sessions(&self, limit: Option<usize>) -> Result<Vec<SessionSummary>, BridgeError> {
        self.record("list_sessions");
        let state = self.state.read().await;
        let mut sessions: Vec<&Session> = state.sessions.values().map(|s| &s.session).collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(Session::summary)
            .collect())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), BridgeError> {
        self.record("delete_session");
        self.state
            .write()
            .await
            .sessions
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| missing_session(session_id))
    }

    /// Negative caps return every match and zero returns none, the way an
    /// SQL `LIMIT` behaves.
    async fn query_events(&self, query: &EventQuery) -> Result<EventPage, BridgeError> {
        self.record("query_events");
        let state = self.state.read().await;
        let stored = state
            .sessions
            .get(&query.session_id)
            .ok_or_else(|| missing_session(&query.session_id))?;
        let matching: Vec<&SessionEvent> =
            stored.events.iter().filter(|e| query.matches(e)).collect();
        let total = matching.len();
        let take = usize::try_from(query.limit).unwrap_or(usize::MAX);
        Ok(EventPage {
            events: matching.into_iter().take(take).cloned().collect(),
            total,
        })
    }

    async fn update_session_config(
        &self,
        session_id: &str,
        patch: SessionConfigPatch,
    ) -> Result<SessionConfig, BridgeError> {
        self.record("update_session_config");
        let mut state = self.state.write().await;
        let stored = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| missing_session(session_id))?;
        patch.apply(&mut stored.session.config);
        Ok(stored.session.config)
    }

    async fn export_session(
        &self,
        session_id: &str,
        output_path: &Path,
    ) -> Result<ArchiveSummary, BridgeError> {
        self.record("export_session");
        let archive = {
            let state = self.state.read().await;
            let stored = state
                .sessions
                .get(session_id)
                .ok_or_else(|| missing_session(session_id))?;
            SessionArchive {
                session: stored.session.clone(),
                events: stored.events.clone(),
                bookmarks: stored.bookmarks.clone(),
                recording: stored.recording.clone(),
            }
        };
        let path = output_path.to_path_buf();
        tokio::task::spawn_blocking(move || archive.write_to(&path))
            .await
            .map_err(|e| BridgeError::backend("export_session", e.to_string()))?
    }

    async fn import_session(&self, archive_path: &Path) -> Result<Session, BridgeError> {
        self.record("import_session");
        let path = archive_path.to_path_buf();
        let archive = tokio::task::spawn_blocking(move || SessionArchive::read_from(&path))
            .await
            .map_err(|e| BridgeError::backend("import_session", e.to_string()))??
            .into_imported();

        let session = archive.session.clone();
        self.state.write().await.sessions.insert(
            session.id.clone(),
            StoredSession {
                session: archive.session,
                events: archive.events,
                bookmarks: archive.bookmarks,
                recording: archive.recording,
            },
        );
        Ok(session)
    }

    async fn session_stats(&self, session_id: &str) -> Result<SessionStats, BridgeError> {
        self.record("session_stats");
        let state = self.state.read().await;
        let stored = state
            .sessions
            .get(session_id)
            .ok_or_else(|| missing_session(session_id))?;
        let mut stats = SessionStats {
            session_id: session_id.to_string(),
            event_count: stored.events.len(),
            duration_ms: session_duration(stored),
            ..Default::default()
        };
        for event in &stored.events {
            *stats.by_type.entry(event.event_type.clone()).or_default() += 1;
            *stats.by_source.entry(event.source.clone()).or_default() += 1;
            *stats.by_level.entry(event.level.clone()).or_default() += 1;
        }
        Ok(stats)
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, BridgeError> {
        self.record("list_workflows");
        Ok(self.state.read().await.workflows.values().cloned().collect())
    }

    async fn get_workflow(&self, workflow_id: &str) -> Result<Option<Workflow>, BridgeError> {
        self.record("get_workflow");
        Ok(self.state.read().await.workflows.get(workflow_id).cloned())
    }

    /// Steps whose action is `fail` make the run fail at that step.
    async fn run_workflow(
        &self,
        workflow_id: &str,
        device_id: &str,
    ) -> Result<WorkflowRunReport, BridgeError> {
        self.record("run_workflow");
        let workflow = self
            .state
            .read()
            .await
            .workflows
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| BridgeError::not_found("Workflow", workflow_id))?;
        self.require_device(device_id).await?;
        self.state.write().await.stop_requests.remove(device_id);

        let mut gate = self.workflow_gate.subscribe();
        loop {
            let open = *gate.borrow_and_update();
            if open {
                break;
            }
            gate.changed()
                .await
                .map_err(|e| BridgeError::backend("run_workflow", e.to_string()))?;
        }

        let mut report = WorkflowRunReport {
            workflow_id: workflow.id.clone(),
            device_id: device_id.to_string(),
            completed_steps: 0,
            stopped: false,
            error: None,
        };
        for step in &workflow.steps {
            if self.state.write().await.stop_requests.remove(device_id) {
                report.stopped = true;
                break;
            }
            if step.action == "fail" {
                report.error = Some(format!("step '{}' failed", step.name));
                break;
            }
            report.completed_steps += 1;
            tokio::task::yield_now().await;
        }
        Ok(report)
    }

    async fn stop_workflow(&self, device_id: &str) -> Result<(), BridgeError> {
        self.record("stop_workflow");
        self.state
            .write()
            .await
            .stop_requests
            .insert(device_id.to_string());
        Ok(())
    }

    async fn list_plugins(&self) -> Result<Vec<Plugin>, BridgeError> {
        self.record("list_plugins");
        Ok(self.state.read().await.plugins.values().cloned().collect())
    }

    async fn get_plugin(&self, plugin_id: &str) -> Result<Option<Plugin>, BridgeError> {
        self.record("get_plugin");
        Ok(self.state.read().await.plugins.get(plugin_id).cloned())
    }

    async fn create_plugin(&self, draft: PluginDraft) -> Result<Plugin, BridgeError> {
        self.record("create_plugin");
        let mut state = self.state.write().await;
        if state.plugins.values().any(|p| p.name == draft.name) {
            return Err(BridgeError::backend(
                "create_plugin",
                format!("a plugin named '{}' already exists", draft.name),
            ));
        }
        let now = Utc::now();
        let plugin = Plugin {
            id: uuid::Uuid::new_v4().to_string(),
            name: draft.name,
            description: draft.description,
            version: "1.0.0".into(),
            enabled: true,
            script: draft.script,
            filters: draft.filters.unwrap_or_default(),
            config: draft.config.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        state.plugins.insert(plugin.id.clone(), plugin.clone());
        Ok(plugin)
    }

    async fn update_plugin(
        &self,
        plugin_id: &str,
        patch: PluginPatch,
    ) -> Result<Plugin, BridgeError> {
        self.record("update_plugin");
        let mut state = self.state.write().await;
        let plugin = state
            .plugins
            .get_mut(plugin_id)
            .ok_or_else(|| missing_plugin(plugin_id))?;
        if let Some(name) = patch.name {
            plugin.name = name;
        }
        if let Some(script) = patch.script {
            plugin.script = script;
        }
        if let Some(description) = patch.description {
            plugin.description = Some(description);
        }
        if let Some(filters) = patch.filters {
            plugin.filters = filters;
        }
        if let Some(config) = patch.config {
            plugin.config = config;
        }
        plugin.updated_at = Utc::now();
        Ok(plugin.clone())
    }

    async fn delete_plugin(&self, plugin_id: &str) -> Result<(), BridgeError> {
        self.record("delete_plugin");
        self.state
            .write()
            .await
            .plugins
            .remove(plugin_id)
            .map(|_| ())
            .ok_or_else(|| missing_plugin(plugin_id))
    }

    async fn set_plugin_enabled(&self, plugin_id: &str, enabled: bool) -> Result<Plugin, BridgeError> {
        self.record("set_plugin_enabled");
        let mut state = self.state.write().await;
        let plugin = state
            .plugins
            .get_mut(plugin_id)
            .ok_or_else(|| missing_plugin(plugin_id))?;
        plugin.enabled = enabled;
        plugin.updated_at = Utc::now();
        Ok(plugin.clone())
    }

    /// Scripts containing `throw` fail; otherwise the plugin echoes the
    /// event when its filters match.
    async fn test_plugin(&self, plugin_id: &str, event: Value) -> Result<PluginTestReport, BridgeError> {
        self.record("test_plugin");
        let state = self.state.read().await;
        let plugin = state
            .plugins
            .get(plugin_id)
            .ok_or_else(|| missing_plugin(plugin_id))?;

        let mut logs = vec![format!("loaded {} v{}", plugin.name, plugin.version)];
        if plugin.script.contains("throw") {
            logs.push("script raised an exception".into());
            return Ok(PluginTestReport {
                matched: false,
                output: None,
                logs,
                error: Some("uncaught exception in plugin script".into()),
                duration_ms: Some(1),
            });
        }

        let matched = filters_match(&plugin.filters, &event);
        let output = matched.then(|| {
            let mut out = Map::new();
            out.insert("plugin".into(), json!(plugin.name));
            out.insert("event".into(), event.clone());
            Value::Object(out)
        });
        logs.push(format!("filters {}", if matched { "matched" } else { "skipped" }));
        Ok(PluginTestReport {
            matched,
            output,
            logs,
            error: None,
            duration_ms: Some(1),
        })
    }
}
