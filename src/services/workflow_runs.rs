//! Handles for detached workflow runs.
//!
//! Starting a run records it here before the backend work is spawned, so a
//! second start for the same device sees it immediately. The originating
//! request never awaits the run; its outcome is only visible through
//! [`WorkflowRuns::status`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Running,
    Completed { completed_steps: usize },
    Stopped { completed_steps: usize },
    Failed { error: String },
}

impl RunState {
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Completed { .. } => "completed",
            RunState::Stopped { .. } => "stopped",
            RunState::Failed { .. } => "failed",
        }
    }
}

/// One run of a workflow on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub workflow_id: String,
    pub workflow_name: String,
    pub device_id: String,
    pub step_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub state: RunState,
}

impl RunRecord {
    pub fn describe(&self) -> String {
        let mut text = format!(
            "Workflow '{}' ({}) on device {}: {}",
            self.workflow_name,
            self.workflow_id,
            self.device_id,
            self.state.label()
        );
        match &self.state {
            RunState::Running => {
                text.push_str(&format!(
                    " since {} ({} steps)",
                    self.started_at.to_rfc3339(),
                    self.step_count
                ));
            }
            RunState::Completed { completed_steps } | RunState::Stopped { completed_steps } => {
                text.push_str(&format!(
                    " after {}/{} steps",
                    completed_steps, self.step_count
                ));
            }
            RunState::Failed { error } => {
                text.push_str(&format!(": {}", error));
            }
        }
        text
    }
}

/// Latest run per device. One active run per device at a time.
#[derive(Debug, Default, Clone)]
pub struct WorkflowRuns {
    runs: Arc<RwLock<HashMap<String, RunRecord>>>,
}

impl WorkflowRuns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new run unless one is already active on the device.
    ///
    /// Returns the active record on conflict.
    pub async fn try_start(
        &self,
        workflow_id: &str,
        workflow_name: &str,
        device_id: &str,
        step_count: usize,
    ) -> Result<RunRecord, RunRecord> {
        let mut runs = self.runs.write().await;
        if let Some(existing) = runs.get(device_id) {
            if existing.state.is_active() {
                return Err(existing.clone());
            }
        }
        let record = RunRecord {
            run_id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            workflow_name: workflow_name.to_string(),
            device_id: device_id.to_string(),
            step_count,
            started_at: Utc::now(),
            finished_at: None,
            state: RunState::Running,
        };
        runs.insert(device_id.to_string(), record.clone());
        Ok(record)
    }

    /// Record the end of a run. Ignored if a newer run replaced it.
    pub async fn finish(&self, device_id: &str, run_id: &str, state: RunState) {
        let mut runs = self.runs.write().await;
        if let Some(record) = runs.get_mut(device_id) {
            if record.run_id == run_id {
                record.state = state;
                record.finished_at = Some(Utc::now());
            }
        }
    }

    pub async fn status(&self, device_id: &str) -> Option<RunRecord> {
        self.runs.read().await.get(device_id).cloned()
    }

    pub async fn is_running(&self, device_id: &str) -> bool {
        self.runs
            .read()
            .await
            .get(device_id)
            .is_some_and(|r| r.state.is_active())
    }
}
