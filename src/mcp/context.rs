use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::AutomationBackend;
use crate::services::workflow_runs::WorkflowRuns;

/// Per-call handle given to every tool handler.
///
/// Cloning is cheap; all shared state sits behind `Arc`.
#[derive(Clone)]
pub struct ToolContext {
    pub backend: Arc<dyn AutomationBackend>,
    pub runs: WorkflowRuns,
    dirs: Arc<WorkDirs>,
}

#[derive(Debug)]
struct WorkDirs {
    scratch: PathBuf,
    exports: PathBuf,
}

impl ToolContext {
    pub fn new(backend: Arc<dyn AutomationBackend>, scratch_dir: PathBuf, export_dir: PathBuf) -> Self {
        Self {
            backend,
            runs: WorkflowRuns::new(),
            dirs: Arc::new(WorkDirs {
                scratch: scratch_dir,
                exports: export_dir,
            }),
        }
    }

    /// Directory for request-scoped temporary files.
    pub fn scratch_dir(&self) -> &Path {
        &self.dirs.scratch
    }

    /// Default destination for session archives.
    pub fn export_dir(&self) -> &Path {
        &self.dirs.exports
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        let root = std::env::temp_dir().join("autobridge-unit");
        Self::new(
            Arc::new(crate::backend::InMemoryBackend::new()),
            root.join("scratch"),
            root.join("exports"),
        )
    }
}
