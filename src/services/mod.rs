pub mod event_query;
pub mod session_list;
pub mod workflow_runs;

pub use event_query::{parse_filter_list, render_event_digest, EventQuery};
pub use session_list::{session_cap, SessionListPage};
pub use workflow_runs::{RunRecord, RunState, WorkflowRuns};
