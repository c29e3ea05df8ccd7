//! Session listing with its own pagination contract.
//!
//! Unlike the event query cap, a session-list cap of zero or below means
//! "no cap". Keep the two paths separate.

use serde::Serialize;

use crate::backend::SessionSummary;

pub const DEFAULT_SESSION_LIMIT: i64 = 20;

/// Effective cap for the session list: `None` when uncapped.
pub fn session_cap(limit: i64) -> Option<usize> {
    (limit > 0).then_some(limit as usize)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionListPage {
    pub sessions: Vec<SessionSummary>,
    pub limit: Option<usize>,
}

impl SessionListPage {
    /// Backends may return more than asked; the cap is applied again here.
    pub fn new(mut sessions: Vec<SessionSummary>, limit: Option<usize>) -> Self {
        if let Some(cap) = limit {
            sessions.truncate(cap);
        }
        Self { sessions, limit }
    }

    /// True when the result filled the cap, so more sessions may exist.
    pub fn may_have_more(&self) -> bool {
        matches!(self.limit, Some(cap) if self.sessions.len() >= cap)
    }

    pub fn header(&self) -> String {
        let count = self.sessions.len();
        match self.limit {
            None => format!("Found {} sessions (all)", count),
            Some(cap) if self.may_have_more() => {
                format!("Found {} sessions (limit: {}, may have more)", count, cap)
            }
            Some(_) => format!("Found {} sessions", count),
        }
    }

    pub fn render(&self) -> String {
        let mut lines = vec![self.header()];
        for s in &self.sessions {
            let mut line = format!(
                "- {} | {} | {} | {} | {} events",
                s.id, s.name, s.session_type, s.status, s.event_count
            );
            if let Some(recording) = &s.recording {
                line.push_str(&format!(" | recording: {}", recording));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}
