//! Session event query engine.
//!
//! Builds an [`EventQuery`] from decoded tool arguments, defines the filter
//! semantics backends must honour, and renders a bounded textual digest of a
//! returned [`EventPage`].
//!
//! Filter dimensions (type, source, level) are OR'd within themselves and
//! AND'ed with each other and with the free-text search.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt::Write;

use crate::backend::{EventPage, SessionEvent};
use crate::mcp::schema::DecodedArgs;
use crate::BridgeError;

/// Cap applied when the caller does not pass one.
pub const DEFAULT_EVENT_LIMIT: i64 = 100;

/// Items rendered in a digest before the remainder is summarized.
pub const MAX_RENDERED_EVENTS: usize = 50;

/// Filtered view over one session's event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQuery {
    pub session_id: String,
    pub search: Option<String>,
    pub types: BTreeSet<String>,
    pub sources: BTreeSet<String>,
    pub levels: BTreeSet<String>,
    /// Forwarded to the backend as given; non-positive values are not
    /// reinterpreted here (unlike the session-list cap).
    pub limit: i64,
}

impl EventQuery {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            search: None,
            types: BTreeSet::new(),
            sources: BTreeSet::new(),
            levels: BTreeSet::new(),
            limit: DEFAULT_EVENT_LIMIT,
        }
    }

    pub fn from_args(args: &DecodedArgs) -> Result<Self, BridgeError> {
        Ok(Self {
            session_id: args.require_text("session_id")?.to_string(),
            search: args.non_blank("search").map(str::to_string),
            types: parse_filter_list(args.text("types")),
            sources: parse_filter_list(args.text("sources")),
            levels: parse_filter_list(args.text("levels")),
            limit: args.integer("limit").unwrap_or(DEFAULT_EVENT_LIMIT),
        })
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_types(mut self, raw: &str) -> Self {
        self.types = parse_filter_list(Some(raw));
        self
    }

    pub fn with_sources(mut self, raw: &str) -> Self {
        self.sources = parse_filter_list(Some(raw));
        self
    }

    pub fn with_levels(mut self, raw: &str) -> Self {
        self.levels = parse_filter_list(Some(raw));
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Whether `event` passes every specified filter.
    pub fn matches(&self, event: &SessionEvent) -> bool {
        in_dimension(&self.types, &event.event_type)
            && in_dimension(&self.sources, &event.source)
            && in_dimension(&self.levels, &event.level)
            && self.search_matches(event)
    }

    fn search_matches(&self, event: &SessionEvent) -> bool {
        let Some(needle) = self.search.as_deref() else {
            return true;
        };
        let needle = needle.to_lowercase();
        [event.title.as_deref(), event.content.as_deref()]
            .into_iter()
            .flatten()
            .any(|haystack| haystack.to_lowercase().contains(&needle))
    }

    pub fn has_filters(&self) -> bool {
        self.search.is_some()
            || !self.types.is_empty()
            || !self.sources.is_empty()
            || !self.levels.is_empty()
    }
}

fn in_dimension(allowed: &BTreeSet<String>, value: &str) -> bool {
    allowed.is_empty() || allowed.contains(value)
}

/// Split a comma-delimited list into a trimmed, deduplicated set.
pub fn parse_filter_list(raw: Option<&str>) -> BTreeSet<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Render the digest for a page the backend already filtered and ordered.
///
/// The page order is preserved; nothing here re-sorts.
pub fn render_event_digest(session_id: &str, page: &EventPage) -> String {
    let mut out = format!(
        "Events for session {}: {} total, {} returned\n",
        session_id,
        page.total,
        page.events.len()
    );
    for (i, event) in page.events.iter().take(MAX_RENDERED_EVENTS).enumerate() {
        out.push('\n');
        out.push_str(&render_event_line(i + 1, event));
    }
    let hidden = page.events.len().saturating_sub(MAX_RENDERED_EVENTS);
    if hidden > 0 {
        let _ = write!(out, "\n... and {} more events (not shown)", hidden);
    }
    out
}

/// One digest line. Every optional field is independent; missing ones are
/// left out.
pub fn render_event_line(index: usize, event: &SessionEvent) -> String {
    let mut line = format!(
        "{}. [{}] {}",
        index,
        event.event_type,
        event.title.as_deref().unwrap_or("(untitled)")
    );

    if let Some(rel) = event.relative_time {
        let _ = write!(line, " @ +{}ms", rel);
    } else if let Some(ts) = event.timestamp {
        match DateTime::from_timestamp_millis(ts) {
            Some(dt) => {
                let _ = write!(line, " @ {}", dt.format("%Y-%m-%d %H:%M:%S%.3f"));
            }
            None => {
                let _ = write!(line, " @ {}", ts);
            }
        }
    }

    if let Some(data) = &event.data {
        if let (Some(x), Some(y)) = (number_field(data, "x"), number_field(data, "y")) {
            let _ = write!(line, " ({},{})", x, y);
        }
        if let (Some(x2), Some(y2)) = (number_field(data, "x2"), number_field(data, "y2")) {
            let _ = write!(line, " -> ({},{})", x2, y2);
        }
        if let Some(gesture) = data.get("gestureType").and_then(Value::as_str) {
            let _ = write!(line, " gesture={}", gesture);
        }
        if let Some(action) = data.get("action").and_then(Value::as_str) {
            let _ = write!(line, " action={}", action);
        }
        if let Some(duration) = number_field(data, "duration") {
            let _ = write!(line, " duration={}ms", duration);
        }
    }
    line
}

/// Numeric field rendered without a trailing `.0` for whole values.
fn number_field(data: &Map<String, Value>, key: &str) -> Option<String> {
    let n = data.get(key)?.as_number()?;
    if let Some(i) = n.as_i64() {
        return Some(i.to_string());
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f.abs() < 1e15 {
        Some(format!("{}", f as i64))
    } else {
        Some(format!("{}", f))
    }
}
