//! Session lifecycle, configuration, querying, archive export/import and
//! statistics.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::backend::{NewSession, Session, SessionConfigPatch};
use crate::mcp::context::ToolContext;
use crate::mcp::registry::{handler, ToolRegistryBuilder, ToolResult};
use crate::mcp::result::ToolOutput;
use crate::mcp::schema::{DecodedArgs, OperationDescriptor, ParamSpec};
use crate::mcp::tools::{resolve_device, resolve_session};
use crate::services::event_query::{render_event_digest, EventQuery, DEFAULT_EVENT_LIMIT};
use crate::services::session_list::{session_cap, SessionListPage, DEFAULT_SESSION_LIMIT};
use crate::BridgeError;

const SESSION_TYPES: &[&str] = &["manual", "automated", "workflow"];

pub fn register(builder: ToolRegistryBuilder) -> ToolRegistryBuilder {
    builder
        .register(
            OperationDescriptor::new("create_session", "Start a new capture session.")
                .param(ParamSpec::text("name", "Session name"))
                .param(ParamSpec::text("device_id", "Device to attach"))
                .param(
                    ParamSpec::text("session_type", "manual, automated or workflow")
                        .default_text("manual"),
                ),
            handler(create_session),
        )
        .register(
            session_op("end_session", "End an active session."),
            handler(end_session),
        )
        .register(
            session_op("get_session", "Get one session with its configuration."),
            handler(get_session),
        )
        .register(
            OperationDescriptor::new(
                "list_sessions",
                "List sessions, newest first. A limit of 0 or less returns all sessions.",
            )
            .param(
                ParamSpec::integer("limit", "Maximum sessions to return")
                    .default_integer(DEFAULT_SESSION_LIMIT),
            ),
            handler(list_sessions),
        )
        .register(
            session_op("delete_session", "Delete a session and its events."),
            handler(delete_session),
        )
        .register(
            session_op(
                "get_session_events",
                "Query a session's events. Filters are comma-separated lists; \
                 values within one filter are OR'd, different filters are AND'd.",
            )
            .param(ParamSpec::text("search", "Case-insensitive text matched against title and content"))
            .param(ParamSpec::text("types", "Event types, e.g. \"touch,network\""))
            .param(ParamSpec::text("sources", "Event sources, e.g. \"app,system\""))
            .param(ParamSpec::text("levels", "Event levels, e.g. \"warn,error\""))
            .param(
                ParamSpec::integer("limit", "Maximum events to return")
                    .default_integer(DEFAULT_EVENT_LIMIT),
            ),
            handler(get_session_events),
        )
        .register(
            session_op("configure_session", "Change capture toggles for a session.")
                .param(ParamSpec::boolean("capture_logs", "Capture device logs"))
                .param(ParamSpec::boolean("record_screen", "Record the screen"))
                .param(ParamSpec::boolean("enable_proxy", "Route traffic through the capture proxy"))
                .param(ParamSpec::boolean("monitor_performance", "Sample CPU and memory")),
            handler(configure_session),
        )
        .register(
            session_op("export_session", "Export a session to an archive file.")
                .param(ParamSpec::text("output_path", "Archive path; defaults to the exports directory")),
            handler(export_session),
        )
        .register(
            OperationDescriptor::new(
                "import_session",
                "Import a session archive. The imported session gets a new id.",
            )
            .param(ParamSpec::text("archive_path", "Path to the archive file").required()),
            handler(import_session),
        )
        .register(
            session_op("get_session_stats", "Event counts by type, source and level."),
            handler(get_session_stats),
        )
}

fn session_op(name: &'static str, description: &'static str) -> OperationDescriptor {
    OperationDescriptor::new(name, description)
        .param(ParamSpec::text("session_id", "Session id").required())
}

fn session_narrative(verb: &str, session: &Session) -> String {
    format!(
        "{} session {} ({}): {}, {} events",
        verb, session.id, session.name, session.status, session.event_count
    )
}

async fn create_session(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let session_type = args.non_blank("session_type").unwrap_or("manual");
    if !SESSION_TYPES.contains(&session_type) {
        return Err(BridgeError::validation(
            "session_type",
            format!("expected one of {}", SESSION_TYPES.join(", ")),
        ));
    }
    let device_id = match args.non_blank("device_id") {
        Some(id) => Some(resolve_device(&ctx, id).await?.id),
        None => None,
    };

    let session = ctx
        .backend
        .create_session(NewSession {
            name: args.non_blank("name").map(str::to_string),
            device_id,
            session_type: Some(session_type.to_string()),
        })
        .await?;
    tracing::info!(session = %session.id, "session created");
    ToolOutput::with_json(session_narrative("Created", &session), &session)
}

async fn end_session(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let session = resolve_session(&ctx, args.require_text("session_id")?).await?;
    let ended = ctx.backend.end_session(&session.id).await?;
    ToolOutput::with_json(session_narrative("Ended", &ended), &ended)
}

async fn get_session(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let session = resolve_session(&ctx, args.require_text("session_id")?).await?;
    ToolOutput::with_json(session_narrative("Found", &session), &session)
}

async fn list_sessions(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let cap = session_cap(args.integer("limit").unwrap_or(DEFAULT_SESSION_LIMIT));
    let sessions = ctx.backend.list_sessions(cap).await?;
    if sessions.is_empty() {
        return Ok(ToolOutput::text("No sessions found."));
    }
    let page = SessionListPage::new(sessions, cap);
    ToolOutput::with_json(page.render(), &page.sessions)
}

async fn delete_session(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let session = resolve_session(&ctx, args.require_text("session_id")?).await?;
    ctx.backend.delete_session(&session.id).await?;
    Ok(ToolOutput::text(format!(
        "Deleted session {} ({}, {} events)",
        session.id, session.name, session.event_count
    )))
}

async fn get_session_events(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let query = EventQuery::from_args(&args)?;
    resolve_session(&ctx, &query.session_id).await?;

    let page = ctx.backend.query_events(&query).await?;
    if page.total == 0 {
        let qualifier = if query.has_filters() {
            " matching the filters"
        } else {
            ""
        };
        return Ok(ToolOutput::text(format!(
            "No events found for session {}{}.",
            query.session_id, qualifier
        )));
    }
    // The digest lists a prefix; the JSON block carries every returned event.
    ToolOutput::with_json(render_event_digest(&query.session_id, &page), &page)
}

async fn configure_session(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let session_id = args.require_text("session_id")?;
    let patch = SessionConfigPatch {
        capture_logs: args.boolean("capture_logs"),
        record_screen: args.boolean("record_screen"),
        enable_proxy: args.boolean("enable_proxy"),
        monitor_performance: args.boolean("monitor_performance"),
    };
    if patch.is_empty() {
        return Err(BridgeError::validation(
            "capture_logs",
            "set at least one of capture_logs, record_screen, enable_proxy, monitor_performance",
        ));
    }
    let session = resolve_session(&ctx, session_id).await?;

    let config = ctx.backend.update_session_config(&session.id, patch).await?;
    let toggles = [
        ("capture_logs", config.capture_logs),
        ("record_screen", config.record_screen),
        ("enable_proxy", config.enable_proxy),
        ("monitor_performance", config.monitor_performance),
    ]
    .iter()
    .map(|(name, on)| format!("{}={}", name, if *on { "on" } else { "off" }))
    .collect::<Vec<_>>()
    .join(", ");
    ToolOutput::with_json(
        format!("Updated session {}: {}", session.id, toggles),
        &config,
    )
}

async fn export_session(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let session = resolve_session(&ctx, args.require_text("session_id")?).await?;
    let output_path = match args.non_blank("output_path") {
        Some(path) => PathBuf::from(path),
        None => ctx
            .export_dir()
            .join(format!("session-{}.autobridge.tar", session.id)),
    };

    let summary = ctx.backend.export_session(&session.id, &output_path).await?;
    let mut narrative = format!(
        "Exported session {} to {} ({} events",
        summary.session_id, summary.path, summary.event_count
    );
    if summary.has_bookmarks {
        narrative.push_str(", bookmarks");
    }
    if summary.has_recording {
        narrative.push_str(", recording");
    }
    narrative.push(')');
    ToolOutput::with_json(narrative, &summary)
}

async fn import_session(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let archive_path = args.require_text("archive_path")?;
    let path = Path::new(archive_path);
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(BridgeError::not_found("Archive", archive_path));
    }

    let session = ctx.backend.import_session(path).await?;
    let origin = session.imported_from.as_deref().unwrap_or("unknown");
    ToolOutput::with_json(
        format!(
            "Imported session {} from archive (original id {}, {} events)",
            session.id, origin, session.event_count
        ),
        &session,
    )
}

fn breakdown(counts: &BTreeMap<String, usize>) -> String {
    if counts.is_empty() {
        return "none".to_string();
    }
    counts
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn get_session_stats(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let session = resolve_session(&ctx, args.require_text("session_id")?).await?;
    let stats = ctx.backend.session_stats(&session.id).await?;

    let mut narrative = format!("Session {}: {} events", stats.session_id, stats.event_count);
    if let Some(ms) = stats.duration_ms {
        narrative.push_str(&format!(" over {:.1}s", ms as f64 / 1000.0));
    }
    narrative.push_str(&format!(
        "\nBy type: {}\nBy source: {}\nBy level: {}",
        breakdown(&stats.by_type),
        breakdown(&stats.by_source),
        breakdown(&stats.by_level)
    ));
    ToolOutput::with_json(narrative, &stats)
}
