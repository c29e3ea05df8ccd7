//! Plugin management.
//!
//! `filters`, `config` and `event` arrive as JSON text embedded in a string
//! parameter. They are parsed here, before the backend is called, so a
//! malformed value is the caller's error and names the field.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::backend::{Plugin, PluginDraft, PluginFilters, PluginPatch};
use crate::mcp::context::ToolContext;
use crate::mcp::registry::{handler, ToolRegistryBuilder, ToolResult};
use crate::mcp::result::ToolOutput;
use crate::mcp::schema::{DecodedArgs, OperationDescriptor, ParamSpec};
use crate::BridgeError;

pub fn register(builder: ToolRegistryBuilder) -> ToolRegistryBuilder {
    builder
        .register(
            OperationDescriptor::new("list_plugins", "List installed plugins."),
            handler(list_plugins),
        )
        .register(
            plugin_op("get_plugin", "Get one plugin including its script."),
            handler(get_plugin),
        )
        .register(
            OperationDescriptor::new("create_plugin", "Create a plugin from a script.")
                .param(ParamSpec::text("name", "Plugin name").required())
                .param(ParamSpec::text("script", "Plugin script source").required())
                .param(ParamSpec::text("description", "What the plugin does"))
                .param(ParamSpec::text(
                    "filters",
                    "JSON object: {\"types\": [...], \"sources\": [...], \"levels\": [...], \"url_pattern\": \"...\"}",
                ))
                .param(ParamSpec::text("config", "JSON object passed to the plugin")),
            handler(create_plugin),
        )
        .register(
            plugin_op("update_plugin", "Update plugin fields. Omitted fields are kept.")
                .param(ParamSpec::text("name", "New name"))
                .param(ParamSpec::text("script", "New script source"))
                .param(ParamSpec::text("description", "New description"))
                .param(ParamSpec::text("filters", "JSON object replacing the filters"))
                .param(ParamSpec::text("config", "JSON object replacing the config")),
            handler(update_plugin),
        )
        .register(
            plugin_op("delete_plugin", "Delete a plugin."),
            handler(delete_plugin),
        )
        .register(
            plugin_op("toggle_plugin", "Enable or disable a plugin.")
                .param(ParamSpec::boolean("enabled", "true to enable").required()),
            handler(toggle_plugin),
        )
        .register(
            plugin_op("test_plugin", "Run a plugin against a sample event.")
                .param(ParamSpec::text("event", "Sample event as a JSON object").required()),
            handler(test_plugin),
        )
}

fn plugin_op(name: &'static str, description: &'static str) -> OperationDescriptor {
    OperationDescriptor::new(name, description)
        .param(ParamSpec::text("plugin_id", "Plugin id").required())
}

/// Parse an embedded JSON parameter, if present.
pub fn embedded_json<T: DeserializeOwned>(
    args: &DecodedArgs,
    field: &str,
) -> Result<Option<T>, BridgeError> {
    let Some(raw) = args.non_blank(field) else {
        return Ok(None);
    };
    serde_json::from_str(raw)
        .map(Some)
        .map_err(|e| BridgeError::validation(field, format!("invalid JSON: {}", e)))
}

fn plugin_line(plugin: &Plugin) -> String {
    format!(
        "{} | {} v{} | {}",
        plugin.id,
        plugin.name,
        plugin.version,
        if plugin.enabled { "enabled" } else { "disabled" }
    )
}

async fn resolve_plugin(ctx: &ToolContext, plugin_id: &str) -> Result<Plugin, BridgeError> {
    ctx.backend
        .get_plugin(plugin_id)
        .await?
        .ok_or_else(|| BridgeError::not_found("Plugin", plugin_id))
}

async fn list_plugins(ctx: ToolContext, _args: DecodedArgs) -> ToolResult {
    let plugins = ctx.backend.list_plugins().await?;
    ToolOutput::listing("plugins", &plugins, plugin_line)
}

async fn get_plugin(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let plugin = resolve_plugin(&ctx, args.require_text("plugin_id")?).await?;
    ToolOutput::with_json(format!("Plugin {}", plugin_line(&plugin)), &plugin)
}

async fn create_plugin(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let draft = PluginDraft {
        name: args.require_text("name")?.to_string(),
        script: args.require_text("script")?.to_string(),
        description: args.non_blank("description").map(str::to_string),
        filters: embedded_json::<PluginFilters>(&args, "filters")?,
        config: embedded_json::<Map<String, Value>>(&args, "config")?,
    };
    let plugin = ctx.backend.create_plugin(draft).await?;
    tracing::info!(plugin = %plugin.id, "plugin created");
    ToolOutput::with_json(format!("Created plugin {}", plugin_line(&plugin)), &plugin)
}

async fn update_plugin(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let plugin_id = args.require_text("plugin_id")?;
    let patch = PluginPatch {
        name: args.non_blank("name").map(str::to_string),
        script: args.non_blank("script").map(str::to_string),
        description: args.non_blank("description").map(str::to_string),
        filters: embedded_json::<PluginFilters>(&args, "filters")?,
        config: embedded_json::<Map<String, Value>>(&args, "config")?,
    };
    if patch.is_empty() {
        return Err(BridgeError::validation(
            "name",
            "set at least one of name, script, description, filters, config",
        ));
    }
    resolve_plugin(&ctx, plugin_id).await?;

    let plugin = ctx.backend.update_plugin(plugin_id, patch).await?;
    ToolOutput::with_json(format!("Updated plugin {}", plugin_line(&plugin)), &plugin)
}

async fn delete_plugin(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let plugin = resolve_plugin(&ctx, args.require_text("plugin_id")?).await?;
    ctx.backend.delete_plugin(&plugin.id).await?;
    Ok(ToolOutput::text(format!(
        "Deleted plugin {} ({})",
        plugin.id, plugin.name
    )))
}

async fn toggle_plugin(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let plugin_id = args.require_text("plugin_id")?;
    let enabled = args.require_bool("enabled")?;
    resolve_plugin(&ctx, plugin_id).await?;

    let plugin = ctx.backend.set_plugin_enabled(plugin_id, enabled).await?;
    ToolOutput::with_json(
        format!(
            "Plugin {} is now {}",
            plugin.name,
            if plugin.enabled { "enabled" } else { "disabled" }
        ),
        &plugin,
    )
}

async fn test_plugin(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let plugin_id = args.require_text("plugin_id")?;
    let event = match embedded_json::<Value>(&args, "event")? {
        Some(Value::Object(map)) => Value::Object(map),
        Some(_) => return Err(BridgeError::validation("event", "expected a JSON object")),
        None => return Err(BridgeError::validation("event", "must be a non-empty string")),
    };
    let plugin = resolve_plugin(&ctx, plugin_id).await?;

    let report = ctx.backend.test_plugin(&plugin.id, event).await?;
    if let Some(error) = &report.error {
        return Err(BridgeError::backend_with_output(
            format!("Plugin '{}' test", plugin.name),
            error.clone(),
            report.logs.join("\n"),
        ));
    }

    let mut narrative = format!(
        "Plugin {} {} the event",
        plugin.name,
        if report.matched { "matched" } else { "did not match" }
    );
    if let Some(ms) = report.duration_ms {
        narrative.push_str(&format!(" in {}ms", ms));
    }
    ToolOutput::with_json(narrative, &report)
}
