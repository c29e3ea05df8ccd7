//! Handlers for the inspection and one-shot CLI commands.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use rmcp::model::JsonObject;
use serde_json::json;

use crate::cli::output::{
    output_json, print_envelope, print_error, print_fields, print_header, print_hint,
    print_resource_contents, print_table, truncate, OutputMode,
};
use crate::init::AppContext;
use crate::mcp::BridgeServer;

pub fn handle_tools(ctx: &AppContext, name: Option<&str>, mode: OutputMode) -> Result<()> {
    let server = BridgeServer::from_context(ctx)?;
    let registry = server.registry();

    let Some(name) = name else {
        if mode == OutputMode::Json {
            output_json(&registry.tools());
            return Ok(());
        }
        let rows = registry
            .descriptors()
            .map(|d| {
                let required: Vec<&str> = d
                    .params
                    .iter()
                    .filter(|p| p.required)
                    .map(|p| p.name)
                    .collect();
                vec![
                    d.name.to_string(),
                    required.join(", "),
                    truncate(d.description, 60),
                ]
            })
            .collect();
        print_table(
            &["Operation", "Required", "Description"],
            rows,
            "No operations registered.",
        );
        print_hint(&format!("{} operations", registry.len()));
        return Ok(());
    };

    let Some(descriptor) = registry.descriptor(name) else {
        bail!("Unknown operation: {}", name);
    };
    if mode == OutputMode::Json {
        output_json(&json!({
            "name": descriptor.name,
            "description": descriptor.description,
            "input_schema": descriptor.input_schema().as_ref(),
        }));
        return Ok(());
    }

    print_header(descriptor.name);
    println!("{}", descriptor.description);
    let rows = descriptor
        .params
        .iter()
        .map(|p| {
            vec![
                p.name.to_string(),
                p.kind.to_string(),
                if p.required { "yes".into() } else { String::new() },
                p.default
                    .as_ref()
                    .map(|v| v.to_json().to_string())
                    .unwrap_or_default(),
                p.description.to_string(),
            ]
        })
        .collect();
    print_table(
        &["Parameter", "Type", "Required", "Default", "Description"],
        rows,
        "Takes no parameters.",
    );
    Ok(())
}

pub fn handle_resources(ctx: &AppContext, mode: OutputMode) -> Result<()> {
    let server = BridgeServer::from_context(ctx)?;
    let table = server.resource_table();

    if mode == OutputMode::Json {
        output_json(&json!({
            "resources": table.resources(),
            "resource_templates": table.templates(),
        }));
        return Ok(());
    }

    let rows = table
        .entries()
        .iter()
        .map(|e| {
            vec![
                e.uri_template.to_string(),
                if e.is_template() { "template" } else { "static" }.to_string(),
                e.description.to_string(),
            ]
        })
        .collect();
    print_table(&["URI", "Kind", "Description"], rows, "No resources registered.");
    Ok(())
}

pub async fn handle_call(ctx: &AppContext, tool: &str, args: &str, mode: OutputMode) -> Result<()> {
    let arguments: JsonObject =
        serde_json::from_str(args).context("--args must be a JSON object")?;
    let server = BridgeServer::from_context(ctx)?;

    let result = match server.call(tool, Some(arguments)).await {
        Ok(result) => result,
        Err(e) => bail!("{}", e.message),
    };

    if mode == OutputMode::Json {
        output_json(&result);
        return Ok(());
    }

    let failed = result.is_error.unwrap_or(false);
    if failed {
        print_error(&format!("{} reported a failure", tool));
    }
    print_envelope(&result);
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

pub async fn handle_read(ctx: &AppContext, uri: &str, mode: OutputMode) -> Result<()> {
    let server = BridgeServer::from_context(ctx)?;
    let result = match server.read(uri).await {
        Ok(result) => result,
        Err(e) => bail!("{}", e.message),
    };

    if mode == OutputMode::Json {
        output_json(&result);
        return Ok(());
    }
    print_resource_contents(&result.contents);
    Ok(())
}

pub fn handle_config(ctx: &AppContext, mode: OutputMode) -> Result<()> {
    if mode == OutputMode::Json {
        output_json(&json!({
            "data_path": ctx.data_path,
            "backend": ctx.backend_label,
            "scratch_dir": ctx.scratch_dir(),
            "export_dir": ctx.export_dir(),
        }));
        return Ok(());
    }

    print_header("Configuration");
    print_fields(&[
        ("data path", ctx.data_path.display().to_string()),
        ("backend", ctx.backend_label.cyan().to_string()),
        ("scratch dir", ctx.scratch_dir().display().to_string()),
        ("export dir", ctx.export_dir().display().to_string()),
    ]);
    Ok(())
}
