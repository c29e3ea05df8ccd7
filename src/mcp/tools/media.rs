//! ffmpeg / ffprobe passthrough.

use crate::backend::MediaTool;
use crate::mcp::context::ToolContext;
use crate::mcp::registry::{handler, ToolRegistryBuilder, ToolResult};
use crate::mcp::result::ToolOutput;
use crate::mcp::schema::{DecodedArgs, OperationDescriptor, ParamSpec};
use crate::mcp::tools::{clamp_timeout, MEDIA_TOOL_TIMEOUT};
use crate::BridgeError;

pub fn register(builder: ToolRegistryBuilder) -> ToolRegistryBuilder {
    builder
        .register(
            media_descriptor(
                "run_ffmpeg",
                "Run ffmpeg with the given arguments. Timeout defaults to 120s, max 600s.",
            ),
            handler(|ctx, args| run_media_tool(ctx, args, MediaTool::Ffmpeg)),
        )
        .register(
            media_descriptor(
                "run_ffprobe",
                "Run ffprobe with the given arguments. Timeout defaults to 120s, max 600s.",
            ),
            handler(|ctx, args| run_media_tool(ctx, args, MediaTool::Ffprobe)),
        )
}

fn media_descriptor(name: &'static str, description: &'static str) -> OperationDescriptor {
    OperationDescriptor::new(name, description)
        .param(
            ParamSpec::text(
                "args",
                "Arguments as a shell-style string, e.g. \"-i in.mp4 -vf scale=640:-1 out.mp4\"",
            )
            .required(),
        )
        .param(ParamSpec::integer("timeout", "Timeout in seconds"))
}

/// Split a shell-style argument string. Unbalanced quotes are a caller error.
pub fn split_args(raw: &str) -> Result<Vec<String>, BridgeError> {
    let parts = shell_words::split(raw)
        .map_err(|e| BridgeError::validation("args", format!("cannot parse arguments: {}", e)))?;
    if parts.is_empty() {
        return Err(BridgeError::validation("args", "no arguments given"));
    }
    Ok(parts)
}

async fn run_media_tool(ctx: ToolContext, args: DecodedArgs, tool: MediaTool) -> ToolResult {
    let argv = split_args(args.require_text("args")?)?;
    let timeout = clamp_timeout(args.integer("timeout"), MEDIA_TOOL_TIMEOUT);
    let binary = tool.binary_name();

    tracing::debug!(tool = binary, argc = argv.len(), "running media tool");
    let output = ctx.backend.run_media_tool(tool, &argv, timeout).await?;

    if output.timed_out {
        return Err(BridgeError::backend_with_output(
            binary,
            format!("timed out after {}s", timeout.as_secs()),
            output.combined(),
        ));
    }
    if !output.succeeded() {
        return Err(BridgeError::backend_with_output(
            binary,
            format!("exited with code {}", output.exit_code),
            output.combined(),
        ));
    }

    let body = output.combined();
    Ok(ToolOutput::text(if body.trim().is_empty() {
        format!("{} completed (no output)", binary)
    } else {
        format!("{} completed:\n{}", binary, body)
    }))
}
