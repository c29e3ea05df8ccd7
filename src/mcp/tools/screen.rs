//! Screenshots and screen recording.

use std::path::Path;

use crate::backend::{RecordingInfo, RecordingOptions};
use crate::mcp::context::ToolContext;
use crate::mcp::registry::{handler, ToolRegistryBuilder, ToolResult};
use crate::mcp::result::{ScratchFile, ToolOutput};
use crate::mcp::schema::{DecodedArgs, OperationDescriptor, ParamSpec};
use crate::mcp::tools::{clamp_timeout, resolve_device, RECORDING_TIME_LIMIT};
use crate::BridgeError;

pub fn register(builder: ToolRegistryBuilder) -> ToolRegistryBuilder {
    builder
        .register(
            OperationDescriptor::new(
                "take_screenshot",
                "Capture the device screen as a PNG image. Optionally also save it to a local path.",
            )
            .param(ParamSpec::text("device_id", "Device serial or id").required())
            .param(ParamSpec::text("save_path", "Local file path to keep a copy")),
            handler(take_screenshot),
        )
        .register(
            OperationDescriptor::new(
                "start_recording",
                "Start recording the device screen. Time limit defaults to and is capped at 180s.",
            )
            .param(ParamSpec::text("device_id", "Device serial or id").required())
            .param(ParamSpec::integer("time_limit", "Maximum recording length in seconds"))
            .param(ParamSpec::integer("bit_rate", "Video bit rate in bits per second")),
            handler(start_recording),
        )
        .register(
            OperationDescriptor::new("stop_recording", "Stop the active screen recording.")
                .param(ParamSpec::text("device_id", "Device serial or id").required())
                .param(ParamSpec::text("save_path", "Local file path for the recording")),
            handler(stop_recording),
        )
}

async fn take_screenshot(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let device = resolve_device(&ctx, args.require_text("device_id")?).await?;

    // Removed when `scratch` drops, whichever way this function returns.
    let scratch = ScratchFile::new(ctx.scratch_dir(), "screenshot-", ".png").await?;
    ctx.backend
        .capture_screenshot(&device.id, scratch.path())
        .await?;

    let bytes = tokio::fs::read(scratch.path()).await.map_err(|e| {
        BridgeError::backend("take_screenshot", format!("captured image unreadable: {}", e))
    })?;
    if bytes.is_empty() {
        return Err(BridgeError::backend("take_screenshot", "captured image is empty"));
    }

    let mut caption = format!("Screenshot of {} ({} bytes)", device.id, bytes.len());
    let mut save_note = None;
    if let Some(target) = args.non_blank("save_path") {
        match persist(Path::new(target), &bytes).await {
            Ok(()) => caption.push_str(&format!(", saved to {}", target)),
            Err(e) => {
                tracing::warn!(path = target, error = %e, "could not save screenshot copy");
                save_note = Some(format!("Could not save a copy to {}: {}", target, e));
            }
        }
    }

    let output = ToolOutput::image(bytes, "image/png", caption);
    Ok(match save_note {
        Some(note) => output.push_text(note),
        None => output,
    })
}

async fn persist(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(target, bytes).await
}

fn recording_line(info: &RecordingInfo) -> String {
    let mut parts = Vec::new();
    if let Some(ms) = info.duration_ms {
        parts.push(format!("{:.1}s", ms as f64 / 1000.0));
    }
    if let Some(size) = info.size_bytes {
        parts.push(format!("{} bytes", size));
    }
    if let Some(path) = &info.path {
        parts.push(format!("saved to {}", path));
    }
    parts.join(", ")
}

async fn start_recording(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let device = resolve_device(&ctx, args.require_text("device_id")?).await?;
    let time_limit = clamp_timeout(args.integer("time_limit"), RECORDING_TIME_LIMIT);
    let bit_rate = match args.integer("bit_rate") {
        Some(rate) if rate <= 0 => {
            return Err(BridgeError::validation("bit_rate", "must be positive"));
        }
        other => other.map(|r| r as u64),
    };

    let info = ctx
        .backend
        .start_recording(
            &device.id,
            RecordingOptions {
                time_limit_secs: time_limit.as_secs(),
                bit_rate,
            },
        )
        .await?;

    ToolOutput::with_json(
        format!(
            "Recording started on {} (time limit {}s)",
            device.id,
            time_limit.as_secs()
        ),
        &info,
    )
}

async fn stop_recording(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let device = resolve_device(&ctx, args.require_text("device_id")?).await?;
    let save_path = args.non_blank("save_path").map(Path::new);

    let info = ctx.backend.stop_recording(&device.id, save_path).await?;

    let detail = recording_line(&info);
    let narrative = if detail.is_empty() {
        format!("Recording stopped on {}", device.id)
    } else {
        format!("Recording stopped on {}: {}", device.id, detail)
    };
    ToolOutput::with_json(narrative, &info)
}
