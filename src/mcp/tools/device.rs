//! Device lifecycle and raw command execution.

use crate::backend::Device;
use crate::mcp::context::ToolContext;
use crate::mcp::registry::{handler, ToolRegistryBuilder, ToolResult};
use crate::mcp::result::ToolOutput;
use crate::mcp::schema::{DecodedArgs, OperationDescriptor, ParamSpec};
use crate::mcp::tools::{clamp_timeout, resolve_device, DEVICE_COMMAND_TIMEOUT};
use crate::BridgeError;

pub fn register(builder: ToolRegistryBuilder) -> ToolRegistryBuilder {
    builder
        .register(
            OperationDescriptor::new("list_devices", "List connected and known devices."),
            handler(list_devices),
        )
        .register(
            OperationDescriptor::new("get_device", "Get details for one device.")
                .param(ParamSpec::text("device_id", "Device serial or id").required()),
            handler(get_device),
        )
        .register(
            OperationDescriptor::new(
                "connect_device",
                "Connect to a network device by address (host:port).",
            )
            .param(ParamSpec::text("address", "Network address, e.g. 192.168.1.20:5555").required()),
            handler(connect_device),
        )
        .register(
            OperationDescriptor::new("disconnect_device", "Disconnect a device.")
                .param(ParamSpec::text("device_id", "Device serial or id").required()),
            handler(disconnect_device),
        )
        .register(
            OperationDescriptor::new(
                "run_device_command",
                "Run a shell command on a device. Timeout defaults to 30s, max 300s.",
            )
            .param(ParamSpec::text("device_id", "Device serial or id").required())
            .param(ParamSpec::text("command", "Shell command to run").required())
            .param(ParamSpec::integer("timeout", "Timeout in seconds")),
            handler(run_device_command),
        )
}

pub(crate) fn device_line(device: &Device) -> String {
    let mut line = format!("{} ({})", device.id, device.state);
    if let Some(model) = &device.model {
        line.push_str(&format!(" - {}", model));
    }
    if let Some(version) = &device.android_version {
        line.push_str(&format!(", Android {}", version));
    }
    line
}

async fn list_devices(ctx: ToolContext, _args: DecodedArgs) -> ToolResult {
    let devices = ctx.backend.list_devices().await?;
    ToolOutput::listing("devices", &devices, device_line)
}

async fn get_device(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let device = resolve_device(&ctx, args.require_text("device_id")?).await?;
    ToolOutput::with_json(format!("Device {}", device_line(&device)), &device)
}

async fn connect_device(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let address = args.require_text("address")?;
    if !address.contains(':') {
        return Err(BridgeError::validation("address", "expected host:port"));
    }
    let device = ctx.backend.connect_device(address).await?;
    tracing::info!(device = %device.id, "device connected");
    ToolOutput::with_json(format!("Connected to {}", device_line(&device)), &device)
}

async fn disconnect_device(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let device = resolve_device(&ctx, args.require_text("device_id")?).await?;
    ctx.backend.disconnect_device(&device.id).await?;
    Ok(ToolOutput::text(format!("Disconnected {}", device.id)))
}

async fn run_device_command(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let device = resolve_device(&ctx, args.require_text("device_id")?).await?;
    let command = args.require_text("command")?;
    let timeout = clamp_timeout(args.integer("timeout"), DEVICE_COMMAND_TIMEOUT);

    let output = ctx
        .backend
        .run_device_command(&device.id, command, timeout)
        .await?;

    let operation = format!("Command '{}' on {}", command, device.id);
    if output.timed_out {
        return Err(BridgeError::backend_with_output(
            operation,
            format!("timed out after {}s", timeout.as_secs()),
            output.combined(),
        ));
    }
    if !output.succeeded() {
        return Err(BridgeError::backend_with_output(
            operation,
            format!("exited with code {}", output.exit_code),
            output.combined(),
        ));
    }

    let body = output.combined();
    Ok(ToolOutput::text(if body.trim().is_empty() {
        format!("Command completed on {} (no output)", device.id)
    } else {
        format!("Command completed on {}:\n{}", device.id, body)
    }))
}
