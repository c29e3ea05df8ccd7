//! Workflow listing and detached runs.
//!
//! `run_workflow` acknowledges immediately. The run itself executes on a
//! spawned task and its outcome lands in [`WorkflowRuns`], readable through
//! `workflow_status`.
//!
//! [`WorkflowRuns`]: crate::services::workflow_runs::WorkflowRuns

use crate::backend::Workflow;
use crate::mcp::context::ToolContext;
use crate::mcp::registry::{handler, ToolRegistryBuilder, ToolResult};
use crate::mcp::result::ToolOutput;
use crate::mcp::schema::{DecodedArgs, OperationDescriptor, ParamSpec};
use crate::mcp::tools::resolve_device;
use crate::services::workflow_runs::RunState;
use crate::BridgeError;

pub fn register(builder: ToolRegistryBuilder) -> ToolRegistryBuilder {
    builder
        .register(
            OperationDescriptor::new("list_workflows", "List saved workflows."),
            handler(list_workflows),
        )
        .register(
            OperationDescriptor::new(
                "run_workflow",
                "Start a workflow on a device. Returns immediately; poll workflow_status for the outcome.",
            )
            .param(ParamSpec::text("workflow_id", "Workflow id").required())
            .param(ParamSpec::text("device_id", "Device serial or id").required()),
            handler(run_workflow),
        )
        .register(
            OperationDescriptor::new("stop_workflow", "Stop the workflow running on a device.")
                .param(ParamSpec::text("device_id", "Device serial or id").required()),
            handler(stop_workflow),
        )
        .register(
            OperationDescriptor::new(
                "workflow_status",
                "Status of the latest workflow run started on a device.",
            )
            .param(ParamSpec::text("device_id", "Device serial or id").required()),
            handler(workflow_status),
        )
}

fn workflow_line(workflow: &Workflow) -> String {
    format!(
        "{} | {} | {} steps",
        workflow.id,
        workflow.name,
        workflow.steps.len()
    )
}

async fn list_workflows(ctx: ToolContext, _args: DecodedArgs) -> ToolResult {
    let workflows = ctx.backend.list_workflows().await?;
    ToolOutput::listing("workflows", &workflows, workflow_line)
}

async fn run_workflow(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let workflow_id = args.require_text("workflow_id")?;
    let workflow = ctx
        .backend
        .get_workflow(workflow_id)
        .await?
        .ok_or_else(|| BridgeError::not_found("Workflow", workflow_id))?;
    let device = resolve_device(&ctx, args.require_text("device_id")?).await?;
    let step_count = workflow.steps.len();

    let record = ctx
        .runs
        .try_start(&workflow.id, &workflow.name, &device.id, step_count)
        .await
        .map_err(|active| BridgeError::AlreadyRunning {
            what: format!("Workflow '{}'", active.workflow_name),
            detail: format!(
                "device {} (started {}); use stop_workflow to cancel it",
                active.device_id,
                active.started_at.to_rfc3339()
            ),
        })?;

    let backend = ctx.backend.clone();
    let runs = ctx.runs.clone();
    let run_id = record.run_id.clone();
    let device_id = device.id.clone();
    let wf_id = workflow.id.clone();
    tokio::spawn(async move {
        let state = match backend.run_workflow(&wf_id, &device_id).await {
            Ok(report) => match report.error {
                Some(error) => RunState::Failed { error },
                None if report.stopped => RunState::Stopped {
                    completed_steps: report.completed_steps,
                },
                None => RunState::Completed {
                    completed_steps: report.completed_steps,
                },
            },
            Err(e) => RunState::Failed {
                error: e.to_string(),
            },
        };
        match &state {
            RunState::Failed { error } => {
                tracing::warn!(workflow = %wf_id, device = %device_id, %error, "workflow run failed")
            }
            other => {
                tracing::info!(workflow = %wf_id, device = %device_id, state = other.label(), "workflow run finished")
            }
        }
        runs.finish(&device_id, &run_id, state).await;
    });

    ToolOutput::with_json(
        format!(
            "Started workflow '{}' ({} steps) on {}. Use workflow_status to check progress.",
            workflow.name, step_count, device.id
        ),
        &record,
    )
}

async fn stop_workflow(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let device = resolve_device(&ctx, args.require_text("device_id")?).await?;
    let active = ctx.runs.status(&device.id).await.filter(|r| r.state.is_active());

    ctx.backend.stop_workflow(&device.id).await?;

    Ok(ToolOutput::text(match active {
        Some(run) => format!(
            "Stop requested for workflow '{}' on {}",
            run.workflow_name, device.id
        ),
        None => format!("Stop requested on {} (no run started from here was active)", device.id),
    }))
}

async fn workflow_status(ctx: ToolContext, args: DecodedArgs) -> ToolResult {
    let device = resolve_device(&ctx, args.require_text("device_id")?).await?;
    match ctx.runs.status(&device.id).await {
        Some(record) => ToolOutput::with_json(record.describe(), &record),
        None => Ok(ToolOutput::text(format!(
            "No workflow has been started on {}.",
            device.id
        ))),
    }
}
