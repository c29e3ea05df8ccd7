use rmcp::{
    model::*, service::RequestContext, ErrorData as McpError, RoleServer, ServerHandler,
    ServiceExt,
};
use std::sync::Arc;

use crate::mcp::context::ToolContext;
use crate::mcp::error::resource_error;
use crate::mcp::registry::ToolRegistry;
use crate::mcp::resources::{default_resources, ResourceTable, JSON_MIME};
use crate::mcp::tools::build_registry;
use crate::BridgeError;

const INSTRUCTIONS: &str = r#"# Autobridge

Drives an Android automation backend: devices, media tools, screen capture,
capture sessions, workflows and event plugins.

## Getting started
- list_devices, then pass a device_id to device/screen/workflow tools
- create_session to start capturing; get_session_events to query it
- run_workflow returns immediately; poll workflow_status

## Conventions
- Event filters (types, sources, levels) are comma-separated lists
- Plugin filters/config/event are JSON objects passed as strings
- Failed commands return a result flagged as an error with partial output

## Resources
- autobridge://devices, autobridge://devices/{device_id}
- autobridge://sessions
- autobridge://workflows, autobridge://workflows/{workflow_id}
"#;

/// MCP server exposing the automation backend.
///
/// Operation and resource tables are built once in [`BridgeServer::new`] and
/// shared read-only between clones.
#[derive(Clone)]
pub struct BridgeServer {
    registry: Arc<ToolRegistry>,
    resources: Arc<ResourceTable>,
    ctx: ToolContext,
}

impl BridgeServer {
    pub fn new(ctx: ToolContext) -> Result<Self, BridgeError> {
        Ok(Self {
            registry: Arc::new(build_registry()?),
            resources: Arc::new(default_resources()?),
            ctx,
        })
    }

    pub fn from_context(ctx: &crate::init::AppContext) -> Result<Self, BridgeError> {
        Self::new(ctx.tool_context())
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn resource_table(&self) -> &ResourceTable {
        &self.resources
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Run one operation by name.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        self.registry.dispatch(&self.ctx, name, arguments).await
    }

    /// Read one resource by URI.
    pub async fn read(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        let text = self
            .resources
            .read(&self.ctx, uri)
            .await
            .map_err(resource_error)?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::TextResourceContents {
                uri: uri.to_string(),
                mime_type: Some(JSON_MIME.to_string()),
                text,
                meta: None,
            }],
        })
    }
}

impl ServerHandler for BridgeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "autobridge".to_string(),
                title: Some("Autobridge Automation Bridge".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.registry.tools(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call(&request.name, request.arguments).await
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: self.resources.resources(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        Ok(ListResourceTemplatesResult {
            resource_templates: self.resources.templates(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.read(&request.uri).await
    }
}

/// Serve MCP over stdio until the client disconnects or ctrl-c.
pub async fn run_mcp_server(ctx: crate::init::AppContext) -> anyhow::Result<()> {
    let server = BridgeServer::from_context(&ctx)?;
    let tool_count = server.registry().len();

    tracing::info!(
        "Starting autobridge MCP server v{} (backend: {})",
        env!("CARGO_PKG_VERSION"),
        ctx.backend_label
    );

    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let service = server.serve(transport).await?;
    tracing::info!("MCP server listening on stdio ({} tools)", tool_count);

    tokio::select! {
        result = service.waiting() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("MCP server shutting down");
    Ok(())
}
