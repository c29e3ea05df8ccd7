//! Read-only resources addressed by `autobridge://` URIs.
//!
//! Resources: devices, devices/{device_id}, sessions, workflows,
//! workflows/{workflow_id}. Every read renders pretty-printed JSON.

pub mod uri;

use futures::future::BoxFuture;
use rmcp::model::{Annotated, RawResource, RawResourceTemplate, Resource, ResourceTemplate};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::mcp::context::ToolContext;
use crate::BridgeError;
pub use uri::UriPattern;

pub const JSON_MIME: &str = "application/json";

type ResourceHandler =
    Arc<dyn Fn(ToolContext, Option<String>) -> BoxFuture<'static, Result<Value, BridgeError>> + Send + Sync>;

fn resource_handler<F, Fut>(f: F) -> ResourceHandler
where
    F: Fn(ToolContext, Option<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BridgeError>> + Send + 'static,
{
    Arc::new(move |ctx, var| Box::pin(f(ctx, var)))
}

pub struct ResourceEntry {
    pub uri_template: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub pattern: UriPattern,
    handler: ResourceHandler,
}

impl ResourceEntry {
    pub fn is_template(&self) -> bool {
        !matches!(self.pattern, UriPattern::Exact(_))
    }
}

/// Immutable resource table.
pub struct ResourceTable {
    entries: Vec<ResourceEntry>,
}

impl ResourceTable {
    /// Build from entries, rejecting patterns that would claim the same URIs.
    pub fn new(entries: Vec<ResourceEntry>) -> Result<Self, BridgeError> {
        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                if overlapping(&a.pattern, &b.pattern) {
                    return Err(BridgeError::Registry(format!(
                        "resource patterns '{}' and '{}' overlap",
                        a.uri_template, b.uri_template
                    )));
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ResourceEntry] {
        &self.entries
    }

    /// Find the single entry that claims `uri` and bind its variable.
    pub fn resolve(&self, uri: &str) -> Result<(&ResourceEntry, Option<String>), BridgeError> {
        let mut claimed = self.entries.iter().filter(|e| e.pattern.claims(uri));
        let Some(entry) = claimed.next() else {
            return Err(BridgeError::UnknownResource(uri.to_string()));
        };
        if claimed.next().is_some() {
            return Err(BridgeError::InvalidUri {
                uri: uri.to_string(),
                reason: "ambiguous".into(),
            });
        }
        let variable = entry.pattern.bind(uri)?;
        Ok((entry, variable))
    }

    /// Resolve and render one resource as pretty JSON.
    #[tracing::instrument(name = "mcp.read_resource", skip(self, ctx))]
    pub async fn read(&self, ctx: &ToolContext, uri: &str) -> Result<String, BridgeError> {
        let (entry, variable) = self.resolve(uri)?;
        let value = (entry.handler)(ctx.clone(), variable).await?;
        Ok(serde_json::to_string_pretty(&value)?)
    }

    pub fn resources(&self) -> Vec<Resource> {
        self.entries
            .iter()
            .filter(|e| !e.is_template())
            .map(|e| {
                Annotated::new(
                    RawResource {
                        uri: e.uri_template.to_string(),
                        name: e.name.to_string(),
                        title: None,
                        description: Some(e.description.to_string()),
                        mime_type: Some(JSON_MIME.to_string()),
                        size: None,
                        icons: None,
                        meta: None,
                    },
                    None,
                )
            })
            .collect()
    }

    pub fn templates(&self) -> Vec<ResourceTemplate> {
        self.entries
            .iter()
            .filter(|e| e.is_template())
            .map(|e| {
                Annotated::new(
                    RawResourceTemplate {
                        uri_template: e.uri_template.to_string(),
                        name: e.name.to_string(),
                        title: None,
                        description: Some(e.description.to_string()),
                        mime_type: Some(JSON_MIME.to_string()),
                        icons: None,
                    },
                    None,
                )
            })
            .collect()
    }
}

fn overlapping(a: &UriPattern, b: &UriPattern) -> bool {
    use UriPattern::*;
    match (a, b) {
        (Exact(x), Exact(y)) => x == y,
        (Exact(x), Segmented { prefix, .. } | Prefix(prefix))
        | (Segmented { prefix, .. } | Prefix(prefix), Exact(x)) => x.starts_with(prefix),
        (Segmented { prefix: p, .. } | Prefix(p), Segmented { prefix: q, .. } | Prefix(q)) => {
            p.starts_with(q) || q.starts_with(p)
        }
    }
}

fn required(variable: Option<String>, uri_name: &str) -> Result<String, BridgeError> {
    variable.ok_or_else(|| BridgeError::InvalidUri {
        uri: uri_name.to_string(),
        reason: "missing identifier".into(),
    })
}

/// The resource set served by the bridge.
pub fn default_resources() -> Result<ResourceTable, BridgeError> {
    ResourceTable::new(vec![
        ResourceEntry {
            uri_template: "autobridge://devices",
            name: "Devices",
            description: "All devices known to the backend with their connection state",
            pattern: UriPattern::Exact("autobridge://devices"),
            handler: resource_handler(|ctx, _| async move {
                let devices = ctx.backend.list_devices().await?;
                Ok(serde_json::to_value(devices)?)
            }),
        },
        ResourceEntry {
            uri_template: "autobridge://devices/{device_id}",
            name: "Device",
            description: "One device by id. Example: autobridge://devices/emulator-5554",
            pattern: UriPattern::Segmented {
                prefix: "autobridge://devices/",
                min_segments: 4,
                index: 3,
            },
            handler: resource_handler(|ctx, var| async move {
                let id = required(var, "autobridge://devices/{device_id}")?;
                let device = ctx
                    .backend
                    .get_device(&id)
                    .await?
                    .ok_or_else(|| BridgeError::not_found("Device", &id))?;
                Ok(serde_json::to_value(device)?)
            }),
        },
        ResourceEntry {
            uri_template: "autobridge://sessions",
            name: "Sessions",
            description: "Recorded sessions, newest first",
            pattern: UriPattern::Exact("autobridge://sessions"),
            handler: resource_handler(|ctx, _| async move {
                let sessions = ctx.backend.list_sessions(None).await?;
                Ok(serde_json::to_value(sessions)?)
            }),
        },
        ResourceEntry {
            uri_template: "autobridge://workflows",
            name: "Workflows",
            description: "Saved workflows with their steps",
            pattern: UriPattern::Exact("autobridge://workflows"),
            handler: resource_handler(|ctx, _| async move {
                let workflows = ctx.backend.list_workflows().await?;
                Ok(serde_json::to_value(workflows)?)
            }),
        },
        ResourceEntry {
            uri_template: "autobridge://workflows/{workflow_id}",
            name: "Workflow",
            description: "One workflow by id. Example: autobridge://workflows/wf-login",
            pattern: UriPattern::Prefix("autobridge://workflows/"),
            handler: resource_handler(|ctx, var| async move {
                let id = required(var, "autobridge://workflows/{workflow_id}")?;
                let workflow = ctx
                    .backend
                    .get_workflow(&id)
                    .await?
                    .ok_or_else(|| BridgeError::not_found("Workflow", &id))?;
                Ok(serde_json::to_value(workflow)?)
            }),
        },
    ])
}
