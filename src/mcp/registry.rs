//! Operation table and dispatcher.
//!
//! The table is assembled once through [`ToolRegistryBuilder`] and is
//! read-only afterwards. Dispatch takes `&self`, so concurrent calls never
//! contend on it.

use futures::future::BoxFuture;
use rmcp::model::{CallToolResult, ErrorData, JsonObject, Tool};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::instrument;

use crate::mcp::context::ToolContext;
use crate::mcp::error::{classify, map_outcome, FailureClass};
use crate::mcp::result::ToolOutput;
use crate::mcp::schema::{decode, DecodedArgs, OperationDescriptor};
use crate::BridgeError;

pub type ToolResult = Result<ToolOutput, BridgeError>;

/// Type-erased async handler.
pub type ToolHandler = Arc<dyn Fn(ToolContext, DecodedArgs) -> BoxFuture<'static, ToolResult> + Send + Sync>;

/// Wrap an `async fn(ToolContext, DecodedArgs) -> ToolResult` as a handler.
pub fn handler<F, Fut>(f: F) -> ToolHandler
where
    F: Fn(ToolContext, DecodedArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ToolResult> + Send + 'static,
{
    Arc::new(move |ctx, args| Box::pin(f(ctx, args)))
}

struct RegisteredTool {
    descriptor: OperationDescriptor,
    handler: ToolHandler,
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: BTreeMap<&'static str, RegisteredTool>,
    errors: Vec<String>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, descriptor: OperationDescriptor, handler: ToolHandler) -> Self {
        if let Err(e) = descriptor.validate() {
            self.errors.push(e.to_string());
            return self;
        }
        if self.tools.contains_key(descriptor.name) {
            self.errors
                .push(format!("operation '{}' registered twice", descriptor.name));
            return self;
        }
        self.tools.insert(
            descriptor.name,
            RegisteredTool {
                descriptor,
                handler,
            },
        );
        self
    }

    pub fn build(self) -> Result<ToolRegistry, BridgeError> {
        if !self.errors.is_empty() {
            return Err(BridgeError::Registry(self.errors.join("; ")));
        }
        Ok(ToolRegistry { tools: self.tools })
    }
}

/// Immutable operation table.
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, RegisteredTool>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn descriptor(&self, name: &str) -> Option<&OperationDescriptor> {
        self.tools.get(name).map(|t| &t.descriptor)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.tools.values().map(|t| &t.descriptor)
    }

    /// Tool listing for `tools/list`.
    pub fn tools(&self) -> Vec<Tool> {
        self.descriptors()
            .map(|d| Tool::new(d.name, d.description, d.input_schema()))
            .collect()
    }

    /// Look up, decode, run, and map one call.
    #[instrument(name = "mcp.dispatch", skip(self, ctx, raw_args))]
    pub async fn dispatch(
        &self,
        ctx: &ToolContext,
        name: &str,
        raw_args: Option<JsonObject>,
    ) -> Result<CallToolResult, ErrorData> {
        map_outcome(self.invoke(ctx, name, raw_args).await)
    }

    /// Dispatch without the MCP mapping; errors keep their taxonomy.
    pub async fn invoke(
        &self,
        ctx: &ToolContext,
        name: &str,
        raw_args: Option<JsonObject>,
    ) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            tracing::debug!(tool = name, "unknown operation");
            return Err(BridgeError::UnknownOperation {
                name: name.to_string(),
                suggestion: self.closest_name(name),
            });
        };

        let raw_args = raw_args.unwrap_or_default();
        let args = decode(&tool.descriptor.params, &raw_args).inspect_err(|e| {
            tracing::debug!(tool = name, error = %e, "argument decode failed");
        })?;

        let outcome = (tool.handler)(ctx.clone(), args).await;
        match &outcome {
            Ok(output) if output.is_error() => {
                tracing::warn!(tool = name, "operation returned a flagged result")
            }
            Ok(_) => tracing::debug!(tool = name, "operation succeeded"),
            Err(e) => match classify(e) {
                FailureClass::Result => tracing::warn!(tool = name, error = %e, "backend failure"),
                _ => tracing::debug!(tool = name, error = %e, "operation rejected"),
            },
        }
        outcome
    }

    fn closest_name(&self, name: &str) -> Option<String> {
        use rapidfuzz::distance::levenshtein;

        let wanted = name.to_lowercase();
        self.tools
            .keys()
            .map(|candidate| {
                let score = levenshtein::normalized_similarity(wanted.chars(), candidate.chars());
                (score, *candidate)
            })
            .filter(|(score, _)| *score >= 0.6)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, candidate)| candidate.to_string())
    }
}
