//! Tool registry
//!
//! Written during startup registration, read on every dispatch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use crate::error::{RegistryError, ToolError};
use crate::{Arguments, BoxFuture, CallContext, Tool, ToolResult};

/// Entry of the `tools/list` result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Name → tool map behind a reader/writer lock
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let mut tools = self.tools.write();
        let name = tool.name().to_string();
        if tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        tracing::debug!(tool = %name, "registered tool");
        tools.insert(name, tool);
        Ok(())
    }

    pub fn register_all(&self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Result<(), RegistryError> {
        tools.into_iter().try_for_each(|tool| self.register(tool))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    /// Snapshot of every registered tool, sorted by name
    pub fn list(&self) -> Vec<ToolInfo> {
        let mut infos: Vec<ToolInfo> = self
            .tools
            .read()
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.schema(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Handler = dyn Fn(CallContext, Arguments) -> BoxFuture<'static, Result<ToolResult, ToolError>> + Send + Sync;

/// Tool built from a closure handler
pub struct ToolDefinition {
    name: String,
    description: String,
    schema: Value,
    handler: Box<Handler>,
}

impl ToolDefinition {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, schema: Value, handler: F) -> Self
    where
        F: Fn(CallContext, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Box::new(move |ctx, args| Box::pin(handler(ctx, args))),
        }
    }
}

impl Tool for ToolDefinition {
    fn name(&self) -> &str { &self.name }
    fn description(&self) -> &str { &self.description }
    fn schema(&self) -> Value { self.schema.clone() }

    fn call(&self, ctx: CallContext, args: Arguments) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        (self.handler)(ctx, args)
    }
}
