//! localmcp - expose local machine operations as MCP tools over stdio
//!
//! The core is small: a tool registry, a sequential JSON-RPC dispatcher,
//! and a task manager for subprocesses that outlive a single request.
//! Tool modules plug in through the [`Tool`] trait.

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod params;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod tasks;
pub mod tools;

pub use context::CallContext;
pub use error::{ToolError, TaskError};
pub use params::Arguments;
pub use protocol::ToolResult;

/// Boxed future for dyn compatibility
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A named, schema-described operation exposed to the caller
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// Advisory JSON schema of the arguments
    fn schema(&self) -> Value;
    /// Run the tool. `Err` is reported to the caller as an `isError` result.
    fn call(&self, ctx: CallContext, args: Arguments) -> BoxFuture<'_, Result<ToolResult, ToolError>>;
}
