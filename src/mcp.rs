//! MCP Server implementation
//!
//! Speaks JSON-RPC over newline-delimited frames. One sequential loop reads
//! a frame, dispatches it and writes the response before reading the next,
//! so responses always come out in request order.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::ServerError;
use crate::protocol::{Request, Response, ToolCallParams, PROTOCOL_VERSION};
use crate::registry::ToolRegistry;
use crate::{Arguments, CallContext, ToolResult};

/// Default frame ceiling (10 MiB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// MCP Server - owns the registry and dispatches frames
pub struct McpServer {
    name: String,
    version: String,
    registry: Arc<ToolRegistry>,
    max_frame_bytes: usize,
    shutdown: CancellationToken,
}

impl McpServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            registry,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_max_frame_bytes(mut self, limit: usize) -> Self {
        self.max_frame_bytes = limit;
        self
    }

    /// Cancelling this token stops the loop and cancels in-flight calls
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve stdin/stdout until EOF or shutdown
    pub async fn run_stdio(&self) -> Result<(), ServerError> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.run(stdin, stdout).await
    }

    /// Serve one input/output stream pair.
    ///
    /// Returns `Ok` on end of input or shutdown. Only a failing stream (or a
    /// frame over the size limit) ends the loop with an error; malformed
    /// frames are answered and skipped.
    pub async fn run<R, W>(&self, mut input: R, mut output: W) -> Result<(), ServerError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(server = %self.name, tools = self.registry.len(), "MCP server listening");
        let mut frame = Vec::new();
        loop {
            frame.clear();
            let read = tokio::select! {
                read = read_frame(&mut input, &mut frame, self.max_frame_bytes) => read?,
                _ = self.shutdown.cancelled() => {
                    tracing::info!("shutdown requested, stopping dispatch loop");
                    return Ok(());
                }
            };
            if !read {
                tracing::info!("input closed, stopping dispatch loop");
                return Ok(());
            }

            let line = trim_frame(&frame);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            if let Some(response) = self.handle_frame(line).await {
                write_response(&mut output, &response).await?;
            }
        }
    }

    /// Decode and dispatch one frame; `None` when nothing should be written
    pub async fn handle_frame(&self, frame: &[u8]) -> Option<Response> {
        let req: Request = match serde_json::from_slice(frame) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("unparseable frame: {e}");
                return Some(Response::parse_error(e.to_string()));
            }
        };
        self.handle_request(req).await
    }

    pub async fn handle_request(&self, req: Request) -> Option<Response> {
        tracing::debug!(method = %req.method, id = ?req.id, "request");
        let notification = req.is_notification();
        let id = req.id.unwrap_or(Value::Null);

        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, req.params).await,
            "notifications/initialized" => return None,
            "ping" => Response::ok(id, json!({})),
            _ => Response::method_not_found(id, &req.method),
        };

        // Notifications are processed but never answered
        if notification {
            tracing::debug!(method = %req.method, "dropping response to notification");
            return None;
        }
        Some(response)
    }

    fn handle_initialize(&self, id: Value) -> Response {
        Response::ok(id, json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": self.name,
                "version": self.version
            }
        }))
    }

    fn handle_tools_list(&self, id: Value) -> Response {
        Response::ok(id, json!({ "tools": self.registry.list() }))
    }

    async fn handle_tools_call(&self, id: Value, params: Value) -> Response {
        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return Response::invalid_params(id, e.to_string()),
        };
        let Some(args) = Arguments::from_value(params.arguments) else {
            return Response::invalid_params(id, "arguments must be an object");
        };

        let Some(tool) = self.registry.get(&params.name) else {
            tracing::warn!(tool = %params.name, "call to unknown tool");
            return Response::unknown_tool(id, &params.name);
        };

        let ctx = CallContext::new(self.shutdown.child_token());
        let result = match tool.call(ctx, args).await {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(tool = %params.name, "tool failed: {e}");
                ToolResult::error(e.to_string())
            }
        };

        match serde_json::to_value(&result) {
            Ok(value) => Response::ok(id, value),
            Err(e) => Response::ok(id, json!({
                "content": [{"type": "text", "text": format!("failed to encode result: {e}")}],
                "isError": true
            })),
        }
    }
}

/// Read one newline-terminated frame into `buf` (newline excluded).
///
/// Returns false at end of input with nothing buffered. A final frame
/// without a trailing newline is still returned.
async fn read_frame<R>(input: &mut R, buf: &mut Vec<u8>, limit: usize) -> Result<bool, ServerError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = input.fill_buf().await?;
        if available.is_empty() {
            return Ok(!buf.is_empty());
        }
        let (chunk, found) = match available.iter().position(|b| *b == b'\n') {
            Some(pos) => (&available[..pos], Some(pos + 1)),
            None => (available, None),
        };
        if buf.len() + chunk.len() > limit {
            return Err(ServerError::FrameTooLarge { limit });
        }
        buf.extend_from_slice(chunk);
        let consumed = found.unwrap_or(chunk.len());
        input.consume(consumed);
        if found.is_some() {
            return Ok(true);
        }
    }
}

fn trim_frame(frame: &[u8]) -> &[u8] {
    frame.strip_suffix(b"\r").unwrap_or(frame)
}

/// Serialize fully, then write the line and flush
async fn write_response<W>(output: &mut W, response: &Response) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    output.write_all(&line).await?;
    output.flush().await?;
    Ok(())
}
