//! MCP server entrypoints for stdio and HTTP/SSE transports.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::tools::ToolRegistry;

mod server;
mod stdio;

pub use server::BiolinkMcpServer;

/// Runs the MCP server over stdio until the client disconnects or Ctrl-C.
///
/// Lines that fail to decode are answered with a JSON-RPC error and the
/// session continues.
///
/// # Errors
///
/// Returns an error when stdio transport setup or MCP server startup fails.
pub async fn run_stdio(registry: Arc<ToolRegistry>) -> anyhow::Result<()> {
    server::run_stdio(registry).await
}

/// Runs the MCP server over HTTP with SSE transport.
///
/// Starts an HTTP server on `bind` with:
/// - `GET /sse` for the server-to-client event stream
/// - `POST /message?sessionId=<id>` for client-to-server JSON-RPC messages
///
/// Every session shares one registry.
///
/// # Errors
///
/// Returns an error when the TCP bind fails.
pub async fn run_sse(bind: SocketAddr, registry: Arc<ToolRegistry>) -> anyhow::Result<()> {
    server::run_sse(bind, registry).await
}
