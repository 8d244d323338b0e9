use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{Error as McpError, ServerHandler, ServiceExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ErrorKind;
use crate::mcp::stdio::line_transport;
use crate::tools::ToolRegistry;

/// MCP request handler shared by every transport.
#[derive(Debug, Clone)]
pub struct BiolinkMcpServer {
    registry: Arc<ToolRegistry>,
}

impl BiolinkMcpServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Runs one tool call and shapes the outcome as an MCP response.
    ///
    /// Validation failures become `invalid_params` errors; upstream failures
    /// become tool results flagged with `is_error`.
    pub async fn dispatch(&self, request: CallToolRequestParam) -> Result<CallToolResult, McpError> {
        let name = request.name.as_ref();
        match self.registry.invoke(name, request.arguments.as_ref()).await {
            Ok(payload) => {
                let text = serde_json::to_string_pretty(&payload).map_err(|e| {
                    McpError::internal_error(format!("Failed to encode {name} result: {e}"), None)
                })?;
                Ok(CallToolResult {
                    content: vec![Content::text(text)],
                    is_error: Some(false),
                })
            }
            Err(err) if err.kind() == ErrorKind::Validation => {
                let data = err.to_descriptor()["error"].clone();
                Err(McpError::invalid_params(err.to_string(), Some(data)))
            }
            Err(err) => {
                warn!(tool = name, kind = %err.kind(), "Tool call failed: {err}");
                Ok(CallToolResult {
                    content: vec![Content::text(err.to_descriptor().to_string())],
                    is_error: Some(true),
                })
            }
        }
    }
}

impl ServerHandler for BiolinkMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "biolink-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Biolink MCP exposes the Monarch Initiative knowledge graph. \
                 Resolve free text to CURIEs with `biolink_normalize` or `biolink_search_entities`, \
                 fetch records with `biolink_get_entity`, and walk relationships with \
                 `biolink_associations` or the gene/phenotype presets."
                    .to_string(),
            ),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: PaginatedRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult {
            next_cursor: None,
            tools: self.registry.list_tools(),
        }))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            let tool = request.name.to_string();
            tokio::select! {
                result = self.dispatch(request) => result,
                () = context.ct.cancelled() => {
                    info!(tool = %tool, "Tool call cancelled by client");
                    Err(McpError::internal_error(format!("{tool} was cancelled"), None))
                }
            }
        }
    }
}

pub async fn run_stdio(registry: Arc<ToolRegistry>) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    let cancel = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    info!(tools = registry.len(), "Biolink MCP server ready on stdio");
    let transport = line_transport(tokio::io::stdin(), tokio::io::stdout());
    let running = BiolinkMcpServer::new(registry)
        .serve_with_ct(transport, shutdown)
        .await?;
    let reason = running.waiting().await?;
    info!(?reason, "Stdio transport closed");
    Ok(())
}

pub async fn run_sse(bind: SocketAddr, registry: Arc<ToolRegistry>) -> anyhow::Result<()> {
    use rmcp::transport::sse_server::SseServer;

    let server = BiolinkMcpServer::new(registry);
    let ct = SseServer::serve(bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind SSE server on {bind}: {e}"))?
        .with_service(move || server.clone());

    info!("Biolink MCP server listening on http://{bind}");
    info!("  SSE endpoint:  GET  http://{bind}/sse");
    info!("  Post endpoint: POST http://{bind}/message");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down…");
    ct.cancel();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BiolinkMcpError;
    use crate::sources::biolink::BiolinkClient;
    use crate::tools::{ParamDef, ParamSchema, ToolArguments};
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::io::{
        AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
    };
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn server() -> BiolinkMcpServer {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                "biolink_get_entity",
                "Fetch an entity",
                ParamSchema::new().param(ParamDef::identifier("entity_id", "CURIE").required()),
                |args: ToolArguments| async move {
                    Ok::<Value, BiolinkMcpError>(json!({ "id": args.str("entity_id")? }))
                },
            )
            .expect("register");
        registry
            .register(
                "biolink_down",
                "Upstream returns 503",
                ParamSchema::new(),
                |_args: ToolArguments| async {
                    Err::<Value, _>(BiolinkMcpError::HttpStatus {
                        status: 503,
                        path: "entity/X".into(),
                        detail: "unavailable".into(),
                    })
                },
            )
            .expect("register");
        BiolinkMcpServer::new(Arc::new(registry))
    }

    fn call(name: &str, arguments: Value) -> CallToolRequestParam {
        CallToolRequestParam {
            name: name.to_string().into(),
            arguments: arguments.as_object().cloned(),
        }
    }

    fn text_of(result: &CallToolResult) -> String {
        let value = serde_json::to_value(&result.content[0]).expect("content json");
        value["text"].as_str().unwrap_or_default().to_string()
    }

    #[test]
    fn get_info_advertises_tools() {
        let info = server().get_info();
        assert!(info.capabilities.tools.is_some());
        assert_eq!(info.server_info.name, "biolink-mcp");
    }

    #[tokio::test]
    async fn dispatch_wraps_success_payload_as_json_text() {
        let result = server()
            .dispatch(call("biolink_get_entity", json!({ "entity_id": "HGNC:11998" })))
            .await
            .expect("success");

        assert_eq!(result.is_error, Some(false));
        let payload: Value = serde_json::from_str(&text_of(&result)).expect("json body");
        assert_eq!(payload["id"], "HGNC:11998");
    }

    #[tokio::test]
    async fn dispatch_maps_validation_errors_to_invalid_params() {
        let server = server();

        let missing = server
            .dispatch(call("biolink_get_entity", json!({})))
            .await
            .expect_err("missing entity_id");
        assert_eq!(missing.code, rmcp::model::ErrorCode::INVALID_PARAMS);
        assert_eq!(
            missing.data.as_ref().map(|d| d["kind"].clone()),
            Some(json!("validation_error"))
        );

        let unknown = server
            .dispatch(call("biolink_unknown", json!({})))
            .await
            .expect_err("unknown tool");
        assert_eq!(unknown.code, rmcp::model::ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn dispatch_reports_upstream_errors_in_band() {
        let result = server()
            .dispatch(call("biolink_down", json!({})))
            .await
            .expect("in-band error");

        assert_eq!(result.is_error, Some(true));
        let payload: Value = serde_json::from_str(&text_of(&result)).expect("json body");
        assert_eq!(payload["error"]["kind"], "http_status_error");
        assert_eq!(payload["error"]["status"], 503);
    }

    #[test]
    fn server_clones_share_one_registry() {
        let server = server();
        let clone = server.clone();
        assert!(std::ptr::eq(server.registry(), clone.registry()));
        assert_eq!(clone.registry().len(), 2);
    }

    /// Client end of an in-memory stdio session.
    struct Session {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
        shutdown: CancellationToken,
    }

    impl Drop for Session {
        fn drop(&mut self) {
            self.shutdown.cancel();
        }
    }

    impl Session {
        fn start(server: BiolinkMcpServer) -> Self {
            let (client, remote) = tokio::io::duplex(64 * 1024);
            let (remote_read, remote_write) = tokio::io::split(remote);
            let shutdown = CancellationToken::new();
            let ct = shutdown.clone();
            tokio::spawn(async move {
                let transport = line_transport(remote_read, remote_write);
                if let Ok(running) = server.serve_with_ct(transport, ct).await {
                    let _ = running.waiting().await;
                }
            });

            let (read, writer) = tokio::io::split(client);
            Self {
                lines: BufReader::new(read).lines(),
                writer,
                shutdown,
            }
        }

        async fn send(&mut self, message: Value) {
            self.send_raw(&message.to_string()).await;
        }

        async fn send_raw(&mut self, line: &str) {
            self.writer
                .write_all(format!("{line}\n").as_bytes())
                .await
                .expect("write line");
        }

        async fn recv(&mut self) -> Value {
            let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
                .await
                .expect("response within 5s")
                .expect("read line")
                .expect("session still open");
            serde_json::from_str(&line).expect("response is json")
        }

        async fn initialize(&mut self) {
            self.send(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "session-test", "version": "0.0.1" }
                }
            }))
            .await;
            let response = self.recv().await;
            assert_eq!(response["id"], 1);
            assert_eq!(response["result"]["serverInfo"]["name"], "biolink-mcp");
            self.send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
                .await;
        }

        async fn list_tools(&mut self, id: u32) -> Vec<String> {
            self.send(json!({ "jsonrpc": "2.0", "id": id, "method": "tools/list", "params": {} }))
                .await;
            let response = self.recv().await;
            assert_eq!(response["id"], id);
            response["result"]["tools"]
                .as_array()
                .expect("tools array")
                .iter()
                .filter_map(|tool| tool["name"].as_str().map(str::to_string))
                .collect()
        }
    }

    fn tool_call(id: u32, name: &str, arguments: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        })
    }

    #[tokio::test]
    async fn stdio_session_discovers_and_invokes_tools() {
        let mut session = Session::start(server());
        session.initialize().await;

        assert_eq!(
            session.list_tools(2).await,
            vec!["biolink_get_entity", "biolink_down"]
        );

        session
            .send(tool_call(3, "biolink_get_entity", json!({ "entity_id": "HGNC:11998" })))
            .await;
        let called = session.recv().await;
        assert_eq!(called["id"], 3);
        assert_eq!(called["result"]["isError"], false);
        let text = called["result"]["content"][0]["text"].as_str().expect("text content");
        let payload: Value = serde_json::from_str(text).expect("payload json");
        assert_eq!(payload["id"], "HGNC:11998");

        session
            .send(tool_call(4, "biolink_get_entity", json!({ "entity_id": "" })))
            .await;
        let rejected = session.recv().await;
        assert_eq!(rejected["id"], 4);
        assert_eq!(rejected["error"]["code"], -32602);
        assert_eq!(rejected["error"]["data"]["kind"], "validation_error");
    }

    #[tokio::test]
    async fn bad_line_before_initialize_gets_parse_error_and_session_starts() {
        let mut session = Session::start(server());

        session.send_raw("{not json").await;
        let error = session.recv().await;
        assert_eq!(error["error"]["code"], -32700);
        assert_eq!(error["id"], Value::Null);

        session.initialize().await;
        assert_eq!(session.list_tools(2).await.len(), 2);
    }

    #[tokio::test]
    async fn bad_lines_mid_session_are_answered_and_serving_continues() {
        let mut session = Session::start(server());
        session.initialize().await;

        session.send_raw("garbage").await;
        let parse_error = session.recv().await;
        assert_eq!(parse_error["error"]["code"], -32700);
        assert_eq!(parse_error["error"]["data"]["kind"], "protocol_error");

        session
            .send(json!({ "jsonrpc": "2.0", "id": 7, "method": "no/such/method" }))
            .await;
        let invalid = session.recv().await;
        assert_eq!(invalid["id"], 7);
        assert_eq!(invalid["error"]["code"], -32600);

        assert_eq!(session.list_tools(8).await.len(), 2);
    }

    async fn wait_for_upstream_requests(upstream: &MockServer, count: usize) {
        for _ in 0..250 {
            let seen = upstream
                .received_requests()
                .await
                .map_or(0, |requests| requests.len());
            if seen >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("upstream never saw {count} request(s)");
    }

    #[tokio::test]
    async fn cancelled_call_fails_fast_without_waiting_for_upstream() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/entity/HGNC:11998"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": "HGNC:11998" }))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&upstream)
            .await;

        let client = Arc::new(BiolinkClient::new_for_test(upstream.uri()).expect("client"));
        let mut registry = ToolRegistry::new();
        crate::tools::biolink::register_tools(&mut registry, client, "biolink_")
            .expect("register");
        let mut session = Session::start(BiolinkMcpServer::new(Arc::new(registry)));
        session.initialize().await;

        session
            .send(tool_call(5, "biolink_get_entity", json!({ "entity_id": "HGNC:11998" })))
            .await;
        wait_for_upstream_requests(&upstream, 1).await;
        session
            .send(json!({
                "jsonrpc": "2.0",
                "method": "notifications/cancelled",
                "params": { "requestId": 5, "reason": "user aborted" }
            }))
            .await;

        // recv times out after 5s, well inside the 30s upstream delay.
        let cancelled = session.recv().await;
        assert_eq!(cancelled["id"], 5);
        assert_eq!(cancelled["error"]["code"], -32603);
        assert!(
            cancelled["error"]["message"]
                .as_str()
                .is_some_and(|m| m.contains("cancelled"))
        );

        assert_eq!(session.list_tools(6).await.len(), 10);
    }
}
