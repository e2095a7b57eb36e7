//! Discovery and invocation of tools on dynamic tool servers, against a
//! `wiremock` server speaking JSON-RPC over HTTP.

mod common;

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use common::test_config;
use lore::mcp::McpManager;
use lore::storage::ToolServer;
use lore::tools::{ToolContext, ToolDispatcher, ToolRegistry};

/// Minimal tool server: echoes request ids and serves a fixed catalog
#[derive(Clone)]
struct RpcServer {
    tools: Value,
    sse: bool,
}

impl RpcServer {
    fn new(tools: Value) -> Self {
        Self { tools, sse: false }
    }

    fn streaming(tools: Value) -> Self {
        Self { tools, sse: true }
    }

    fn reply(&self, payload: Value) -> ResponseTemplate {
        if self.sse {
            let body = format!("event: ping\ndata: {{}}\n\nevent: message\ndata: {}\n\n", payload);
            ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
        } else {
            ResponseTemplate::new(200).set_body_json(payload)
        }
    }
}

impl Respond for RpcServer {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let Some(id) = body.get("id").cloned() else {
            return ResponseTemplate::new(202);
        };

        let result = match body["method"].as_str().unwrap_or_default() {
            "initialize" => {
                let payload = json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "protocolVersion": "2025-03-26",
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": "docs", "version": "1.0.0"}
                    }
                });
                return self.reply(payload).insert_header("Mcp-Session-Id", "sess-1");
            }
            "tools/list" => json!({ "tools": self.tools }),
            "tools/call" => {
                let name = body["params"]["name"].as_str().unwrap_or_default();
                if name == "broken" {
                    json!({
                        "content": [{"type": "text", "text": "index offline"}],
                        "isError": true
                    })
                } else {
                    json!({
                        "content": [{
                            "type": "text",
                            "text": format!("{} got {}", name, body["params"]["arguments"])
                        }]
                    })
                }
            }
            other => {
                return self.reply(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": -32601, "message": format!("unknown method {}", other)}
                }));
            }
        };
        self.reply(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
    }
}

fn catalog() -> Value {
    json!([
        {
            "name": "lookup",
            "description": "Look up a crate in the docs index",
            "inputSchema": {
                "type": "object",
                "properties": {"crate": {"type": "string"}},
                "required": ["crate"]
            }
        },
        {
            "name": "broken",
            "description": "Always fails",
            "inputSchema": {"type": "object"}
        }
    ])
}

async fn tool_server(responder: RpcServer) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(responder)
        .mount(&server)
        .await;
    server
}

fn docs(server: &MockServer) -> ToolServer {
    ToolServer::new("docs", format!("{}/mcp", server.uri()))
}

fn registry() -> Arc<ToolRegistry> {
    let config = test_config("http://127.0.0.1:9");
    let mcp = Arc::new(McpManager::from_config(&config.mcp, &config.retry));
    Arc::new(ToolRegistry::with_builtins(&config, mcp).unwrap())
}

async fn count_method(server: &MockServer, method_name: &str) -> usize {
    let needle = format!("\"method\":\"{}\"", method_name);
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| String::from_utf8_lossy(&r.body).contains(&needle))
        .count()
}

#[tokio::test]
async fn test_remote_tools_are_namespaced_after_builtins() {
    let server = tool_server(RpcServer::new(catalog())).await;
    let registry = registry();

    let schemas = registry.list_tool_schemas(&[docs(&server)]).await;
    let names: Vec<&str> = schemas.iter().map(|t| t.name.as_str()).collect();

    assert_eq!(names.len(), 7);
    assert_eq!(names[0], "web_search");
    assert_eq!(&names[5..], &["docs__lookup", "docs__broken"]);
    assert!(schemas[5].description.starts_with("[docs]"));
    assert_eq!(schemas[5].parameters["required"][0], "crate");
}

#[tokio::test]
async fn test_session_header_is_sent_after_initialize() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_string_contains("\"method\":\"tools/list\""))
        .and(header("Mcp-Session-Id", "sess-1"))
        .respond_with(RpcServer::new(catalog()))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(RpcServer::new(catalog()))
        .mount(&server)
        .await;

    let schemas = registry().list_tool_schemas(&[docs(&server)]).await;
    assert_eq!(schemas.len(), 7);
}

#[tokio::test]
async fn test_catalog_is_cached_per_server() {
    let server = tool_server(RpcServer::new(catalog())).await;
    let registry = registry();
    let servers = [docs(&server)];

    registry.list_tool_schemas(&servers).await;
    registry.list_tool_schemas(&servers).await;

    assert_eq!(count_method(&server, "initialize").await, 1);
    assert_eq!(count_method(&server, "tools/list").await, 1);
}

#[tokio::test]
async fn test_unreachable_server_is_skipped() {
    let server = tool_server(RpcServer::new(catalog())).await;
    let registry = registry();
    let servers = [
        ToolServer::new("offline", "http://127.0.0.1:9/mcp"),
        docs(&server),
    ];

    let schemas = registry.list_tool_schemas(&servers).await;
    let names: Vec<&str> = schemas.iter().map(|t| t.name.as_str()).collect();

    assert!(names.contains(&"docs__lookup"));
    assert!(!names.iter().any(|n| n.starts_with("offline__")));
}

#[tokio::test]
async fn test_event_stream_responses_are_parsed() {
    let server = tool_server(RpcServer::streaming(catalog())).await;

    let schemas = registry().list_tool_schemas(&[docs(&server)]).await;
    assert!(schemas.iter().any(|t| t.name == "docs__lookup"));
}

#[tokio::test]
async fn test_dispatcher_invokes_remote_tool() {
    let server = tool_server(RpcServer::new(catalog())).await;
    let dispatcher = ToolDispatcher::new(registry());
    let ctx = ToolContext::new(None, None).with_servers(vec![docs(&server)]);

    let result = dispatcher
        .execute("docs__lookup", json!({"crate": "serde"}), &ctx)
        .await;

    assert_eq!(result["content"], "lookup got {\"crate\":\"serde\"}");
    assert_eq!(count_method(&server, "tools/call").await, 1);
}

#[tokio::test]
async fn test_remote_error_flag_becomes_error_value() {
    let server = tool_server(RpcServer::new(catalog())).await;
    let dispatcher = ToolDispatcher::new(registry());
    let ctx = ToolContext::new(None, None).with_servers(vec![docs(&server)]);

    let result = dispatcher.execute("docs__broken", json!({}), &ctx).await;
    assert_eq!(result["error"], "index offline");
}

#[tokio::test]
async fn test_tool_of_unlisted_server_is_unknown() {
    let server = tool_server(RpcServer::new(catalog())).await;
    let dispatcher = ToolDispatcher::new(registry());

    let result = dispatcher
        .execute("docs__lookup", json!({"crate": "serde"}), &ToolContext::default())
        .await;

    assert!(result["error"].as_str().unwrap().contains("docs__lookup"));
    assert_eq!(count_method(&server, "tools/call").await, 0);
}

#[tokio::test]
async fn test_failed_server_is_not_contacted_again_during_backoff() {
    let healthy = tool_server(RpcServer::new(catalog())).await;
    let failing = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .mount(&failing)
        .await;

    let dispatcher = ToolDispatcher::new(registry());
    let servers = vec![
        docs(&healthy),
        ToolServer::new("flaky", format!("{}/mcp", failing.uri())),
    ];
    let ctx = ToolContext::new(None, None).with_servers(servers.clone());

    let schemas = dispatcher.list_tool_schemas(&servers).await;
    assert!(schemas.iter().any(|t| t.name == "docs__lookup"));
    assert!(!schemas.iter().any(|t| t.name.starts_with("flaky__")));
    let after_discovery = failing.received_requests().await.unwrap_or_default().len();
    assert_eq!(after_discovery, 1);

    for _ in 0..3 {
        let result = dispatcher
            .execute("docs__lookup", json!({"crate": "serde"}), &ctx)
            .await;
        assert_eq!(result["content"], "lookup got {\"crate\":\"serde\"}");
    }
    let unknown = dispatcher.execute("flaky__anything", json!({}), &ctx).await;
    assert!(unknown["error"].is_string());
    dispatcher.list_tool_schemas(&servers).await;

    assert_eq!(
        failing.received_requests().await.unwrap_or_default().len(),
        after_discovery
    );
    assert_eq!(count_method(&healthy, "initialize").await, 1);
}
