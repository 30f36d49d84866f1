//! MCP stdio server implementing JSON-RPC 2.0 over stdin/stdout.
//!
//! Exposes the note operations as native agent tools via the MCP (Model
//! Context Protocol). Protocol: newline-delimited JSON-RPC 2.0 on
//! stdin/stdout. Logging goes to stderr (stdout is reserved for protocol
//! messages).

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::joplin::JoplinClient;
use crate::ops;
use crate::render::ResponseFormat;

pub struct McpServer {
    client: JoplinClient,
}

impl McpServer {
    pub fn new(client: JoplinClient) -> Self {
        Self { client }
    }

    /// Run the stdio loop, reading JSON-RPC requests line by line and writing
    /// one response line per request.
    pub async fn run(&self) -> anyhow::Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        log::info!("MCP stdio server started");

        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = self.handle_message(line).await;
            if response.is_empty() {
                // Notification: no response goes out
                continue;
            }

            stdout.write_all(response.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }

        log::info!("MCP stdio server stopped");
        Ok(())
    }

    pub async fn handle_message(&self, line: &str) -> String {
        let request: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                return error_response(
                    serde_json::Value::Null,
                    -32700,
                    &format!("Parse error: {}", e),
                );
            }
        };

        let id = request.get("id").cloned().unwrap_or(serde_json::Value::Null);
        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let params = request.get("params").cloned().unwrap_or(json!({}));

        match method {
            "initialize" => self.handle_initialize(id),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, &params).await,
            // Client notifications carry no id and expect no response
            "notifications/initialized" => String::new(),
            _ => error_response(id, -32601, &format!("Method not found: {}", method)),
        }
    }

    fn handle_initialize(&self, id: serde_json::Value) -> String {
        let result = json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": "joplin-mcp",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        success_response(id, result)
    }

    fn handle_tools_list(&self, id: serde_json::Value) -> String {
        let tools: Vec<serde_json::Value> = ops::catalogue()
            .into_iter()
            .map(|spec| {
                json!({
                    "name": spec.name,
                    "description": spec.description,
                    "inputSchema": spec.input_schema,
                })
            })
            .collect();

        success_response(id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: serde_json::Value, params: &serde_json::Value) -> String {
        let name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");

        // `arguments` may be null or missing entirely for no-argument tools
        let arguments = match params.get("arguments") {
            None | Some(serde_json::Value::Null) => json!({}),
            Some(v) => v.clone(),
        };

        // The caller picks the output encoding; the operations themselves
        // always produce both.
        let format = arguments
            .get("response_format")
            .and_then(|v| serde_json::from_value::<ResponseFormat>(v.clone()).ok())
            .unwrap_or_default();

        log::info!("tools/call {}", name);
        let reply = ops::dispatch(&self.client, name, arguments).await;

        // Operation failures become isError content, not JSON-RPC errors, so
        // the agent sees the actionable message instead of a protocol fault.
        let result = json!({
            "content": [{ "type": "text", "text": reply.render(format) }],
            "isError": reply.is_error,
        });
        success_response(id, result)
    }
}

fn success_response(id: serde_json::Value, result: serde_json::Value) -> String {
    json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string()
}

fn error_response(id: serde_json::Value, code: i64, message: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    })
    .to_string()
}
