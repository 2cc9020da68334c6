// Mock MCP Server
//
// A small decompiler-shaped MCP server speaking newline-delimited JSON-RPC
// over stdio. The harness's own integration tests and benches run against
// it, and flags inject the failures a real server might show.
//
// Usage:
//   mock-mcp-server [--notify] [--stderr] [--hang-on TOOL] ...
//
// Example:
//   mcp-harness run --command target/debug/mock-mcp-server --arg --notify

use anyhow::{Context, Result};
use clap::Parser;
use mcp_harness::mcp::{McpError, McpResponse, Tool, PROTOCOL_VERSION};
use serde_json::{json, Value};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tracing::{debug, info, warn, Level};

/// Classes the fake scan "finds"
const KNOWN_CLASSES: [&str; 3] = [
    "com.example.Application",
    "com.example.service.UserService",
    "com.example.repository.UserRepository",
];

/// Offset added to the `tools/list` response id under `--wrong-id`
const WRONG_ID_OFFSET: u64 = 1000;

#[derive(Parser, Debug, Clone)]
#[command(name = "mock-mcp-server")]
#[command(about = "Scriptable stdio MCP server for harness tests", long_about = None)]
struct Flags {
    /// Reject the initialize request
    #[arg(long)]
    handshake_error: bool,

    /// Answer calls to this tool with a non-JSON line
    #[arg(long, value_name = "TOOL")]
    garbage_on: Option<String>,

    /// Never answer calls to this tool
    #[arg(long, value_name = "TOOL")]
    hang_on: Option<String>,

    /// Exit without answering when this tool is called
    #[arg(long, value_name = "TOOL")]
    exit_on: Option<String>,

    /// Emit a log notification before every response
    #[arg(long)]
    notify: bool,

    /// Answer tools/list with a mismatched id
    #[arg(long)]
    wrong_id: bool,

    /// Log every request to stderr
    #[arg(long)]
    stderr: bool,
}

/// What to do with one incoming line
enum Action {
    Reply(Value),
    Garbage,
    Silent,
    Exit,
}

struct MockServer {
    flags: Flags,
    scanned: bool,
}

impl MockServer {
    fn new(flags: Flags) -> Self {
        Self { flags, scanned: false }
    }

    fn handle(&mut self, message: &Value) -> Action {
        let method = message["method"].as_str().unwrap_or_default();
        let Some(id) = message.get("id").and_then(Value::as_u64) else {
            debug!("notification: {}", method);
            return Action::Silent;
        };
        if self.flags.stderr {
            info!("request #{}: {}", id, method);
        }

        let response = match method {
            "initialize" if self.flags.handshake_error => {
                McpResponse::err(id, McpError::internal_error("initialization refused"))
            }
            "initialize" => McpResponse::ok(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "mock-mcp-server", "version": env!("CARGO_PKG_VERSION")}
                }),
            ),
            "tools/list" => {
                let id = if self.flags.wrong_id { id + WRONG_ID_OFFSET } else { id };
                McpResponse::ok(id, json!({ "tools": tools() }))
            }
            "tools/call" => {
                let tool = message["params"]["name"].as_str().unwrap_or_default();
                if self.flags.exit_on.as_deref() == Some(tool) {
                    return Action::Exit;
                }
                if self.flags.hang_on.as_deref() == Some(tool) {
                    warn!("not answering call #{} to {}", id, tool);
                    return Action::Silent;
                }
                if self.flags.garbage_on.as_deref() == Some(tool) {
                    return Action::Garbage;
                }
                self.call_tool(id, tool, &message["params"]["arguments"])
            }
            other => McpResponse::err(id, McpError::method_not_found(other)),
        };

        match serde_json::to_value(&response) {
            Ok(value) => Action::Reply(value),
            Err(e) => {
                warn!("failed to encode response: {}", e);
                Action::Silent
            }
        }
    }

    fn call_tool(&mut self, id: u64, tool: &str, arguments: &Value) -> McpResponse {
        match tool {
            "scan_dependencies" => {
                let Some(path) = arguments.get("projectPath").and_then(Value::as_str) else {
                    return McpResponse::err(id, McpError::invalid_params("projectPath must be a string"));
                };
                if path.is_empty() || !Path::new(path).exists() {
                    return McpResponse::ok(id, tool_error(format!("Project path not found: {:?}", path)));
                }
                self.scanned = true;
                McpResponse::ok(
                    id,
                    text_result(format!(
                        "Scanned {}: indexed {} classes",
                        path,
                        KNOWN_CLASSES.len()
                    )),
                )
            }
            "decompile_class" | "analyze_class" => {
                let Some(class) = arguments.get("className").and_then(Value::as_str) else {
                    return McpResponse::err(id, McpError::invalid_params("className must be a string"));
                };
                if !self.scanned {
                    return McpResponse::ok(id, tool_error("No scan has run yet; call scan_dependencies first"));
                }
                if !KNOWN_CLASSES.contains(&class) {
                    return McpResponse::ok(id, tool_error(format!("Class not found: {}", class)));
                }
                let text = if tool == "decompile_class" {
                    let (package, simple) = class.rsplit_once('.').unwrap_or(("", class));
                    format!("package {};\n\npublic class {} {{\n}}\n", package, simple)
                } else {
                    format!("{}: 0 fields, 1 constructor, 0 methods", class)
                };
                McpResponse::ok(id, text_result(text))
            }
            other => McpResponse::err(id, McpError::invalid_params(format!("Unknown tool: {}", other))),
        }
    }
}

fn tools() -> Vec<Tool> {
    let class_schema = json!({
        "type": "object",
        "properties": {
            "className": {"type": "string", "description": "Fully qualified class name"},
            "projectPath": {"type": "string", "description": "Project root"}
        },
        "required": ["className"]
    });
    vec![
        Tool {
            name: "scan_dependencies".to_string(),
            description: "Scan a project's dependency jars and index their classes".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"projectPath": {"type": "string", "description": "Project root"}},
                "required": ["projectPath"]
            }),
        },
        Tool {
            name: "decompile_class".to_string(),
            description: "Decompile an indexed class to Java source".to_string(),
            input_schema: class_schema.clone(),
        },
        Tool {
            name: "analyze_class".to_string(),
            description: "Summarize the members of an indexed class".to_string(),
            input_schema: class_schema,
        },
    ]
}

fn text_result(text: impl Into<String>) -> Value {
    json!({"content": [{"type": "text", "text": text.into()}]})
}

fn tool_error(text: impl Into<String>) -> Value {
    json!({"content": [{"type": "text", "text": text.into()}], "isError": true})
}

async fn send(stdout: &mut Stdout, line: &str) -> Result<()> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await.context("Failed to flush stdout")
}

#[tokio::main]
async fn main() -> Result<()> {
    let flags = Flags::parse();

    // stdout carries the protocol, so logs go to stderr
    let level = if flags.stderr { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let notify = flags.notify;
    let mut server = MockServer::new(flags);
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!("mock-mcp-server ready");
    while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                warn!("unparseable request: {}", e);
                let reply = json!({"jsonrpc": "2.0", "id": null, "error": McpError::parse_error(e.to_string())});
                send(&mut stdout, &reply.to_string()).await?;
                continue;
            }
        };

        match server.handle(&message) {
            Action::Reply(reply) => {
                if notify {
                    let note = json!({
                        "jsonrpc": "2.0",
                        "method": "notifications/message",
                        "params": {"level": "info", "data": format!("handling {}", message["method"])}
                    });
                    send(&mut stdout, &note.to_string()).await?;
                }
                send(&mut stdout, &reply.to_string()).await?;
            }
            Action::Garbage => send(&mut stdout, "this is not json {").await?,
            Action::Silent => {}
            Action::Exit => {
                warn!("exiting on request of {}", message["params"]["name"]);
                std::process::exit(3);
            }
        }
    }

    info!("stdin closed, shutting down");
    Ok(())
}
