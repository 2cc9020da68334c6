//! Scripted in-memory transport for unit tests.

use crate::mcp::error::{McpClientError, McpResult};
use crate::mcp::transport::{Incoming, Transport};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Decides which lines the fake server emits for each line it receives
pub(crate) type Responder = Box<dyn FnMut(&Value) -> Vec<String> + Send>;

/// Transport whose "server" is a closure
///
/// Each written line is parsed and handed to the responder; the lines it
/// returns are queued for `read_line`. An empty queue behaves like a silent
/// server: the read sleeps for its full timeout.
pub(crate) struct MockTransport {
    responder: Responder,
    incoming: VecDeque<Incoming>,
    written: Arc<Mutex<Vec<String>>>,
    connected: bool,
    stops: Arc<Mutex<usize>>,
}

impl MockTransport {
    pub(crate) fn new<F>(responder: F) -> Self
    where
        F: FnMut(&Value) -> Vec<String> + Send + 'static,
    {
        Self {
            responder: Box::new(responder),
            incoming: VecDeque::new(),
            written: Arc::new(Mutex::new(Vec::new())),
            connected: true,
            stops: Arc::new(Mutex::new(0)),
        }
    }

    /// A conforming server with the three decompiler tools
    pub(crate) fn well_behaved() -> Self {
        Self::new(well_behaved_reply)
    }

    /// Shared view of every line the client wrote
    pub(crate) fn written(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.written)
    }

    /// Shared counter of `stop()` calls
    pub(crate) fn stops(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.stops)
    }
}

/// Reply of a conforming server; notifications get no answer
pub(crate) fn well_behaved_reply(message: &Value) -> Vec<String> {
    let Some(id) = message.get("id").and_then(Value::as_u64) else {
        return Vec::new();
    };
    let result = match message["method"].as_str().unwrap_or_default() {
        "initialize" => json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "mock-server", "version": "0.0.1"}
        }),
        "tools/list" => json!({"tools": tool_descriptors()}),
        "tools/call" => json!({
            "content": [{"type": "text", "text": message["params"]["arguments"].to_string()}]
        }),
        other => {
            return vec![json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": format!("Method not found: {other}")}
            })
            .to_string()]
        }
    };
    vec![json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string()]
}

pub(crate) fn tool_descriptors() -> Value {
    json!([
        {"name": "scan_dependencies", "description": "Scan project dependencies",
         "inputSchema": {"type": "object", "properties": {"projectPath": {"type": "string"}}}},
        {"name": "decompile_class", "description": "Decompile a class",
         "inputSchema": {"type": "object", "properties": {"className": {"type": "string"}}}},
        {"name": "analyze_class", "description": "Analyze a class",
         "inputSchema": {"type": "object", "properties": {"className": {"type": "string"}}}}
    ])
}

#[async_trait]
impl Transport for MockTransport {
    async fn write_line(&mut self, line: &str) -> McpResult<()> {
        if !self.connected {
            return Err(McpClientError::TransportClosed("mock transport stopped".into()));
        }
        if let Ok(mut written) = self.written.lock() {
            written.push(line.to_string());
        }
        let message: Value = serde_json::from_str(line)?;
        for reply in (self.responder)(&message) {
            if reply == "<eof>" {
                self.incoming.push_back(Incoming::EndOfStream);
            } else {
                self.incoming.push_back(Incoming::Line(reply));
            }
        }
        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> McpResult<Incoming> {
        match self.incoming.pop_front() {
            Some(Incoming::EndOfStream) => {
                self.connected = false;
                Ok(Incoming::EndOfStream)
            }
            Some(line) => Ok(line),
            None => {
                tokio::time::sleep(timeout).await;
                Err(McpClientError::ReadTimeout(timeout))
            }
        }
    }

    fn is_connected(&mut self) -> bool {
        self.connected
    }

    async fn stop(&mut self, _grace: Duration) -> McpResult<()> {
        if let Ok(mut stops) = self.stops.lock() {
            *stops += 1;
        }
        self.connected = false;
        Ok(())
    }
}
