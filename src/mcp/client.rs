//! MCP Client Layer
//!
//! The high-level protocol client: handshake, request-id assignment,
//! notifications and request/response correlation on top of a [`Transport`].
//!
//! # Concurrency
//!
//! The protocol is strictly half-duplex: one request is in flight per
//! connection and the next line read is its response. All operations take
//! `&self` and serialize through an async mutex around the connection, so
//! ten concurrent `list_tools()` calls become ten back-to-back exchanges
//! with no cross-talk. With [`ConcurrencyPolicy::Reject`] an overlapping
//! caller fails with [`McpClientError::ConcurrentRequest`] instead of
//! queueing.
//!
//! # Usage
//!
//! ```ignore
//! use mcp_harness::mcp::{ClientOptions, McpClient, ServerCommand};
//!
//! let command = ServerCommand::new("node").arg("dist/index.js");
//! let client = McpClient::spawn(&command, ClientOptions::default()).await?;
//! let tools = client.list_tools().await?;
//! let response = client.call_tool("scan_dependencies", json!({"projectPath": "."})).await?;
//! client.shutdown(Duration::from_secs(5)).await?;
//! ```

use crate::mcp::error::{McpClientError, McpResult};
use crate::mcp::protocol::{
    ClientInfo, InitializeParams, InitializeResult, McpMethod, McpNotification, McpRequest,
    McpResponse, ServerInfo, Tool, ToolCallParams,
};
use crate::mcp::transport::{Incoming, ServerCommand, StdioTransport, Transport};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// What to do when a call arrives while another is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyPolicy {
    /// Wait for the connection (FIFO)
    #[default]
    Queue,

    /// Fail fast with `ConcurrentRequest`
    Reject,
}

/// Client tunables
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Identification sent in the handshake
    pub client_info: ClientInfo,

    /// Deadline for each response
    pub request_timeout: Duration,

    /// Behaviour under overlapping calls
    pub concurrency: ConcurrencyPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            client_info: ClientInfo::default(),
            request_timeout: Duration::from_secs(30),
            concurrency: ConcurrencyPolicy::Queue,
        }
    }
}

/// Client state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Client is created but not initialized
    Created,

    /// Initialization is in progress
    Initializing,

    /// Handshake complete; tool operations allowed
    Ready,

    /// The server went away or the client was shut down
    Disconnected,
}

/// Everything that must only be touched by one exchange at a time
struct Connection<T> {
    transport: T,

    /// Last assigned request id (0 before the first request)
    next_id: u64,

    state: ClientState,

    /// Id written but whose response has not been consumed yet
    in_flight: Option<u64>,

    /// Highest id whose caller gave up; late responses up to it are dropped
    abandoned: Option<u64>,

    server: Option<InitializeResult>,
}

impl<T: Transport> Connection<T> {
    fn next_request_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn ensure_ready(&self) -> McpResult<()> {
        match self.state {
            ClientState::Ready => Ok(()),
            ClientState::Disconnected => Err(McpClientError::TransportClosed(
                "client is disconnected".into(),
            )),
            ClientState::Created | ClientState::Initializing => {
                Err(McpClientError::NotInitialized)
            }
        }
    }

    fn note_failure(&mut self, err: &McpClientError) {
        if err.is_fatal() {
            self.state = ClientState::Disconnected;
        }
    }

    async fn notify(&mut self, notification: &McpNotification) -> McpResult<()> {
        let line = serde_json::to_string(notification)?;
        tracing::debug!("Sending notification to MCP server: {}", line);
        let sent = self.transport.write_line(&line).await;
        if let Err(e) = &sent {
            self.note_failure(e);
        }
        sent
    }

    /// Write one request and read lines until its response arrives
    async fn exchange<P>(&mut self, request: &McpRequest<P>, timeout: Duration) -> McpResult<McpResponse>
    where
        P: Serialize + Sync,
    {
        // A previous caller was cancelled or timed out before its response arrived.
        if let Some(stale) = self.in_flight.take() {
            tracing::debug!(id = stale, "Previous request was abandoned");
            self.abandoned = Some(stale);
        }

        let line = serde_json::to_string(request)?;
        tracing::debug!("Sending to MCP server: {}", line);

        self.in_flight = Some(request.id);
        if let Err(e) = self.transport.write_line(&line).await {
            self.in_flight = None;
            self.note_failure(&e);
            return Err(e);
        }

        let result = self.await_response(request.id, timeout).await;
        if let Err(e) = &result {
            self.note_failure(e);
        }
        result
    }

    async fn await_response(&mut self, id: u64, timeout: Duration) -> McpResult<McpResponse> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(McpClientError::ReadTimeout(timeout));
            }

            let line = match self.transport.read_line(remaining).await {
                Ok(Incoming::Line(line)) => line,
                Ok(Incoming::EndOfStream) => return Err(McpClientError::EndOfStream),
                Err(McpClientError::ReadTimeout(_)) => {
                    return Err(McpClientError::ReadTimeout(timeout))
                }
                Err(e) => return Err(e),
            };

            let raw = line.trim();
            if raw.is_empty() {
                continue;
            }
            tracing::debug!("Received from MCP server: {}", raw);

            let value: Value = serde_json::from_str(raw)
                .map_err(|e| McpClientError::malformed(format!("invalid JSON: {}", e), raw))?;

            if value.get("method").is_some() {
                if value.get("id").map_or(true, Value::is_null) {
                    tracing::debug!("Skipping server notification: {}", value["method"]);
                } else {
                    tracing::warn!("Ignoring unsupported server request: {}", value["method"]);
                }
                continue;
            }

            let response: McpResponse = serde_json::from_value(value)
                .map_err(|e| McpClientError::malformed(format!("not a JSON-RPC response: {}", e), raw))?;

            if response.id != id {
                if self.abandoned.is_some_and(|stale| response.id <= stale) {
                    tracing::warn!(
                        id = response.id,
                        "Discarding late response to an abandoned request"
                    );
                    continue;
                }
                return Err(McpClientError::IdMismatch {
                    expected: id,
                    actual: response.id,
                });
            }

            self.in_flight = None;
            response
                .check_shape()
                .map_err(|reason| McpClientError::malformed(reason, raw))?;
            return Ok(response);
        }
    }

    async fn handshake(&mut self, options: &ClientOptions) -> McpResult<InitializeResult> {
        let params = InitializeParams::new(options.client_info.clone());
        let request = McpRequest::new(
            self.next_request_id(),
            McpMethod::Initialize.as_str(),
            Some(params),
        );

        let response = self.exchange(&request, options.request_timeout).await?;
        if let Some(error) = response.error {
            return Err(McpClientError::Rpc(error));
        }

        let result = response.result.unwrap_or(Value::Null);
        let info: InitializeResult = serde_json::from_value(result.clone()).map_err(|e| {
            McpClientError::malformed(format!("invalid initialize result: {}", e), result.to_string())
        })?;

        self.notify(&McpNotification::initialized()).await?;
        Ok(info)
    }
}

/// High-level MCP client
///
/// Generic over the transport so tests can script a server in memory.
///
/// # Lifecycle
///
/// 1. Create with [`McpClient::new`] (or [`McpClient::spawn`] for stdio)
/// 2. Handshake with [`McpClient::initialize`]
/// 3. List and call tools
/// 4. [`McpClient::shutdown`] to stop the server
pub struct McpClient<T>
where
    T: Transport,
{
    conn: Mutex<Connection<T>>,
    options: ClientOptions,
}

impl McpClient<StdioTransport> {
    /// Start the server and complete the handshake
    ///
    /// # Errors
    ///
    /// [`McpClientError::ProcessSpawn`] if the executable cannot start, or
    /// [`McpClientError::Handshake`] if initialization fails (the child is
    /// stopped before returning).
    pub async fn spawn(command: &ServerCommand, options: ClientOptions) -> McpResult<Self> {
        let transport = StdioTransport::start(command).await?;
        let client = Self::new(transport, options);

        if let Err(e) = client.initialize().await {
            let tail = client.stderr_tail().await;
            if !tail.is_empty() {
                tracing::error!("MCP server stderr before handshake failure:\n{}", tail.join("\n"));
            }
            if let Err(stop_err) = client.shutdown(Duration::from_secs(1)).await {
                tracing::warn!("Error while stopping MCP server after failed handshake: {}", stop_err);
            }
            return Err(e);
        }
        Ok(client)
    }

    /// OS process id of the server
    pub async fn server_pid(&self) -> Option<u32> {
        self.conn.lock().await.transport.pid()
    }
}

impl<T> McpClient<T>
where
    T: Transport,
{
    /// Create a new MCP client with the given transport
    pub fn new(transport: T, options: ClientOptions) -> Self {
        Self {
            conn: Mutex::new(Connection {
                transport,
                next_id: 0,
                state: ClientState::Created,
                in_flight: None,
                abandoned: None,
                server: None,
            }),
            options,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    async fn acquire(&self) -> McpResult<MutexGuard<'_, Connection<T>>> {
        match self.options.concurrency {
            ConcurrencyPolicy::Queue => Ok(self.conn.lock().await),
            ConcurrencyPolicy::Reject => self
                .conn
                .try_lock()
                .map_err(|_| McpClientError::ConcurrentRequest),
        }
    }

    /// Perform the `initialize` / `notifications/initialized` handshake
    ///
    /// Calling it again after success is a no-op.
    ///
    /// # Errors
    ///
    /// Any failure is wrapped in [`McpClientError::Handshake`]; a
    /// server-reported error arrives as `Handshake(Rpc(..))`. The client
    /// stays uninitialized.
    pub async fn initialize(&self) -> McpResult<()> {
        let mut conn = self.acquire().await?;
        match conn.state {
            ClientState::Ready => {
                tracing::debug!("MCP client already initialized");
                return Ok(());
            }
            ClientState::Disconnected => {
                return Err(McpClientError::Handshake(Box::new(
                    McpClientError::TransportClosed("client is disconnected".into()),
                )))
            }
            ClientState::Created | ClientState::Initializing => {}
        }

        conn.state = ClientState::Initializing;
        tracing::info!("Initializing MCP connection...");

        match conn.handshake(&self.options).await {
            Ok(info) => {
                let server = info.server_info.clone().unwrap_or_default();
                tracing::info!(
                    "MCP connection initialized: {} v{} (protocol {})",
                    server.name,
                    server.version,
                    info.protocol_version.as_deref().unwrap_or("unknown")
                );
                conn.server = Some(info);
                conn.state = ClientState::Ready;
                Ok(())
            }
            Err(e) => {
                if conn.state != ClientState::Disconnected {
                    conn.state = ClientState::Created;
                }
                tracing::error!("MCP handshake failed: {}", e);
                Err(McpClientError::Handshake(Box::new(e)))
            }
        }
    }

    /// Send a request and return its response, whatever it carries
    ///
    /// `params` is written in its own field order.
    pub async fn call<P>(&self, method: &str, params: Option<P>) -> McpResult<McpResponse>
    where
        P: Serialize + Sync,
    {
        let mut conn = self.acquire().await?;
        conn.ensure_ready()?;
        let request = McpRequest::new(conn.next_request_id(), method, params);
        conn.exchange(&request, self.options.request_timeout).await
    }

    /// Send a fire-and-forget notification
    pub async fn notify(&self, notification: &McpNotification) -> McpResult<()> {
        let mut conn = self.acquire().await?;
        conn.ensure_ready()?;
        conn.notify(notification).await
    }

    /// List available tools from the MCP server
    ///
    /// A missing `result.tools` yields an empty list.
    ///
    /// # Errors
    ///
    /// [`McpClientError::Rpc`] if the server answers with an error, plus the
    /// usual transport and protocol failures.
    pub async fn list_tools(&self) -> McpResult<Vec<Tool>> {
        tracing::debug!("Listing available tools from MCP server");
        let response = self
            .call(McpMethod::ToolsList.as_str(), Some(json!({})))
            .await?;

        let result = response.into_result().map_err(McpClientError::Rpc)?;
        let tools = match result.get("tools") {
            None | Some(Value::Null) => Vec::new(),
            Some(tools) => serde_json::from_value(tools.clone()).map_err(|e| {
                McpClientError::malformed(format!("invalid tools list: {}", e), tools.to_string())
            })?,
        };

        tracing::debug!("Listed {} tools from MCP server", tools.len());
        Ok(tools)
    }

    /// Call a tool on the MCP server
    ///
    /// Returns the raw response: a JSON-RPC `error` from the server is data
    /// for the caller to inspect, not an `Err`. Only transport and protocol
    /// failures are errors.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<McpResponse> {
        tracing::debug!("Calling tool: {} with arguments: {}", name, arguments);
        let params = ToolCallParams {
            name: name.to_string(),
            arguments,
        };
        self.call(McpMethod::ToolsCall.as_str(), Some(params)).await
    }

    /// Get the current client state
    pub async fn state(&self) -> ClientState {
        self.conn.lock().await.state
    }

    pub async fn is_initialized(&self) -> bool {
        self.state().await == ClientState::Ready
    }

    /// Whether the server process is alive and the client usable
    pub async fn is_connected(&self) -> bool {
        let mut conn = self.conn.lock().await;
        conn.state != ClientState::Disconnected && conn.transport.is_connected()
    }

    /// Server identification from the handshake
    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.conn
            .lock()
            .await
            .server
            .as_ref()
            .and_then(|info| info.server_info.clone())
    }

    /// Recent stderr lines of the server
    pub async fn stderr_tail(&self) -> Vec<String> {
        self.conn.lock().await.transport.stderr_tail()
    }

    /// Id of the most recently sent request (0 if none)
    pub async fn last_request_id(&self) -> u64 {
        self.conn.lock().await.next_id
    }

    /// Stop the server, waiting at most `grace` before killing it
    pub async fn shutdown(&self, grace: Duration) -> McpResult<()> {
        let mut conn = self.conn.lock().await;
        conn.state = ClientState::Disconnected;
        conn.transport.stop(grace).await
    }
}
