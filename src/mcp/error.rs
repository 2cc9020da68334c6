//! Error taxonomy for the transport and protocol client.

use crate::mcp::protocol::McpError;
use std::time::Duration;

/// Result type alias for transport and client operations
pub type McpResult<T> = Result<T, McpClientError>;

/// Closed set of failures the transport and client can report
#[derive(Debug, thiserror::Error)]
pub enum McpClientError {
    /// The server executable could not be started
    #[error("failed to spawn MCP server '{command}': {source}")]
    ProcessSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The child process exited or its input stream is gone
    #[error("transport closed: {0}")]
    TransportClosed(String),

    /// The output stream closed while a response was awaited
    #[error("MCP server closed its output stream (EOF)")]
    EndOfStream,

    /// No complete line arrived before the deadline
    #[error("no response from MCP server within {0:?}")]
    ReadTimeout(Duration),

    /// A line was not valid JSON or not a valid response object
    #[error("malformed response ({reason}): {raw}")]
    MalformedResponse { reason: String, raw: String },

    /// The initialize exchange failed
    #[error("handshake failed: {0}")]
    Handshake(#[source] Box<McpClientError>),

    /// The server answered with a JSON-RPC error object
    #[error("RPC error: {0}")]
    Rpc(McpError),

    /// A tool operation was attempted before the handshake completed
    #[error("client not initialized; complete the handshake first")]
    NotInitialized,

    /// Another request is in flight and the client rejects overlap
    #[error("another request is already in flight on this connection")]
    ConcurrentRequest,

    /// A response did not correlate with the request awaiting it
    #[error("response id {actual} does not match request id {expected}")]
    IdMismatch { expected: u64, actual: u64 },

    /// Failed to encode an outgoing message
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Low-level I/O failure on one of the pipes
    #[error("I/O error on MCP server pipe: {0}")]
    Io(#[from] std::io::Error),
}

impl McpClientError {
    /// Whether the error leaves the shared connection unusable
    ///
    /// Fatal errors abort the remaining suites; everything else fails only
    /// the current test.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::ProcessSpawn { .. }
            | Self::TransportClosed(_)
            | Self::EndOfStream
            | Self::Handshake(_)
            | Self::Io(_) => true,
            Self::ReadTimeout(_)
            | Self::MalformedResponse { .. }
            | Self::Rpc(_)
            | Self::NotInitialized
            | Self::ConcurrentRequest
            | Self::IdMismatch { .. }
            | Self::Serialize(_) => false,
        }
    }

    /// Stable snake_case name of the error kind, used in test details
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProcessSpawn { .. } => "process_spawn",
            Self::TransportClosed(_) => "transport_closed",
            Self::EndOfStream => "end_of_stream",
            Self::ReadTimeout(_) => "read_timeout",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::Handshake(_) => "handshake",
            Self::Rpc(_) => "rpc",
            Self::NotInitialized => "not_initialized",
            Self::ConcurrentRequest => "concurrent_request",
            Self::IdMismatch { .. } => "id_mismatch",
            Self::Serialize(_) => "serialize",
            Self::Io(_) => "io",
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}
