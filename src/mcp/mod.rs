//! MCP (Model Context Protocol) Client Implementation
//!
//! A stdio JSON-RPC client for driving a tool server under test.
//!
//! # Architecture
//!
//! 1. **Protocol Layer** (`protocol`): JSON-RPC 2.0 message types
//! 2. **Transport Layer** (`transport`): child process and line framing
//! 3. **Client Layer** (`client`): handshake, ids, correlation
//!
//! Failures of every layer share one closed enumeration in `error`.

// Protocol layer: JSON-RPC 2.0 message types
pub mod protocol;

// Error taxonomy shared by transport and client
pub mod error;

// Transport layer: child process over stdio
pub mod transport;

// Client layer: High-level MCP client API
pub mod client;

pub use client::{ClientOptions, ClientState, ConcurrencyPolicy, McpClient};
pub use error::{McpClientError, McpResult};
pub use protocol::{
    ClientInfo, McpError, McpMethod, McpNotification, McpRequest, McpResponse, ServerInfo, Tool,
    ToolCallParams, ToolContent, PROTOCOL_VERSION,
};
pub use transport::{Incoming, ServerCommand, StdioTransport, Transport};

#[cfg(test)]
pub(crate) mod mock;

// Property-based tests module
#[cfg(test)]
mod proptests;
