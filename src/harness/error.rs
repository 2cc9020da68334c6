//! Failures that stop a run rather than a single test

use crate::mcp::McpClientError;

/// Run-level failure
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The server could not be started or the handshake failed
    #[error("setup failed: {0}")]
    Setup(#[source] McpClientError),

    /// The server died while a suite was running
    #[error("connection to MCP server lost during suite '{suite}' (last test: {test})")]
    ConnectionLost {
        suite: String,
        test: String,
        /// Last stderr lines of the server, when available
        stderr_tail: Vec<String>,
    },
}
