//! MCP Harness Library
//!
//! Conformance testing for tool servers that speak MCP (JSON-RPC 2.0) over
//! the stdio of a child process: the protocol client, the suite runner and
//! the bundled suites.

pub mod config;
pub mod harness;
pub mod mcp;
pub mod suites;
