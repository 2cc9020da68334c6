//! Bundled Test Suites
//!
//! Five suites exercise a decompiler server exposing `scan_dependencies`,
//! `decompile_class` and `analyze_class`. Suites are looked up by their
//! kebab-case key and run in the order requested.

pub mod battle_prep;
pub mod edge_cases;
pub mod performance;
pub mod smoke;
pub mod stress;

use crate::harness::TestCase;
use crate::mcp::{McpClient, McpResponse, Transport};
use anyhow::{Context, Result};
use serde_json::Value;

/// Keys of every bundled suite, in default run order
pub const SUITE_NAMES: [&str; 5] = ["smoke", "stress", "edge-cases", "battle-prep", "performance"];

/// Tools every bundled suite expects the server to expose
pub const EXPECTED_TOOLS: [&str; 3] = ["scan_dependencies", "decompile_class", "analyze_class"];

/// A named, ordered list of test cases
pub struct Suite<T: Transport> {
    /// Lookup key (`smoke`, `edge-cases`, ...)
    pub key: &'static str,

    /// Heading printed when the suite runs
    pub title: &'static str,

    pub tests: Vec<TestCase<T>>,
}

impl<T: Transport> Suite<T> {
    pub fn test_names(&self) -> Vec<&'static str> {
        self.tests.iter().map(|t| t.name).collect()
    }
}

/// Look up a bundled suite by key
pub fn by_name<T: Transport>(name: &str) -> Option<Suite<T>> {
    let (title, tests) = match name {
        "smoke" => ("Smoke Tests", smoke::tests()),
        "stress" => ("Stress Tests", stress::tests()),
        "edge-cases" => ("Edge Cases", edge_cases::tests()),
        "battle-prep" => ("Battle Prep", battle_prep::tests()),
        "performance" => ("Performance", performance::tests()),
        _ => return None,
    };
    let key = *SUITE_NAMES.iter().find(|k| **k == name)?;
    Some(Suite { key, title, tests })
}

/// Every bundled suite, in default order
pub fn all<T: Transport>() -> Vec<Suite<T>> {
    SUITE_NAMES.iter().filter_map(|name| by_name(name)).collect()
}

/// Call a tool and require a response (result or error), not a failure
pub(crate) async fn call_handled<T: Transport>(
    client: &McpClient<T>,
    tool: &str,
    arguments: Value,
) -> Result<McpResponse> {
    let response = client
        .call_tool(tool, arguments)
        .await
        .with_context(|| format!("{} was not handled", tool))?;
    anyhow::ensure!(
        response.result.is_some() || response.error.is_some(),
        "{} returned neither result nor error",
        tool
    );
    Ok(response)
}

/// Call a tool and require a `result`
pub(crate) async fn call_with_result<T: Transport>(
    client: &McpClient<T>,
    tool: &str,
    arguments: Value,
) -> Result<McpResponse> {
    let response = call_handled(client, tool, arguments).await?;
    if let Some(error) = &response.error {
        anyhow::bail!("{} returned an error instead of a result: {}", tool, error);
    }
    Ok(response)
}

/// Mean of a set of durations, in seconds
pub(crate) fn mean_secs(samples: &[std::time::Duration]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|d| d.as_secs_f64()).sum::<f64>() / samples.len() as f64
}
