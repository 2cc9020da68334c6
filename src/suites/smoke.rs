//! Smoke Tests
//!
//! The most basic checks. If these fail the server is broken in a
//! fundamental way.

use super::{call_handled, call_with_result, EXPECTED_TOOLS};
use crate::harness::{Fixtures, TestCase};
use crate::mcp::{McpClient, Transport};
use crate::test_case;
use anyhow::{ensure, Result};
use serde_json::json;
use std::collections::HashSet;

pub fn tests<T: Transport>() -> Vec<TestCase<T>> {
    vec![
        test_case!(server_connects),
        test_case!(list_tools),
        test_case!(scan_dependencies_tool),
        test_case!(scan_dependencies_response_format),
        test_case!(tool_descriptions),
        test_case!(tool_input_schema),
        test_case!(invalid_project_path),
        test_case!(decompile_class_without_scan),
        test_case!(analyze_class_without_scan),
    ]
}

async fn server_connects<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    ensure!(client.is_connected().await, "server process is not running");
    ensure!(client.is_initialized().await, "client is not initialized");
    Ok(())
}

async fn list_tools<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    let tools = client.list_tools().await?;
    ensure!(!tools.is_empty(), "server advertises no tools");

    let names: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    for expected in EXPECTED_TOOLS {
        ensure!(names.contains(expected), "missing tool: {}", expected);
    }
    Ok(())
}

async fn scan_dependencies_tool<T: Transport>(client: &McpClient<T>, fixtures: &Fixtures) -> Result<()> {
    let response = call_with_result(
        client,
        "scan_dependencies",
        json!({"projectPath": fixtures.project_path()}),
    )
    .await?;

    let has_content = response
        .result
        .as_ref()
        .and_then(|r| r.get("content"))
        .map_or(true, |c| c.is_array());
    ensure!(has_content, "result.content is not a sequence");
    Ok(())
}

async fn scan_dependencies_response_format<T: Transport>(
    client: &McpClient<T>,
    fixtures: &Fixtures,
) -> Result<()> {
    let response = call_with_result(
        client,
        "scan_dependencies",
        json!({"projectPath": fixtures.project_path()}),
    )
    .await?;

    let content = response.content();
    if !content.is_empty() {
        ensure!(
            content.iter().any(|item| item.text.is_some()),
            "no content entry carries text"
        );
    }
    Ok(())
}

async fn tool_descriptions<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    for tool in client.list_tools().await? {
        ensure!(!tool.name.is_empty(), "tool without a name");
        ensure!(!tool.description.is_empty(), "tool {} has an empty description", tool.name);
    }
    Ok(())
}

async fn tool_input_schema<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    for tool in client.list_tools().await? {
        ensure!(
            tool.input_schema.is_object(),
            "tool {} has a non-object inputSchema: {}",
            tool.name,
            tool.input_schema
        );
    }
    Ok(())
}

async fn invalid_project_path<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    call_handled(
        client,
        "scan_dependencies",
        json!({"projectPath": "/nonexistent/path/that/does/not/exist"}),
    )
    .await?;
    Ok(())
}

async fn decompile_class_without_scan<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    call_handled(
        client,
        "decompile_class",
        json!({"className": "com.example.Test", "projectPath": "/tmp"}),
    )
    .await?;
    Ok(())
}

async fn analyze_class_without_scan<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    call_handled(
        client,
        "analyze_class",
        json!({"className": "com.example.Test", "projectPath": "/tmp"}),
    )
    .await?;
    Ok(())
}
