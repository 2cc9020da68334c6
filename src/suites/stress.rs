//! Stress Tests
//!
//! Heavy and concurrent usage patterns. Concurrent calls share the one
//! client and are queued through it, so these measure how the server copes
//! with back-to-back traffic rather than true parallelism.

use super::call_handled;
use crate::harness::{Fixtures, TestCase};
use crate::mcp::{McpClient, Transport};
use crate::test_case;
use anyhow::{ensure, Context, Result};
use futures::future::{join_all, try_join_all};
use serde_json::json;
use std::time::{Duration, Instant};

pub fn tests<T: Transport>() -> Vec<TestCase<T>> {
    vec![
        test_case!(concurrent_tool_calls),
        test_case!(rapid_sequential_calls),
        test_case!(concurrent_different_tools),
        test_case!(memory_stability),
        test_case!(long_running_session),
        test_case!(burst_traffic),
        test_case!(error_recovery),
    ]
}

async fn concurrent_tool_calls<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    client.list_tools().await?;

    let results = join_all((0..10).map(|_| client.list_tools())).await;
    for (i, result) in results.into_iter().enumerate() {
        result.with_context(|| format!("concurrent call {} failed", i))?;
    }
    Ok(())
}

async fn rapid_sequential_calls<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    let start = Instant::now();
    for _ in 0..20 {
        client.list_tools().await?;
    }
    let elapsed = start.elapsed();
    ensure!(elapsed < Duration::from_secs(10), "too slow: {:.2}s for 20 calls", elapsed.as_secs_f64());
    Ok(())
}

async fn concurrent_different_tools<T: Transport>(client: &McpClient<T>, fixtures: &Fixtures) -> Result<()> {
    let project = fixtures.project_path();
    let (tools, _scan, _analyze) = tokio::join!(
        client.list_tools(),
        client.call_tool("scan_dependencies", json!({"projectPath": project})),
        client.call_tool("analyze_class", json!({"className": "test.Test", "projectPath": project})),
    );

    // Only list_tools is required to succeed.
    tools.context("list_tools failed alongside other calls")?;
    Ok(())
}

async fn memory_stability<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    for _ in 0..50 {
        client.list_tools().await?;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

async fn long_running_session<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        client.list_tools().await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let tools = client.list_tools().await?;
    ensure!(!tools.is_empty(), "server stopped advertising tools");
    Ok(())
}

async fn burst_traffic<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    for burst in 0..3 {
        try_join_all((0..15).map(|_| client.list_tools()))
            .await
            .with_context(|| format!("burst {} failed", burst))?;
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Ok(())
}

async fn error_recovery<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    for _ in 0..5 {
        // Failures are expected here; the server just has to survive them.
        let _ = call_handled(
            client,
            "decompile_class",
            json!({"className": "", "projectPath": "/nonexistent"}),
        )
        .await;
    }

    let tools = client.list_tools().await?;
    ensure!(!tools.is_empty(), "server did not recover after invalid calls");
    Ok(())
}
