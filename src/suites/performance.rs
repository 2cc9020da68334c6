//! Performance Tests
//!
//! Response-time envelopes for listing and calling tools.

use super::{call_handled, mean_secs};
use crate::harness::{Fixtures, TestCase};
use crate::mcp::{McpClient, Transport};
use crate::test_case;
use anyhow::{ensure, Result};
use futures::future::try_join_all;
use serde_json::json;
use std::time::{Duration, Instant};

/// Serialized tool list must stay under this size
const MAX_TOOL_LIST_BYTES: usize = 10 * 1024;

/// Timing noise tolerated by the degradation check
const NOISE_FLOOR: Duration = Duration::from_millis(5);

pub fn tests<T: Transport>() -> Vec<TestCase<T>> {
    vec![
        test_case!(list_tools_response_time),
        test_case!(list_tools_consistency),
        test_case!(tool_list_size),
        test_case!(tool_response_size),
        test_case!(concurrent_overhead),
        test_case!(warm_start_performance),
        test_case!(scan_performance),
        test_case!(error_response_speed),
        test_case!(no_slow_leaks),
    ]
}

/// Time `n` sequential `list_tools` calls
async fn time_list_tools<T: Transport>(client: &McpClient<T>, n: usize) -> Result<Vec<Duration>> {
    let mut samples = Vec::with_capacity(n);
    for _ in 0..n {
        let start = Instant::now();
        client.list_tools().await?;
        samples.push(start.elapsed());
    }
    Ok(samples)
}

async fn list_tools_response_time<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    let elapsed = time_list_tools(client, 1).await?[0];
    ensure!(
        elapsed < Duration::from_secs(2),
        "list_tools too slow: {:.3}s",
        elapsed.as_secs_f64()
    );
    Ok(())
}

async fn list_tools_consistency<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    let samples = time_list_tools(client, 10).await?;
    let avg = mean_secs(&samples);
    let max = samples.iter().max().copied().unwrap_or_default();

    ensure!(avg < 1.0, "average time too high: {:.3}s", avg);
    ensure!(max < Duration::from_secs(2), "max time too high: {:.3}s", max.as_secs_f64());
    Ok(())
}

async fn tool_list_size<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    let count = client.list_tools().await?.len();
    ensure!(count >= 3, "expected at least 3 tools, got {}", count);
    ensure!(count < 100, "unreasonable number of tools: {}", count);
    Ok(())
}

async fn tool_response_size<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    let tools = client.list_tools().await?;
    let size = serde_json::to_vec(&tools)?.len();
    ensure!(
        size < MAX_TOOL_LIST_BYTES,
        "tool list too large: {:.1}KB",
        size as f64 / 1024.0
    );
    Ok(())
}

async fn concurrent_overhead<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    let single = time_list_tools(client, 1).await?[0];

    let start = Instant::now();
    try_join_all((0..5).map(|_| client.list_tools())).await?;
    let concurrent = start.elapsed();

    // Calls are queued on one connection, so compare against five sequential ones.
    let budget = single * 5 * 2 + Duration::from_millis(100);
    ensure!(
        concurrent < budget,
        "5 queued calls took {:.3}s, budget {:.3}s",
        concurrent.as_secs_f64(),
        budget.as_secs_f64()
    );
    Ok(())
}

async fn warm_start_performance<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    time_list_tools(client, 5).await?;

    let avg = mean_secs(&time_list_tools(client, 10).await?);
    ensure!(avg < 0.5, "warm calls too slow: {:.3}s", avg);
    Ok(())
}

async fn scan_performance<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    let start = Instant::now();
    call_handled(client, "scan_dependencies", json!({"projectPath": "/tmp"})).await?;
    let elapsed = start.elapsed();
    ensure!(elapsed < Duration::from_secs(5), "scan too slow: {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

async fn error_response_speed<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    let start = Instant::now();
    call_handled(client, "decompile_class", json!({"className": "", "projectPath": ""})).await?;
    let elapsed = start.elapsed();
    ensure!(
        elapsed < Duration::from_secs(1),
        "error response too slow: {:.3}s",
        elapsed.as_secs_f64()
    );
    Ok(())
}

async fn no_slow_leaks<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    let mut samples = Vec::with_capacity(100);
    for i in 0..100 {
        samples.extend(time_list_tools(client, 1).await?);

        if (i + 1) % 20 == 0 {
            let first = mean_secs(&samples[..20]);
            let recent = mean_secs(&samples[samples.len() - 20..]);
            ensure!(
                !degraded(first, recent),
                "performance degraded: first={:.4}s, recent={:.4}s",
                first,
                recent
            );
        }
    }
    Ok(())
}

fn degraded(first_mean: f64, recent_mean: f64) -> bool {
    recent_mean >= first_mean * 2.0 + NOISE_FLOOR.as_secs_f64()
}
