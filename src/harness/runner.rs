//! Suite Runner
//!
//! Drives ordered lists of [`TestCase`]s against one shared client.
//!
//! Every test runs under its own failure boundary: an `Err`, a panic or an
//! overrun of the per-test timeout is recorded as a failing [`TestResult`]
//! and the next test starts. Only the loss of the server process escapes a
//! suite, as [`HarnessError::ConnectionLost`].

use crate::harness::case::{Fixtures, TestCase};
use crate::harness::error::HarnessError;
use crate::harness::result::{SuiteResult, TestResult};
use crate::mcp::{ClientOptions, McpClient, McpClientError, ServerCommand, StdioTransport, Transport};
use futures::FutureExt;
use serde_json::{json, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Runner tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Upper bound for one test body
    pub test_timeout: Duration,

    /// Pause after the handshake before the first test
    pub settle: Duration,

    /// Grace period given to the server on teardown
    pub shutdown_grace: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            test_timeout: Duration::from_secs(120),
            settle: Duration::from_millis(1000),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Runs suites sequentially against one connection
pub struct SuiteRunner<T: Transport> {
    client: McpClient<T>,
    fixtures: Fixtures,
    options: RunnerOptions,
    results: Vec<SuiteResult>,
}

impl SuiteRunner<StdioTransport> {
    /// Start the server, complete the handshake and let it settle
    ///
    /// # Errors
    ///
    /// [`HarnessError::Setup`] if the process cannot start or the handshake
    /// fails. No suite can run in that case.
    pub async fn setup(
        command: &ServerCommand,
        client_options: ClientOptions,
        fixtures: Fixtures,
        options: RunnerOptions,
    ) -> Result<Self, HarnessError> {
        info!("🚀 Starting MCP server: {}", command.display());
        let client = McpClient::spawn(command, client_options)
            .await
            .map_err(HarnessError::Setup)?;
        Self::with_client(client, fixtures, options).await
    }
}

impl<T: Transport> SuiteRunner<T> {
    /// Wrap an existing client, initializing it if needed
    pub async fn with_client(
        client: McpClient<T>,
        fixtures: Fixtures,
        options: RunnerOptions,
    ) -> Result<Self, HarnessError> {
        client.initialize().await.map_err(HarnessError::Setup)?;

        if !options.settle.is_zero() {
            debug!("Waiting {:?} for the server to settle", options.settle);
            tokio::time::sleep(options.settle).await;
        }

        Ok(Self {
            client,
            fixtures,
            options,
            results: Vec::new(),
        })
    }

    pub fn client(&self) -> &McpClient<T> {
        &self.client
    }

    pub fn fixtures(&self) -> &Fixtures {
        &self.fixtures
    }

    /// Completed suites, in run order
    pub fn results(&self) -> &[SuiteResult] {
        &self.results
    }

    /// Run one test under its failure boundary
    pub async fn run_test(&self, case: &TestCase<T>) -> TestResult {
        debug!("Running test: {}", case.name);
        let start = Instant::now();

        let body = AssertUnwindSafe(case.run(&self.client, &self.fixtures)).catch_unwind();
        let outcome = tokio::time::timeout(self.options.test_timeout, body).await;
        let duration = start.elapsed();

        match outcome {
            Ok(Ok(Ok(()))) => TestResult::pass(case.name, duration),
            Ok(Ok(Err(e))) => TestResult::fail(case.name, duration, format!("{:#}", e), Some(error_details(&e))),
            Ok(Err(panic)) => TestResult::fail(
                case.name,
                duration,
                format!("test panicked: {}", panic_message(panic.as_ref())),
                Some(json!({"kind": "panic"})),
            ),
            Err(_) => TestResult::fail(
                case.name,
                duration,
                format!("test timed out after {:?}", self.options.test_timeout),
                Some(json!({
                    "kind": "test_timeout",
                    "timeout_secs": self.options.test_timeout.as_secs_f64(),
                })),
            ),
        }
    }

    /// Run `tests` in order and record the suite
    ///
    /// Each outcome is printed as soon as it is known.
    ///
    /// # Errors
    ///
    /// [`HarnessError::ConnectionLost`] when the server is gone after a test.
    /// The partial suite is still recorded in [`SuiteRunner::results`].
    pub async fn run_suite(&mut self, name: &str, tests: &[TestCase<T>]) -> Result<SuiteResult, HarnessError> {
        println!("\n{}", "=".repeat(60));
        println!("Running Suite: {}", name);
        println!("{}", "=".repeat(60));
        info!("Running suite '{}' ({} tests)", name, tests.len());

        let start = Instant::now();
        let mut results = Vec::with_capacity(tests.len());
        let mut lost = None;

        for case in tests {
            let result = self.run_test(case).await;

            let status = if result.passed { "✓" } else { "✗" };
            println!("{} {} ({:.2}s)", status, result.name, result.duration.as_secs_f64());
            if let Some(error) = &result.error {
                println!("  Error: {}", error);
            }
            results.push(result);

            if !self.client.is_connected().await {
                lost = Some(case.name);
                break;
            }
        }

        let suite = SuiteResult {
            name: name.to_string(),
            tests: results,
            total_duration: start.elapsed(),
        };
        println!("\nSuite Results: {}/{} passed", suite.passed_count(), suite.tests.len());
        println!("Duration: {:.2}s", suite.total_duration.as_secs_f64());
        self.results.push(suite.clone());

        if let Some(test) = lost {
            let stderr_tail = self.client.stderr_tail().await;
            warn!("MCP server connection lost after test '{}'", test);
            if !stderr_tail.is_empty() {
                warn!("MCP server stderr (last {} lines):\n{}", stderr_tail.len(), stderr_tail.join("\n"));
            }
            return Err(HarnessError::ConnectionLost {
                suite: name.to_string(),
                test: test.to_string(),
                stderr_tail,
            });
        }

        Ok(suite)
    }

    /// Stop the server and hand back every recorded suite
    pub async fn teardown(self) -> Vec<SuiteResult> {
        info!("🧹 Stopping MCP server");
        if let Err(e) = self.client.shutdown(self.options.shutdown_grace).await {
            warn!("Error while stopping MCP server: {}", e);
        }
        self.results
    }
}

/// `{"kind": ...}` for a failed test body
fn error_details(error: &anyhow::Error) -> Value {
    let client_error = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<McpClientError>());
    match client_error {
        Some(e) => json!({"kind": e.kind(), "fatal": e.is_fatal()}),
        None => json!({"kind": "assertion"}),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
