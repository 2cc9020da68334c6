//! Per-test and per-suite outcomes

use serde_json::Value;
use std::time::Duration;

/// Outcome of one test case execution
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    /// Test name as registered in its suite
    pub name: String,

    /// Whether the test body returned `Ok(())`
    pub passed: bool,

    /// Wall-clock time spent in the test body
    pub duration: Duration,

    /// Failure message (None when passed)
    pub error: Option<String>,

    /// Structured failure details, e.g. `{"kind": "read_timeout"}`
    pub details: Option<Value>,
}

impl TestResult {
    pub fn pass(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            passed: true,
            duration,
            error: None,
            details: None,
        }
    }

    pub fn fail(
        name: impl Into<String>,
        duration: Duration,
        error: impl Into<String>,
        details: Option<Value>,
    ) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = "test failed without a message".to_string();
        }
        Self {
            name: name.into(),
            passed: false,
            duration,
            error: Some(error),
            details,
        }
    }
}

/// Ordered results of one suite
///
/// Counts are derived from `tests` on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteResult {
    pub name: String,
    pub tests: Vec<TestResult>,
    pub total_duration: Duration,
}

impl SuiteResult {
    pub fn passed_count(&self) -> usize {
        self.tests.iter().filter(|t| t.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.tests.len() - self.passed_count()
    }

    /// True when no test failed
    pub fn passed(&self) -> bool {
        self.failed_count() == 0
    }
}
