//! Test Harness
//!
//! Orchestrates suites of [`TestCase`]s against one live MCP client and
//! aggregates their outcomes.
//!
//! 1. [`SuiteRunner::setup`] spawns the server and completes the handshake
//! 2. [`SuiteRunner::run_suite`] runs each suite in order, isolating tests
//! 3. [`Summary`] totals the results and decides the exit status
//! 4. [`SuiteRunner::teardown`] stops the server

pub mod case;
pub mod error;
pub mod reporter;
pub mod result;
pub mod runner;

pub use case::{Fixtures, TestCase, TestFn, TestFuture};
pub use error::HarnessError;
pub use reporter::{SuiteSummary, Summary};
pub use result::{SuiteResult, TestResult};
pub use runner::{RunnerOptions, SuiteRunner};
