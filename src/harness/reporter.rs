//! Final summary across suites

use crate::harness::result::SuiteResult;
use std::fmt::Write as _;
use std::time::Duration;

/// One line of the summary
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteSummary {
    pub name: String,
    pub passed: usize,
    pub total: usize,
    pub duration: Duration,
}

/// Totals over every suite of a run
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub suites: Vec<SuiteSummary>,
    pub total_passed: usize,
    pub total_failed: usize,
    pub total_duration: Duration,
}

impl Summary {
    pub fn from_suites(results: &[SuiteResult]) -> Self {
        let suites: Vec<SuiteSummary> = results
            .iter()
            .map(|suite| SuiteSummary {
                name: suite.name.clone(),
                passed: suite.passed_count(),
                total: suite.tests.len(),
                duration: suite.total_duration,
            })
            .collect();

        Self {
            total_passed: results.iter().map(SuiteResult::passed_count).sum(),
            total_failed: results.iter().map(SuiteResult::failed_count).sum(),
            total_duration: results.iter().map(|s| s.total_duration).sum(),
            suites,
        }
    }

    /// Whether every test of every suite passed
    pub fn passed(&self) -> bool {
        self.total_failed == 0
    }

    /// Process exit status: 0 on success, 1 if any test failed
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(60);
        let _ = writeln!(out, "\n{}\nTEST SUMMARY\n{}", rule, rule);

        for suite in &self.suites {
            let status = if suite.passed == suite.total { "✓" } else { "✗" };
            let _ = writeln!(
                out,
                "{} {}: {}/{} passed ({:.2}s)",
                status,
                suite.name,
                suite.passed,
                suite.total,
                suite.duration.as_secs_f64()
            );
        }

        let _ = writeln!(
            out,
            "\nTotal: {}/{} tests passed",
            self.total_passed,
            self.total_passed + self.total_failed
        );
        let _ = writeln!(out, "Total Duration: {:.2}s", self.total_duration.as_secs_f64());

        if self.total_failed > 0 {
            let _ = writeln!(out, "\n{} tests FAILED!", self.total_failed);
        }
        out
    }

    /// Write the summary to stdout
    pub fn print(&self) {
        print!("{}", self.render());
    }
}
