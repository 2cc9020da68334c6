//! Test case definition and shared fixtures

use crate::mcp::{McpClient, Transport};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

/// Future returned by a test body
pub type TestFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + 'a>>;

/// Signature of a test body: borrow the shared client and fixtures
pub type TestFn<T> = for<'a> fn(&'a McpClient<T>, &'a Fixtures) -> TestFuture<'a>;

/// Data shared by every test of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixtures {
    /// Project directory handed to `projectPath` arguments
    pub project_root: PathBuf,
}

impl Fixtures {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// `project_root` as sent on the wire
    pub fn project_path(&self) -> String {
        self.project_root.to_string_lossy().into_owned()
    }
}

impl Default for Fixtures {
    fn default() -> Self {
        Self::new(".")
    }
}

/// A named asynchronous check against a live client
///
/// The body passes by returning `Ok(())`; an `Err` or a panic fails it.
pub struct TestCase<T: Transport> {
    pub name: &'static str,
    run: TestFn<T>,
}

impl<T: Transport> TestCase<T> {
    pub fn new(name: &'static str, run: TestFn<T>) -> Self {
        Self { name, run }
    }

    /// Start the test body
    pub fn run<'a>(&self, client: &'a McpClient<T>, fixtures: &'a Fixtures) -> TestFuture<'a> {
        (self.run)(client, fixtures)
    }
}

impl<T: Transport> Clone for TestCase<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            run: self.run,
        }
    }
}

impl<T: Transport> std::fmt::Debug for TestCase<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase").field("name", &self.name).finish()
    }
}

/// Build a [`TestCase`] from an `async fn(&McpClient<T>, &Fixtures) -> anyhow::Result<()>`
///
/// The test is named after the function.
#[macro_export]
macro_rules! test_case {
    ($body:path) => {
        $crate::harness::TestCase::new(
            {
                let path: &'static str = stringify!($body);
                let name = match path.rfind(':') {
                    Some(i) => &path[i + 1..],
                    None => path,
                };
                name.trim()
            },
            |client, fixtures| Box::pin($body(client, fixtures)),
        )
    };
}
