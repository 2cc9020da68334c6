//! MCP Transport Layer
//!
//! The transport owns one child process and turns its byte streams into
//! discrete newline-delimited messages. It knows nothing about JSON-RPC;
//! request ids, correlation and the handshake live in the client layer.
//!
//! # Architecture
//!
//! - [`Transport`] is the seam the client is generic over, so unit tests can
//!   script a server in memory.
//! - [`StdioTransport`] spawns the real server with three independent pipes.
//!   Stdout is read line by line, stdin receives one line per message, and
//!   stderr is drained in the background into `tracing` so the child never
//!   blocks on a full pipe.

use crate::mcp::error::{McpClientError, McpResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

/// Number of stderr lines kept for post-mortem output
const STDERR_TAIL_LINES: usize = 64;

/// One read from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A complete message, without its line terminator
    Line(String),

    /// The output pipe closed and no data was pending
    EndOfStream,
}

/// Transport trait for MCP communication
///
/// Implementations move whole lines; framing beyond the `\n` terminator is
/// the caller's business.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Write `line` followed by a single `\n` and flush
    async fn write_line(&mut self, line: &str) -> McpResult<()>;

    /// Wait up to `timeout` for the next complete line
    ///
    /// Must be cancellation safe: bytes of a partially received line are
    /// kept and completed by the next call.
    async fn read_line(&mut self, timeout: Duration) -> McpResult<Incoming>;

    /// Whether the peer is still alive and the pipes are open
    fn is_connected(&mut self) -> bool;

    /// Terminate the peer, forcing it after `grace`. Idempotent.
    async fn stop(&mut self, grace: Duration) -> McpResult<()>;

    /// Recent diagnostic output of the peer, oldest first
    fn stderr_tail(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Command line and working directory of the server under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    /// Executable to launch
    pub program: String,

    /// Arguments passed verbatim (no shell)
    pub args: Vec<String>,

    /// Working directory for the child
    pub cwd: Option<PathBuf>,
}

impl ServerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Human-readable command line (for diagnostics)
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// stdio transport for local MCP servers
///
/// Spawns the server as a child process and exchanges one JSON message per
/// line over its stdin/stdout.
///
/// # Example
///
/// ```ignore
/// let command = ServerCommand::new("node").arg("dist/index.js");
/// let mut transport = StdioTransport::start(&command).await?;
/// transport.write_line(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await?;
/// let reply = transport.read_line(Duration::from_secs(5)).await?;
/// transport.stop(Duration::from_secs(5)).await?;
/// ```
pub struct StdioTransport {
    /// Child process handle (None once stopped)
    child: Option<Child>,

    /// stdin handle for sending messages
    stdin: Option<ChildStdin>,

    /// stdout handle for receiving messages
    stdout: Option<BufReader<ChildStdout>>,

    /// Background task forwarding stderr into tracing
    stderr_task: Option<JoinHandle<()>>,

    /// Most recent stderr lines
    stderr_tail: Arc<Mutex<VecDeque<String>>>,

    /// Bytes of a line that has not been terminated yet
    pending: Vec<u8>,

    /// Server command (for diagnostics)
    command: String,

    /// Set by `stop()`
    stopped: bool,
}

impl StdioTransport {
    /// Spawn the server process and wire up its three pipes
    ///
    /// # Errors
    ///
    /// Returns [`McpClientError::ProcessSpawn`] if the executable cannot be
    /// started.
    pub async fn start(command: &ServerCommand) -> McpResult<Self> {
        let command_line = command.display();
        tracing::info!("Spawning MCP server: {}", command_line);
        tracing::debug!("Server working directory: {:?}", command.cwd);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| McpClientError::ProcessSpawn {
            command: command_line.clone(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpClientError::TransportClosed("failed to capture child stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpClientError::TransportClosed("failed to capture child stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| McpClientError::TransportClosed("failed to capture child stderr".into()))?;

        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let tail = Arc::clone(&stderr_tail);
        let server = command_line.clone();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::warn!(server = %server, "MCP server stderr: {}", line);
                if let Ok(mut tail) = tail.lock() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
        });

        tracing::debug!(pid = ?child.id(), "MCP server process started");

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            stdout: Some(BufReader::new(stdout)),
            stderr_task: Some(stderr_task),
            stderr_tail,
            pending: Vec::with_capacity(4096),
            command: command_line,
            stopped: false,
        })
    }

    /// OS process id of the server, while it runs
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Ask the child to exit: SIGTERM on unix, hard kill elsewhere
    fn terminate(child: &mut Child) {
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                // SAFETY: plain kill(2) on a pid we own; failure just means it already exited.
                unsafe {
                    libc::kill(pid as libc::pid_t, libc::SIGTERM);
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = child.start_kill();
        }
    }

    fn exit_status(&mut self) -> Option<std::process::ExitStatus> {
        self.child
            .as_mut()
            .and_then(|child| child.try_wait().ok().flatten())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::debug!("Dropping StdioTransport, killing MCP server");
            let _ = child.start_kill();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn write_line(&mut self, line: &str) -> McpResult<()> {
        if self.stopped {
            return Err(McpClientError::TransportClosed("transport stopped".into()));
        }
        if let Some(status) = self.exit_status() {
            return Err(McpClientError::TransportClosed(format!(
                "MCP server exited with {}",
                status
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| McpClientError::TransportClosed("stdin already closed".into()))?;

        // One buffer, one write: the terminator never travels separately.
        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line.as_bytes());
        frame.push(b'\n');

        let written = async {
            stdin.write_all(&frame).await?;
            stdin.flush().await
        }
        .await;

        written.map_err(|e| match e.kind() {
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => {
                McpClientError::TransportClosed(format!("MCP server stdin closed: {}", e))
            }
            _ => McpClientError::Io(e),
        })
    }

    async fn read_line(&mut self, timeout: Duration) -> McpResult<Incoming> {
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| McpClientError::TransportClosed("transport stopped".into()))?;

        // read_until keeps partial bytes in `pending` when the timeout fires.
        let read = tokio::time::timeout(timeout, stdout.read_until(b'\n', &mut self.pending)).await;

        match read {
            Err(_) => Err(McpClientError::ReadTimeout(timeout)),
            Ok(Err(e)) => Err(McpClientError::Io(e)),
            Ok(Ok(0)) if self.pending.is_empty() => Ok(Incoming::EndOfStream),
            Ok(Ok(_)) => {
                let mut bytes = std::mem::take(&mut self.pending);
                while matches!(bytes.last(), Some(b'\n' | b'\r')) {
                    bytes.pop();
                }
                String::from_utf8(bytes).map(Incoming::Line).map_err(|e| {
                    let raw = String::from_utf8_lossy(e.as_bytes()).into_owned();
                    McpClientError::malformed("line is not valid UTF-8", raw)
                })
            }
        }
    }

    fn stderr_tail(&self) -> Vec<String> {
        self.stderr_tail
            .lock()
            .map(|tail| tail.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn is_connected(&mut self) -> bool {
        !self.stopped && self.child.is_some() && self.exit_status().is_none()
    }

    async fn stop(&mut self, grace: Duration) -> McpResult<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        // Closing stdin is the first hint for servers that exit on EOF.
        self.stdin.take();

        if let Some(mut child) = self.child.take() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    tracing::info!(server = %self.command, %status, "MCP server already exited");
                }
                _ => {
                    Self::terminate(&mut child);
                    match tokio::time::timeout(grace, child.wait()).await {
                        Ok(Ok(status)) => {
                            tracing::info!(server = %self.command, %status, "MCP server exited");
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(server = %self.command, error = %e, "Error waiting for MCP server to exit");
                        }
                        Err(_) => {
                            tracing::warn!(
                                server = %self.command,
                                "MCP server did not exit within {:?}, killing it",
                                grace
                            );
                            child.kill().await?;
                        }
                    }
                }
            }
        }

        self.stdout.take();
        self.pending.clear();

        if let Some(mut task) = self.stderr_task.take() {
            // Give the drain a moment to pick up the last lines.
            if tokio::time::timeout(Duration::from_millis(200), &mut task)
                .await
                .is_err()
            {
                task.abort();
            }
        }

        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    // Scripts run through `bash <file>` so they never need the exec bit.
    fn script(content: &str) -> (TempDir, ServerCommand) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.sh");
        std::fs::write(&path, content).unwrap();
        let command = ServerCommand::new("bash").arg(path.to_string_lossy());
        (dir, command)
    }

    async fn wait_for_exit(transport: &mut StdioTransport) {
        let start = Instant::now();
        while transport.is_connected() && start.elapsed() < Duration::from_secs(5) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_echo_round_trip() {
        let (_dir, command) = script("while IFS= read -r line; do echo \"$line\"; done\n");
        let mut transport = StdioTransport::start(&command).await.unwrap();

        transport.write_line(r#"{"jsonrpc":"2.0","id":1}"#).await.unwrap();
        let reply = transport.read_line(Duration::from_secs(5)).await.unwrap();
        assert_eq!(reply, Incoming::Line(r#"{"jsonrpc":"2.0","id":1}"#.to_string()));

        transport.stop(Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_spawn_missing_executable() {
        let command = ServerCommand::new("/nonexistent/mcp-server-binary");
        let result = StdioTransport::start(&command).await;
        assert!(matches!(result, Err(McpClientError::ProcessSpawn { .. })));
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let (_dir, command) = script("exec sleep 30\n");
        let mut transport = StdioTransport::start(&command).await.unwrap();

        let result = transport.read_line(Duration::from_millis(100)).await;
        assert!(matches!(result, Err(McpClientError::ReadTimeout(_))));

        transport.stop(Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_partial_line_survives_timeout() {
        let (_dir, command) =
            script("printf '{\"a\":'\nsleep 0.5\nprintf '1}\\n'\nexec sleep 30\n");
        let mut transport = StdioTransport::start(&command).await.unwrap();

        let first = transport.read_line(Duration::from_millis(100)).await;
        assert!(matches!(first, Err(McpClientError::ReadTimeout(_))));

        let second = transport.read_line(Duration::from_secs(5)).await.unwrap();
        assert_eq!(second, Incoming::Line(r#"{"a":1}"#.to_string()));

        transport.stop(Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_end_of_stream() {
        let (_dir, command) = script("exit 0\n");
        let mut transport = StdioTransport::start(&command).await.unwrap();

        let result = transport.read_line(Duration::from_secs(5)).await.unwrap();
        assert_eq!(result, Incoming::EndOfStream);
    }

    #[tokio::test]
    async fn test_write_after_exit_is_closed() {
        let (_dir, command) = script("exit 3\n");
        let mut transport = StdioTransport::start(&command).await.unwrap();
        wait_for_exit(&mut transport).await;

        assert!(!transport.is_connected());
        let result = transport.write_line("{}").await;
        assert!(matches!(result, Err(McpClientError::TransportClosed(_))));
    }

    #[tokio::test]
    async fn test_stop_forces_kill_after_grace() {
        let (_dir, command) = script("trap '' TERM\nwhile true; do sleep 0.1; done\n");
        let mut transport = StdioTransport::start(&command).await.unwrap();
        // Let bash install the trap before we signal it.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let start = Instant::now();
        transport.stop(Duration::from_millis(300)).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!transport.is_connected());

        // Second stop is a no-op
        transport.stop(Duration::from_millis(300)).await.unwrap();
        let result = transport.write_line("{}").await;
        assert!(matches!(result, Err(McpClientError::TransportClosed(_))));
    }

    #[tokio::test]
    async fn test_stderr_is_captured() {
        let (_dir, command) = script("echo 'server booting' >&2\nexec sleep 30\n");
        let mut transport = StdioTransport::start(&command).await.unwrap();

        let start = Instant::now();
        while transport.stderr_tail().is_empty() && start.elapsed() < Duration::from_secs(5) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(transport.stderr_tail(), vec!["server booting".to_string()]);

        transport.stop(Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_working_directory() {
        let (dir, command) = script("pwd\nexec sleep 30\n");
        let workdir = dir.path().join("work");
        std::fs::create_dir(&workdir).unwrap();
        let mut transport = StdioTransport::start(&command.current_dir(&workdir))
            .await
            .unwrap();

        match transport.read_line(Duration::from_secs(5)).await.unwrap() {
            Incoming::Line(line) => assert!(line.ends_with("/work"), "got {line}"),
            Incoming::EndOfStream => panic!("expected pwd output"),
        }

        transport.stop(Duration::from_secs(2)).await.unwrap();
    }

    #[test]
    fn test_command_display() {
        let command = ServerCommand::new("node").args(["dist/index.js", "--stdio"]);
        assert_eq!(command.display(), "node dist/index.js --stdio");
        assert_eq!(ServerCommand::new("server").display(), "server");
    }

    #[test]
    fn test_transport_trait_bounds() {
        fn assert_send<T: Send>() {}
        assert_send::<StdioTransport>();
    }
}
