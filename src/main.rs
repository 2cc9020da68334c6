// MCP Harness - Main Entry Point
//
// Conformance-test runner for stdio MCP tool servers:
// - run: execute the bundled suites against a server
// - quick: start, handshake and list tools
// - list-suites: show what would run
//
// Logs go to stderr; the suite report goes to stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mcp_harness::config::Config;
use mcp_harness::harness::{HarnessError, Summary, SuiteRunner};
use mcp_harness::mcp::{ClientOptions, McpClient, StdioTransport};
use mcp_harness::suites::{self, SUITE_NAMES};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// Request timeout used by the quick probe
const QUICK_TIMEOUT: Duration = Duration::from_secs(5);

/// MCP Harness: conformance tests for stdio MCP servers
#[derive(Parser, Debug)]
#[command(name = "mcp-harness")]
#[command(version)]
#[command(about = "Conformance-test harness for stdio MCP tool servers", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run test suites against a server
    Run {
        /// Executable that starts the MCP server
        #[arg(long)]
        command: Option<String>,

        /// Argument for the server (repeatable)
        #[arg(long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,

        /// Working directory of the server
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Project directory handed to the tests
        #[arg(long)]
        project_root: Option<PathBuf>,

        /// Suite to run (repeatable, in order)
        #[arg(long = "suite")]
        suites: Vec<String>,

        /// Run only the smoke suite
        #[arg(long, conflicts_with = "suites")]
        smoke_only: bool,

        /// Pause after the handshake, in milliseconds
        #[arg(long)]
        settle_ms: Option<u64>,

        /// Deadline for each response, in seconds
        #[arg(long)]
        request_timeout_secs: Option<u64>,

        /// Deadline for each test, in seconds
        #[arg(long)]
        test_timeout_secs: Option<u64>,
    },
    /// Start the server, handshake and list its tools
    Quick {
        /// Executable that starts the MCP server
        #[arg(long)]
        command: Option<String>,

        /// Argument for the server (repeatable)
        #[arg(long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,

        /// Working directory of the server
        #[arg(long)]
        cwd: Option<PathBuf>,
    },
    /// List the bundled suites and their tests
    ListSuites,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config, args.verbose);

    let outcome = match args.command {
        Commands::Run {
            command,
            args,
            cwd,
            project_root,
            suites,
            smoke_only,
            settle_ms,
            request_timeout_secs,
            test_timeout_secs,
        } => {
            let mut config = config;
            apply_server_flags(&mut config, command, args, cwd);
            if project_root.is_some() {
                config.server.project_root = project_root;
            }
            if smoke_only {
                config.run.suites = vec!["smoke".to_string()];
            } else if !suites.is_empty() {
                config.run.suites = suites;
            }
            if let Some(ms) = settle_ms {
                config.timeouts.settle_ms = ms;
            }
            if let Some(secs) = request_timeout_secs {
                config.timeouts.request_secs = secs;
            }
            if let Some(secs) = test_timeout_secs {
                config.timeouts.test_secs = secs;
            }
            run_suites(config).await
        }
        Commands::Quick { command, args, cwd } => {
            let mut config = config;
            apply_server_flags(&mut config, command, args, cwd);
            quick(config).await
        }
        Commands::ListSuites => {
            list_suites();
            Ok(true)
        }
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing to stderr
///
/// `RUST_LOG` wins over the configured level; `--verbose` raises the
/// default to DEBUG.
fn init_tracing(config: &Config, verbose: bool) {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.log_level().unwrap_or(Level::INFO)
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };
    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

/// CLI flags win over file and environment
fn apply_server_flags(config: &mut Config, command: Option<String>, args: Vec<String>, cwd: Option<PathBuf>) {
    if let Some(command) = command {
        config.server.command = command;
        config.server.args = args;
    } else if !args.is_empty() {
        config.server.args = args;
    }
    if cwd.is_some() {
        config.server.cwd = cwd;
    }
}

/// Run the configured suites; `Ok(false)` when any test failed
async fn run_suites(config: Config) -> Result<bool> {
    config.validate().context("Invalid configuration")?;

    let command = config.server_command();
    info!("🧪 MCP harness v{} testing: {}", env!("CARGO_PKG_VERSION"), command.display());

    let mut runner = match SuiteRunner::setup(
        &command,
        config.client_options(),
        config.fixtures(),
        config.runner_options(),
    )
    .await
    {
        Ok(runner) => runner,
        Err(e) => {
            println!("✗ Setup failed: {:#}", anyhow::Error::from(e));
            return Ok(false);
        }
    };

    let mut aborted = None;
    for key in &config.run.suites {
        let Some(suite) = suites::by_name::<StdioTransport>(key) else {
            // validate() already rejected unknown names
            continue;
        };
        if let Err(e) = runner.run_suite(suite.title, &suite.tests).await {
            aborted = Some(e);
            break;
        }
    }

    let results = runner.teardown().await;
    let summary = Summary::from_suites(&results);
    summary.print();

    if let Some(HarnessError::ConnectionLost { stderr_tail, .. }) = &aborted {
        if !stderr_tail.is_empty() {
            println!("\nServer stderr (last {} lines):", stderr_tail.len());
            for line in stderr_tail {
                println!("  {}", line);
            }
        }
    }
    if let Some(e) = aborted {
        println!("\n✗ Run aborted: {}", e);
        return Ok(false);
    }

    Ok(summary.passed())
}

/// Start, handshake, list tools, stop
async fn quick(config: Config) -> Result<bool> {
    anyhow::ensure!(
        !config.server.command.trim().is_empty(),
        "No server command configured (use --command or [server] command)"
    );

    let command = config.server_command();
    let options = ClientOptions {
        request_timeout: QUICK_TIMEOUT,
        ..config.client_options()
    };

    println!("Starting MCP server: {}", command.display());
    let client = match McpClient::spawn(&command, options).await {
        Ok(client) => client,
        Err(e) => {
            println!("[FAIL] {}", e);
            return Ok(false);
        }
    };

    let server = client.server_info().await.unwrap_or_default();
    println!("[PASS] Server initialized successfully");
    println!("  Server info: {} {}", server.name, server.version);

    let passed = match client.list_tools().await {
        Ok(tools) => {
            println!("[PASS] Listed {} tools", tools.len());
            for tool in &tools {
                println!("  - {}", tool.name);
            }
            true
        }
        Err(e) => {
            println!("[FAIL] Could not list tools: {}", e);
            false
        }
    };

    if let Err(e) = client.shutdown(Duration::from_secs(3)).await {
        tracing::warn!("Error while stopping MCP server: {}", e);
    }
    Ok(passed)
}

fn list_suites() {
    for key in SUITE_NAMES {
        if let Some(suite) = suites::by_name::<StdioTransport>(key) {
            println!("{} ({}, {} tests)", suite.key, suite.title, suite.tests.len());
            for name in suite.test_names() {
                println!("  {}", name);
            }
        }
    }
}
