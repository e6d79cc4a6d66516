//! AgentLink CLI: NDJSON over stdio between an agent backend and a remote client.
//!
//! Each stdin line is one inbound message; each stdout line is one outbound
//! signal. Logs go to stderr so stdout stays a clean protocol channel.

use agentlink_config::{AgentLinkConfig, CliOverrides};
use agentlink_core::{CoordinatorConfig, Gateway, LineSink, ReplayBackend, SessionCoordinator, SessionRegistry};
use agentlink_permissions::ApprovalGate;
use agentlink_types::PermissionMode;
use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "agentlink", version, about = "Bridge an agent backend to a remote approval client")]
struct Cli {
    /// Replay a JSONL transcript of backend events instead of a live agent
    #[arg(long, value_name = "FILE")]
    replay: PathBuf,

    /// Milliseconds the peer has to answer an approval request
    #[arg(long, value_name = "MS")]
    approval_timeout_ms: Option<u64>,

    /// Default permission mode (default, acceptEdits, bypassPermissions, plan)
    #[arg(long)]
    permission_mode: Option<PermissionMode>,

    /// Default model handed to the backend
    #[arg(long)]
    model: Option<String>,

    /// Default working directory for sessions
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Allow every tool call without asking, unless a dispatch says otherwise
    #[arg(long)]
    skip_permissions: bool,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let mut config = AgentLinkConfig::load(CliOverrides {
        approval_timeout_ms: cli.approval_timeout_ms,
        permission_mode: cli.permission_mode,
        model: cli.model,
        cwd: cli.cwd,
    })
    .context("Failed to load configuration")?;
    if cli.skip_permissions {
        config.default_tools.skip_permissions = true;
    }

    let backend = ReplayBackend::load(&cli.replay)
        .await
        .with_context(|| format!("Failed to load transcript {}", cli.replay.display()))?;
    tracing::info!(events = backend.len(), path = %cli.replay.display(), "transcript loaded");

    let coordinator = Arc::new(SessionCoordinator::new(
        Arc::new(backend),
        Arc::new(SessionRegistry::new()),
        Arc::new(ApprovalGate::new()),
        coordinator_config(&config),
    ));

    let (tx, rx) = mpsc::unbounded_channel();
    let stop_writer = CancellationToken::new();
    let writer = tokio::spawn(write_lines(rx, stop_writer.clone()));
    let gateway = Gateway::new(coordinator, Arc::new(LineSink::new(tx)));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let interrupted = loop {
        tokio::select! {
            _ = &mut ctrl_c => break true,
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(line) => gateway.handle_line(&line),
                None => break false,
            },
        }
    };

    // On EOF let running dispatches finish; Ctrl-C during that wait aborts them.
    let interrupted = interrupted
        || tokio::select! {
            _ = gateway.drain() => false,
            _ = &mut ctrl_c => true,
        };
    if interrupted {
        tracing::info!("interrupted, aborting sessions");
        gateway.shutdown().await;
    }

    stop_writer.cancel();
    writer
        .await
        .context("Output writer panicked")?
        .context("Failed to write to stdout")?;
    Ok(())
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn coordinator_config(config: &AgentLinkConfig) -> CoordinatorConfig {
    CoordinatorConfig {
        approval_timeout: config.approval_timeout(),
        permission_mode: config.permission_mode,
        default_cwd: config.default_cwd.clone(),
        model: config.model.clone(),
        default_tools: config.default_tools.clone(),
    }
}

/// Write queued signal lines to stdout until `stop` fires and the queue is empty.
async fn write_lines(
    mut rx: mpsc::UnboundedReceiver<String>,
    stop: CancellationToken,
) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    loop {
        let line = tokio::select! {
            biased;
            line = rx.recv() => match line {
                Some(line) => line,
                None => break,
            },
            _ = stop.cancelled() => match rx.try_recv() {
                Ok(line) => line,
                Err(_) => break,
            },
        };
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}
