#![forbid(unsafe_code)]

//! `mc-herd` — session orchestrator binary.
//!
//! Loads configuration, accounts and proxies, then runs the action
//! scheduler, the IPC server for `mc-herd-ctl` and the interactive console
//! until `exit` or a shutdown signal.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use mc_herd::client::connector_for;
use mc_herd::config::GlobalConfig;
use mc_herd::console::{execute, render, run_console, ControlCommand};
use mc_herd::ipc::spawn_ipc_server;
use mc_herd::orchestrator::proxy_allocator::ProxyAllocator;
use mc_herd::orchestrator::Orchestrator;
use mc_herd::persistence::proxies::{load_proxies, ProxyWatcher};
use mc_herd::persistence::{AccountStore, FileJournal};
use mc_herd::{AppError, Result};

/// Time allowed for session tasks and hold windows to finish on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "mc-herd", about = "Multi-session game client orchestrator", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Start sessions against this server on launch.
    #[arg(long)]
    server: Option<String>,

    /// Number of sessions to start on launch (with --server; all accounts when omitted).
    #[arg(long)]
    count: Option<usize>,

    /// Do not read commands from stdin; control via `mc-herd-ctl` only.
    #[arg(long)]
    no_console: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("mc-herd bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    let config = Arc::new(config);
    info!(driver = ?config.driver, "configuration loaded");

    // ── Load accounts and proxies ───────────────────────
    let accounts = AccountStore::load(config.accounts_path.clone())?;
    let allocator = Arc::new(ProxyAllocator::new(load_proxies(&config.proxies_path)?));
    let journal = Arc::new(FileJournal::new(
        config.logs_dir.clone(),
        config.chatlog_path.clone(),
    )?);

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&config),
        accounts,
        Arc::clone(&allocator),
        connector_for(&config),
        journal,
    ));

    // ── Background services ─────────────────────────────
    let ct = CancellationToken::new();
    let scheduler_handle = orchestrator.spawn_scheduler(ct.clone());

    let _proxy_watcher = if config.proxies.watch {
        match ProxyWatcher::spawn(config.proxies_path.clone(), Arc::clone(&allocator)) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                warn!(%err, "proxy hot-reload disabled");
                None
            }
        }
    } else {
        None
    };

    let ipc_handle = if config.ipc_enabled {
        match spawn_ipc_server(&config.ipc_name, Arc::clone(&orchestrator), ct.clone()) {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!(%err, "ipc server unavailable");
                None
            }
        }
    } else {
        None
    };

    // ── Optional launch-time start ──────────────────────
    if args.server.is_some() || args.count.is_some() {
        let command = ControlCommand::Start {
            address: args.server.clone(),
            count: args.count,
        };
        match execute(&orchestrator, command).await {
            Ok(output) => render(&output).iter().for_each(|line| info!("{line}")),
            Err(err) => error!(%err, "launch-time start failed"),
        }
    }

    let console_handle = if args.no_console {
        None
    } else {
        Some(tokio::spawn(run_console(
            Arc::clone(&orchestrator),
            ct.clone(),
        )))
    };

    info!("mc-herd ready");

    // ── Wait for exit or shutdown signal ────────────────
    tokio::select! {
        () = shutdown_signal() => info!("shutdown signal received"),
        () = ct.cancelled() => info!("exit requested"),
    }
    ct.cancel();

    orchestrator.shutdown(SHUTDOWN_GRACE).await;

    // ── Wait for background tasks ───────────────────────
    let _ = scheduler_handle.await;
    if let Some(handle) = ipc_handle {
        let _ = handle.await;
    }
    if let Some(handle) = console_handle {
        // Blocked stdin reads are abandoned rather than awaited.
        handle.abort();
    }
    info!("mc-herd shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Console output owns stdout.
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
