//! Factory Sentinel - industrial telemetry monitoring service
//!
//! Consumes the sensor feed, classifies every reading, keeps the recent
//! history window, escalates persistent critical conditions to an on-call
//! phone and serves the current state over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Built-in synthetic feed (default)
//! factory-sentinel --simulate --interval-ms 1000
//!
//! # Feed JSON payloads from stdin
//! sensor-simulator --count 500 | factory-sentinel --stdin
//!
//! # Replay a captured feed (JSON lines)
//! factory-sentinel --replay capture.jsonl --interval-ms 0
//! ```
//!
//! # Environment Variables
//!
//! - `SENTINEL_CONFIG`: Path to TOML configuration (default: ./sentinel.toml)
//! - `TWILIO_ACCOUNT_SID` / `TWILIO_AUTH_TOKEN`: transport credentials
//! - `SENTINEL_CORS_ORIGINS`: comma-separated origins allowed by the API
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use factory_sentinel::api::{create_app, ApiState};
use factory_sentinel::config::{self, defaults, SentinelConfig};
use factory_sentinel::dispatch::build_dispatcher;
use factory_sentinel::pipeline::processing_loop::ProcessingLoop;
use factory_sentinel::pipeline::source::{FeedSource, ReplaySource, SimulatedSource, StdinSource};
use factory_sentinel::pipeline::PipelineCoordinator;
use factory_sentinel::processing::RandomJitter;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "factory-sentinel")]
#[command(about = "Factory Sentinel telemetry anomaly monitoring and emergency escalation")]
#[command(version)]
struct CliArgs {
    /// Read feed payloads from stdin (one JSON document per line)
    /// Use with simulator: sensor-simulator | factory-sentinel --stdin
    #[arg(long, conflicts_with_all = ["replay", "simulate"])]
    stdin: bool,

    /// Replay a captured feed file (one JSON document per line)
    #[arg(long, value_name = "PATH", conflicts_with = "simulate")]
    replay: Option<PathBuf>,

    /// Use the built-in synthetic feed (default when no input is given)
    #[arg(long)]
    simulate: bool,

    /// Delay between replayed or simulated pushes (0 = no delay)
    #[arg(long, default_value_t = defaults::DEFAULT_REPLAY_INTERVAL_MS)]
    interval_ms: u64,

    /// Stop the synthetic feed after this many pushes
    #[arg(long)]
    limit: Option<u64>,

    /// Seed for the synthetic feed and prediction jitter
    #[arg(long)]
    seed: Option<u64>,

    /// Override the server address (default: from config, "0.0.0.0:8080")
    #[arg(short, long)]
    addr: Option<String>,

    /// Configuration file (overrides SENTINEL_CONFIG and ./sentinel.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Do not start the HTTP server
    #[arg(long)]
    no_server: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

// ============================================================================
// Supervised Tasks
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    FeedProcessor,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::FeedProcessor => write!(f, "FeedProcessor"),
        }
    }
}

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Let the server finish its graceful shutdown
    while task_set.join_next().await.is_some() {}
    Ok(())
}

// ============================================================================
// Pipeline Runner
// ============================================================================

/// Run the monitoring pipeline with any feed source.
async fn run_pipeline<S: FeedSource>(
    mut source: S,
    config: &SentinelConfig,
    server_addr: Option<String>,
    seed: Option<u64>,
    cancel_token: CancellationToken,
) -> Result<()> {
    let dispatcher = build_dispatcher(&config.notify).context("building alert dispatcher")?;

    let mut coordinator = PipelineCoordinator::new(config, dispatcher);
    if let Some(seed) = seed {
        coordinator = coordinator.with_jitter(Box::new(RandomJitter::seeded(seed)));
    }
    let escalation = coordinator.escalation_handle();

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    // Task 1: HTTP Server
    if let Some(addr) = server_addr {
        let state = ApiState {
            publisher: coordinator.publisher(),
            escalation: escalation.clone(),
            classifier: coordinator.classifier(),
            escalation_config: config.escalation,
            feed_offset: coordinator.feed_offset(),
            started: std::time::Instant::now(),
        };
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding HTTP server to {addr}"))?;
        info!("HTTP API listening on http://{}/api/v1", addr);
        spawn_http_server(&mut task_set, listener, create_app(state), cancel_token.clone());
    }

    // Task 2: Feed Processor
    let proc_cancel = cancel_token.clone();
    task_set.spawn(async move {
        info!("[FeedProcessor] Task starting");
        ProcessingLoop::new(coordinator, proc_cancel).run(&mut source).await;
        Ok(TaskName::FeedProcessor)
    });

    let result = run_supervisor(&mut task_set, cancel_token).await;

    // Manual and automatic deliveries alike; never drop one on exit
    let drain_timeout = std::time::Duration::from_secs(config.notify.timeout_secs.saturating_add(1));
    if !escalation.drain(drain_timeout).await {
        warn!("Exiting with emergency dispatch still in flight");
    }
    result
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.json_logs);

    let sentinel_config = match &args.config {
        Some(path) => SentinelConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SentinelConfig::load(),
    };
    sentinel_config.validate().context("invalid configuration")?;
    config::init(sentinel_config);
    let config = config::get();

    info!("Factory Sentinel - telemetry anomaly monitoring");
    info!(
        cooldown_secs = config.escalation.cooldown_secs,
        indicator_gate = config.escalation.indicator_gate,
        dispatcher = ?config.notify.dispatcher,
        "Escalation configured"
    );

    let server_addr = (config.server.enabled && !args.no_server)
        .then(|| args.addr.clone().unwrap_or_else(|| config.server.addr.clone()));

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    if args.stdin {
        info!("Input: stdin (JSON feed payloads)");
        run_pipeline(StdinSource::new(), config, server_addr, args.seed, cancel_token).await?;
    } else if let Some(path) = &args.replay {
        info!("Input: replay {} ({}ms between pushes)", path.display(), args.interval_ms);
        let source = ReplaySource::from_file(path, args.interval_ms).await?;
        run_pipeline(source, config, server_addr, args.seed, cancel_token).await?;
    } else {
        if !args.simulate {
            info!("No input selected, falling back to the synthetic feed");
        }
        info!("Input: synthetic feed ({}ms between pushes)", args.interval_ms);
        let source = SimulatedSource::new(args.seed, args.interval_ms, args.limit);
        run_pipeline(source, config, server_addr, args.seed, cancel_token).await?;
    }

    info!("Factory Sentinel shutdown complete");
    Ok(())
}
