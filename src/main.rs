//! PLC Healer - self-healing control loop
//!
//! Polls a controller's tags, detects threshold violations, launches
//! remediation jobs on an automation platform and can inject faults on
//! purpose to exercise all of it.
//!
//! # Usage
//!
//! ```bash
//! # Run with ./healer.toml
//! cargo run --release
//!
//! # Explicit config, JSON logs, different listen address
//! ./plc-healer --config /etc/plc-healer/healer.toml --log-json --addr 127.0.0.1:9090
//!
//! # Validate a config file and exit
//! ./plc-healer --config healer.toml --check-config
//! ```
//!
//! # Environment Variables
//!
//! - `PLC_HEALER_CONFIG`: config path when `--config` is not given
//! - `PLC_HEALER_CORS_ORIGINS`: comma-separated origins allowed by the API
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use plc_healer::api::create_app;
use plc_healer::automation::build_client;
use plc_healer::config::{self, defaults, AppConfig};
use plc_healer::{ChaosEngine, ControlPlane, SimulatedDevice};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "plc-healer")]
#[command(about = "Self-healing control loop for industrial controllers")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config (default: $PLC_HEALER_CONFIG, then ./healer.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the server address from the config
    #[arg(short, long)]
    addr: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,

    /// Seed for chaos draws and simulated device jitter (reproducible runs)
    #[arg(long)]
    seed: Option<u64>,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

// ============================================================================
// Task Supervision
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    PollingMonitor,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::PollingMonitor => write!(f, "PollingMonitor"),
        }
    }
}

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    plane: ControlPlane,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, create_app(plane))
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

/// Run the supervisor loop: monitor tasks, cancel everything on failure, and
/// give the rest a bounded time to wind down after cancellation.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring");

    let outcome = loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break Ok(());
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed with error: {}", e);
                        cancel_token.cancel();
                        break Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        break Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break Ok(());
                    }
                }
            }
        }
    };

    let drain = async {
        while let Some(result) = task_set.join_next().await {
            match result {
                Ok(Ok(task_name)) => info!("Supervisor: task {} stopped", task_name),
                Ok(Err(e)) => warn!("Supervisor: task stopped with error: {}", e),
                Err(e) => warn!("Supervisor: task panicked during shutdown: {}", e),
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(defaults::SHUTDOWN_TIMEOUT_SECS), drain)
        .await
        .is_err()
    {
        warn!(
            "Supervisor: tasks still running after {}s, aborting",
            defaults::SHUTDOWN_TIMEOUT_SECS
        );
        task_set.abort_all();
    }

    outcome
}

fn log_config_summary(cfg: &AppConfig) {
    info!(
        device = %cfg.device.name,
        address = %cfg.device.address,
        poll_interval_ms = cfg.device.poll_interval_ms,
        tags = cfg.tags.len(),
        "Device"
    );
    for tag in &cfg.tags {
        info!(
            tag = %tag.key,
            device_name = %tag.device_name,
            value_type = %tag.value_type,
            nominal = %tag.nominal,
            condition = %tag.condition,
            action = %tag.remediation_action,
            "Tag"
        );
    }
    info!(
        auto_remediate = cfg.remediation.auto_remediate,
        cooldown_seconds = cfg.remediation.cooldown_seconds,
        max_retries = cfg.remediation.max_retries,
        automation = ?cfg.automation.mode,
        "Remediation"
    );
    info!(
        enabled = cfg.chaos.enabled,
        injection_rate = cfg.chaos.injection_rate,
        failure_types = ?cfg.chaos.failure_types,
        "Chaos"
    );
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    info!("PLC Healer v{}", env!("CARGO_PKG_VERSION"));

    let cfg = match config::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{}", e);
            return Err(anyhow::Error::new(e).context("Failed to load configuration"));
        }
    };
    log_config_summary(&cfg);

    if args.check_config {
        info!("Configuration is valid");
        return Ok(());
    }

    let server_addr = args.addr.clone().unwrap_or_else(|| cfg.server.addr.clone());

    let client = build_client(&cfg.automation).context("Failed to build automation client")?;
    info!(backend = client.backend_name(), "Automation client ready");

    let mut device = SimulatedDevice::new(cfg.device.name.clone(), &cfg.tags, cfg.device.jitter);
    let mut chaos = ChaosEngine::new(&cfg.chaos, cfg.tags.clone());
    if let Some(seed) = args.seed {
        device = device.with_seed(seed);
        chaos = chaos.with_seed(seed);
    }

    let (plane, monitor) = ControlPlane::build_with_chaos(cfg, device, client, chaos);

    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("Failed to bind {server_addr}"))?;
    info!("API listening on http://{}/api/v1", server_addr);

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_http_server(&mut task_set, listener, plane, cancel_token.clone());

    let monitor_cancel = cancel_token.clone();
    task_set.spawn(async move {
        info!("[PollingMonitor] Task starting");
        monitor.run(monitor_cancel).await;
        Ok(TaskName::PollingMonitor)
    });

    run_supervisor(&mut task_set, cancel_token).await?;

    info!("PLC Healer shutdown complete");
    Ok(())
}
