#![forbid(unsafe_code)]

//! `helpdesk-workflow` server binary.
//!
//! Bootstraps configuration, opens the database, starts the email delivery
//! pool, and serves the HTTP API until a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use helpdesk_workflow::app::AppState;
use helpdesk_workflow::config::GlobalConfig;
use helpdesk_workflow::http;
use helpdesk_workflow::notify::{DeliveryPool, SmtpMailer};
use helpdesk_workflow::persistence::db;
use helpdesk_workflow::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "helpdesk-workflow", about = "Helpdesk ticket workflow service", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the database path from the configuration file.
    #[arg(long)]
    database: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("helpdesk-workflow bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(path) = args.database {
        config.database_path = path;
    }
    config.load_credentials().await?;
    info!(database = %config.database_path.display(), "configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(db::connect(&config.database_path).await?);
    info!("database connected");

    // ── Start email delivery ────────────────────────────
    let ct = CancellationToken::new();
    let mailer = Arc::new(SmtpMailer::from_config(&config.smtp)?);
    let (delivery, delivery_runtime) = DeliveryPool::start(mailer, &config.delivery, ct.clone());

    // ── Build shared application state ──────────────────
    let state = Arc::new(AppState::build(db, delivery).await?);

    // ── Start HTTP API ──────────────────────────────────
    let http_ct = ct.clone();
    let http_state = Arc::clone(&state);
    let port = config.http_port;
    let http_handle = tokio::spawn(async move {
        if let Err(err) = http::bind_and_serve(port, http_state, http_ct).await {
            error!(%err, "http server failed");
        }
    });

    info!(port, "helpdesk-workflow ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    // ── Wait for background tasks ───────────────────────
    if let Err(err) = http_handle.await {
        error!(%err, "http task panicked");
    }
    let delivery = state.delivery.clone();
    drop(state);
    delivery_runtime.join().await;

    let stats = delivery.stats();
    info!(
        delivered = stats.delivered,
        fallback_delivered = stats.fallback_delivered,
        failed = stats.failed,
        abandoned = stats.abandoned,
        "helpdesk-workflow shut down"
    );
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
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

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
