use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod handlers;
mod metrics;
mod middleware;
mod server;
mod smoke;

use config::{Args, SimConfig};
use engine::Dispatcher;
use metrics::LatencyLog;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Front of the simulated queuing network.
    pub dispatcher: Dispatcher,

    /// Producer side of the latency stream written to stdout.
    pub latency_log: LatencyLog,
}

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr; stdout carries only the latency stream.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── 1. Configuration ─────────────────────────────────────────
    let args = Args::parse();
    let config = SimConfig::from_args(&args).unwrap_or_else(|e| {
        tracing::error!("invalid configuration: {e}");
        std::process::exit(2);
    });

    // ── 2. Bind before anything starts serving ───────────────────
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("cannot bind {}: {e}", config.listen);
            std::process::exit(1);
        });
    let local_addr = listener.local_addr().unwrap_or(config.listen);

    // ── 3. Engine and latency log ────────────────────────────────
    // The pool and the log writer stay owned here; the router only holds
    // clones of their handles.
    let (dispatcher, pool) = Dispatcher::new(&config);
    let (latency_log, log_writer) = LatencyLog::spawn(std::io::stdout());
    let state = Arc::new(AppState {
        dispatcher,
        latency_log,
    });

    // ── 4. Smoke test, fatal on failure ──────────────────────────
    if let Some(grace) = config.smoke_delay {
        let verbose = config.verbose;
        tokio::spawn(async move {
            if let Err(e) = smoke::run(local_addr, grace, verbose).await {
                tracing::error!("smoke test failed, the service never became ready: {e}");
                std::process::exit(1);
            }
        });
    }

    // ── 5. Serve until Ctrl-C ────────────────────────────────────
    tracing::info!(addr = %local_addr, model = ?config.model, "listening");
    let app = server::create_router(state.clone());
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server exited with error: {e}");
    }

    // ── 6. Stop the pool and flush every pending latency line ────
    // Both waits end once the last router clone holding the state is gone.
    let dropped = state.latency_log.dropped();
    if dropped > 0 {
        tracing::warn!(dropped, "latency samples lost after the log writer failed");
    }
    drop(state);
    pool.join().await;
    match log_writer.drain().await {
        Ok(written) => tracing::info!(samples = written, "latency log drained"),
        Err(e) => tracing::error!("latency log drain failed: {e}"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
