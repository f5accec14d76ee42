use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use tmws_core::config::TmwsConfig;
use tmws_server::{bootstrap, transport, AppState};

/// Where the WebSocket/REST listener binds.
const DEFAULT_BIND: &str = "127.0.0.1:8820";

enum Mode {
    Serve,
    Stdio,
}

#[tokio::main]
async fn main() -> ExitCode {
    // ── CLI ────────────────────────────────────────────────────────
    let mode = match std::env::args().nth(1).as_deref() {
        None | Some("serve") => Mode::Serve,
        Some("stdio") => Mode::Stdio,
        Some(other) => {
            eprintln!("unknown argument {other:?}; usage: tmws-server [serve|stdio]");
            return ExitCode::from(64);
        }
    };

    // ── Config ─────────────────────────────────────────────────────
    let config = match TmwsConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(2);
        }
    };

    // ── Tracing ────────────────────────────────────────────────────
    let default_filter = config
        .log_level
        .clone()
        .map(|level| format!("tmws={level}"))
        .unwrap_or_else(|| "tmws=info,tower_http=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .json()
        .init();
    tracing::info!(version = tmws_core::constants::VERSION, "tmws starting");

    // ── State ──────────────────────────────────────────────────────
    let state = match bootstrap::build_state(config) {
        Ok(state) => state,
        Err(err) if err.is_retryable() => {
            tracing::error!(error = %err, "database unreachable after retries");
            return ExitCode::from(3);
        }
        Err(err) => {
            tracing::error!(error = %err, "startup failed");
            return ExitCode::from(2);
        }
    };

    let outcome = match mode {
        Mode::Stdio => transport::stdio::run(state).await,
        Mode::Serve => serve(state).await,
    };

    match outcome {
        Ok(()) => {
            tracing::info!("clean shutdown");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "server error");
            ExitCode::from(1)
        }
    }
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    // Safety-net sweeper behind the per-connection idle timers.
    let sweeper_sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            sweeper_sessions.sweep_idle();
        }
    });

    let app = transport::http::router(state);
    let addr: SocketAddr = DEFAULT_BIND.parse().expect("default bind address");
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
