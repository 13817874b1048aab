//! Tally entrypoint: HTTP verification server or JSONL batch scorer.
//!
//! ```text
//! tally [serve]        run the HTTP gateway (default)
//! tally batch          read JSONL samples on stdin, write scored JSONL to stdout
//! tally --health-check check /healthz on the configured port
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mimalloc::MiMalloc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::signal;

use tally::config::Config;
use tally::gateway::{HandlerState, create_router_with_state};
use tally::pool::VerifierPool;
use tally::sample::Sample;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

enum Mode {
    Serve,
    Batch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check().await);
    }

    let mode = match args.first().map(String::as_str) {
        None | Some("serve") => Mode::Serve,
        Some("batch") => Mode::Batch,
        Some(other) => anyhow::bail!("unknown command '{}' (expected 'serve' or 'batch')", other),
    };

    // Logs go to stderr; stdout carries results in batch mode.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    config.validate()?;

    let pool = Arc::new(VerifierPool::new(config.pool.clone())?);

    let result = match mode {
        Mode::Serve => serve(&config, Arc::clone(&pool)).await,
        Mode::Batch => run_batch(&pool).await,
    };

    pool.shutdown();
    pool.flush_audit().await;
    result
}

async fn serve(config: &Config, pool: Arc<VerifierPool>) -> anyhow::Result<()> {
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        pool = %pool.name(),
        workers = pool.num_workers(),
        "Tally starting"
    );

    let app = create_router_with_state(HandlerState::new(pool));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Tally shutdown complete");
    Ok(())
}

/// Scores every stdin line and writes results in input order.
///
/// A line that is not a valid sample yields `{"error": ..., "line": n}` so
/// output lines stay aligned with input lines.
async fn run_batch(pool: &VerifierPool) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut parsed: Vec<Result<Sample, String>> = Vec::new();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        parsed.push(serde_json::from_str(&line).map_err(|e| e.to_string()));
    }

    let samples: Vec<Sample> = parsed
        .iter()
        .filter_map(|entry| entry.as_ref().ok().cloned())
        .collect();
    tracing::info!(
        samples = samples.len(),
        rejected = parsed.len() - samples.len(),
        "Scoring batch"
    );
    let mut scored = pool.verify_batch(samples).await.into_iter();

    let mut stdout = tokio::io::stdout();
    for (index, entry) in parsed.iter().enumerate() {
        let value = match entry {
            Ok(_) => match scored.next() {
                Some(sample) => serde_json::to_value(sample)?,
                None => anyhow::bail!("batch result count mismatch"),
            },
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "Skipping invalid sample");
                serde_json::json!({ "error": e, "line": index + 1 })
            }
        };
        let mut out = serde_json::to_vec(&value)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
    }
    stdout.flush().await?;

    let stats = pool.stats();
    tracing::info!(
        succeeded = stats.succeeded,
        failed_attempts = stats.failed_attempts,
        exhausted = stats.exhausted,
        "Batch complete"
    );
    Ok(())
}

async fn run_health_check() -> i32 {
    let port = std::env::var(Config::ENV_PORT)
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(tally::config::DEFAULT_PORT);

    let url = format!("http://127.0.0.1:{}/healthz", port);

    let Ok(client) = reqwest::Client::builder()
        .timeout(Duration::from_secs(1))
        .build()
    else {
        return 1;
    };

    match client.get(&url).send().await {
        Ok(res) if res.status().is_success() => 0,
        _ => 1,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
