//! Test server harness.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tally::gateway::{HandlerState, create_router_with_state};
use tally::pool::{PoolConfig, VerifierPool};
use tally::worker::{MockBehavior, MockWorkerFactory};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const STARTUP_WAIT_TIMEOUT_SECS: u64 = 5;
const STARTUP_POLL_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone)]
pub struct TestServerConfig {
    pub workers: usize,
    /// `None` runs real thread-backed workers.
    pub mock_behavior: Option<MockBehavior>,
}

impl Default for TestServerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            mock_behavior: None,
        }
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub pool: Arc<VerifierPool>,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.pool.shutdown();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerStartupError {
    #[error("Server failed to start within timeout")]
    Timeout,
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Server startup failed: {0}")]
    StartupFailed(String),
}

pub async fn wait_for_server_ready(
    addr: SocketAddr,
    timeout: Duration,
    interval: Duration,
) -> Result<(), ServerStartupError> {
    let start = std::time::Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(ServerStartupError::Timeout);
        }

        match tokio::net::TcpStream::connect(addr).await {
            Ok(_) => return Ok(()),
            Err(_) => tokio::time::sleep(interval).await,
        }
    }
}

/// Spawns a gateway on an ephemeral port backed by a fresh pool.
pub async fn spawn_test_server(config: TestServerConfig) -> Result<TestServer, ServerStartupError> {
    let pool_config = PoolConfig::for_testing(config.workers);
    let pool = match config.mock_behavior {
        Some(behavior) => VerifierPool::with_factory(
            pool_config,
            Arc::new(MockWorkerFactory::new(behavior)),
        ),
        None => VerifierPool::new(pool_config),
    }
    .map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?;
    let pool = Arc::new(pool);

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;

    let app = create_router_with_state(HandlerState::new(Arc::clone(&pool)));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    wait_for_server_ready(
        addr,
        Duration::from_secs(STARTUP_WAIT_TIMEOUT_SECS),
        Duration::from_millis(STARTUP_POLL_INTERVAL_MS),
    )
    .await?;

    Ok(TestServer {
        addr,
        pool,
        _server_handle: server_handle,
        shutdown_tx: Some(shutdown_tx),
    })
}
