//! Server process: startup checks, listener, and graceful shutdown.
//!
//! Startup fails fast: the endpoint table is checked and the daemon socket
//! is opened before anything listens. On shutdown, in-flight requests are
//! drained and only then is the daemon connection closed.

use std::path::PathBuf;
use std::sync::Arc;

use lightning_rest_config::AppConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::gateway::endpoints::TableError;
use crate::gateway::{EndpointTable, GatewayState, app};
use crate::rpc::{RpcTransport, TransportError, UnixSocketRpc};

/// Shutdown signal sent via broadcast channel.
#[derive(Debug, Clone)]
pub struct ShutdownSignal;

/// Errors that stop the gateway from starting or serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("endpoint table is inconsistent: {0}")]
    Table(#[from] TableError),

    #[error("daemon unreachable at {path}: {source}")]
    DaemonUnreachable {
        path: PathBuf,
        source: TransportError,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The gateway process: configuration, the daemon connection, and the
/// routes served over it.
pub struct Gateway {
    config: AppConfig,
    rpc: Arc<dyn RpcTransport>,
    state: Arc<GatewayState>,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
    _shutdown_rx: broadcast::Receiver<ShutdownSignal>,
}

impl Gateway {
    /// Connect to the daemon socket named in `config`, then check the
    /// endpoint table.
    pub async fn connect(config: AppConfig) -> Result<Self, ServerError> {
        let path = config.rpc.resolved_socket_path();
        let rpc = UnixSocketRpc::connect(&path, config.rpc.timeout())
            .await
            .map_err(|source| ServerError::DaemonUnreachable { path, source })?;

        Self::with_transport(config, Arc::new(rpc))
    }

    /// Build a gateway over an already established transport, checking the
    /// endpoint table first.
    pub fn with_transport(
        config: AppConfig,
        rpc: Arc<dyn RpcTransport>,
    ) -> Result<Self, ServerError> {
        let table = EndpointTable::standard();
        table.check()?;

        let state = Arc::new(GatewayState::new(Arc::clone(&rpc), &table, &config));
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

        Ok(Self {
            config,
            rpc,
            state,
            shutdown_tx,
            _shutdown_rx,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The axum app serving the endpoint table.
    pub fn app(&self) -> axum::Router {
        app(Arc::clone(&self.state))
    }

    /// A sender that stops [`Gateway::serve`] when signalled.
    pub fn shutdown_handle(&self) -> broadcast::Sender<ShutdownSignal> {
        self.shutdown_tx.clone()
    }

    /// Bind the configured address and port.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = format!("{}:{}", self.config.server.bind, self.config.server.port);
        TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Bind and serve until shutdown.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve on `listener` until Ctrl-C, SIGTERM, or a [`ShutdownSignal`].
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener.local_addr()?;
        info!(
            addr = %local,
            socket = %self.config.rpc.resolved_socket_path().display(),
            version = env!("CARGO_PKG_VERSION"),
            "lightning-rest listening"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let result = axum::serve(listener, self.app())
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_rx.recv() => info!("Shutdown signal received"),
                    _ = wait_for_signal() => warn!("Termination signal received, draining requests"),
                }
            })
            .await;

        self.rpc.close().await;
        info!("Gateway stopped");
        result.map_err(ServerError::Io)
    }
}

/// Resolve on Ctrl-C or SIGTERM.
async fn wait_for_signal() {
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate => {}
    }
}
