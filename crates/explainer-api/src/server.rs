use crate::{create_router, ApiResult, AppState};
use explainer_core::{ConfigManager, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

pub struct Server {
    state: AppState,
    addr: SocketAddr,
}

impl Server {
    pub fn new(addr: SocketAddr, config: Arc<ConfigManager>) -> ApiResult<Self> {
        let state = AppState::new(config)?;
        Ok(Self { state, addr })
    }

    pub async fn run(self) -> Result<()> {
        let router = create_router(self.state);

        info!("Starting code explainer on {}", self.addr);

        let listener = {
            let socket = if self.addr.is_ipv6() {
                tokio::net::TcpSocket::new_v6()
            } else {
                tokio::net::TcpSocket::new_v4()
            }?;

            // Rebind quickly across restarts
            let _ = socket.set_reuseaddr(true);
            let _ = socket.set_keepalive(true);

            socket.bind(self.addr)?;
            socket.listen(1024)?
        };

        info!("Server listening on http://{}", self.addr);
        info!("  GET  /             - Web interface");
        info!("  POST /explain/     - Explain a code snippet");
        info!("  GET  /health       - Configuration health");
        info!("  GET  /openapi.json - OpenAPI document");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
