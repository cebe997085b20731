use crate::error::Result;
use crate::host::{HostState, SocketTasks, health_check, module_handler, ws_handler};
use crate::transport::{TlsListener, TransportSecurity};
use axum::Router;
use axum::routing::get;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tether_core::RELAY_PATH;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
/// Time open sockets get to flush their close frame.
const SOCKET_CLOSE_GRACE: Duration = Duration::from_millis(250);

pub fn router(state: HostState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(RELAY_PATH, get(ws_handler))
        .route("/modules/{name}", get(module_handler))
        .fallback(health_check)
        .layer(cors)
        .with_state(state)
}

/// The rendezvous listener, served on its own task.
pub struct HostServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    sockets: SocketTasks,
    task: JoinHandle<io::Result<()>>,
}

impl HostServer {
    /// Serves `router(state)` on an already bound listener.
    pub fn start(
        listener: TcpListener,
        security: &TransportSecurity,
        state: HostState,
    ) -> Result<Self> {
        let local_addr = listener.local_addr()?;
        let sockets = state.sockets().clone();
        let app = router(state);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let signal = async move {
            let _ = shutdown_rx.await;
        };

        let task = match security {
            TransportSecurity::Plain => {
                info!("Server runs on http://{}", local_addr);
                tokio::spawn(async move {
                    axum::serve(listener, app)
                        .with_graceful_shutdown(signal)
                        .await
                })
            }
            TransportSecurity::Tls { acceptor, .. } => {
                info!("Server runs on https://{}", local_addr);
                let listener = TlsListener::new(listener, acceptor.clone())?;
                tokio::spawn(async move {
                    axum::serve(listener, app)
                        .with_graceful_shutdown(signal)
                        .await
                })
            }
        };

        Ok(Self {
            local_addr,
            shutdown: Some(shutdown_tx),
            sockets,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting, ends every websocket session and waits until the
    /// listening socket is released.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.sockets.shutdown(SOCKET_CLOSE_GRACE).await;

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut self.task).await {
            Ok(Ok(Ok(()))) => info!("Listener on {} closed", self.local_addr),
            Ok(Ok(Err(e))) => warn!("Listener on {} failed: {}", self.local_addr, e),
            Ok(Err(e)) => warn!("Listener task on {} panicked: {}", self.local_addr, e),
            Err(_) => {
                warn!("Listener on {} did not drain in time, aborting", self.local_addr);
                self.task.abort();
                let _ = (&mut self.task).await;
            }
        }
    }
}

impl Drop for HostServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
