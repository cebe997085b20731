use axum::serve::Listener;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_native_tls::{TlsAcceptor, TlsStream};
use tracing::{debug, warn};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const HANDSHAKE_BACKLOG: usize = 64;

type Handshaken = (TlsStream<TcpStream>, SocketAddr);

/// TCP listener that hands axum only streams whose TLS handshake finished.
///
/// Every handshake runs on its own task, so a peer that never speaks TLS
/// cannot hold up the others. Failed handshakes are logged and skipped.
pub struct TlsListener {
    local_addr: SocketAddr,
    ready: mpsc::Receiver<Handshaken>,
    task: JoinHandle<()>,
}

impl TlsListener {
    pub fn new(inner: TcpListener, acceptor: TlsAcceptor) -> io::Result<Self> {
        let local_addr = inner.local_addr()?;
        let (tx, ready) = mpsc::channel(HANDSHAKE_BACKLOG);
        let task = tokio::spawn(accept_loop(inner, acceptor, tx));

        Ok(Self {
            local_addr,
            ready,
            task,
        })
    }
}

impl Drop for TlsListener {
    fn drop(&mut self) {
        // Releases the listening socket and any handshake still in flight.
        self.task.abort();
    }
}

impl Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        match self.ready.recv().await {
            Some(accepted) => accepted,
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        Ok(self.local_addr)
    }
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    ready: mpsc::Sender<Handshaken>,
) {
    let mut handshakes = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    handshakes.spawn(handshake(acceptor.clone(), stream, addr, ready.clone()));
                }
                Err(e) => {
                    warn!("TCP accept error: {}", e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            },

            Some(_) = handshakes.join_next() => {}

            _ = ready.closed() => break,
        }
    }

    debug!("TLS accept loop stopped");
}

async fn handshake(
    acceptor: TlsAcceptor,
    stream: TcpStream,
    addr: SocketAddr,
    ready: mpsc::Sender<Handshaken>,
) {
    match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
        Ok(Ok(tls)) => {
            let _ = ready.send((tls, addr)).await;
        }
        Ok(Err(e)) => warn!("TLS handshake with {} failed: {}", addr, e),
        Err(_) => warn!("TLS handshake with {} timed out", addr),
    }
}
