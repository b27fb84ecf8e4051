//! Accept loop and connection ceiling.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use peershare_catalog::Catalog;
use peershare_protocol::ResponseHead;
use peershare_protocol::response::ERR_BUSY;

use crate::handler::handle_connection;
use crate::{ServerConfig, ServerError};

/// The peershare TCP server.
///
/// One task per accepted connection, one request per connection. `active`
/// counts handlers still running; arrivals past the ceiling are refused
/// before a handler ever spawns, so a refused connection is never counted.
pub struct FileServer {
    config: ServerConfig,
    catalog: Arc<Catalog>,
    listener: TcpListener,
    active: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl FileServer {
    /// Binds the configured port.
    pub async fn bind(config: ServerConfig, catalog: Arc<Catalog>) -> Result<Self, ServerError> {
        let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
        let listener = TcpListener::bind(addr).await?;
        info!(
            addr = %listener.local_addr()?,
            max_connections = config.max_connections,
            compression = config.compression_enabled,
            "file server listening"
        );

        Ok(Self {
            config,
            catalog,
            listener,
            active: Arc::new(AtomicUsize::new(0)),
            cancel: CancellationToken::new(),
        })
    }

    /// The bound address (useful when the configured port was 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Connections currently being served.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Accepts connections until the cancellation token fires.
    ///
    /// Accept errors are logged and the loop keeps going; only cancellation
    /// ends it.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("server shutting down");
                    return Ok(());
                }
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.dispatch(stream, peer),
                        Err(e) => warn!("accept error: {e}"),
                    }
                }
            }
        }
    }

    fn dispatch(&self, mut stream: TcpStream, peer: SocketAddr) {
        // The ceiling check and the slot acquisition both happen here, on
        // the accept task, so admissions are strictly sequential.
        if self.active.load(Ordering::Relaxed) >= self.config.max_connections {
            warn!(%peer, active = self.active.load(Ordering::Relaxed), "connection refused: server busy");
            tokio::spawn(async move {
                let line = ResponseHead::error(ERR_BUSY).to_line();
                let _ = stream.write_all(line.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
            return;
        }

        let guard = ConnectionGuard::acquire(&self.active);
        let catalog = Arc::clone(&self.catalog);
        let compression_enabled = self.config.compression_enabled;

        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = handle_connection(stream, peer, &catalog, compression_enabled).await {
                warn!(%peer, "connection error: {e}");
            }
        });
    }
}

/// Holds one slot in the active-connection count for as long as the
/// handler task lives, whatever exit path it takes.
struct ConnectionGuard {
    active: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    fn acquire(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::Relaxed);
        Self {
            active: Arc::clone(active),
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }
}
