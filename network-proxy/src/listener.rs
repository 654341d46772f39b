//! TCP accept loop (component G's outer shell). Bound to an ephemeral
//! loopback port so `wrapWithSandbox` can read it back via `local_addr()`
//! before the first command is spawned.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::connection::handle_connection;
use crate::error::ProxyError;
use crate::state::ProxyState;

pub struct FilteringProxy {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    accept_loop: JoinHandle<()>,
}

impl FilteringProxy {
    /// Binds to `127.0.0.1:0` and spawns the accept loop on the current
    /// tokio runtime. The returned proxy owns the loop's shutdown signal;
    /// dropping or calling [`FilteringProxy::shutdown`] stops new accepts
    /// and lets in-flight connections finish on their own.
    pub async fn bind(state: Arc<ProxyState>) -> Result<Self, ProxyError> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(ProxyError::Bind)?;
        let local_addr = listener.local_addr().map_err(ProxyError::LocalAddr)?;
        tracing::info!(%local_addr, "filtering proxy listening");

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let accept_loop = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((socket, _peer)) => {
                                let state = Arc::clone(&state);
                                tokio::spawn(async move {
                                    handle_connection(socket, state).await;
                                });
                            }
                            Err(error) => {
                                tracing::warn!(%error, "proxy accept failed");
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            local_addr,
            shutdown: Some(shutdown_tx),
            accept_loop,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Stops accepting new connections. Used by the manager's `reset()`.
    pub fn shutdown(&mut self) {
        if let Some(sender) = self.shutdown.take() {
            tracing::info!(local_addr = %self.local_addr, "filtering proxy shutting down");
            let _ = sender.send(());
        }
    }
}

impl Drop for FilteringProxy {
    fn drop(&mut self) {
        self.shutdown();
        self.accept_loop.abort();
    }
}
