//! Command server.
//!
//! Accepts TCP connections and runs one [`Session`] task per connection.
//! All sessions share the same [`ControlApi`], so every request goes
//! through the single registry lock.

use crate::error::ServerResult;
use crate::session::Session;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use watchdog_supervisor::ControlApi;

/// Back-off after a failed accept, so a persistent error does not spin.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

pub struct CommandServer {
    listener: TcpListener,
    api: ControlApi,
    status_interval: Duration,
}

impl CommandServer {
    /// Bind the listening socket.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        api: ControlApi,
        status_interval: Duration,
    ) -> ServerResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            api,
            status_interval,
        })
    }

    /// Address actually bound; useful when binding port 0.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` is cancelled, then wait for
    /// open sessions to close.
    pub async fn run(self, shutdown: CancellationToken) -> ServerResult<()> {
        info!("Command server listening on {}", self.local_addr()?);

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = finished {
                        error!("Session task failed: {}", e);
                    }
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!("Accept failed: {}", e);
                            tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                            continue;
                        }
                    };

                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
                    }

                    info!("Controller connected from {}", peer);
                    let session = Session::new(
                        stream,
                        peer,
                        self.api.clone(),
                        self.status_interval,
                        shutdown.child_token(),
                    );
                    sessions.spawn(async move {
                        match session.run().await {
                            Ok(()) => info!("Controller {} disconnected", peer),
                            Err(e) => warn!("Connection from {} closed: {}", peer, e),
                        }
                    });
                }
            }
        }

        info!("Command server stopping, {} open sessions", sessions.len());
        while let Some(finished) = sessions.join_next().await {
            if let Err(e) = finished {
                error!("Session task failed: {}", e);
            }
        }

        Ok(())
    }

    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<ServerResult<()>> {
        tokio::spawn(self.run(shutdown))
    }
}
