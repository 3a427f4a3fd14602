//! Relay server
//!
//! Binds the RTMP ingest listener and the HTTP gateway and runs both accept
//! loops. Each RTMP connection gets its own task; per-session failures never
//! take down either listener.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::archive::ArchiveSink;
use crate::config::RelayConfig;
use crate::error::Result;
use crate::gateway::{self, GatewayState};
use crate::relay::RelayHub;
use crate::server::connection::RtmpConnection;
use crate::session::IngestSupervisor;
use crate::stats::ViewerStats;

/// Live relay server: RTMP ingest plus HTTP playback and statistics
pub struct RelayServer {
    config: RelayConfig,
    hub: Arc<RelayHub>,
    viewers: Arc<ViewerStats>,
    supervisor: Arc<IngestSupervisor>,
    sink: Arc<dyn ArchiveSink>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl RelayServer {
    /// Create a server with the given configuration and storage collaborator
    pub fn new(config: RelayConfig, sink: Arc<dyn ArchiveSink>) -> Self {
        let hub = Arc::new(RelayHub::new(config.broadcast_capacity));
        let viewers = Arc::new(ViewerStats::new(
            config.heartbeat_window,
            config.viewer_multiplier,
            config.history_capacity,
        ));
        let supervisor = Arc::new(IngestSupervisor::new(
            config.clone(),
            hub.clone(),
            sink.clone(),
        ));

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            hub,
            viewers,
            supervisor,
            sink,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the relay hub
    pub fn hub(&self) -> &Arc<RelayHub> {
        &self.hub
    }

    /// Get a reference to the viewer statistics component
    pub fn viewers(&self) -> &Arc<ViewerStats> {
        &self.viewers
    }

    /// Get a reference to the ingest supervisor
    pub fn supervisor(&self) -> &Arc<IngestSupervisor> {
        &self.supervisor
    }

    /// Run both listeners
    ///
    /// This method blocks until the server is shut down or a listener fails
    /// to bind.
    pub async fn run(&self) -> Result<()> {
        let rtmp = TcpListener::bind(self.config.rtmp_addr).await?;
        tracing::info!(addr = %self.config.rtmp_addr, "RTMP ingest listening");

        let http = TcpListener::bind(self.config.http_addr).await?;
        tracing::info!(addr = %self.config.http_addr, "HTTP gateway listening");

        tokio::select! {
            result = self.accept_loop(&rtmp) => result,
            result = self.serve_gateway(http) => result,
        }
    }

    /// Run both listeners until the shutdown future completes
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let rtmp = TcpListener::bind(self.config.rtmp_addr).await?;
        tracing::info!(addr = %self.config.rtmp_addr, "RTMP ingest listening");

        let http = TcpListener::bind(self.config.http_addr).await?;
        tracing::info!(addr = %self.config.http_addr, "HTTP gateway listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&rtmp) => result,
            result = self.serve_gateway(http) => result,
        }
    }

    async fn serve_gateway(&self, listener: TcpListener) -> Result<()> {
        let state = GatewayState {
            hub: self.hub.clone(),
            viewers: self.viewers.clone(),
            sink: self.sink.clone(),
            policy: self.config.key_policy.clone(),
        };
        let router = gateway::router(state);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::warn!(error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let connection = RtmpConnection::new(
            session_id,
            peer_addr,
            self.supervisor.clone(),
            self.hub.clone(),
        );

        tokio::spawn(async move {
            // Hold the permit for the connection's whole lifetime
            let _permit = permit;

            if let Err(e) = connection.run(socket).await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }

    /// Get the RTMP bind address
    pub fn rtmp_addr(&self) -> SocketAddr {
        self.config.rtmp_addr
    }

    /// Get the HTTP bind address
    pub fn http_addr(&self) -> SocketAddr {
        self.config.http_addr
    }
}
