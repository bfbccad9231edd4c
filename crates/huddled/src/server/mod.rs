//! WebSocket server for the signaling daemon.
//!
//! The server:
//! - Listens on a TCP socket for WebSocket clients
//! - Spawns a ConnectionHandler for each client
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  SignalServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌───────────────────┐
//! │ConnectionHandler│────▶│ CoordinatorHandle │
//! │  (per client)   │     │                   │
//! └───────┬─────────┘     └─────────┬─────────┘
//!         ▲                         │
//!         │    outbox (ServerEvent) │
//!         └─────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept errors are logged and the server keeps accepting

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, ConnectionSettings};

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::coordinator::CoordinatorHandle;

/// WebSocket server for the signaling daemon.
pub struct SignalServer {
    listener: TcpListener,

    /// Handle to the coordinator actor
    coordinator: CoordinatorHandle,

    settings: ConnectionSettings,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,
}

impl SignalServer {
    /// Binds the listener at the configured address.
    ///
    /// # Errors
    ///
    /// - `ServerError::Bind` if the address cannot be bound
    pub async fn bind(
        config: &ServerConfig,
        coordinator: CoordinatorHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_address)
            .await
            .map_err(|e| ServerError::Bind {
                address: config.bind_address,
                error: e.to_string(),
            })?;

        Ok(Self {
            listener,
            coordinator,
            settings: ConnectionSettings::from(config),
            cancel_token,
        })
    }

    /// Returns the address the server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::LocalAddr(e.to_string()))
    }

    /// Runs the server.
    ///
    /// Accepts connections until the cancellation token is triggered. Open
    /// connections observe the same token and close on their own.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(address = %self.local_addr()?, "Signaling server listening");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.handle_connection(stream, peer),
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Handles a new client connection by spawning a handler task.
    fn handle_connection(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let handler = ConnectionHandler::new(
            peer,
            self.coordinator.clone(),
            self.settings,
            self.cancel_token.child_token(),
        );

        tokio::spawn(async move {
            if let Err(e) = handler.run(stream).await {
                debug!(peer = %peer, error = %e, "Connection ended");
            }
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {address}: {error}")]
    Bind { address: SocketAddr, error: String },

    #[error("Failed to read listener address: {0}")]
    LocalAddr(String),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}
