//! WebSocket Front End
//!
//! Async WebSocket server binding connections to the coordinator.
//! One task per connection reads inbound frames; a writer task drains
//! the connection's outbound channel onto the socket. All coordination
//! logic lives in [`GameCoordinator`]; this layer only moves frames.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::game::role::ConnectionId;
use crate::game::rules::RulesEngine;
use crate::network::broadcaster::ChannelBroadcaster;
use crate::network::coordinator::{GameCoordinator, DEFAULT_CHAT_TEXT_LIMIT};
use crate::network::protocol::{ClientMessage, ServerMessage, ServerWarning, WarningCode};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Outbound channel depth per connection.
    pub outbound_capacity: usize,
    /// Longest accepted chat line, in characters.
    pub chat_text_limit: usize,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".parse().unwrap(),
            max_connections: 256,
            outbound_capacity: 64,
            chat_text_limit: DEFAULT_CHAT_TEXT_LIMIT,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Read overrides from `GAMBIT_*` environment variables, falling
    /// back to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("GAMBIT_BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_addr),
            max_connections: std::env::var("GAMBIT_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            outbound_capacity: std::env::var("GAMBIT_OUTBOUND_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.outbound_capacity),
            chat_text_limit: std::env::var("GAMBIT_CHAT_TEXT_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.chat_text_limit),
            version: defaults.version,
        }
    }
}

/// Coordinator server errors.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// The coordinator's WebSocket server.
pub struct CoordinatorServer {
    /// Server configuration.
    config: ServerConfig,
    /// The shared coordinator core.
    coordinator: Arc<GameCoordinator>,
    /// Outbound channel registry.
    broadcaster: Arc<ChannelBroadcaster>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl CoordinatorServer {
    /// Create a server around a fresh coordinator.
    pub fn new(config: ServerConfig, rules: Arc<dyn RulesEngine>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let broadcaster = Arc::new(ChannelBroadcaster::new());
        let coordinator = Arc::new(
            GameCoordinator::new(rules, broadcaster.clone())
                .with_chat_text_limit(config.chat_text_limit),
        );

        Self {
            config,
            coordinator,
            broadcaster,
            shutdown_tx,
        }
    }

    /// The coordinator this server fronts.
    pub fn coordinator(&self) -> Arc<GameCoordinator> {
        self.coordinator.clone()
    }

    /// Run the server until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), CoordinatorServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Coordinator listening on {}", self.config.bind_addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.broadcaster.connection_count() >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let coordinator = self.coordinator.clone();
        let broadcaster = self.broadcaster.clone();
        let outbound_capacity = self.config.outbound_capacity;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(outbound_capacity);

            let conn = ConnectionId::new();
            broadcaster.register(conn, msg_tx.clone());
            coordinator.handle_connect(conn).await;

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            // Handle incoming frames
            loop {
                tokio::select! {
                    frame = ws_receiver.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                match ClientMessage::from_json(&text) {
                                    Ok(message) => {
                                        coordinator.handle_message(conn, message).await;
                                    }
                                    Err(e) => {
                                        debug!(%conn, "Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Warning(ServerWarning {
                                            code: WarningCode::InvalidMessage,
                                            message: "Invalid message format".to_string(),
                                        })).await;
                                    }
                                }
                            }
                            Some(Ok(Message::Binary(data))) => {
                                // Binary protocol alternative
                                if let Ok(message) = ClientMessage::from_bytes(&data) {
                                    coordinator.handle_message(conn, message).await;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!(%conn, "Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!(%conn, "WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Cleanup: disconnect is the only cancellation signal, so the
            // slot and any live negotiation go in the same pass.
            sender_task.abort();
            coordinator.handle_disconnect(conn).await;
            broadcaster.unregister(conn);
            info!(%conn, "Client {} cleaned up", addr);
        });
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub fn connection_count(&self) -> usize {
        self.broadcaster.connection_count()
    }
}
