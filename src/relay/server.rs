use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use super::connection::RelayConnection;
use super::guard::UpgradeGuard;
use super::hub::BroadcastHub;
use super::protocol::ServerFrame;
use crate::session::SessionStore;

/// Accepts raw TCP connections, runs the upgrade guard, and wires each
/// admitted connection into the hub with one send task and one receive loop.
pub struct RelayServer {
    hub: Arc<BroadcastHub>,
    guard: UpgradeGuard,
    heartbeat_interval_ms: u64,
}

impl RelayServer {
    pub fn new(
        sessions: Arc<SessionStore>,
        hub: Arc<BroadcastHub>,
        heartbeat_interval_ms: u64,
    ) -> Self {
        Self {
            hub,
            guard: UpgradeGuard::new(sessions),
            heartbeat_interval_ms,
        }
    }

    pub async fn handle_connection(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        debug!("upgrade request from {}", addr);

        let Some((ws_stream, identity)) = self.guard.admit(stream).await else {
            info!("rejected upgrade from {}", addr);
            return;
        };
        info!("admitted {} from {}", identity.username, addr);

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let connection = RelayConnection::new(identity, tx.clone(), self.hub.clone());
        let connection_id = connection.id();

        self.hub.add(connection_id, tx).await;
        // Advertise the heartbeat cadence before anything else reaches the
        // peer.
        self.hub
            .send_to(
                &connection_id,
                &ServerFrame::HeartbeatHint(self.heartbeat_interval_ms),
            )
            .await;

        // Forward queued outbound messages to the socket.
        let mut send_task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if ws_sink.send(message).await.is_err() {
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = ws_sink.close().await;
        });

        // Read inbound frames until the peer goes away or a frame is fatal.
        let mut receive_task = tokio::spawn(async move {
            while let Some(message) = ws_stream.next().await {
                match message {
                    Ok(msg) => {
                        if connection.handle_message(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("receive error on connection {}: {}", connection.id(), e);
                        break;
                    }
                }
            }
        });

        tokio::select! {
            _ = &mut send_task => {
                debug!("send task finished for connection {}", connection_id);
                // The socket's write half is gone; stop reading from it too
                // instead of waiting for the peer to hang up.
                receive_task.abort();
            }
            _ = &mut receive_task => {
                debug!("receive task finished for connection {}", connection_id);
            }
        }

        // Exactly-once teardown: remove() is idempotent, and dropping the
        // hub's sender lets the send task drain and close the sink.
        self.hub.remove(&connection_id).await;
        info!("connection {} closed", connection_id);
    }
}
