use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::hub::BroadcastHub;
use super::protocol::{ChatEvent, ClientFrame, ServerFrame, OP_CHAT_SUBMIT, OP_PING};
use crate::error::RelayError;
use crate::session::Identity;

/// Per-connection protocol state machine. The identity snapshot is copied
/// from the session at admission and never re-fetched.
pub struct RelayConnection {
    id: Uuid,
    identity: Identity,
    tx: mpsc::UnboundedSender<Message>,
    hub: Arc<BroadcastHub>,
}

impl RelayConnection {
    pub fn new(
        identity: Identity,
        tx: mpsc::UnboundedSender<Message>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            tx,
            hub,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Handles one inbound transport message. An `Err` ends the receive
    /// loop; the caller owns hub removal.
    pub async fn handle_message(&self, msg: Message) -> Result<(), RelayError> {
        match msg {
            Message::Text(text) => self.handle_frame(&text).await,
            Message::Close(_) => {
                info!("connection {} closed by peer", self.id);
                Err(RelayError::Connection("closed by peer".into()))
            }
            Message::Ping(data) => self
                .tx
                .send(Message::Pong(data))
                .map_err(|e| RelayError::Send(e.to_string())),
            Message::Pong(_) => Ok(()),
            other => {
                debug!(
                    "ignoring unsupported message type on connection {}: {:?}",
                    self.id, other
                );
                Ok(())
            }
        }
    }

    async fn handle_frame(&self, text: &str) -> Result<(), RelayError> {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                // Malformed frames end the connection gracefully, with no
                // error payload sent back.
                warn!("connection {}: unparseable frame: {}", self.id, e);
                let _ = self.tx.send(Message::Close(None));
                return Err(RelayError::MalformedFrame);
            }
        };

        match frame.op {
            OP_CHAT_SUBMIT => {
                let Some(content) = frame.content.as_deref().filter(|c| !c.is_empty()) else {
                    // submit without content is dropped, not an error
                    return Ok(());
                };
                let event = ChatEvent::build(content, &self.identity);
                self.hub.broadcast(&ServerFrame::ChatEvent(event)).await;
                Ok(())
            }
            OP_PING => self
                .tx
                .send(ServerFrame::Pong.to_message())
                .map_err(|e| RelayError::Send(e.to_string())),
            other => {
                debug!("connection {}: discarding opcode {}", self.id, other);
                Ok(())
            }
        }
    }
}
