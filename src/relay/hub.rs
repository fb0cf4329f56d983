use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};
use uuid::Uuid;

use super::protocol::ServerFrame;

/// Authoritative membership set of admitted connections. Fan-out goes
/// through each member's unbounded outbound channel, so a stalled peer only
/// grows its own queue and never blocks delivery to the others.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    members: RwLock<HashMap<Uuid, mpsc::UnboundedSender<Message>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, id: Uuid, sender: mpsc::UnboundedSender<Message>) {
        self.members.write().await.insert(id, sender);
        info!("connection {} joined the hub", id);
    }

    /// Removes `id` from the membership set. Idempotent; returns whether the
    /// connection was still a member.
    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.members.write().await.remove(id).is_some();
        if removed {
            info!("connection {} left the hub", id);
        }
        removed
    }

    /// Fans `frame` out to every current member, the sender included. A
    /// member whose receive half is already gone is skipped; that race is
    /// ordinary teardown, never a hub failure.
    pub async fn broadcast(&self, frame: &ServerFrame) {
        let message = frame.to_message();
        let members = self.members.read().await;
        for (id, sender) in members.iter() {
            if sender.send(message.clone()).is_err() {
                debug!("skipping closed connection {} during broadcast", id);
            }
        }
    }

    /// Sends `frame` to a single member. Returns false if the member is
    /// absent or its channel is closed.
    pub async fn send_to(&self, id: &Uuid, frame: &ServerFrame) -> bool {
        match self.members.read().await.get(id) {
            Some(sender) => sender.send(frame.to_message()).is_ok(),
            None => false,
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.members.read().await.len()
    }
}
