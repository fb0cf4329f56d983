//! Streaming relay: upgrade admission, the broadcast hub, and the
//! per-connection protocol state machine.

mod connection;
mod guard;
mod hub;
mod protocol;
mod server;

pub use connection::RelayConnection;
pub use guard::UpgradeGuard;
pub use hub::BroadcastHub;
pub use protocol::{
    Author, ChatEvent, ClientFrame, ServerFrame, MAX_CONTENT_CHARS, OP_CHAT_EVENT,
    OP_CHAT_SUBMIT, OP_HEARTBEAT_HINT, OP_PING, OP_PONG,
};
pub use server::RelayServer;
