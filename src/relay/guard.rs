use std::sync::Arc;

use actix_web::cookie::Cookie;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

use crate::gateway::AUTH_COOKIE;
use crate::session::{Identity, SessionStore};

/// Upper bound on the upgrade request head; anything longer is rejected.
const MAX_HEAD_BYTES: usize = 8 * 1024;

/// Gatekeeper for streaming upgrades. A request either becomes an admitted
/// WebSocket carrying the session's identity snapshot, or its socket is
/// dropped with nothing written back.
///
/// The silent rejection (no status line on the failure path) matches the
/// relay's long-standing observable behavior; clients treat a handshake that
/// dies without a response as "not authenticated".
pub struct UpgradeGuard {
    sessions: Arc<SessionStore>,
}

struct UpgradeRequest {
    key: String,
    token: Option<String>,
}

impl UpgradeGuard {
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self { sessions }
    }

    /// Runs the admission decision on a raw accepted stream.
    ///
    /// Admitted: the 101 response is written and the completed WebSocket is
    /// returned with the identity copied out of the session store. Rejected
    /// (bad request head, missing cookie, unknown token, handshake write
    /// failure): returns `None` and the dropped stream closes the socket.
    pub async fn admit<S>(&self, mut stream: S) -> Option<(WebSocketStream<S>, Identity)>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let head = read_request_head(&mut stream).await?;
        let request = parse_upgrade_request(&head)?;

        let token = match request.token {
            Some(token) => token,
            None => {
                debug!("upgrade request without a session cookie");
                return None;
            }
        };
        let identity = match self.sessions.lookup(&token).await {
            Some(identity) => identity,
            None => {
                debug!("upgrade request with an unknown session token");
                return None;
            }
        };

        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Connection: Upgrade\r\n\
             Upgrade: websocket\r\n\
             Sec-WebSocket-Accept: {}\r\n\r\n",
            derive_accept_key(request.key.as_bytes())
        );
        stream.write_all(response.as_bytes()).await.ok()?;

        let ws = WebSocketStream::from_raw_socket(stream, Role::Server, None).await;
        Some((ws, identity))
    }
}

/// Reads the request head up to the blank line. One byte at a time so
/// nothing past the header block is consumed before the WebSocket codec
/// takes over the stream.
async fn read_request_head<S>(stream: &mut S) -> Option<String>
where
    S: AsyncRead + Unpin,
{
    let mut head = Vec::with_capacity(1024);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_HEAD_BYTES {
            debug!("upgrade request head exceeded {} bytes", MAX_HEAD_BYTES);
            return None;
        }
        match stream.read(&mut byte).await {
            Ok(0) | Err(_) => return None,
            Ok(_) => head.push(byte[0]),
        }
    }
    String::from_utf8(head).ok()
}

fn parse_upgrade_request(head: &str) -> Option<UpgradeRequest> {
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?;
    if request_line.split_whitespace().next()? != "GET" {
        return None;
    }

    let mut key = None;
    let mut token = None;
    let mut is_upgrade = false;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("sec-websocket-key") {
            key = Some(value.to_owned());
        } else if name.eq_ignore_ascii_case("upgrade") {
            is_upgrade = value.eq_ignore_ascii_case("websocket");
        } else if name.eq_ignore_ascii_case("cookie") {
            token = auth_token(value);
        }
    }

    if !is_upgrade {
        return None;
    }
    Some(UpgradeRequest { key: key?, token })
}

fn auth_token(cookie_header: &str) -> Option<String> {
    cookie_header
        .split(';')
        .filter_map(|part| Cookie::parse(part.trim().to_owned()).ok())
        .find(|cookie| cookie.name() == AUTH_COOKIE)
        .map(|cookie| cookie.value().to_owned())
}
