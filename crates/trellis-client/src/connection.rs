//! Lifecycle of the single WebSocket channel to the backend.
//!
//! The transport handle is owned exclusively here; the protocol layers only
//! ever go through [`Connection::ensure_connection`] because idle channels
//! may be dropped server-side at any time.

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{Result, TrellisError};
use crate::protocol::Reply;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct Connection {
    endpoint: String,
    socket: Option<Socket>,
    connected: bool,
    /// Idle deadline applied to each receive; `None` waits forever and
    /// leaves hang protection to the transport's own ping timeout.
    recv_timeout: Option<Duration>,
}

impl Connection {
    pub fn new(server_url: &str, recv_timeout: Option<Duration>) -> Self {
        Self {
            endpoint: ws_endpoint(server_url),
            socket: None,
            connected: false,
            recv_timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.connected && self.socket.is_some()
    }

    /// Establish the channel. A call while already connected is a no-op
    /// success. No retries happen here; retry policy belongs to the caller.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            debug!("already connected to {}", self.endpoint);
            return Ok(());
        }
        info!("connecting to {}", self.endpoint);
        match connect_async(self.endpoint.as_str()).await {
            Ok((socket, _)) => {
                self.socket = Some(socket);
                self.connected = true;
                info!("connected to {}", self.endpoint);
                Ok(())
            }
            Err(err) => {
                self.socket = None;
                self.connected = false;
                Err(TrellisError::Connection(format!(
                    "handshake with {} failed: {err}",
                    self.endpoint
                )))
            }
        }
    }

    /// The only entry point the protocol layers use: reconnects if the
    /// channel went away since the last call.
    pub async fn ensure_connection(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.connect().await
    }

    /// Close the channel if open. Always safe to call; close errors are
    /// logged and swallowed because the caller's intent already succeeded.
    pub async fn disconnect(&mut self) {
        self.connected = false;
        if let Some(mut socket) = self.socket.take() {
            if let Err(err) = socket.close(None).await {
                warn!("error closing connection: {err}");
            } else {
                info!("disconnected from {}", self.endpoint);
            }
        }
    }

    /// Drop the handle without a close handshake, so the next
    /// `ensure_connection` reconnects. Used after protocol-level failures.
    pub fn mark_dead(&mut self) {
        self.connected = false;
        self.socket = None;
    }

    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let json = serde_json::to_string(message)?;
        let Some(socket) = self.socket.as_mut() else {
            return Err(TrellisError::Connection("not connected".to_string()));
        };
        if let Err(err) = socket.send(Message::Text(json)).await {
            self.mark_dead();
            return Err(err.into());
        }
        Ok(())
    }

    /// Receive the next reply envelope, skipping non-text frames.
    pub async fn recv_reply(&mut self) -> Result<Reply> {
        loop {
            let next = {
                let Some(socket) = self.socket.as_mut() else {
                    return Err(TrellisError::Connection("not connected".to_string()));
                };
                match self.recv_timeout {
                    Some(deadline) => match timeout(deadline, socket.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            self.mark_dead();
                            return Err(TrellisError::Timeout);
                        }
                    },
                    None => socket.next().await,
                }
            };
            match next {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Close(_))) | None => {
                    self.mark_dead();
                    return Err(TrellisError::Connection(
                        "connection closed by server".to_string(),
                    ));
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    self.mark_dead();
                    return Err(err.into());
                }
            }
        }
    }
}

/// The backend expects the channel at `<server_url>/ws`.
fn ws_endpoint(server_url: &str) -> String {
    let trimmed = server_url.trim_end_matches('/');
    if trimmed.ends_with("/ws") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/ws")
    }
}

#[cfg(test)]
mod tests {
    use super::ws_endpoint;

    #[test]
    fn endpoint_gains_ws_suffix_once() {
        assert_eq!(ws_endpoint("ws://host:5000"), "ws://host:5000/ws");
        assert_eq!(ws_endpoint("ws://host:5000/"), "ws://host:5000/ws");
        assert_eq!(ws_endpoint("ws://host:5000/ws"), "ws://host:5000/ws");
    }
}
