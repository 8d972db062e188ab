//! DevTools JSON-RPC over a page target's WebSocket.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{BrowserError, Result};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Incoming frame: either a command response (`id` set) or an event.
#[derive(Debug, Deserialize)]
struct Incoming {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ProtocolError>,
    #[serde(default)]
    method: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProtocolError {
    code: i64,
    message: String,
}

/// One DevTools session bound to a single target.
///
/// The socket lock is held for a whole request/response cycle so
/// responses can never be handed to the wrong caller.  Events arriving
/// in between are discarded.
pub(super) struct CdpConnection {
    socket: Mutex<Socket>,
    next_id: AtomicU64,
    command_timeout: Duration,
}

impl CdpConnection {
    pub(super) async fn connect(ws_url: &str, command_timeout: Duration) -> Result<Self> {
        let (socket, _response) = tokio_tungstenite::connect_async(ws_url).await?;
        tracing::debug!(url = %ws_url, "DevTools target connected");
        Ok(Self {
            socket: Mutex::new(socket),
            next_id: AtomicU64::new(1),
            command_timeout,
        })
    }

    /// Send a command and wait for its result.
    pub(super) async fn send(&self, method: &str, params: Value) -> Result<Value> {
        let mut socket = self.socket.lock().await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = serde_json::json!({ "id": id, "method": method, "params": params });
        socket.send(Message::Text(request.to_string())).await?;

        let response = tokio::time::timeout(self.command_timeout, async {
            loop {
                match socket.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let incoming: Incoming = match serde_json::from_str(&text) {
                            Ok(incoming) => incoming,
                            Err(e) => return Err(BrowserError::Json(e)),
                        };
                        if incoming.id != Some(id) {
                            if let Some(event) = incoming.method.as_deref() {
                                tracing::trace!(event, "skipping DevTools event");
                            }
                            continue;
                        }
                        if let Some(err) = incoming.error {
                            return Err(BrowserError::Protocol {
                                code: err.code,
                                message: err.message,
                            });
                        }
                        return Ok(incoming.result.unwrap_or(Value::Null));
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return Err(BrowserError::ConnectionClosed)
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(BrowserError::WebSocket(e)),
                }
            }
        })
        .await;

        match response {
            Ok(result) => result,
            Err(_) => Err(BrowserError::Timeout(format!(
                "{method} got no response within {}ms",
                self.command_timeout.as_millis()
            ))),
        }
    }
}
