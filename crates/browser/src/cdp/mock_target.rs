//! In-process DevTools target for connection and page tests.
//!
//! Accepts a single WebSocket client on an ephemeral port and answers each
//! command with whatever frames the test's handler returns for it.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use super::connection::CdpConnection;

/// What the target does in response to one command.
pub(super) enum Reply {
    Frame(Value),
    Close,
}

pub(super) fn result(id: u64, result: Value) -> Reply {
    Reply::Frame(json!({ "id": id, "result": result }))
}

pub(super) fn error(id: u64, code: i64, message: &str) -> Reply {
    Reply::Frame(json!({ "id": id, "error": { "code": code, "message": message } }))
}

pub(super) fn event(method: &str) -> Reply {
    Reply::Frame(json!({ "method": method, "params": {} }))
}

/// `Runtime.evaluate` result carrying `value`.
pub(super) fn evaluated(id: u64, value: Value) -> Reply {
    result(id, json!({ "result": { "type": "object", "value": value } }))
}

/// Boot the target and return its `ws://` URL.
///
/// `handler` gets the command id, method and params; returning no
/// replies leaves the command unanswered.
pub(super) async fn serve<F>(mut handler: F) -> String
where
    F: FnMut(u64, &str, &Value) -> Vec<Reply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _peer) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        while let Some(Ok(Message::Text(text))) = ws.next().await {
            let command: Value = serde_json::from_str(&text).unwrap();
            let id = command["id"].as_u64().unwrap();
            let method = command["method"].as_str().unwrap_or_default().to_string();

            for reply in handler(id, &method, &command["params"]) {
                match reply {
                    Reply::Frame(frame) => {
                        if ws.send(Message::Text(frame.to_string())).await.is_err() {
                            return;
                        }
                    }
                    Reply::Close => {
                        let _ = ws.close(None).await;
                        // Let the client finish the closing handshake.
                        while let Some(Ok(_)) = ws.next().await {}
                        return;
                    }
                }
            }
        }
    });

    format!("ws://{addr}")
}

/// Boot a target and connect to it.
pub(super) async fn connect<F>(command_timeout: Duration, handler: F) -> CdpConnection
where
    F: FnMut(u64, &str, &Value) -> Vec<Reply> + Send + 'static,
{
    let url = serve(handler).await;
    CdpConnection::connect(&url, command_timeout).await.unwrap()
}
