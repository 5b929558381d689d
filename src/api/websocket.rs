//! WebSocket endpoint for live plugin events
//!
//! The client authenticates through the subprotocol header
//! `Sec-WebSocket-Protocol: a2, <token>`. After the upgrade it sends
//! `{"module": "...", "args": [...]}` whenever it navigates, and receives the
//! event frames dispatched to that module. The socket is closed when the
//! session ends.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::{
        ConnectInfo, State, WebSocketUpgrade,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code, rejection::WebSocketUpgradeRejection},
    },
    http::{HeaderMap, StatusCode, header::SEC_WEBSOCKET_PROTOCOL},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::ApiState;
use crate::events::Frame;
use crate::session::{ClientHandle, Location, Session};

/// Subprotocol name the client must offer first
pub const PROTOCOL: &str = "a2";

/// Frames buffered per client before dispatch waits on it
const CLIENT_BUFFER: usize = 32;

/// Build WebSocket router
#[must_use]
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ws", get(ws_upgrade)).with_state(state)
}

/// Token from a `a2, <token>` subprotocol header
fn protocol_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(SEC_WEBSOCKET_PROTOCOL)?.to_str().ok()?;
    let mut parts = value.split(',').map(str::trim);

    if parts.next()? != PROTOCOL {
        return None;
    }
    parts.next().filter(|t| !t.is_empty())
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(session) = protocol_token(&headers).and_then(|t| state.sessions.session_by_token(t)) else {
        tracing::debug!("WebSocket rejected: missing or invalid token");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let addr = connect_info.map_or_else(
        || SocketAddr::from(([0, 0, 0, 0], 0)),
        |Extension(ConnectInfo(addr))| addr,
    );

    ws.protocols([PROTOCOL])
        .on_upgrade(move |socket| handle_socket(socket, session, addr))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, session: Arc<Session>, addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::channel::<Frame>(CLIENT_BUFFER);
    let client = session.new_client(addr, tx);
    let cancel = session.cancellation().clone();

    tracing::info!(%addr, user = session.user_name(), "WebSocket connected");

    // Forward dispatched frames; close when the session ends
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    let close = CloseFrame {
                        code: close_code::POLICY,
                        reason: Utf8Bytes::from_static("session ended"),
                    };
                    let _ = sender.send(Message::Close(Some(close))).await;
                    break;
                }
                frame = rx.recv() => {
                    let Some(frame) = frame else { break };
                    if sender.send(Message::Text(String::from(&*frame).into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => handle_message(&client, text.as_str()),
                Message::Close(_) => break,
                _ => {}
            }
        }
        drop(client);
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!(%addr, "WebSocket disconnected");
}

/// Apply a navigation message
fn handle_message(client: &ClientHandle, text: &str) {
    match serde_json::from_str::<Location>(text) {
        Ok(location) => client.set_location(location.module, location.args),
        Err(e) => tracing::debug!(client = %client.id(), error = %e, "ignoring malformed message"),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn parses_protocol_token() {
        assert_eq!(protocol_token(&headers("a2, abc")), Some("abc"));
        assert_eq!(protocol_token(&headers("a2,abc")), Some("abc"));
        assert_eq!(protocol_token(&headers("a2")), None);
        assert_eq!(protocol_token(&headers("a2, ")), None);
        assert_eq!(protocol_token(&headers("chat, abc")), None);
        assert_eq!(protocol_token(&HeaderMap::new()), None);
    }

    #[test]
    fn location_message_parses() {
        let location: Location =
            serde_json::from_str(r#"{"module": "dns", "args": ["zones", "lan"]}"#).unwrap();
        assert_eq!(location.module, "dns");
        assert_eq!(location.args, vec!["zones", "lan"]);

        let empty: Location = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Location::default());
    }
}
