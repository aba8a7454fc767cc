//! WebSocket upgrade + push loop. Every store change is pushed to every
//! connected client as `data_update`; the only client message is `ping`.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, instrument, warn};

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;
use crate::store::StoreEvent;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "spellquest_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

fn encode(msg: &ServerWsMessage) -> String {
  serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  })
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "spellquest_backend", "WebSocket connected");
  let mut events = state.store.subscribe();

  loop {
    tokio::select! {
      event = events.recv() => {
        let reply = match event {
          Ok(StoreEvent::DataUpdate { timestamp_ms }) => ServerWsMessage::DataUpdate { timestamp: timestamp_ms },
          Err(RecvError::Lagged(skipped)) => {
            // Updates coalesce: one notification covers the skipped ones.
            warn!(target: "spellquest_backend", skipped, "WS subscriber lagged");
            ServerWsMessage::DataUpdate { timestamp: chrono::Utc::now().timestamp_millis() }
          }
          Err(RecvError::Closed) => break,
        };
        if let Err(e) = socket.send(Message::Text(encode(&reply))).await {
          error!(target: "spellquest_backend", error = %e, "WS send error");
          break;
        }
      }
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        let reply = match msg {
          Message::Text(txt) => match serde_json::from_str::<ClientWsMessage>(&txt) {
            Ok(ClientWsMessage::Ping) => {
              debug!(target: "spellquest_backend", "WS ping");
              ServerWsMessage::Pong
            }
            Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
          },
          Message::Ping(payload) => {
            let _ = socket.send(Message::Pong(payload)).await;
            continue;
          }
          Message::Close(_) => break,
          _ => continue,
        };
        if let Err(e) = socket.send(Message::Text(encode(&reply))).await {
          error!(target: "spellquest_backend", error = %e, "WS send error");
          break;
        }
      }
    }
  }
  info!(target: "spellquest_backend", "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wire_shapes() {
    assert_eq!(encode(&ServerWsMessage::DataUpdate { timestamp: 42 }), r#"{"type":"data_update","timestamp":42}"#);
    assert_eq!(encode(&ServerWsMessage::Pong), r#"{"type":"pong"}"#);
    assert!(matches!(serde_json::from_str::<ClientWsMessage>(r#"{"type":"ping"}"#), Ok(ClientWsMessage::Ping)));
  }
}
