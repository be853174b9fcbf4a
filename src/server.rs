//! WebSocket transport

use crate::arena::Arena;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use reaction_arena_core::protocol::{ClientEvent, ServerEvent};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Routes: `/ws` for players, `/healthz` for liveness probes
pub fn router(arena: Arena) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(health))
        .with_state(arena)
}

/// Serve until the listener fails
pub async fn serve(arena: Arena) -> std::io::Result<()> {
    let addr = arena.config().bind_addr;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on ws://{}/ws", listener.local_addr()?);
    axum::serve(listener, router(arena)).await
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(arena): State<Arena>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(arena, socket))
}

/// Decode one text frame
pub fn parse_frame(text: &str) -> Result<ClientEvent, String> {
    serde_json::from_str(text).map_err(|e| format!("Invalid message: {e}"))
}

/// One task per socket. Inbound events are handled one at a time, so a
/// player's mutations never overlap.
async fn handle_socket(arena: Arena, mut socket: WebSocket) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let conn = arena.connect(tx.clone()).await;

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to encode event for {}: {}", conn, e),
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => match parse_frame(&text) {
                        Ok(event) => arena.handle(conn, event).await,
                        Err(message) => {
                            debug!("{} sent a bad frame: {}", conn, message);
                            let _ = tx.send(ServerEvent::Error(message));
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!("{} socket error: {}", conn, e);
                        break;
                    }
                    _ => continue,
                }
            }
        }
    }

    arena.disconnect(conn).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame() {
        let event = parse_frame(r#"{"event":"registerUser","data":{"username":"alice"}}"#).unwrap();
        assert!(matches!(event, ClientEvent::RegisterUser(ref c) if c.username == "alice"));

        let err = parse_frame("not json").unwrap_err();
        assert!(err.starts_with("Invalid message"));

        assert!(parse_frame(r#"{"event":"virusClicked","data":{}}"#).is_err());
    }

    #[test]
    fn test_parse_frame_without_payload() {
        let event = parse_frame(r#"{"event":"saveData"}"#).unwrap();
        assert!(matches!(event, ClientEvent::SaveData(_)));

        let err = parse_frame(r#"{"event":"registerUser"}"#).unwrap_err();
        assert!(err.starts_with("Invalid message"));
    }
}
