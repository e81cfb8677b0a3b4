//! WebSocket transport.
//!
//! Binds the first free port from the candidate list and accepts upgrades on a
//! single path. Each accepted socket gets a writer task draining the engine's
//! outbound channel, so frames are never interleaved.

use crate::engine::{Admission, Inbound, Outbound, SyncEngine};
use crate::error::RelayError;
use crate::upstream::Upstream;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Bind to the first port in `ports` that is free
pub async fn bind_first_available(bind: &str, ports: &[u16]) -> Result<TcpListener, RelayError> {
    for &port in ports {
        info!("Creating WebSocket server on port {}", port);
        match TcpListener::bind((bind, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => warn!("Impossible to create a WebSocket on port {}: {}", port, e),
        }
    }

    error!("No available port found");
    Err(RelayError::NoPortAvailable(ports.to_vec()))
}

pub fn router<U: Upstream>(engine: SyncEngine<U>, path: &str) -> Router {
    Router::new()
        .route(path, get(ws_handler::<U>))
        .with_state(engine)
}

/// Serve subscribers until the listener fails
pub async fn serve<U: Upstream>(listener: TcpListener, engine: SyncEngine<U>, path: &str) -> Result<(), RelayError> {
    if let Ok(addr) = listener.local_addr() {
        info!("WebSocket endpoint: ws://{}{}", addr, path);
    }
    axum::serve(listener, router(engine, path)).await?;
    Ok(())
}

async fn ws_handler<U: Upstream>(ws: WebSocketUpgrade, State(engine): State<SyncEngine<U>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, engine))
}

async fn handle_socket<U: Upstream>(socket: WebSocket, engine: SyncEngine<U>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let subscriber = match engine.connect().await {
        Admission::Accepted(subscriber) => subscriber,
        Admission::Rejected(messages) => {
            for message in messages {
                if ws_tx.send(to_message(message)).await.is_err() {
                    break;
                }
            }
            return;
        }
    };

    let id = subscriber.id;
    let mut outbound = subscriber.outbound;
    let forward = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let closing = matches!(message, Outbound::Close(_));
            if ws_tx.send(to_message(message)).await.is_err() {
                debug!("[{}] WebSocket send failed, closing", id);
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(message) = ws_rx.next().await {
        let inbound = match message {
            Ok(Message::Text(text)) => Inbound::Text(text),
            Ok(Message::Binary(bytes)) => Inbound::Binary(bytes),
            Ok(Message::Close(_)) => {
                info!("[{}] Client closed connection", id);
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Err(e) => {
                error!("[{}] WebSocket error: {}", id, e);
                break;
            }
        };
        engine.handle_inbound(id, inbound).await;
    }

    engine.disconnect(id).await;
    forward.abort();
}

fn to_message(outbound: Outbound) -> Message {
    match outbound {
        Outbound::Text(text) => Message::Text(text),
        Outbound::Binary(bytes) => Message::Binary(bytes),
        Outbound::Close(reason) => Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: reason.into(),
        })),
    }
}
