use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::state::AppState;
use crate::ws::hub::ObserverHub;

/// HTTP handler that upgrades the connection to an observer WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

/// Manage a single observer connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the observer with the hub, which starts its heartbeat.
///   2. Spawns a sender task that forwards hub messages to the sink.
///   3. Reads inbound frames on the current task; any frame counts as
///      proof of life. Client payloads are otherwise ignored.
///   4. Unregisters as soon as either side ends.
async fn handle_socket(socket: WebSocket, hub: Arc<ObserverHub>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "Observer connected");

    let rx = hub.register(conn_id.clone()).await;

    let (sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_timeout = hub.send_timeout();
    let mut send_task = tokio::spawn(async move {
        forward_outbound(rx, sink, send_timeout, &sender_conn_id).await;
    });

    let recv_hub = Arc::clone(&hub);
    let recv_conn_id = conn_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(Message::Pong(_)) => {
                    tracing::trace!(conn_id = %recv_conn_id, "Pong received");
                    recv_hub.touch(&recv_conn_id).await;
                }
                Ok(_) => recv_hub.touch(&recv_conn_id).await,
                Err(e) => {
                    tracing::debug!(conn_id = %recv_conn_id, error = %e, "Observer receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.unregister(&conn_id).await;
    tracing::info!(conn_id = %conn_id, "Observer disconnected");
}

/// Forward hub messages to the socket.
///
/// Stops when the hub drops the channel, after a Close frame, or when a
/// send fails or does not complete within `send_timeout`.
async fn forward_outbound<S>(
    mut rx: mpsc::UnboundedReceiver<Message>,
    mut sink: S,
    send_timeout: Duration,
    conn_id: &str,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        match tokio::time::timeout(send_timeout, sink.send(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(conn_id, error = %e, "Observer sink closed");
                break;
            }
            Err(_) => {
                tracing::warn!(
                    conn_id,
                    timeout_ms = send_timeout.as_millis() as u64,
                    "Observer send timed out",
                );
                break;
            }
        }
        if closing {
            break;
        }
    }
}
