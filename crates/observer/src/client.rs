//! WebSocket client for the live progress channel.
//!
//! [`ObserverClient`] holds the endpoint and reconnection policy. Call
//! [`ObserverClient::run`] to connect and deliver decoded events until
//! cancelled or until the server stays unreachable.

use futures::StreamExt;
use medval_core::events::JobEvent;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::reconnect::{ConnectionState, ReconnectPolicy};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Errors that end an observer run.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error("Cannot reach server at {url} after {attempts} reconnection attempts")]
    Unreachable { url: String, attempts: u32 },
}

/// How a connected session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Disconnected,
    Cancelled,
}

/// Configuration handle for one progress channel endpoint.
pub struct ObserverClient {
    url: String,
    policy: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
}

impl ObserverClient {
    /// Create a client for `url`, e.g. `ws://localhost:3001/ws`.
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            url: url.into(),
            policy,
            state,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Connect and hand every decoded event to `on_event`.
    ///
    /// Returns `Ok(())` when `cancel` fires and
    /// [`ObserverError::Unreachable`] once the reconnection budget is
    /// spent without a successful connection.
    pub async fn run<F>(&self, cancel: &CancellationToken, mut on_event: F) -> Result<(), ObserverError>
    where
        F: FnMut(JobEvent),
    {
        let mut used = 0u32;
        self.set_state(ConnectionState::Connecting);

        loop {
            tracing::info!(url = %self.url, "Connecting to progress channel");

            let connected = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                result = connect_async(self.url.as_str()) => result,
            };

            match connected {
                Ok((ws_stream, _response)) => {
                    used = 0;
                    self.set_state(ConnectionState::Connected);
                    tracing::info!(url = %self.url, "Progress channel connected");
                    if run_session(ws_stream, cancel, &mut on_event).await == SessionEnd::Cancelled {
                        return Ok(());
                    }
                    tracing::warn!(url = %self.url, "Progress channel disconnected");
                }
                Err(e) => {
                    tracing::warn!(url = %self.url, error = %e, "Progress channel connection failed");
                }
            }

            let Some(attempt) = self.policy.next_attempt(used) else {
                self.set_state(ConnectionState::Unreachable);
                return Err(ObserverError::Unreachable {
                    url: self.url.clone(),
                    attempts: used,
                });
            };
            used = attempt;
            self.set_state(ConnectionState::Reconnecting { attempt });
            tracing::info!(
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = self.policy.delay.as_millis() as u64,
                "Reconnecting",
            );

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

/// Read frames until the server goes away or `cancel` fires.
async fn run_session<F>(ws_stream: WsStream, cancel: &CancellationToken, on_event: &mut F) -> SessionEnd
where
    F: FnMut(JobEvent),
{
    let (_sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = decode_message(&text) {
                        on_event(event);
                    }
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // Pongs are queued by tungstenite and flushed on the next read.
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Server closed progress channel");
                    return SessionEnd::Disconnected;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Progress channel receive error");
                    return SessionEnd::Disconnected;
                }
                None => return SessionEnd::Disconnected,
            },
        }
    }
}

/// Decode one server text frame. Unknown or malformed frames are logged
/// and ignored.
pub fn decode_message(text: &str) -> Option<JobEvent> {
    match serde_json::from_str::<JobEvent>(text) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, len = text.len(), "Ignoring unrecognised message");
            None
        }
    }
}
