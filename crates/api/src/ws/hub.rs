use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use medval_core::events::JobEvent;
use medval_core::types::Timestamp;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::heartbeat::{spawn_heartbeat, HeartbeatStatus};

/// Channel sender half for pushing messages to an observer connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Liveness settings applied to every observer.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    /// Time between pings.
    pub interval: Duration,
    /// Silence after which the observer is considered dead.
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(90),
        }
    }
}

/// Delivery to one observer failed. Never surfaced to broadcasters; the
/// observer is simply dropped.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("observer channel closed")]
    ChannelClosed,
}

/// A registered live observer.
struct Observer {
    sender: WsSender,
    connected_at: Timestamp,
    last_seen: Instant,
    heartbeat: Option<JoinHandle<()>>,
}

impl Observer {
    fn deliver(&self, message: Message) -> Result<(), TransportError> {
        self.sender
            .send(message)
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn stop_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
    }
}

/// The set of live observers and fan-out of job events to them.
///
/// Every event goes to every registered observer. Events are not scoped to
/// the job that produced them.
pub struct ObserverHub {
    observers: RwLock<HashMap<String, Observer>>,
    heartbeat: HeartbeatConfig,
}

impl ObserverHub {
    /// Panics if the heartbeat interval is zero.
    pub fn new(heartbeat: HeartbeatConfig) -> Self {
        assert!(
            !heartbeat.interval.is_zero(),
            "heartbeat interval must be non-zero"
        );
        Self {
            observers: RwLock::new(HashMap::new()),
            heartbeat,
        }
    }

    /// Longest a single outbound frame may take to reach an observer.
    pub fn send_timeout(&self) -> Duration {
        self.heartbeat.timeout
    }

    /// Register an observer and start its heartbeat.
    ///
    /// Returns the receiver half of the outbound channel so the caller can
    /// forward messages to the socket. Re-registering an id replaces the
    /// previous observer.
    pub async fn register(self: &Arc<Self>, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let heartbeat = spawn_heartbeat(Arc::downgrade(self), conn_id.clone(), self.heartbeat);
        let observer = Observer {
            sender: tx,
            connected_at: chrono::Utc::now(),
            last_seen: Instant::now(),
            heartbeat: Some(heartbeat),
        };

        let mut observers = self.observers.write().await;
        if let Some(mut previous) = observers.insert(conn_id.clone(), observer) {
            previous.stop_heartbeat();
        }
        tracing::debug!(conn_id = %conn_id, count = observers.len(), "Observer registered");
        rx
    }

    /// Remove an observer and stop its heartbeat. Unknown ids are a no-op.
    ///
    /// Returns whether an observer was removed.
    pub async fn unregister(&self, conn_id: &str) -> bool {
        let removed = self.observers.write().await.remove(conn_id);
        match removed {
            Some(mut observer) => {
                observer.stop_heartbeat();
                let connected_secs = (chrono::Utc::now() - observer.connected_at).num_seconds();
                tracing::debug!(conn_id = %conn_id, connected_secs, "Observer unregistered");
                true
            }
            None => false,
        }
    }

    /// Record inbound traffic from an observer.
    pub async fn touch(&self, conn_id: &str) {
        if let Some(observer) = self.observers.write().await.get_mut(conn_id) {
            observer.last_seen = Instant::now();
        }
    }

    /// Push a job event to every observer.
    ///
    /// The event is serialized once. Observers that can no longer be
    /// reached are removed. Returns the number of observers that received
    /// the event.
    pub async fn broadcast(&self, event: &JobEvent) -> usize {
        tracing::debug!(kind = event.message_type(), "Broadcasting job event");
        self.broadcast_message(Message::Text(event.to_json().into()))
            .await
    }

    /// Push a raw frame to every observer, dropping unreachable ones.
    pub async fn broadcast_message(&self, message: Message) -> usize {
        let mut observers = self.observers.write().await;
        observers.retain(|conn_id, observer| match observer.deliver(message.clone()) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "Dropping unreachable observer");
                observer.stop_heartbeat();
                false
            }
        });
        observers.len()
    }

    /// Return the current number of registered observers.
    pub async fn connection_count(&self) -> usize {
        self.observers.read().await.len()
    }

    /// Send a Close frame to every observer, then clear the set.
    pub async fn shutdown_all(&self) {
        let mut observers = self.observers.write().await;
        let count = observers.len();
        for observer in observers.values_mut() {
            let _ = observer.deliver(Message::Close(None));
            observer.stop_heartbeat();
        }
        observers.clear();
        tracing::info!(count, "Closed all observer connections");
    }

    /// One heartbeat step for one observer, run from its heartbeat task.
    ///
    /// A stale observer is sent a Close frame and removed. The heartbeat
    /// handle is detached rather than aborted since the caller is that task.
    pub(crate) async fn heartbeat_tick(&self, conn_id: &str) -> HeartbeatStatus {
        let mut observers = self.observers.write().await;
        let Some(observer) = observers.get(conn_id) else {
            return HeartbeatStatus::Gone;
        };

        if observer.last_seen.elapsed() > self.heartbeat.timeout {
            let _ = observer.deliver(Message::Close(None));
            observers.remove(conn_id);
            return HeartbeatStatus::Stale;
        }

        match observer.deliver(Message::Ping(Bytes::new())) {
            Ok(()) => HeartbeatStatus::Alive,
            Err(_) => {
                observers.remove(conn_id);
                HeartbeatStatus::Gone
            }
        }
    }
}

impl Default for ObserverHub {
    fn default() -> Self {
        Self::new(HeartbeatConfig::default())
    }
}
