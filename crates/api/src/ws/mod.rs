//! Live observer connections.
//!
//! Provides the observer hub (registration, fan-out, per-observer
//! heartbeat) and the HTTP upgrade handler used by Axum routes.

mod handler;
mod heartbeat;
pub mod hub;

pub use handler::ws_handler;
pub use hub::{HeartbeatConfig, ObserverHub, TransportError};
