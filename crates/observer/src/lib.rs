//! Observer client for the validation server's live progress channel.
//!
//! Connects to `/ws`, decodes pushed frames into
//! [`JobEvent`](medval_core::events::JobEvent)s and reconnects with a
//! fixed delay up to a bounded number of attempts.

pub mod client;
pub mod reconnect;
