//! Medical data validation API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! observer hub, job orchestration) so integration tests and the binary
//! entrypoint can both access them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod query;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
