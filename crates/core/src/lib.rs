//! Domain logic for the data validation service.
//!
//! Everything here is free of HTTP concerns: the worker process adapter,
//! the line protocol decoder, job bookkeeping, upload checks and result
//! file access. The `medval-api` crate wires these into the server.

pub mod decoder;
pub mod error;
pub mod events;
pub mod job;
pub mod results;
pub mod types;
pub mod upload;
pub mod worker;
