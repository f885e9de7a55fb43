//! Route tree.
//!
//! ```text
//! /health                              service health (timed)
//! /ws                                  observer WebSocket
//!
//! /api/upload                          submit a job (POST, untimed)
//! /api/download/{filename}             raw result file (timed)
//! /api/result/{filename}               parsed result rows (timed)
//! /api/result/{filename}/summary       conformance counts (timed)
//! ```

pub mod health;
pub mod jobs;
pub mod results;
