//! Storage Node
//!
//! Holds block bytes on local disk and serves them over HTTP.
//!
//! ## Write pipeline
//! The client sends a block to the first node of its replica set together with
//! the rest of the set. That node stores the block, then forwards the same bytes
//! to each remaining node in turn. Forwarded replicas are stored and never
//! forwarded again. A failed hop is logged and skipped.
//!
//! ## Reporting
//! Every node sends a heartbeat every `heartbeat_interval` and its full
//! inventory every `block_report_interval`. The coordinator learns about stored
//! replicas only through these reports.

pub mod block_store;
pub mod handlers;
pub mod protocol;
pub mod service;

#[cfg(test)]
mod tests;
