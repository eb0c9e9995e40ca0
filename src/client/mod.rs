//! Cluster Client
//!
//! Drives the client half of every operation: directory commands go straight to
//! the coordinator; file writes, reads and deletes first fetch a plan from the
//! coordinator and then talk to the storage nodes it names.
//!
//! Errors are returned to the caller as-is. Nothing is retried except falling
//! back to another replica of the same block.

pub mod service;

#[cfg(test)]
mod tests;
