//! Reconciliation & Repair Loop
//!
//! A periodic task, independent from request handling, that keeps the block map
//! honest and tops up lost replicas.
//!
//! ## Cycle
//! 1. Rebuild the block map from the latest block reports. Blocks nobody reports
//!    keep their ID with an empty replica set.
//! 2. Remove nodes whose heartbeat is older than the dead timeout from every
//!    replica set.
//! 3. Collect blocks with fewer than R replicas.
//! 4. For each of them, ask a live holder to copy the block to a live node that
//!    does not hold it yet.
//!
//! Errors end the current cycle only. Nothing is retried until the next tick.

pub mod service;

#[cfg(test)]
mod tests;
