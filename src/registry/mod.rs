//! Node Registry & Placement Module
//!
//! Tracks storage-node liveness from heartbeat timestamps and hands out nodes for
//! new replicas in round-robin ring order.
//!
//! ## Core Mechanisms
//! - **Liveness**: a node is alive iff `now - last_heartbeat <= dead_timeout`. A node
//!   that never sent a heartbeat is not alive. Liveness is recomputed on every query.
//! - **Round-robin placement**: a process-local cursor walks the fixed ring and skips
//!   dead nodes. The cursor is not persisted; a restart only resets fairness.
//! - **Dead-node sweep**: removes dead nodes from every replica set in the block map.

pub mod service;

#[cfg(test)]
mod tests;
