//! Distributed Block Storage Cluster Library
//!
//! A coordinator tracks a directory namespace and maps files to fixed-size blocks
//! and blocks to the storage nodes holding their replicas. Storage nodes hold the
//! bytes, replicate them along a forwarding chain on write and copy them on
//! request when the coordinator detects lost redundancy.
//!
//! ## Architecture Modules
//!
//! - **`metadata`**: The shared state. Namespace, block map, heartbeats and block
//!   reports stored as JSON values in a key-value cache (in memory or on disk).
//! - **`registry`**: Node liveness derived from heartbeat age, and round-robin
//!   placement over the fixed node ring that skips dead nodes.
//! - **`namenode`**: The coordinator's HTTP API. Plans writes, reads and deletes
//!   and ingests heartbeats and block reports.
//! - **`checker`**: The periodic reconciliation loop. Rebuilds the block map from
//!   reports, sweeps dead nodes and dispatches repair copies.
//! - **`datanode`**: The storage node. Local block files, the write/forward
//!   pipeline, and the heartbeat and block-report senders.
//! - **`client`**: Splits files into blocks and drives the pipeline from the
//!   caller's side.
//! - **`transport`**: The HTTP client every component uses to reach its peers.

pub mod checker;
pub mod client;
pub mod config;
pub mod datanode;
pub mod error;
pub mod metadata;
pub mod namenode;
pub mod registry;
pub mod transport;
