//! Metadata Store Module
//!
//! The single source of truth for the namespace and the block map. Every value is
//! JSON-encoded under a well-known key in a shared key-value cache, so the
//! coordinator, the repair loop and the storage nodes all read and write the same
//! state instead of holding private copies.
//!
//! ## Keys
//! - **`block_list`**: block ID -> node IDs believed to hold a replica.
//! - **`block_temp`**: node ID -> block IDs from that node's latest block report.
//! - **`file_dir`**: file name -> `{directory: [block IDs]}`.
//! - **`heartbeats`**: node ID -> last heartbeat (ms since the epoch).
//! - **`directories`**: every known directory path.
//! - **`block_data`**: a storage node's own inventory (kept in the node's cache).
//!
//! Updates are plain read-modify-write round trips; two concurrent writers of the
//! same key race and the later write wins.

pub mod kv;
pub mod store;
pub mod types;
