//! Coordinator (Metadata Authority)
//!
//! Owns the namespace and the block map, decides where new blocks go and answers
//! clients with replica locations. It never moves block bytes itself.
//!
//! ## Write path
//! `POST /file/` allocates `ceil(size / block_size)` block IDs starting at
//! `max + 1`, assigns each one R distinct live nodes by round-robin and records
//! both the placement and the file before answering. The client then pushes the
//! bytes to the storage nodes.
//!
//! ## Node ingestion
//! Heartbeats update the liveness table immediately. Block reports are only
//! buffered; they reach the block map on the repair loop's next rebuild.

pub mod handlers;
pub mod protocol;
pub mod service;
