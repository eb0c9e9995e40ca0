//! Coordinator Network Protocol
//!
//! Endpoints and DTOs of the metadata authority. Storage nodes call the
//! heartbeat and report endpoints; the client calls everything else.

use serde::{Deserialize, Serialize};

use crate::metadata::types::{BlockId, BlockMap, Directories, FileDir, Heartbeats, NodeId};

// --- API Endpoints ---

/// Liveness signal from a storage node.
pub const ENDPOINT_HEARTBEAT: &str = "heartbeat";
/// Full inventory from a storage node.
pub const ENDPOINT_BLOCK_REPORT: &str = "block_report";
/// Plan write (POST), and plan read / delete under `/file/{directory}/{name}`.
pub const ENDPOINT_FILE: &str = "file";
/// Directory management and listing.
pub const ENDPOINT_DIRECTORIES: &str = "directories";
/// Inspection dump of the shared state.
pub const ENDPOINT_VARIABLES: &str = "variables";

// --- Data Transfer Objects ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub id: NodeId,
}

/// Every block ID the node currently holds. Replaces the previous report.
#[derive(Debug, Serialize, Deserialize)]
pub struct BlockReportRequest {
    pub id: NodeId,
    pub block_data: Vec<BlockId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteFileRequest {
    pub file_name: String,
    pub directory: String,
    /// Size of the source data in bytes.
    pub size: u64,
}

/// Placement plan for a new file.
#[derive(Debug, Serialize, Deserialize)]
pub struct WritePlanResponse {
    pub block_count: u64,
    pub block_size: u64,
    pub blocks_and_dns: BlockMap,
}

/// Replica sets of a file's blocks, keyed by block ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadPlanResponse {
    pub message: BlockMap,
}

/// Replica sets the caller must now delete from, already purged from the map.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeletePlanResponse {
    pub blocks_and_dns: BlockMap,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DirectoryRequest {
    pub directory: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteSubdirectoryRequest {
    pub parent: String,
    pub sub_directory: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VariablesResponse {
    pub file_dir: FileDir,
    pub block_list: BlockMap,
    pub directories: Directories,
    pub heartbeats: Heartbeats,
}
