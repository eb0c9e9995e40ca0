//! Storage Node Network Protocol
//!
//! Endpoints and DTOs of a storage node. Block bodies travel as JSON byte arrays.

use serde::{Deserialize, Serialize};

use crate::metadata::types::{BlockId, NodeId};

// --- API Endpoints ---

/// Client write: `/block/{file}/{blockID}` (POST). Read and delete use
/// `/block/{blockID}/`.
pub const ENDPOINT_BLOCK: &str = "block";
/// Node-to-node replica push: `/forward_block/{file}/{blockID}`.
pub const ENDPOINT_FORWARD_BLOCK: &str = "forward_block";
/// Repair instruction from the checker to a source node.
pub const ENDPOINT_COPY_BLOCK: &str = "copy_block_data";
/// Inspection dump of the node's inventory.
pub const ENDPOINT_VARIABLES: &str = "variables";

// --- Data Transfer Objects ---

/// First hop of the write pipeline.
#[derive(Debug, Serialize, Deserialize)]
pub struct WriteBlockRequest {
    pub block_body: Vec<u8>,
    /// Nodes this node forwards the block to, in order.
    #[serde(default)]
    pub copy_node: Vec<NodeId>,
}

/// A forwarded replica. The receiver stores it and does not forward further.
#[derive(Debug, Serialize, Deserialize)]
pub struct ForwardBlockRequest {
    pub block_body: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadBlockResponse {
    pub block_body: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CopyBlockRequest {
    pub block_name: BlockId,
    pub copy_node: NodeId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeVariablesResponse {
    pub id: NodeId,
    pub blocks: Vec<BlockId>,
}
