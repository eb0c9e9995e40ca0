use rand::seq::SliceRandom;
use reqwest::Url;
use std::sync::Arc;

use crate::config::ClusterConfig;
use crate::datanode::protocol::{ENDPOINT_BLOCK, ReadBlockResponse, WriteBlockRequest};
use crate::error::{DfsError, DfsResult};
use crate::metadata::types::{BlockId, BlockMap, NodeId};
use crate::namenode::protocol::*;
use crate::transport::{MessageResponse, PeerClient};

/// Cuts `data` into consecutive chunks of exactly `block_size` bytes; the last
/// one may be shorter. Empty input yields no chunks.
pub fn split_into_chunks(data: &[u8], block_size: u64) -> Vec<&[u8]> {
    let size = usize::try_from(block_size).unwrap_or(usize::MAX).max(1);
    data.chunks(size).collect()
}

#[derive(Debug, Default)]
pub struct WriteSummary {
    pub written: Vec<BlockId>,
    /// Blocks no replica accepted.
    pub failed: Vec<BlockId>,
}

#[derive(Debug, Default)]
pub struct DeleteSummary {
    pub deleted: Vec<(BlockId, NodeId)>,
    pub failed: Vec<(BlockId, NodeId, String)>,
}

/// Client side of the cluster: asks the coordinator for plans and moves block
/// bytes to and from storage nodes.
pub struct DfsClient {
    peers: PeerClient,
    config: Arc<ClusterConfig>,
}

impl DfsClient {
    pub fn new(config: Arc<ClusterConfig>, peers: PeerClient) -> Self {
        Self { peers, config }
    }

    fn namenode(&self, segments: &[&str]) -> DfsResult<Url> {
        PeerClient::endpoint(&self.config.namenode_url, segments)
    }

    fn node(&self, node: &NodeId, segments: &[&str]) -> DfsResult<Url> {
        let base = self
            .config
            .node_url(node)
            .ok_or_else(|| DfsError::NotFound(format!("node {}", node)))?;
        PeerClient::endpoint(base, segments)
    }

    // ============================================================
    // DIRECTORIES
    // ============================================================

    pub async fn mkdir(&self, path: &str) -> DfsResult<String> {
        let url = self.namenode(&[ENDPOINT_DIRECTORIES, path, ""])?;
        let reply: MessageResponse = self.peers.get_json(url).await?;
        Ok(reply.message)
    }

    pub async fn mkdir_parent(&self, parent: &str, name: &str) -> DfsResult<String> {
        let url = self.namenode(&[ENDPOINT_DIRECTORIES, "sub", parent, name, ""])?;
        let reply: MessageResponse = self.peers.get_json(url).await?;
        Ok(reply.message)
    }

    pub async fn rmdir(&self, path: &str) -> DfsResult<String> {
        let url = self.namenode(&[ENDPOINT_DIRECTORIES, ""])?;
        let request = DirectoryRequest {
            directory: path.to_string(),
        };
        let reply: MessageResponse = self.peers.delete_with_body(url, &request).await?;
        Ok(reply.message)
    }

    pub async fn rmdir_parent(&self, parent: &str, name: &str) -> DfsResult<String> {
        let url = self.namenode(&[ENDPOINT_DIRECTORIES, "sub_dir", ""])?;
        let request = DeleteSubdirectoryRequest {
            parent: parent.to_string(),
            sub_directory: name.to_string(),
        };
        let reply: MessageResponse = self.peers.delete_with_body(url, &request).await?;
        Ok(reply.message)
    }

    pub async fn ls(&self, path: &str) -> DfsResult<String> {
        let url = self.namenode(&[ENDPOINT_DIRECTORIES, ""])?;
        let request = DirectoryRequest {
            directory: path.to_string(),
        };
        let reply: MessageResponse = self.peers.post_json(url, &request).await?;
        Ok(reply.message)
    }

    // ============================================================
    // FILES
    // ============================================================

    /// Plans the file, then sends each chunk to the head of its replica set with
    /// the rest of the set as forwarding list.
    ///
    /// If the head is offline the next replica takes its place, so a block is
    /// only reported failed when no replica accepted it.
    pub async fn write_file(&self, name: &str, directory: &str, data: &[u8]) -> DfsResult<WriteSummary> {
        let request = WriteFileRequest {
            file_name: name.to_string(),
            directory: directory.to_string(),
            size: data.len() as u64,
        };
        let plan: WritePlanResponse = self
            .peers
            .post_json(self.namenode(&[ENDPOINT_FILE, ""])?, &request)
            .await?;

        let chunks = split_into_chunks(data, plan.block_size);
        if chunks.len() as u64 != plan.block_count {
            return Err(DfsError::Malformed(format!(
                "plan has {} blocks but the data splits into {}",
                plan.block_count,
                chunks.len()
            )));
        }

        let mut summary = WriteSummary::default();
        for ((block, replicas), chunk) in plan.blocks_and_dns.iter().zip(chunks) {
            if self.push_block(name, *block, replicas, chunk).await {
                summary.written.push(*block);
            } else {
                summary.failed.push(*block);
            }
        }

        tracing::info!(
            "Wrote {} to {}: {} blocks stored, {} failed",
            name,
            directory,
            summary.written.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    async fn push_block(&self, name: &str, block: BlockId, replicas: &[NodeId], chunk: &[u8]) -> bool {
        // The head waits for every forward before answering.
        let peers = self
            .peers
            .with_timeout(self.config.request_timeout() * replicas.len().max(1) as u32);
        let block_id = block.to_string();

        for (i, head) in replicas.iter().enumerate() {
            let url = match self.node(head, &[ENDPOINT_BLOCK, name, &block_id]) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!("Skipping {} for block {}: {}", head, block, e);
                    continue;
                }
            };
            let request = WriteBlockRequest {
                block_body: chunk.to_vec(),
                copy_node: replicas[i + 1..].to_vec(),
            };

            match peers.post_json::<_, MessageResponse>(url, &request).await {
                Ok(reply) => {
                    tracing::debug!("{}", reply.message);
                    return true;
                }
                Err(e) => tracing::warn!("Block {} not written to {}: {}", block, head, e),
            }
        }

        false
    }

    /// Fetches every block from a randomly chosen replica, falling back to the
    /// others, and concatenates them in block order.
    pub async fn read_file(&self, name: &str, directory: &str) -> DfsResult<Vec<u8>> {
        let blocks = self.block_locations(name, directory).await?;

        let mut data = Vec::new();
        for (block, replicas) in &blocks {
            data.extend(self.fetch_block(*block, replicas).await?);
        }
        Ok(data)
    }

    async fn fetch_block(&self, block: BlockId, replicas: &[NodeId]) -> DfsResult<Vec<u8>> {
        let mut candidates = replicas.to_vec();
        candidates.shuffle(&mut rand::thread_rng());

        let block_id = block.to_string();
        let mut last_error = DfsError::MissingBlocks(vec![block]);
        for node in &candidates {
            let reply = match self.node(node, &[ENDPOINT_BLOCK, &block_id, ""]) {
                Ok(url) => self.peers.get_json::<ReadBlockResponse>(url).await,
                Err(e) => Err(e),
            };
            match reply {
                Ok(reply) => return Ok(reply.block_body),
                Err(e) => {
                    tracing::warn!("Block {} not readable from {}: {}", block, node, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Removes the file from the namespace, then deletes every replica. A replica
    /// that cannot be deleted is recorded and left behind.
    pub async fn delete_file(&self, name: &str, directory: &str) -> DfsResult<DeleteSummary> {
        let url = self.namenode(&[ENDPOINT_FILE, directory, name])?;
        let plan: DeletePlanResponse = self.peers.delete_json(url).await?;

        let mut summary = DeleteSummary::default();
        for (block, replicas) in &plan.blocks_and_dns {
            let block_id = block.to_string();
            for node in replicas {
                let reply = match self.node(node, &[ENDPOINT_BLOCK, &block_id, ""]) {
                    Ok(url) => self.peers.delete_json::<MessageResponse>(url).await,
                    Err(e) => Err(e),
                };
                match reply {
                    Ok(_) => summary.deleted.push((*block, node.clone())),
                    Err(e) => {
                        tracing::warn!("Block {} not deleted from {}: {}", block, node, e);
                        summary.failed.push((*block, node.clone(), e.to_string()));
                    }
                }
            }
        }

        Ok(summary)
    }

    /// Current replica set of every block of the file, in block order.
    pub async fn block_locations(&self, name: &str, directory: &str) -> DfsResult<BlockMap> {
        let url = self.namenode(&[ENDPOINT_FILE, directory, name])?;
        let plan: ReadPlanResponse = self.peers.get_json(url).await?;
        Ok(plan.message)
    }
}
