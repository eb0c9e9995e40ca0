use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use super::block_store::LocalBlockStore;
use super::protocol::*;
use crate::config::ClusterConfig;
use crate::error::{DfsError, DfsResult};
use crate::metadata::kv::KvStore;
use crate::metadata::types::{BlockId, KEY_BLOCK_DATA, NodeId};
use crate::namenode::protocol::{
    BlockReportRequest, ENDPOINT_BLOCK_REPORT, ENDPOINT_HEARTBEAT, HeartbeatRequest,
};
use crate::transport::{MessageResponse, PeerClient};

/// A storage node: holds block bytes, takes part in the write pipeline and
/// reports itself to the coordinator.
pub struct DataNode {
    id: NodeId,
    blocks: LocalBlockStore,
    /// Mirror of `inventory` under `block_data`.
    kv: Arc<dyn KvStore>,
    inventory: Mutex<BTreeSet<BlockId>>,
    peers: PeerClient,
    config: Arc<ClusterConfig>,
}

impl DataNode {
    /// Opens the node over `blocks`. The inventory is taken from what is on disk.
    pub async fn open(
        id: NodeId,
        blocks: LocalBlockStore,
        kv: Arc<dyn KvStore>,
        peers: PeerClient,
        config: Arc<ClusterConfig>,
    ) -> DfsResult<Arc<Self>> {
        let on_disk: BTreeSet<BlockId> = blocks.list().await?.into_iter().collect();
        tracing::info!(
            "Data node {} holds {} blocks in {:?}",
            id,
            on_disk.len(),
            blocks.root()
        );

        let node = Self {
            id,
            blocks,
            kv,
            inventory: Mutex::new(BTreeSet::new()),
            peers,
            config,
        };
        node.update_inventory(|inventory| *inventory = on_disk)?;
        Ok(Arc::new(node))
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn inventory(&self) -> Vec<BlockId> {
        self.inventory
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .copied()
            .collect()
    }

    fn update_inventory<F>(&self, change: F) -> DfsResult<()>
    where
        F: FnOnce(&mut BTreeSet<BlockId>),
    {
        let mut inventory = self.inventory.lock().unwrap_or_else(|e| e.into_inner());
        change(&mut inventory);
        let snapshot: Vec<BlockId> = inventory.iter().copied().collect();
        self.kv.set(KEY_BLOCK_DATA, serde_json::to_string(&snapshot)?)
    }

    async fn store_locally(&self, block: BlockId, bytes: &[u8]) -> DfsResult<()> {
        self.blocks.put(block, bytes).await?;
        self.update_inventory(|inventory| {
            inventory.insert(block);
        })
    }

    // ============================================================
    // WRITE PIPELINE
    // ============================================================

    /// Stores the block, then forwards it to each node of `copy_nodes` in order.
    ///
    /// A failed forward is logged and skipped; the write still succeeds.
    pub async fn write_block(
        &self,
        file_name: &str,
        block: BlockId,
        bytes: Vec<u8>,
        copy_nodes: &[NodeId],
    ) -> DfsResult<String> {
        self.store_locally(block, &bytes).await?;
        tracing::info!("Stored block {} of {} ({} bytes)", block, file_name, bytes.len());

        let mut forwarded = Vec::new();
        for target in copy_nodes {
            if target == &self.id {
                continue;
            }
            match self.forward(file_name, block, &bytes, target).await {
                Ok(()) => forwarded.push(target.clone()),
                Err(e) => {
                    tracing::warn!("Forwarding block {} to {} failed: {}", block, target, e)
                }
            }
        }

        Ok(format!(
            "Block {} written to {} and forwarded to {:?}",
            block, self.id, forwarded
        ))
    }

    /// Stores a replica pushed by another node.
    pub async fn receive_forward(&self, file_name: &str, block: BlockId, bytes: Vec<u8>) -> DfsResult<String> {
        self.store_locally(block, &bytes).await?;
        tracing::info!("Stored forwarded block {} of {}", block, file_name);
        Ok(format!("Block {} written to dn {}", block, self.id))
    }

    async fn forward(&self, file_name: &str, block: BlockId, bytes: &[u8], target: &NodeId) -> DfsResult<()> {
        let base = self
            .config
            .node_url(target)
            .ok_or_else(|| DfsError::NotFound(format!("node {}", target)))?;
        let url = PeerClient::endpoint(
            base,
            &[ENDPOINT_FORWARD_BLOCK, file_name, &block.to_string()],
        )?;

        let request = ForwardBlockRequest {
            block_body: bytes.to_vec(),
        };
        let _: MessageResponse = self.peers.post_json(url, &request).await?;
        tracing::debug!("Forwarded block {} to {}", block, target);
        Ok(())
    }

    // ============================================================
    // READ / DELETE / REPAIR
    // ============================================================

    pub async fn read_block(&self, block: BlockId) -> DfsResult<Vec<u8>> {
        self.blocks
            .get(block)
            .await?
            .ok_or_else(|| DfsError::NotFound(format!("block {} on {}", block, self.id)))
    }

    pub async fn delete_block(&self, block: BlockId) -> DfsResult<String> {
        let removed = self.blocks.delete(block).await?;
        self.update_inventory(|inventory| {
            inventory.remove(&block);
        })?;

        if !removed {
            return Err(DfsError::NotFound(format!("block {} on {}", block, self.id)));
        }

        tracing::info!("Deleted block {}", block);
        Ok(format!("Block {} deleted from {}", block, self.id))
    }

    /// Sends the local replica of `block` to `target`, on the checker's request.
    pub async fn copy_block(&self, block: BlockId, target: &NodeId) -> DfsResult<String> {
        let bytes = self.read_block(block).await?;
        self.forward(&format!("{}_file", block), block, &bytes, target)
            .await?;

        tracing::info!("Copied block {} to {}", block, target);
        Ok(format!("Block {} forwarded to {}", block, target))
    }

    // ============================================================
    // REPORTING
    // ============================================================

    pub async fn send_heartbeat(&self) -> DfsResult<()> {
        let url = PeerClient::endpoint(&self.config.namenode_url, &[ENDPOINT_HEARTBEAT, ""])?;
        let request = HeartbeatRequest {
            id: self.id.clone(),
        };
        let reply: MessageResponse = self.peers.put_json(url, &request).await?;
        tracing::debug!("{}", reply.message);
        Ok(())
    }

    pub async fn send_block_report(&self) -> DfsResult<()> {
        let url = PeerClient::endpoint(&self.config.namenode_url, &[ENDPOINT_BLOCK_REPORT, ""])?;
        let request = BlockReportRequest {
            id: self.id.clone(),
            block_data: self.inventory(),
        };
        let reply: MessageResponse = self.peers.put_json(url, &request).await?;
        tracing::debug!("{}", reply.message);
        Ok(())
    }

    /// Spawns the heartbeat and block-report loops.
    pub fn start_reporting(self: Arc<Self>) {
        tracing::info!("Starting heartbeat and block report senders for {}", self.id);

        let _heartbeat_handle = {
            let node = self.clone();
            tokio::spawn(async move {
                node.heartbeat_loop().await;
            })
        };

        let _report_handle = {
            let node = self.clone();
            tokio::spawn(async move {
                node.block_report_loop().await;
            })
        };
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.heartbeat_interval());

        loop {
            interval.tick().await;
            if let Err(e) = self.send_heartbeat().await {
                tracing::warn!("Heartbeat from {} not delivered: {}", self.id, e);
            }
        }
    }

    async fn block_report_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.block_report_interval());

        loop {
            interval.tick().await;
            if let Err(e) = self.send_block_report().await {
                tracing::warn!("Block report from {} not delivered: {}", self.id, e);
            }
        }
    }
}
