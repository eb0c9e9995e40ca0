use std::sync::Arc;

use crate::config::ClusterConfig;
use crate::datanode::protocol::{CopyBlockRequest, ENDPOINT_COPY_BLOCK};
use crate::error::{DfsError, DfsResult};
use crate::metadata::store::MetadataStore;
use crate::metadata::types::{BlockId, BlockMap, NodeId};
use crate::registry::service::NodeRegistry;
use crate::transport::{MessageResponse, PeerClient};

/// One copy instruction: `source` sends its replica of `block` to `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairTask {
    pub block: BlockId,
    pub source: NodeId,
    pub target: NodeId,
}

/// What one pass of the loop observed and did.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub dead_nodes: Vec<NodeId>,
    pub under_replicated: Vec<BlockId>,
    pub dispatched: Vec<RepairTask>,
    pub unrecoverable: Vec<BlockId>,
    pub failed: Vec<BlockId>,
}

/// Blocks holding fewer than `replica_count` replicas, in block-ID order.
pub fn under_replicated(block_map: &BlockMap, replica_count: usize) -> Vec<BlockId> {
    block_map
        .iter()
        .filter(|(_, owners)| owners.len() < replica_count)
        .map(|(block, _)| *block)
        .collect()
}

pub struct ReplicaChecker {
    store: Arc<MetadataStore>,
    registry: Arc<NodeRegistry>,
    peers: PeerClient,
    config: Arc<ClusterConfig>,
}

impl ReplicaChecker {
    pub fn new(
        store: Arc<MetadataStore>,
        registry: Arc<NodeRegistry>,
        peers: PeerClient,
        config: Arc<ClusterConfig>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            registry,
            peers,
            config,
        })
    }

    /// Rebuilds the block map from the buffered reports and strips dead nodes.
    ///
    /// Returns the resulting map and the nodes that were swept.
    pub fn reconcile(&self) -> DfsResult<(BlockMap, Vec<NodeId>)> {
        let inventories = self.store.inventories()?;
        let known: Vec<BlockId> = self.store.block_map()?.keys().copied().collect();

        let rebuilt = self.store.rebuild_block_map(&inventories, known)?;
        tracing::debug!("Rebuilt block map with {} blocks", rebuilt.len());

        let dead = self.registry.sweep_dead_nodes()?;
        Ok((self.store.block_map()?, dead))
    }

    /// Chooses a source and a target for every under-replicated block.
    ///
    /// Returns the tasks plus the blocks that have no live replica left.
    pub fn plan_repairs(&self, block_map: &BlockMap) -> DfsResult<(Vec<RepairTask>, Vec<BlockId>)> {
        let mut tasks = Vec::new();
        let mut unrecoverable = Vec::new();

        for block in under_replicated(block_map, self.config.replica_count) {
            let owners = &block_map[&block];

            let mut source = None;
            for owner in owners {
                if self.registry.is_alive(owner)? {
                    source = Some(owner.clone());
                    break;
                }
            }
            let Some(source) = source else {
                tracing::warn!("Block {} has no live replica and cannot be repaired", block);
                unrecoverable.push(block);
                continue;
            };

            match self.registry.next_available_node_excluding(owners)? {
                Some(target) => tasks.push(RepairTask {
                    block,
                    source,
                    target,
                }),
                None => {
                    tracing::debug!("No spare live node to copy block {} to", block);
                }
            }
        }

        Ok((tasks, unrecoverable))
    }

    /// Tells the source node to push its replica to the target. Success is only
    /// observed on the target's next block report.
    pub async fn dispatch(&self, task: &RepairTask) -> DfsResult<()> {
        let base = self
            .config
            .node_url(&task.source)
            .ok_or_else(|| DfsError::NodeUnreachable(task.source.to_string()))?;
        let url = PeerClient::endpoint(base, &[ENDPOINT_COPY_BLOCK, ""])?;

        let request = CopyBlockRequest {
            block_name: task.block,
            copy_node: task.target.clone(),
        };
        let reply: MessageResponse = self.peers.post_json(url, &request).await?;

        tracing::info!(
            "Repair of block {}: {} -> {} ({})",
            task.block,
            task.source,
            task.target,
            reply.message
        );
        Ok(())
    }

    /// Runs rebuild, dead sweep, scan and dispatch once.
    pub async fn run_cycle(&self) -> DfsResult<CycleReport> {
        let (block_map, dead_nodes) = self.reconcile()?;
        let under = under_replicated(&block_map, self.config.replica_count);
        let (tasks, unrecoverable) = self.plan_repairs(&block_map)?;

        let mut report = CycleReport {
            dead_nodes,
            under_replicated: under,
            unrecoverable,
            ..CycleReport::default()
        };

        for task in tasks {
            match self.dispatch(&task).await {
                Ok(()) => report.dispatched.push(task),
                Err(e) => {
                    tracing::warn!("Could not repair block {}: {}", task.block, e);
                    report.failed.push(task.block);
                }
            }
        }

        if !report.under_replicated.is_empty() {
            tracing::info!(
                "Check cycle: {} under-replicated, {} copies dispatched, {} unrecoverable",
                report.under_replicated.len(),
                report.dispatched.len(),
                report.unrecoverable.len()
            );
        }

        Ok(report)
    }

    /// Repeats [`run_cycle`](Self::run_cycle) every `check_interval` until the
    /// process exits. A failed cycle is logged and the next one starts on time.
    pub async fn run(self: Arc<Self>) {
        let period = self.config.check_interval();
        tracing::info!("Repair loop started, checking every {:?}", period);

        let mut interval = tokio::time::interval(period);
        // The first tick fires immediately; give nodes one period to report.
        interval.tick().await;

        loop {
            interval.tick().await;
            if let Err(e) = self.run_cycle().await {
                tracing::error!("Check cycle failed: {}", e);
            }
        }
    }
}
