use std::sync::Arc;

use super::protocol::VariablesResponse;
use crate::error::{DfsError, DfsResult};
use crate::metadata::store::MetadataStore;
use crate::metadata::types::{BlockId, BlockMap, NodeId};
use crate::registry::service::NodeRegistry;

/// A placement plan for a new file.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    pub block_count: u64,
    pub block_size: u64,
    pub blocks: BlockMap,
}

/// The metadata authority: turns client requests into namespace changes and
/// placement decisions, and ingests what storage nodes report.
pub struct NameNode {
    store: Arc<MetadataStore>,
    registry: Arc<NodeRegistry>,
    block_size: u64,
    replica_count: usize,
}

impl NameNode {
    pub fn new(
        store: Arc<MetadataStore>,
        registry: Arc<NodeRegistry>,
        block_size: u64,
        replica_count: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            registry,
            block_size,
            replica_count,
        })
    }

    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    // ============================================================
    // NODE INGESTION
    // ============================================================

    pub fn receive_heartbeat(&self, node: &NodeId) -> DfsResult<String> {
        if !self.registry.ring().contains(node) {
            tracing::warn!("Heartbeat from {} which is not on the placement ring", node);
        }
        let at = self.registry.record_heartbeat(node)?;
        Ok(format!("Received heartbeat from {} on {}", node, at))
    }

    /// Buffers the node's inventory; the repair loop folds it into the block map.
    pub fn receive_block_report(&self, node: &NodeId, blocks: Vec<BlockId>) -> DfsResult<String> {
        tracing::debug!("Block report from {}: {:?}", node, blocks);
        let message = format!("Received block report for {:?} on datanode {}", blocks, node);
        self.store.record_inventory(node, blocks)?;
        Ok(message)
    }

    // ============================================================
    // PLACEMENT
    // ============================================================

    /// Allocates `ceil(size / block_size)` fresh block IDs, assigns each up to R
    /// distinct live nodes and records the file.
    pub fn plan_write(&self, name: &str, directory: &str, size: u64) -> DfsResult<WritePlan> {
        self.store.ensure_creatable(name, directory)?;

        let block_count = size.div_ceil(self.block_size);
        let first_id = self.store.next_block_id()?;

        let mut blocks = BlockMap::new();
        for block in first_id..first_id + block_count {
            let replicas = self.registry.select_replicas(self.replica_count)?;
            if replicas.is_empty() {
                return Err(DfsError::NoLiveNodes);
            }
            if replicas.len() < self.replica_count {
                tracing::warn!(
                    "Block {} placed on {} of {} replicas, the repair loop will top it up",
                    block,
                    replicas.len(),
                    self.replica_count
                );
            }
            blocks.insert(block, replicas);
        }

        self.store.record_placement(&blocks)?;
        self.store
            .create_file(name, directory, blocks.keys().copied().collect())?;

        tracing::info!(
            "Planned {} in {} ({} bytes) as {} blocks: {:?}",
            name,
            directory,
            size,
            block_count,
            blocks
        );

        Ok(WritePlan {
            block_count,
            block_size: self.block_size,
            blocks,
        })
    }

    /// Current replica set of every block of the file.
    pub fn plan_read(&self, name: &str, directory: &str) -> DfsResult<BlockMap> {
        let file_blocks = self.store.file_blocks(name, directory)?;
        let block_map = self.store.block_map()?;

        let missing: Vec<BlockId> = file_blocks
            .iter()
            .filter(|block| !block_map.contains_key(block))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(DfsError::MissingBlocks(missing));
        }

        Ok(file_blocks
            .into_iter()
            .map(|block| (block, block_map[&block].clone()))
            .collect())
    }

    /// Removes the file and its blocks from the metadata and returns the replica
    /// sets the caller has to delete from.
    pub fn plan_delete(&self, name: &str, directory: &str) -> DfsResult<BlockMap> {
        let file_blocks = self.store.delete_file(name, directory)?;
        let mut purged = self.store.purge_blocks(&file_blocks)?;

        // Blocks that were already gone from the map have nobody to delete from.
        for block in &file_blocks {
            purged.entry(*block).or_default();
        }

        tracing::info!("Deleted {} from {}, blocks: {:?}", name, directory, purged);
        Ok(purged)
    }

    // ============================================================
    // DIRECTORIES
    // ============================================================

    pub fn create_directory(&self, path: &str) -> DfsResult<String> {
        self.store.create_directory(path)?;
        Ok(format!("Made directory {}", path))
    }

    pub fn create_subdirectory(&self, parent: &str, name: &str) -> DfsResult<String> {
        let path = self.store.create_subdirectory(parent, name)?;
        Ok(format!("Made sub directory {}", path))
    }

    pub fn delete_directory(&self, path: &str) -> DfsResult<String> {
        self.store.delete_directory(path)?;
        Ok(format!("Directory {} removed successfully", path))
    }

    pub fn delete_subdirectory(&self, parent: &str, name: &str) -> DfsResult<String> {
        let path = self.store.delete_subdirectory(parent, name)?;
        Ok(format!("Sub directory {} deleted", path))
    }

    /// Renders the directory as
    ///
    /// ```text
    /// DIR: data
    ///   -- a.txt
    ///   -> data\logs
    /// ```
    pub fn list_directory(&self, path: &str) -> DfsResult<String> {
        if !self.store.directory_exists(path)? {
            return Err(DfsError::NotFound(format!("directory {}", path)));
        }

        let listing = self.store.list_directory(path)?;
        let mut pretty = format!("DIR: {}\n", listing.directory());
        for file in listing.iter() {
            pretty.push_str(&format!("  -- {}\n", file));
        }
        for child in self.store.subdirectories(path)? {
            pretty.push_str(&format!("  -> {}\n", child));
        }
        Ok(pretty)
    }

    pub fn variables(&self) -> DfsResult<VariablesResponse> {
        Ok(VariablesResponse {
            file_dir: self.store.file_dir()?,
            block_list: self.store.block_map()?,
            directories: self.store.directories()?,
            heartbeats: self.store.heartbeats()?,
        })
    }
}
