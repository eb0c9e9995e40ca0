//! Local Block Store
//!
//! One file per block under the node's data directory. Block contents are opaque
//! bytes; no checksums are kept.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::DfsResult;
use crate::metadata::types::BlockId;

const BLOCK_FILE_PREFIX: &str = "blk_";

pub struct LocalBlockStore {
    root: PathBuf,
}

impl LocalBlockStore {
    pub async fn open(root: impl AsRef<Path>) -> DfsResult<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, block: BlockId) -> PathBuf {
        self.root.join(format!("{}{}", BLOCK_FILE_PREFIX, block))
    }

    /// Writes (or overwrites) the block.
    pub async fn put(&self, block: BlockId, bytes: &[u8]) -> DfsResult<()> {
        tokio::fs::write(self.path_for(block), bytes).await?;
        Ok(())
    }

    /// `None` if the block is not stored here.
    pub async fn get(&self, block: BlockId) -> DfsResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(block)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns whether a block was removed.
    pub async fn delete(&self, block: BlockId) -> DfsResult<bool> {
        match tokio::fs::remove_file(self.path_for(block)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// IDs of every block file on disk, ascending.
    pub async fn list(&self) -> DfsResult<Vec<BlockId>> {
        let mut blocks = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(id) = name
                .to_str()
                .and_then(|name| name.strip_prefix(BLOCK_FILE_PREFIX))
                .and_then(|id| id.parse::<BlockId>().ok())
            {
                blocks.push(id);
            }
        }

        blocks.sort_unstable();
        Ok(blocks)
    }
}
