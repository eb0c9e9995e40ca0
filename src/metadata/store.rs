use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::kv::{KvStore, MemoryKvStore};
use super::types::*;
use crate::error::{DfsError, DfsResult};

/// Namespace and block-map repository over a shared key-value cache.
///
/// The store holds no state of its own: every operation loads the affected keys,
/// mutates them in memory and writes them back.
pub struct MetadataStore {
    kv: Arc<dyn KvStore>,
}

impl MetadataStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Isolated in-memory store, used by tests and single-process clusters.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKvStore::new()))
    }

    /// Seeds every key with an empty value unless it is already present, so a
    /// restarted coordinator keeps its namespace.
    pub fn initialize(&self) -> DfsResult<()> {
        for key in [
            KEY_BLOCK_LIST,
            KEY_BLOCK_TEMP,
            KEY_FILE_DIR,
            KEY_HEARTBEATS,
            KEY_DIRECTORIES,
        ] {
            if self.kv.get(key)?.is_none() {
                let empty = if key == KEY_DIRECTORIES { "[]" } else { "{}" };
                self.kv.set(key, empty.to_string())?;
            }
        }
        Ok(())
    }

    fn load<T: DeserializeOwned + Default>(&self, key: &str) -> DfsResult<T> {
        match self.kv.get(key)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(T::default()),
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> DfsResult<()> {
        self.kv.set(key, serde_json::to_string(value)?)
    }

    // ============================================================
    // DIRECTORIES
    // ============================================================

    pub fn directories(&self) -> DfsResult<Directories> {
        self.load(KEY_DIRECTORIES)
    }

    pub fn directory_exists(&self, path: &str) -> DfsResult<bool> {
        Ok(self.directories()?.contains(path))
    }

    /// Registers `path` and every ancestor prefix.
    pub fn create_directory(&self, path: &str) -> DfsResult<()> {
        validate_path(path)?;

        let mut directories = self.directories()?;
        if directories.contains(path) {
            return Err(DfsError::AlreadyExists(format!("directory {}", path)));
        }

        directories.extend(ancestor_paths(path));
        self.save(KEY_DIRECTORIES, &directories)?;

        tracing::info!("Created directory {}", path);
        Ok(())
    }

    /// Registers `parent` if unknown, then `parent\name`. Returns the full path.
    pub fn create_subdirectory(&self, parent: &str, name: &str) -> DfsResult<String> {
        validate_path(parent)?;
        validate_path(name)?;

        let path = join_path(parent, name);
        let mut directories = self.directories()?;
        if directories.contains(&path) {
            return Err(DfsError::AlreadyExists(format!("directory {}", path)));
        }

        directories.extend(ancestor_paths(&path));
        self.save(KEY_DIRECTORIES, &directories)?;

        tracing::info!("Created sub directory {}", path);
        Ok(path)
    }

    /// Removes `path` unless a file still lives directly in it.
    ///
    /// Sub-directories do not block the removal and stay registered.
    pub fn delete_directory(&self, path: &str) -> DfsResult<()> {
        let mut directories = self.directories()?;
        if !directories.contains(path) {
            return Err(DfsError::NotFound(format!("directory {}", path)));
        }

        let files: Vec<String> = self
            .list_directory(path)?
            .iter()
            .map(str::to_string)
            .collect();
        if !files.is_empty() {
            return Err(DfsError::NotEmpty {
                directory: path.to_string(),
                files,
            });
        }

        directories.remove(path);
        self.save(KEY_DIRECTORIES, &directories)?;

        tracing::info!("Removed directory {}", path);
        Ok(())
    }

    pub fn delete_subdirectory(&self, parent: &str, name: &str) -> DfsResult<String> {
        let path = join_path(parent, name);
        self.delete_directory(&path)?;
        Ok(path)
    }

    /// Direct children of `path`, as full paths.
    pub fn subdirectories(&self, path: &str) -> DfsResult<Vec<String>> {
        let prefix = format!("{}{}", path, DIR_SEPARATOR);
        Ok(self
            .directories()?
            .into_iter()
            .filter(|dir| {
                dir.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains(DIR_SEPARATOR))
            })
            .collect())
    }

    // ============================================================
    // FILES
    // ============================================================

    pub fn file_dir(&self) -> DfsResult<FileDir> {
        self.load(KEY_FILE_DIR)
    }

    /// Checks that `name` could be created in `directory` right now.
    ///
    /// File names are unique across the whole namespace, not per directory.
    pub fn ensure_creatable(&self, name: &str, directory: &str) -> DfsResult<()> {
        if name.is_empty() {
            return Err(DfsError::Malformed("file name is empty".into()));
        }
        if self.file_dir()?.contains_key(name) {
            return Err(DfsError::AlreadyExists(format!(
                "file {}, delete it first",
                name
            )));
        }
        if !self.directory_exists(directory)? {
            return Err(DfsError::UnknownDirectory(directory.to_string()));
        }
        Ok(())
    }

    pub fn create_file(&self, name: &str, directory: &str, blocks: Vec<BlockId>) -> DfsResult<()> {
        self.ensure_creatable(name, directory)?;

        let mut file_dir = self.file_dir()?;
        let mut entry = FileEntry::new();
        entry.insert(directory.to_string(), blocks);
        file_dir.insert(name.to_string(), entry);
        self.save(KEY_FILE_DIR, &file_dir)
    }

    /// Ordered block IDs of `name`, which must live in `directory`.
    pub fn file_blocks(&self, name: &str, directory: &str) -> DfsResult<Vec<BlockId>> {
        let file_dir = self.file_dir()?;
        let entry = file_dir
            .get(name)
            .ok_or_else(|| DfsError::NotFound(format!("file {}", name)))?;

        entry
            .get(directory)
            .cloned()
            .ok_or_else(|| DfsError::WrongDirectory {
                name: name.to_string(),
                directory: directory.to_string(),
            })
    }

    /// Removes the namespace entry and hands back its block IDs; purging them
    /// from the block map is the caller's job.
    pub fn delete_file(&self, name: &str, directory: &str) -> DfsResult<Vec<BlockId>> {
        let blocks = self.file_blocks(name, directory)?;

        let mut file_dir = self.file_dir()?;
        file_dir.remove(name);
        self.save(KEY_FILE_DIR, &file_dir)?;

        Ok(blocks)
    }

    pub fn list_directory(&self, path: &str) -> DfsResult<DirectoryListing> {
        Ok(DirectoryListing::new(path, self.file_dir()?))
    }

    // ============================================================
    // BLOCK MAP
    // ============================================================

    pub fn block_map(&self) -> DfsResult<BlockMap> {
        self.load(KEY_BLOCK_LIST)
    }

    pub fn save_block_map(&self, block_map: &BlockMap) -> DfsResult<()> {
        self.save(KEY_BLOCK_LIST, block_map)
    }

    pub fn get_block_owners(&self, block: BlockId) -> DfsResult<Vec<NodeId>> {
        Ok(self.block_map()?.remove(&block).unwrap_or_default())
    }

    /// Adds `node` to the replica set of `block` unless it is already there.
    pub fn upsert_block_owners(&self, block: BlockId, node: &NodeId) -> DfsResult<()> {
        let mut block_map = self.block_map()?;
        let owners = block_map.entry(block).or_default();
        if !owners.contains(node) {
            owners.push(node.clone());
        }
        self.save_block_map(&block_map)
    }

    /// Merges a placement plan into the block map without duplicating owners.
    pub fn record_placement(&self, plan: &BlockMap) -> DfsResult<()> {
        let mut block_map = self.block_map()?;
        for (block, nodes) in plan {
            let owners = block_map.entry(*block).or_default();
            for node in nodes {
                if !owners.contains(node) {
                    owners.push(node.clone());
                }
            }
        }
        self.save_block_map(&block_map)
    }

    /// `1 + max(existing ID)`, or 1 for an empty map.
    pub fn next_block_id(&self) -> DfsResult<BlockId> {
        Ok(self
            .block_map()?
            .keys()
            .next_back()
            .map_or(1, |max| max + 1))
    }

    /// Drops `blocks` from the block map, returning the replica sets they had.
    pub fn purge_blocks(&self, blocks: &[BlockId]) -> DfsResult<BlockMap> {
        let mut block_map = self.block_map()?;
        let mut purged = BlockMap::new();
        for block in blocks {
            if let Some(owners) = block_map.remove(block) {
                purged.insert(*block, owners);
            }
        }
        self.save_block_map(&block_map)?;
        Ok(purged)
    }

    /// Replaces the block map with one derived from `inventories` plus `known`.
    pub fn rebuild_block_map<I>(&self, inventories: &Inventories, known: I) -> DfsResult<BlockMap>
    where
        I: IntoIterator<Item = BlockId>,
    {
        let rebuilt = rebuild_block_map(inventories, known);
        self.save_block_map(&rebuilt)?;
        Ok(rebuilt)
    }

    /// Removes every replica entry for which `is_dead` holds. Returns the removed
    /// node IDs, each once.
    pub fn remove_nodes_where<F>(&self, mut is_dead: F) -> DfsResult<Vec<NodeId>>
    where
        F: FnMut(&NodeId) -> bool,
    {
        let mut block_map = self.block_map()?;
        let mut removed: Vec<NodeId> = Vec::new();

        for owners in block_map.values_mut() {
            owners.retain(|node| {
                if is_dead(node) {
                    if !removed.contains(node) {
                        removed.push(node.clone());
                    }
                    false
                } else {
                    true
                }
            });
        }

        self.save_block_map(&block_map)?;
        Ok(removed)
    }

    // ============================================================
    // HEARTBEATS & BLOCK REPORTS
    // ============================================================

    pub fn heartbeats(&self) -> DfsResult<Heartbeats> {
        self.load(KEY_HEARTBEATS)
    }

    pub fn record_heartbeat(&self, node: &NodeId, at_ms: u64) -> DfsResult<()> {
        let mut heartbeats = self.heartbeats()?;
        heartbeats.insert(node.clone(), at_ms);
        self.save(KEY_HEARTBEATS, &heartbeats)
    }

    pub fn inventories(&self) -> DfsResult<Inventories> {
        self.load(KEY_BLOCK_TEMP)
    }

    /// Overwrites the node's previous snapshot wholesale.
    pub fn record_inventory(&self, node: &NodeId, blocks: Vec<BlockId>) -> DfsResult<()> {
        let mut inventories = self.inventories()?;
        inventories.insert(node.clone(), blocks);
        self.save(KEY_BLOCK_TEMP, &inventories)
    }
}

fn validate_path(path: &str) -> DfsResult<()> {
    if path.is_empty() || path.split(DIR_SEPARATOR).any(str::is_empty) {
        return Err(DfsError::Malformed(format!("invalid directory path {:?}", path)));
    }
    Ok(())
}
