use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const KEY_BLOCK_LIST: &str = "block_list";
pub const KEY_BLOCK_TEMP: &str = "block_temp";
pub const KEY_FILE_DIR: &str = "file_dir";
pub const KEY_HEARTBEATS: &str = "heartbeats";
pub const KEY_DIRECTORIES: &str = "directories";
pub const KEY_BLOCK_DATA: &str = "block_data";

/// Separator between directory path segments, e.g. `data\logs`.
pub const DIR_SEPARATOR: char = '\\';

/// Process-wide block identifier. Allocated as `max + 1`, starting at 1.
pub type BlockId = u64;

/// Identifier of a storage node on the placement ring (e.g. `dn0`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// `block_list`: block ID -> replica set.
pub type BlockMap = BTreeMap<BlockId, Vec<NodeId>>;

/// `block_temp`: node ID -> block IDs it last reported.
pub type Inventories = BTreeMap<NodeId, Vec<BlockId>>;

/// One `file_dir` value: the owning directory mapped to the file's ordered blocks.
pub type FileEntry = BTreeMap<String, Vec<BlockId>>;

/// `file_dir`: file name -> entry.
pub type FileDir = BTreeMap<String, FileEntry>;

/// `heartbeats`: node ID -> ms since the epoch.
pub type Heartbeats = BTreeMap<NodeId, u64>;

/// `directories`: known directory paths.
pub type Directories = BTreeSet<String>;

/// A snapshot of the files directly inside one directory.
///
/// Iteration is lazy and can be restarted any number of times; the snapshot does
/// not observe later namespace changes.
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    directory: String,
    file_dir: FileDir,
}

impl DirectoryListing {
    pub fn new(directory: impl Into<String>, file_dir: FileDir) -> Self {
        Self {
            directory: directory.into(),
            file_dir,
        }
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.file_dir
            .iter()
            .filter(move |(_, entry)| entry.contains_key(&self.directory))
            .map(|(name, _)| name.as_str())
    }
}

/// Builds the authoritative block map from per-node inventories.
///
/// Every reported block maps to the nodes reporting it; every ID in `known` that
/// no node reported is kept with an empty replica set so a fully lost block keeps
/// its identity.
pub fn rebuild_block_map<I>(inventories: &Inventories, known: I) -> BlockMap
where
    I: IntoIterator<Item = BlockId>,
{
    let mut rebuilt = BlockMap::new();

    for (node, blocks) in inventories {
        for block in blocks {
            let owners = rebuilt.entry(*block).or_default();
            if !owners.contains(node) {
                owners.push(node.clone());
            }
        }
    }

    for block in known {
        rebuilt.entry(block).or_default();
    }

    rebuilt
}

/// Splits `a\b\c` into `["a", "a\b", "a\b\c"]`.
pub fn ancestor_paths(path: &str) -> Vec<String> {
    let mut prefixes = Vec::new();
    let mut current = String::new();

    for segment in path.split(DIR_SEPARATOR) {
        if !current.is_empty() {
            current.push(DIR_SEPARATOR);
        }
        current.push_str(segment);
        prefixes.push(current.clone());
    }

    prefixes
}

pub fn join_path(parent: &str, name: &str) -> String {
    format!("{}{}{}", parent, DIR_SEPARATOR, name)
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
