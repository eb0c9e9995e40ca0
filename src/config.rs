//! Cluster Configuration
//!
//! One `ClusterConfig` is shared by the coordinator, the repair loop, the storage
//! nodes and the client. It is loaded from an optional JSON file and then patched
//! from `DFS_*` environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::DfsError;
use crate::metadata::types::NodeId;

/// `int(1.024e7 * 1.28)` bytes.
pub const DEFAULT_BLOCK_SIZE: u64 = 13_107_200;
pub const DEFAULT_REPLICA_COUNT: usize = 3;
pub const DEFAULT_DEAD_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 20;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_BLOCK_REPORT_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// A storage node as seen by everyone else: its ID on the placement ring and the
/// base URL its HTTP API listens on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeAddress {
    pub id: NodeId,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub block_size: u64,
    pub replica_count: usize,
    pub dead_timeout_secs: u64,
    pub check_interval_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub block_report_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub namenode_url: String,
    /// Placement ring, in ring order.
    pub nodes: Vec<NodeAddress>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        let nodes = (0..3)
            .map(|i| NodeAddress {
                id: NodeId(format!("dn{}", i)),
                url: format!("http://127.0.0.1:{}", 5000 + i),
            })
            .collect();

        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            replica_count: DEFAULT_REPLICA_COUNT,
            dead_timeout_secs: DEFAULT_DEAD_TIMEOUT_SECS,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            block_report_interval_secs: DEFAULT_BLOCK_REPORT_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            namenode_url: "http://127.0.0.1:4000".to_string(),
            nodes,
        }
    }
}

impl ClusterConfig {
    /// Loads the file at `path` if given, applies environment overrides and
    /// validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                tracing::debug!("Loading cluster config from {:?}", path);
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {:?}", path))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("parsing config file {:?}", path))?
            }
            None => ClusterConfig::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("DFS_BLOCK_SIZE") {
            self.block_size = value.parse().context("DFS_BLOCK_SIZE")?;
        }
        if let Ok(value) = std::env::var("DFS_REPLICA_COUNT") {
            self.replica_count = value.parse().context("DFS_REPLICA_COUNT")?;
        }
        if let Ok(value) = std::env::var("DFS_DEAD_TIMEOUT_SECS") {
            self.dead_timeout_secs = value.parse().context("DFS_DEAD_TIMEOUT_SECS")?;
        }
        if let Ok(value) = std::env::var("DFS_CHECK_INTERVAL_SECS") {
            self.check_interval_secs = value.parse().context("DFS_CHECK_INTERVAL_SECS")?;
        }
        if let Ok(value) = std::env::var("DFS_NAMENODE_URL") {
            self.namenode_url = value;
        }
        if let Ok(value) = std::env::var("DFS_NODES") {
            self.nodes = parse_node_list(&value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DfsError> {
        if self.block_size == 0 {
            return Err(DfsError::Malformed("block_size must be positive".into()));
        }
        if self.replica_count == 0 {
            return Err(DfsError::Malformed("replica_count must be positive".into()));
        }
        if self.heartbeat_interval_secs == 0
            || self.block_report_interval_secs == 0
            || self.check_interval_secs == 0
        {
            return Err(DfsError::Malformed("intervals must be at least one second".into()));
        }
        if self.nodes.is_empty() {
            return Err(DfsError::Malformed("the node ring is empty".into()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if self.nodes[..i].iter().any(|other| other.id == node.id) {
                return Err(DfsError::Malformed(format!("duplicate node id {}", node.id)));
            }
        }
        Ok(())
    }

    pub fn ring(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|node| node.id.clone()).collect()
    }

    pub fn node_url(&self, id: &NodeId) -> Option<&str> {
        self.nodes
            .iter()
            .find(|node| &node.id == id)
            .map(|node| node.url.trim_end_matches('/'))
    }

    pub fn dead_timeout(&self) -> Duration {
        Duration::from_secs(self.dead_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn block_report_interval(&self) -> Duration {
        Duration::from_secs(self.block_report_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Parses `dn0=http://host:5000,dn1=http://host:5001`.
pub fn parse_node_list(value: &str) -> Result<Vec<NodeAddress>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (id, url) = entry
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("expected <id>=<url>, got {:?}", entry))?;
            Ok(NodeAddress {
                id: NodeId(id.trim().to_string()),
                url: url.trim().to_string(),
            })
        })
        .collect()
}
