use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::DfsResult;
use crate::metadata::store::MetadataStore;
use crate::metadata::types::{Heartbeats, NodeId, now_ms};

pub struct NodeRegistry {
    ring: Vec<NodeId>,
    dead_timeout: Duration,
    /// Index of the next ring slot to inspect.
    cursor: Mutex<usize>,
    store: Arc<MetadataStore>,
}

impl NodeRegistry {
    pub fn new(ring: Vec<NodeId>, dead_timeout: Duration, store: Arc<MetadataStore>) -> Arc<Self> {
        Arc::new(Self {
            ring,
            dead_timeout,
            cursor: Mutex::new(0),
            store,
        })
    }

    pub fn ring(&self) -> &[NodeId] {
        &self.ring
    }

    pub fn dead_timeout(&self) -> Duration {
        self.dead_timeout
    }

    pub fn record_heartbeat(&self, node: &NodeId) -> DfsResult<u64> {
        let now = now_ms();
        self.record_heartbeat_at(node, now)?;
        Ok(now)
    }

    pub fn record_heartbeat_at(&self, node: &NodeId, at_ms: u64) -> DfsResult<()> {
        tracing::debug!("Heartbeat from {} at {}", node, at_ms);
        self.store.record_heartbeat(node, at_ms)
    }

    pub fn is_alive(&self, node: &NodeId) -> DfsResult<bool> {
        Ok(self.alive_in(&self.store.heartbeats()?, node, now_ms()))
    }

    fn alive_in(&self, heartbeats: &Heartbeats, node: &NodeId, now: u64) -> bool {
        heartbeats.get(node).is_some_and(|last| {
            now.saturating_sub(*last) <= self.dead_timeout.as_millis() as u64
        })
    }

    pub fn live_nodes(&self) -> DfsResult<Vec<NodeId>> {
        let heartbeats = self.store.heartbeats()?;
        let now = now_ms();
        Ok(self
            .ring
            .iter()
            .filter(|node| self.alive_in(&heartbeats, node, now))
            .cloned()
            .collect())
    }

    /// Advances the cursor to the next live node in ring order.
    ///
    /// Inspects each ring slot at most once per call and returns `None` when no
    /// node is alive.
    pub fn next_available_node(&self) -> DfsResult<Option<NodeId>> {
        let heartbeats = self.store.heartbeats()?;
        let now = now_ms();

        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        for _ in 0..self.ring.len() {
            let candidate = &self.ring[*cursor % self.ring.len()];
            *cursor = (*cursor + 1) % self.ring.len();

            if self.alive_in(&heartbeats, candidate, now) {
                return Ok(Some(candidate.clone()));
            }
        }

        Ok(None)
    }

    /// Draws up to `count` distinct live nodes, retrying on duplicates.
    pub fn select_replicas(&self, count: usize) -> DfsResult<Vec<NodeId>> {
        let mut replicas: Vec<NodeId> = Vec::with_capacity(count);
        let max_draws = count * self.ring.len().max(1);

        for _ in 0..max_draws {
            if replicas.len() == count {
                break;
            }
            match self.next_available_node()? {
                Some(node) if !replicas.contains(&node) => replicas.push(node),
                Some(_) => continue,
                None => break,
            }
        }

        Ok(replicas)
    }

    /// Draws a live node that is not in `exclude`, or `None` if every live node
    /// is excluded.
    pub fn next_available_node_excluding(&self, exclude: &[NodeId]) -> DfsResult<Option<NodeId>> {
        for _ in 0..self.ring.len() {
            match self.next_available_node()? {
                Some(node) if exclude.contains(&node) => continue,
                other => return Ok(other),
            }
        }
        Ok(None)
    }

    /// Removes every node that is not alive from every replica set.
    pub fn sweep_dead_nodes(&self) -> DfsResult<Vec<NodeId>> {
        let heartbeats = self.store.heartbeats()?;
        let now = now_ms();

        let removed = self
            .store
            .remove_nodes_where(|node| !self.alive_in(&heartbeats, node, now))?;

        for node in &removed {
            tracing::warn!("Data node {} is dead, removed from the block map", node);
        }

        Ok(removed)
    }
}
