//! Registry Module Tests
//!
//! Covers liveness derivation, round-robin order, and the dead-node sweep.

#[cfg(test)]
mod tests {
    use crate::metadata::store::MetadataStore;
    use crate::metadata::types::{BlockMap, NodeId, now_ms};
    use crate::registry::service::NodeRegistry;
    use std::sync::Arc;
    use std::time::Duration;

    fn node(id: &str) -> NodeId {
        NodeId(id.to_string())
    }

    fn ring() -> Vec<NodeId> {
        vec![node("dn0"), node("dn1"), node("dn2")]
    }

    fn registry_with(store: Arc<MetadataStore>) -> Arc<NodeRegistry> {
        NodeRegistry::new(ring(), Duration::from_secs(20), store)
    }

    fn all_alive() -> (Arc<MetadataStore>, Arc<NodeRegistry>) {
        let store = Arc::new(MetadataStore::in_memory());
        let registry = registry_with(store.clone());
        for n in ring() {
            registry.record_heartbeat(&n).unwrap();
        }
        (store, registry)
    }

    /// Pretends `id` last sent a heartbeat a minute ago.
    fn expire(registry: &NodeRegistry, id: &str) {
        registry
            .record_heartbeat_at(&node(id), now_ms() - 60_000)
            .unwrap();
    }

    // ============================================================
    // LIVENESS TESTS
    // ============================================================

    #[test]
    fn test_unknown_node_is_not_alive() {
        let store = Arc::new(MetadataStore::in_memory());
        let registry = registry_with(store);

        assert!(!registry.is_alive(&node("dn0")).unwrap());
        assert_eq!(registry.next_available_node().unwrap(), None);
    }

    #[test]
    fn test_heartbeat_makes_node_alive_until_timeout() {
        let (_store, registry) = all_alive();
        assert!(registry.is_alive(&node("dn1")).unwrap());

        expire(&registry, "dn1");

        assert!(!registry.is_alive(&node("dn1")).unwrap());
        assert_eq!(registry.live_nodes().unwrap(), vec![node("dn0"), node("dn2")]);
    }

    // ============================================================
    // ROUND-ROBIN TESTS
    // ============================================================

    #[test]
    fn test_round_robin_visits_ring_in_order() {
        let (_store, registry) = all_alive();

        let picks: Vec<NodeId> = (0..6)
            .map(|_| registry.next_available_node().unwrap().unwrap())
            .collect();

        assert_eq!(
            picks,
            vec![
                node("dn0"),
                node("dn1"),
                node("dn2"),
                node("dn0"),
                node("dn1"),
                node("dn2")
            ]
        );
    }

    #[test]
    fn test_round_robin_skips_dead_nodes() {
        let (_store, registry) = all_alive();
        expire(&registry, "dn1");

        for _ in 0..10 {
            let picked = registry.next_available_node().unwrap().unwrap();
            assert_ne!(picked, node("dn1"));
        }
    }

    #[test]
    fn test_select_replicas_returns_distinct_nodes() {
        let (_store, registry) = all_alive();

        let replicas = registry.select_replicas(3).unwrap();
        assert_eq!(replicas, ring());

        // Only two live nodes: no duplicate is used to pad the set.
        expire(&registry, "dn2");
        let replicas = registry.select_replicas(3).unwrap();
        assert_eq!(replicas.len(), 2);
        assert_ne!(replicas[0], replicas[1]);
    }

    #[test]
    fn test_next_available_node_excluding() {
        let (_store, registry) = all_alive();

        for _ in 0..5 {
            let picked = registry
                .next_available_node_excluding(&[node("dn0")])
                .unwrap()
                .unwrap();
            assert_ne!(picked, node("dn0"));
        }

        assert_eq!(registry.next_available_node_excluding(&ring()).unwrap(), None);
    }

    // ============================================================
    // DEAD SWEEP TESTS
    // ============================================================

    #[test]
    fn test_sweep_removes_dead_node_from_every_replica_set() {
        let (store, registry) = all_alive();
        let mut plan = BlockMap::new();
        plan.insert(1, ring());
        plan.insert(2, vec![node("dn1"), node("dn2")]);
        store.record_placement(&plan).unwrap();

        expire(&registry, "dn1");
        let removed = registry.sweep_dead_nodes().unwrap();

        assert_eq!(removed, vec![node("dn1")]);
        let map = store.block_map().unwrap();
        assert_eq!(map[&1], vec![node("dn0"), node("dn2")]);
        assert_eq!(map[&2], vec![node("dn2")]);
        assert!(map.values().all(|owners| !owners.contains(&node("dn1"))));
    }
}
