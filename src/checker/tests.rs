//! Repair Loop Tests
//!
//! Rebuild, sweep, scan and task planning against an in-memory store. Node URLs
//! point at a closed loopback port, so dispatch always fails here; successful
//! copies are covered by the cluster test.

#[cfg(test)]
mod tests {
    use crate::checker::service::{ReplicaChecker, under_replicated};
    use crate::config::{ClusterConfig, NodeAddress};
    use crate::metadata::store::MetadataStore;
    use crate::metadata::types::{BlockMap, NodeId, now_ms};
    use crate::registry::service::NodeRegistry;
    use crate::transport::PeerClient;
    use std::sync::Arc;
    use std::time::Duration;

    fn node(id: &str) -> NodeId {
        NodeId(id.to_string())
    }

    fn offline_config() -> Arc<ClusterConfig> {
        let nodes = (0..3)
            .map(|i| NodeAddress {
                id: NodeId(format!("dn{}", i)),
                url: "http://127.0.0.1:9".to_string(),
            })
            .collect();
        Arc::new(ClusterConfig {
            nodes,
            ..ClusterConfig::default()
        })
    }

    fn setup() -> (Arc<MetadataStore>, Arc<NodeRegistry>, Arc<ReplicaChecker>) {
        let config = offline_config();
        let store = Arc::new(MetadataStore::in_memory());
        store.initialize().unwrap();
        let registry = NodeRegistry::new(config.ring(), config.dead_timeout(), store.clone());
        for n in config.ring() {
            registry.record_heartbeat(&n).unwrap();
        }
        let checker = ReplicaChecker::new(
            store.clone(),
            registry.clone(),
            PeerClient::new(Duration::from_millis(500)),
            config,
        );
        (store, registry, checker)
    }

    fn kill(registry: &NodeRegistry, id: &str) {
        registry
            .record_heartbeat_at(&node(id), now_ms() - 60_000)
            .unwrap();
    }

    // ============================================================
    // SCAN TESTS
    // ============================================================

    #[test]
    fn test_under_replicated_is_exactly_short_blocks() {
        let mut map = BlockMap::new();
        map.insert(1, vec![node("dn0"), node("dn1"), node("dn2")]);
        map.insert(2, vec![node("dn0")]);
        map.insert(3, vec![]);
        map.insert(4, vec![node("dn1"), node("dn2")]);

        assert_eq!(under_replicated(&map, 3), vec![2, 3, 4]);
        assert_eq!(under_replicated(&map, 1), vec![3]);
    }

    // ============================================================
    // RECONCILE TESTS
    // ============================================================

    #[test]
    fn test_reconcile_replaces_map_from_reports() {
        let (store, _registry, checker) = setup();
        let mut plan = BlockMap::new();
        plan.insert(1, vec![node("dn0"), node("dn1"), node("dn2")]);
        plan.insert(2, vec![node("dn0")]);
        store.record_placement(&plan).unwrap();

        store.record_inventory(&node("dn0"), vec![1]).unwrap();
        store.record_inventory(&node("dn2"), vec![1, 3]).unwrap();

        let (map, dead) = checker.reconcile().unwrap();

        assert!(dead.is_empty());
        assert_eq!(map[&1], vec![node("dn0"), node("dn2")]);
        // Known but unreported: kept, with nobody holding it.
        assert!(map[&2].is_empty());
        assert_eq!(map[&3], vec![node("dn2")]);
    }

    #[test]
    fn test_reconcile_sweeps_dead_node_even_if_it_reported() {
        let (store, registry, checker) = setup();
        for n in ["dn0", "dn1", "dn2"] {
            store.record_inventory(&node(n), vec![1]).unwrap();
        }
        kill(&registry, "dn1");

        let (map, dead) = checker.reconcile().unwrap();

        assert_eq!(dead, vec![node("dn1")]);
        assert_eq!(map[&1], vec![node("dn0"), node("dn2")]);
        for _ in 0..3 {
            assert_ne!(registry.next_available_node().unwrap(), Some(node("dn1")));
        }
    }

    // ============================================================
    // REPAIR PLANNING TESTS
    // ============================================================

    #[test]
    fn test_single_replica_block_gets_new_target() {
        let (store, _registry, checker) = setup();
        store.record_inventory(&node("dn0"), vec![5]).unwrap();

        let (map, _) = checker.reconcile().unwrap();
        assert_eq!(under_replicated(&map, 3), vec![5]);

        let (tasks, unrecoverable) = checker.plan_repairs(&map).unwrap();

        assert!(unrecoverable.is_empty());
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].block, 5);
        assert_eq!(tasks[0].source, node("dn0"));
        assert_ne!(tasks[0].target, node("dn0"));
    }

    #[test]
    fn test_replica_count_grows_after_target_reports() {
        let (store, _registry, checker) = setup();
        store.record_inventory(&node("dn0"), vec![5]).unwrap();

        let (map, _) = checker.reconcile().unwrap();
        let before = map[&5].len();
        let (tasks, _) = checker.plan_repairs(&map).unwrap();

        // The target stores the copy and includes it in its next report.
        store.record_inventory(&tasks[0].target, vec![5]).unwrap();
        let (map, _) = checker.reconcile().unwrap();

        assert!(map[&5].len() > before);
        assert!(map[&5].contains(&tasks[0].target));
    }

    #[test]
    fn test_block_without_replicas_is_unrecoverable() {
        let (store, _registry, checker) = setup();
        let mut plan = BlockMap::new();
        plan.insert(8, vec![]);
        store.record_placement(&plan).unwrap();

        let (map, _) = checker.reconcile().unwrap();
        let (tasks, unrecoverable) = checker.plan_repairs(&map).unwrap();

        assert!(tasks.is_empty());
        assert_eq!(unrecoverable, vec![8]);
    }

    #[test]
    fn test_no_task_when_every_live_node_already_holds_block() {
        let (store, registry, checker) = setup();
        kill(&registry, "dn2");
        store.record_inventory(&node("dn0"), vec![1]).unwrap();
        store.record_inventory(&node("dn1"), vec![1]).unwrap();

        let (map, _) = checker.reconcile().unwrap();
        let (tasks, unrecoverable) = checker.plan_repairs(&map).unwrap();

        assert_eq!(under_replicated(&map, 3), vec![1]);
        assert!(tasks.is_empty());
        assert!(unrecoverable.is_empty());
    }

    // ============================================================
    // CYCLE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_cycle_survives_unreachable_source() {
        let (store, _registry, checker) = setup();
        store.record_inventory(&node("dn0"), vec![5]).unwrap();

        let report = checker.run_cycle().await.unwrap();

        assert_eq!(report.under_replicated, vec![5]);
        assert!(report.dispatched.is_empty());
        assert_eq!(report.failed, vec![5]);

        // The next cycle tries again.
        let report = checker.run_cycle().await.unwrap();
        assert_eq!(report.failed, vec![5]);
    }
}
