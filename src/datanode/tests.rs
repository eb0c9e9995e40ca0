//! Storage Node Module Tests
//!
//! Local block store on a temp directory, and the write pipeline between real
//! nodes bound to loopback ports.

#[cfg(test)]
mod tests {
    use crate::config::{ClusterConfig, NodeAddress};
    use crate::datanode::block_store::LocalBlockStore;
    use crate::datanode::handlers::router;
    use crate::datanode::service::DataNode;
    use crate::error::DfsError;
    use crate::metadata::kv::{KvStore, MemoryKvStore};
    use crate::metadata::types::{KEY_BLOCK_DATA, NodeId};
    use crate::transport::PeerClient;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn node(id: &str) -> NodeId {
        NodeId(id.to_string())
    }

    struct TestNode {
        node: Arc<DataNode>,
        kv: Arc<MemoryKvStore>,
        _dir: TempDir,
    }

    /// Binds `count` nodes `dn0..` on loopback and serves their routers.
    async fn spawn_nodes(count: usize) -> (Vec<TestNode>, Arc<ClusterConfig>) {
        let mut listeners = Vec::new();
        let mut addresses = Vec::new();
        for i in 0..count {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            addresses.push(NodeAddress {
                id: NodeId(format!("dn{}", i)),
                url: format!("http://{}", listener.local_addr().unwrap()),
            });
            listeners.push(listener);
        }

        let config = Arc::new(ClusterConfig {
            nodes: addresses.clone(),
            // Nothing listens here: reports go nowhere.
            namenode_url: "http://127.0.0.1:9".to_string(),
            ..ClusterConfig::default()
        });

        let mut nodes = Vec::new();
        for (listener, address) in listeners.into_iter().zip(addresses) {
            let dir = tempfile::tempdir().unwrap();
            let kv = Arc::new(MemoryKvStore::new());
            let node = DataNode::open(
                address.id,
                LocalBlockStore::open(dir.path()).await.unwrap(),
                kv.clone(),
                PeerClient::new(Duration::from_secs(5)),
                config.clone(),
            )
            .await
            .unwrap();

            let app = router(node.clone());
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            nodes.push(TestNode {
                node,
                kv,
                _dir: dir,
            });
        }

        (nodes, config)
    }

    // ============================================================
    // LOCAL BLOCK STORE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_block_store_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlockStore::open(dir.path()).await.unwrap();

        store.put(3, b"hello").await.unwrap();
        store.put(1, b"").await.unwrap();

        assert_eq!(store.get(3).await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(store.get(1).await.unwrap(), Some(Vec::new()));
        assert_eq!(store.get(2).await.unwrap(), None);
        assert_eq!(store.list().await.unwrap(), vec![1, 3]);

        assert!(store.delete(3).await.unwrap());
        assert!(!store.delete(3).await.unwrap());
        assert_eq!(store.list().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_inventory_is_rebuilt_from_disk_on_open() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalBlockStore::open(dir.path()).await.unwrap();
            store.put(7, b"x").await.unwrap();
            store.put(2, b"y").await.unwrap();
        }

        let kv = Arc::new(MemoryKvStore::new());
        let node = DataNode::open(
            node("dn0"),
            LocalBlockStore::open(dir.path()).await.unwrap(),
            kv.clone(),
            PeerClient::new(Duration::from_secs(1)),
            Arc::new(ClusterConfig::default()),
        )
        .await
        .unwrap();

        assert_eq!(node.inventory(), vec![2, 7]);
        assert_eq!(kv.get(KEY_BLOCK_DATA).unwrap().as_deref(), Some("[2,7]"));
    }

    // ============================================================
    // WRITE PIPELINE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_write_block_forwards_to_copy_nodes() {
        let (nodes, _config) = spawn_nodes(3).await;

        nodes[0]
            .node
            .write_block("a.txt", 1, b"chunk".to_vec(), &[node("dn1"), node("dn2")])
            .await
            .unwrap();

        for n in &nodes {
            assert_eq!(n.node.read_block(1).await.unwrap(), b"chunk".to_vec());
            assert_eq!(n.node.inventory(), vec![1]);
            assert_eq!(n.kv.get(KEY_BLOCK_DATA).unwrap().as_deref(), Some("[1]"));
        }
    }

    #[tokio::test]
    async fn test_forward_failure_is_skipped() {
        let (nodes, _config) = spawn_nodes(2).await;

        // dn7 is not on the ring, dn1 is: the write still lands on dn0 and dn1.
        let message = nodes[0]
            .node
            .write_block("a.txt", 4, b"abc".to_vec(), &[node("dn7"), node("dn1")])
            .await
            .unwrap();

        assert!(message.contains("dn1"));
        assert_eq!(nodes[0].node.inventory(), vec![4]);
        assert_eq!(nodes[1].node.inventory(), vec![4]);
    }

    #[tokio::test]
    async fn test_write_over_http() {
        let (nodes, config) = spawn_nodes(2).await;
        let peers = PeerClient::new(Duration::from_secs(5));
        let base = config.node_url(&node("dn0")).unwrap();

        let url = PeerClient::endpoint(base, &["block", "a.txt", "9"]).unwrap();
        let body = serde_json::json!({"block_body": [1, 2, 3], "copy_node": ["dn1"]});
        let _: serde_json::Value = peers.post_json(url, &body).await.unwrap();

        let url = PeerClient::endpoint(
            config.node_url(&node("dn1")).unwrap(),
            &["block", "9", ""],
        )
        .unwrap();
        let read: serde_json::Value = peers.get_json(url).await.unwrap();
        assert_eq!(read["block_body"], serde_json::json!([1, 2, 3]));
        assert_eq!(nodes[1].node.inventory(), vec![9]);
    }

    // ============================================================
    // DELETE & COPY TESTS
    // ============================================================

    #[tokio::test]
    async fn test_delete_missing_block_is_not_found() {
        let (nodes, config) = spawn_nodes(1).await;
        let dn0 = &nodes[0].node;

        dn0.write_block("f", 2, b"z".to_vec(), &[]).await.unwrap();
        dn0.delete_block(2).await.unwrap();

        assert!(dn0.inventory().is_empty());
        assert!(matches!(dn0.delete_block(2).await, Err(DfsError::NotFound(_))));
        assert!(matches!(dn0.read_block(2).await, Err(DfsError::NotFound(_))));

        let peers = PeerClient::new(Duration::from_secs(5));
        let url = PeerClient::endpoint(config.node_url(&node("dn0")).unwrap(), &["block", "2", ""])
            .unwrap();
        let result: Result<serde_json::Value, DfsError> = peers.delete_json(url).await;
        match result {
            Err(DfsError::Rejected(reason)) => assert!(reason.starts_with("ERROR: ")),
            other => panic!("expected a rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_copy_block_to_target() {
        let (nodes, _config) = spawn_nodes(2).await;

        nodes[0]
            .node
            .write_block("f", 5, b"replica".to_vec(), &[])
            .await
            .unwrap();
        nodes[0].node.copy_block(5, &node("dn1")).await.unwrap();

        assert_eq!(nodes[1].node.read_block(5).await.unwrap(), b"replica".to_vec());
        assert!(matches!(
            nodes[0].node.copy_block(6, &node("dn1")).await,
            Err(DfsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reports_to_offline_coordinator_fail() {
        let (nodes, _config) = spawn_nodes(1).await;

        assert!(matches!(
            nodes[0].node.send_heartbeat().await,
            Err(DfsError::NodeUnreachable(_))
        ));
    }
}
