//! Client Module Tests

#[cfg(test)]
mod tests {
    use crate::client::service::{DfsClient, split_into_chunks};
    use crate::config::ClusterConfig;
    use crate::error::DfsError;
    use crate::metadata::store::MetadataStore;
    use crate::namenode::handlers::router;
    use crate::namenode::service::NameNode;
    use crate::registry::service::NodeRegistry;
    use crate::transport::PeerClient;
    use std::sync::Arc;
    use std::time::Duration;

    // ============================================================
    // CHUNKING TESTS
    // ============================================================

    #[test]
    fn test_split_exact_multiple() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let chunks = split_into_chunks(&data, 3);
        assert_eq!(chunks, vec![&[1u8, 2, 3][..], &[4, 5, 6][..]]);
    }

    #[test]
    fn test_split_short_last_chunk() {
        let data = b"abcdefg";
        let chunks = split_into_chunks(data, 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], b"g");
        assert_eq!(chunks.concat(), data.to_vec());
    }

    #[test]
    fn test_split_empty_and_oversized() {
        assert!(split_into_chunks(&[], 4).is_empty());
        assert_eq!(split_into_chunks(b"ab", 13_107_200), vec![&b"ab"[..]]);
    }

    // ============================================================
    // DIRECTORY COMMAND TESTS
    // ============================================================

    async fn client_with_coordinator() -> (DfsClient, Arc<NameNode>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = Arc::new(ClusterConfig {
            namenode_url: format!("http://{}", listener.local_addr().unwrap()),
            ..ClusterConfig::default()
        });

        let store = Arc::new(MetadataStore::in_memory());
        store.initialize().unwrap();
        let registry = NodeRegistry::new(config.ring(), config.dead_timeout(), store.clone());
        let namenode = NameNode::new(store, registry, config.block_size, config.replica_count);

        let app = router(namenode.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = DfsClient::new(config, PeerClient::new(Duration::from_secs(5)));
        (client, namenode)
    }

    #[tokio::test]
    async fn test_directory_commands_round_trip() {
        let (client, namenode) = client_with_coordinator().await;

        assert_eq!(client.mkdir("data").await.unwrap(), "Made directory data");
        client.mkdir_parent("data", "logs").await.unwrap();
        assert!(namenode.store().directory_exists("data\\logs").unwrap());

        let listing = client.ls("data").await.unwrap();
        assert_eq!(listing, "DIR: data\n  -> data\\logs\n");

        client.rmdir_parent("data", "logs").await.unwrap();
        client.rmdir("data").await.unwrap();
        assert!(namenode.store().directories().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_coordinator_errors_are_relayed() {
        let (client, _namenode) = client_with_coordinator().await;
        client.mkdir("data").await.unwrap();

        match client.mkdir("data").await {
            Err(DfsError::Rejected(reason)) => {
                assert!(reason.starts_with("ERROR: "));
                assert!(reason.contains("already exists"));
            }
            other => panic!("expected a rejection, got {:?}", other),
        }

        // No node has sent a heartbeat yet.
        assert!(matches!(
            client.write_file("a.txt", "data", b"hello").await,
            Err(DfsError::Rejected(_))
        ));
        assert!(matches!(
            client.read_file("a.txt", "data").await,
            Err(DfsError::Rejected(_))
        ));
    }
}
