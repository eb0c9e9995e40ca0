use anyhow::Context;
use axum::Router;
use clap::{Parser, Subcommand};
use dfs_cluster::checker::service::ReplicaChecker;
use dfs_cluster::client::service::DfsClient;
use dfs_cluster::config::ClusterConfig;
use dfs_cluster::datanode::block_store::LocalBlockStore;
use dfs_cluster::datanode::service::DataNode;
use dfs_cluster::error::DfsError;
use dfs_cluster::metadata::kv::{FileKvStore, KvStore, MemoryKvStore};
use dfs_cluster::metadata::store::MetadataStore;
use dfs_cluster::metadata::types::NodeId;
use dfs_cluster::namenode::service::NameNode;
use dfs_cluster::registry::service::NodeRegistry;
use dfs_cluster::transport::PeerClient;
use dfs_cluster::{datanode, namenode};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dfs", about = "Replicated block storage: coordinator, storage node and client")]
struct Cli {
    /// Cluster configuration file (JSON). Built-in defaults are used without it.
    #[arg(long, global = true, env = "DFS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the coordinator.
    Namenode(NamenodeArgs),
    /// Run the repair loop on its own, over the coordinator's store directory.
    Checker(CheckerArgs),
    /// Run a storage node.
    Datanode(DatanodeArgs),
    /// Talk to a running cluster.
    #[command(subcommand)]
    Client(ClientCommand),
}

#[derive(Parser, Debug)]
struct NamenodeArgs {
    #[arg(long, default_value = "127.0.0.1:4000")]
    bind: SocketAddr,

    /// Directory of the file-backed metadata cache. In memory if absent.
    #[arg(long, env = "DFS_STORE")]
    store: Option<PathBuf>,

    /// Do not run the repair loop inside this process.
    #[arg(long)]
    no_checker: bool,
}

#[derive(Parser, Debug)]
struct CheckerArgs {
    #[arg(long, env = "DFS_STORE")]
    store: PathBuf,
}

#[derive(Parser, Debug)]
struct DatanodeArgs {
    /// Node ID on the placement ring, e.g. `dn0`.
    #[arg(long)]
    id: String,

    /// Listen address. Defaults to the host and port of this node's configured URL.
    #[arg(long)]
    bind: Option<SocketAddr>,

    #[arg(long)]
    data_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
enum ClientCommand {
    /// Create a directory, or `<parent>\<name>` with --parent.
    Mkdir {
        name: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Remove an empty directory, or `<parent>\<name>` with --parent.
    Rmdir {
        name: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// List the files and sub-directories of a directory.
    Ls { directory: String },
    /// Upload a local file into a directory.
    Write {
        local: PathBuf,
        directory: String,
        /// Name in the cluster. Defaults to the local file name.
        #[arg(long)]
        name: Option<String>,
    },
    /// Download a file. Written to stdout without --output.
    Read {
        file: String,
        directory: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a file and all its replicas.
    Delete { file: String, directory: String },
    /// Show where each block of a file is stored.
    Blocks { file: String, directory: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Arc::new(ClusterConfig::load(cli.config.as_deref())?);

    match cli.command {
        Command::Namenode(args) => run_namenode(config, args).await,
        Command::Checker(args) => run_checker(config, args).await,
        Command::Datanode(args) => run_datanode(config, args).await,
        Command::Client(command) => {
            let client = DfsClient::new(config.clone(), PeerClient::new(config.request_timeout()));
            if let Err(e) = run_client(&client, command).await {
                eprintln!("{}", e.wire_message());
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn open_metadata(store: Option<&Path>) -> anyhow::Result<Arc<MetadataStore>> {
    let kv: Arc<dyn KvStore> = match store {
        Some(dir) => Arc::new(FileKvStore::open(dir)?),
        None => Arc::new(MemoryKvStore::new()),
    };
    let metadata = Arc::new(MetadataStore::new(kv));
    metadata.initialize()?;
    Ok(metadata)
}

async fn serve(bind: SocketAddr, app: Router) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", bind);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_namenode(config: Arc<ClusterConfig>, args: NamenodeArgs) -> anyhow::Result<()> {
    tracing::info!("Starting coordinator with ring {:?}", config.ring());

    // 1. Shared state:
    let store = open_metadata(args.store.as_deref())?;
    let registry = NodeRegistry::new(config.ring(), config.dead_timeout(), store.clone());

    // 2. Repair loop:
    if args.no_checker {
        tracing::info!("Repair loop disabled in this process");
    } else {
        let checker = ReplicaChecker::new(
            store.clone(),
            registry.clone(),
            PeerClient::new(config.request_timeout()),
            config.clone(),
        );
        tokio::spawn(checker.run());
    }

    // 3. HTTP API:
    let namenode = NameNode::new(store, registry, config.block_size, config.replica_count);
    serve(args.bind, namenode::handlers::router(namenode)).await
}

async fn run_checker(config: Arc<ClusterConfig>, args: CheckerArgs) -> anyhow::Result<()> {
    let store = open_metadata(Some(args.store.as_path()))?;
    let registry = NodeRegistry::new(config.ring(), config.dead_timeout(), store.clone());
    let checker = ReplicaChecker::new(
        store,
        registry,
        PeerClient::new(config.request_timeout()),
        config,
    );

    checker.run().await;
    Ok(())
}

async fn run_datanode(config: Arc<ClusterConfig>, args: DatanodeArgs) -> anyhow::Result<()> {
    let id = NodeId(args.id);
    let url = config
        .node_url(&id)
        .with_context(|| format!("{} is not on the configured ring", id))?;

    let bind = match args.bind {
        Some(bind) => bind,
        None => reqwest::Url::parse(url)?
            .socket_addrs(|| None)?
            .into_iter()
            .next()
            .with_context(|| format!("cannot derive a listen address from {}", url))?,
    };

    tracing::info!("Starting data node {} on {}", id, bind);

    let blocks = LocalBlockStore::open(args.data_dir.join("blocks")).await?;
    let kv: Arc<dyn KvStore> = Arc::new(FileKvStore::open(args.data_dir.join("meta"))?);
    let node = DataNode::open(
        id,
        blocks,
        kv,
        PeerClient::new(config.request_timeout()),
        config.clone(),
    )
    .await?;

    node.clone().start_reporting();
    serve(bind, datanode::handlers::router(node)).await
}

async fn run_client(client: &DfsClient, command: ClientCommand) -> Result<(), DfsError> {
    match command {
        ClientCommand::Mkdir { name, parent } => {
            let message = match parent {
                Some(parent) => client.mkdir_parent(&parent, &name).await?,
                None => client.mkdir(&name).await?,
            };
            println!("{}", message);
        }
        ClientCommand::Rmdir { name, parent } => {
            let message = match parent {
                Some(parent) => client.rmdir_parent(&parent, &name).await?,
                None => client.rmdir(&name).await?,
            };
            println!("{}", message);
        }
        ClientCommand::Ls { directory } => {
            print!("{}", client.ls(&directory).await?);
        }
        ClientCommand::Write {
            local,
            directory,
            name,
        } => {
            let name = match name {
                Some(name) => name,
                None => local
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| DfsError::Malformed(format!("no file name in {:?}", local)))?,
            };
            let data = tokio::fs::read(&local).await?;

            let summary = client.write_file(&name, &directory, &data).await?;
            println!(
                "Wrote {} ({} bytes) to {}: blocks {:?}",
                name,
                data.len(),
                directory,
                summary.written
            );
            if !summary.failed.is_empty() {
                println!("No replica accepted blocks {:?}", summary.failed);
            }
        }
        ClientCommand::Read {
            file,
            directory,
            output,
        } => {
            let data = client.read_file(&file, &directory).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &data).await?;
                    println!("Read {} ({} bytes) into {:?}", file, data.len(), path);
                }
                None => std::io::stdout().write_all(&data)?,
            }
        }
        ClientCommand::Delete { file, directory } => {
            let summary = client.delete_file(&file, &directory).await?;
            for (block, node) in &summary.deleted {
                println!("Block {} deleted from {}", block, node);
            }
            for (block, node, reason) in &summary.failed {
                println!("Block {} left on {}: {}", block, node, reason);
            }
        }
        ClientCommand::Blocks { file, directory } => {
            for (block, nodes) in client.block_locations(&file, &directory).await? {
                println!("{} -> {:?}", block, nodes);
            }
        }
    }

    Ok(())
}
