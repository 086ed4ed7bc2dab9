use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use procure_store::web::{self, ServerConfig};
use procure_store::{
    CollectionKind, DurableStore, FileCache, FileDurableStore, HttpDurableStore, RecordStore,
    StoreConfig, SyncState,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "procure-store")]
#[command(about = "Durable store server and data tooling for the procurement tool")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve `/api/save-data`, the collection files and the static client
    Serve(ServeArgs),
    /// Write a full snapshot of every collection to a file
    Export {
        #[command(flatten)]
        source: SourceArgs,
        /// Output file; defaults to `procurement_data_<date>.json`
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace the collections present in a snapshot file
    Import {
        #[command(flatten)]
        source: SourceArgs,
        file: PathBuf,
    },
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "PROCURE_HOST", default_value = "127.0.0.1")]
    host: String,
    #[arg(long, env = "PROCURE_PORT", default_value_t = 3000)]
    port: u16,
    #[arg(long, env = "PROCURE_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,
    #[arg(long, env = "PROCURE_STATIC_ROOT", default_value = ".")]
    static_root: PathBuf,
    #[arg(long, env = "PROCURE_ENTRY", default_value = "index.html")]
    entry: String,
}

/// Where a command-line store reads and writes its collections.
#[derive(Args)]
struct SourceArgs {
    /// Local cache directory
    #[arg(long, env = "PROCURE_CACHE_DIR", default_value = ".procure-cache")]
    cache_dir: PathBuf,
    /// Base URL of a running durable store; the data directory is used when absent
    #[arg(long, env = "PROCURE_DURABLE_URL")]
    durable_url: Option<String>,
    #[arg(long, env = "PROCURE_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,
}

impl SourceArgs {
    async fn open(&self) -> Result<RecordStore> {
        let durable: Arc<dyn DurableStore> = match &self.durable_url {
            Some(url) => Arc::new(
                HttpDurableStore::new(url)
                    .with_context(|| format!("invalid durable store url {url}"))?,
            ),
            None => Arc::new(FileDurableStore::new(&self.data_dir)),
        };
        let cache = FileCache::open(&self.cache_dir).with_context(|| {
            format!("failed to open cache directory {}", self.cache_dir.display())
        })?;
        Ok(RecordStore::open(StoreConfig::default(), durable, Arc::new(cache)).await)
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Serve(args) => serve(args).await,
            Command::Export { source, out } => export(&source, out).await,
            Command::Import { source, file } => import(&source, file).await,
        }
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = ServerConfig::new()
        .host(&args.host)
        .port(args.port)
        .data_dir(args.data_dir)
        .static_root(args.static_root)
        .entry_document(&args.entry);

    web::serve(config, shutdown_signal())
        .await
        .context("server error")
}

async fn export(source: &SourceArgs, out: Option<PathBuf>) -> Result<()> {
    let store = source.open().await?;
    let doc = store.export().await;
    let path = out.unwrap_or_else(|| PathBuf::from(doc.file_name()));
    let text = serde_json::to_string_pretty(&doc).context("failed to encode export")?;
    tokio::fs::write(&path, text)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!(
        path = %path.display(),
        users = doc.users.len(),
        materials = doc.materials.len(),
        requests = doc.requests.len(),
        "export written"
    );
    Ok(())
}

async fn import(source: &SourceArgs, file: PathBuf) -> Result<()> {
    let text = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let store = source.open().await?;
    let replaced = store
        .import_json(&text)
        .await
        .with_context(|| format!("{} was not imported", file.display()))?;
    store.flush().await;

    let mut unsynced = 0;
    for kind in &replaced {
        if let SyncState::Unsynced(reason) = store.sync_state(*kind) {
            warn!(collection = %kind, %reason, "imported into cache only");
            unsynced += 1;
        }
    }
    if replaced.is_empty() {
        bail!("{} holds none of {:?}", file.display(), CollectionKind::ALL);
    }

    info!(collections = ?replaced, unsynced, "import finished");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
