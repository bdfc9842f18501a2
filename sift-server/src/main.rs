use std::io::{BufRead, BufReader};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sift::{Catalog, Document};

/// Documents per catalog write when bulk-loading a file.
const LOAD_CHUNK: usize = 10_000;

#[derive(Parser)]
#[command(name = "sift", about = "Sharded full-text search service")]
struct Cli {
    /// Home directory holding one subdirectory per index
    #[arg(long, env = "SIFT_HOME", default_value = "/tmp/sift")]
    home: PathBuf,

    /// Address to listen on
    #[arg(long, env = "SIFT_BIND_ADDR", default_value = "127.0.0.1")]
    bind_addr: String,

    #[arg(long, env = "SIFT_PORT", default_value_t = 8080)]
    port: u16,

    #[arg(long, default_value = "sift")]
    cluster_name: String,

    /// Node name; defaults to the machine hostname
    #[arg(long)]
    node_name: Option<String>,

    /// Multicast discovery address. Recorded only; peer discovery is not
    /// implemented.
    #[arg(long)]
    discovery_addr: Option<String>,

    /// Load a newline-delimited JSON file into this index and exit,
    /// instead of serving
    #[arg(long)]
    index: Option<String>,

    /// Field carrying the document identifier when loading a file
    #[arg(long, default_value = "id")]
    id_field: String,

    /// File to load (with --index)
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let node_name = cli.node_name.clone().unwrap_or_else(|| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string())
    });
    if let Some(ref addr) = cli.discovery_addr {
        warn!("discovery address {} configured but peer discovery is not implemented", addr);
    }

    let catalog = Catalog::open(&cli.home, &cli.cluster_name, &node_name)?;

    if let Some(index) = cli.index {
        let file = cli
            .file
            .ok_or("--index requires a file argument to load")?;
        load_file(&catalog, &index, &cli.id_field, &file).await?;
        catalog.close().await;
        return Ok(());
    }

    let _refresh_loop = Catalog::spawn_refresh_loop(&catalog);

    let addr: SocketAddr = format!("{}:{}", cli.bind_addr, cli.port).parse()?;
    sift_http::serve(catalog, addr).await
}

/// One-shot ingest of a newline-delimited JSON file, then a final refresh
/// so the documents are immediately searchable.
async fn load_file(
    catalog: &Arc<Catalog>,
    index: &str,
    id_field: &str,
    path: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("indexing json file {} ...", path.display());
    let reader = BufReader::new(std::fs::File::open(path)?);

    let mut batch = Vec::with_capacity(LOAD_CHUNK);
    let mut loaded = 0usize;
    let mut skipped = 0usize;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc = serde_json::from_str::<serde_json::Value>(&line)
            .map_err(sift::SiftError::from)
            .and_then(|v| Document::from_json(&v, id_field));
        match doc {
            Ok(doc) => batch.push(doc),
            Err(e) => {
                warn!("skipping line: {}", e);
                skipped += 1;
                continue;
            }
        }
        if batch.len() >= LOAD_CHUNK {
            loaded += batch.len();
            catalog.index(index, std::mem::take(&mut batch)).await?;
        }
    }
    if !batch.is_empty() {
        loaded += batch.len();
        catalog.index(index, batch).await?;
    }

    catalog.refresh(Some(index)).await?;
    info!("loaded {} docs into {} ({} skipped)", loaded, index, skipped);
    Ok(())
}
