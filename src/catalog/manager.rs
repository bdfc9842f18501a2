use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::index::{
    CountResponse, Index, RefreshResponse, RefreshShards, SearchResponse, ShardsHeader,
    DEFAULT_SHARD_COUNT,
};
use crate::cluster::NodeRegistry;
use crate::error::{Result, SiftError};
use crate::types::{Document, IndexName};

/// How often the background loop flushes pending writes on every index.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(2);

/// Informational cluster color. Not derived from shard health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterStatus {
    #[default]
    Green,
    Yellow,
    Red,
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClusterStatus::Green => "green",
            ClusterStatus::Yellow => "yellow",
            ClusterStatus::Red => "red",
        };
        f.write_str(s)
    }
}

/// Top-level service: the mapping from index name to [`Index`] under one
/// on-disk home, plus lazy index creation and cluster bookkeeping.
///
/// [`Catalog::open`] scans the home directory and loads every subdirectory
/// as an index; unknown names are created lazily on first write. The
/// registry is a `DashMap`, so concurrent first-writes to the same name
/// resolve to a single index (no duplicate creation race).
pub struct Catalog {
    home: PathBuf,
    cluster_name: String,
    indices: DashMap<IndexName, Arc<Index>>,
    status: ClusterStatus,
    nodes: NodeRegistry,
}

impl Catalog {
    /// Create `home` if absent, then load one index per subdirectory.
    pub fn open(home: &Path, cluster_name: &str, node_name: &str) -> Result<Arc<Catalog>> {
        if home.exists() {
            info!("loading indices from {}", home.display());
        } else {
            info!("creating {}", home.display());
            std::fs::create_dir_all(home)?;
        }

        let indices = DashMap::new();
        for entry in std::fs::read_dir(home)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let index = Index::open(&name, &entry.path(), DEFAULT_SHARD_COUNT)?;
            indices.insert(name, Arc::new(index));
        }

        Ok(Arc::new(Catalog {
            home: home.to_path_buf(),
            cluster_name: cluster_name.to_string(),
            indices,
            status: ClusterStatus::Green,
            nodes: NodeRegistry::with_local_node(node_name),
        }))
    }

    /// Start the periodic refresh task. Holds only a weak reference, so the
    /// loop winds down when the last strong handle to the catalog drops.
    pub fn spawn_refresh_loop(catalog: &Arc<Catalog>) -> JoinHandle<()> {
        let weak = Arc::downgrade(catalog);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(catalog) = weak.upgrade() else {
                    debug!("catalog dropped, stopping refresh loop");
                    break;
                };
                if let Err(e) = catalog.refresh(None).await {
                    error!("periodic refresh failed: {}", e);
                }
            }
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn find_index(&self, name: &str) -> Option<Arc<Index>> {
        self.indices.get(name).map(|r| Arc::clone(&r))
    }

    fn find_or_create_index(&self, name: &str) -> Result<Arc<Index>> {
        if let Some(index) = self.find_index(name) {
            return Ok(index);
        }
        // Entry holds a per-key lock, so two concurrent first-writes to the
        // same name create exactly one index.
        match self.indices.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(e) => Ok(Arc::clone(e.get())),
            dashmap::mapref::entry::Entry::Vacant(v) => {
                let index = Arc::new(Index::open(
                    name,
                    &self.home.join(name),
                    DEFAULT_SHARD_COUNT,
                )?);
                v.insert(Arc::clone(&index));
                Ok(index)
            }
        }
    }

    /// Buffer `docs` into the named index, creating it on first write.
    pub async fn index(&self, name: &str, docs: Vec<Document>) -> Result<ShardsHeader> {
        let index = self.find_or_create_index(name)?;
        Ok(index.index(docs).await)
    }

    /// Committed document count for an existing index.
    pub async fn count(&self, name: &str) -> Result<CountResponse> {
        debug!("counting index {}", name);
        let index = self
            .find_index(name)
            .ok_or_else(|| SiftError::IndexNotFound(name.to_string()))?;
        Ok(index.count().await)
    }

    /// Search an existing index; no implicit creation.
    pub async fn search(&self, name: &str, query: &str, size: usize) -> Result<SearchResponse> {
        debug!("searching index {} for {:?}", name, query);
        let index = self
            .find_index(name)
            .ok_or_else(|| SiftError::IndexNotFound(name.to_string()))?;
        Ok(index.search(query, size).await)
    }

    /// Flush pending writes: one index when `name` is given, otherwise every
    /// known index concurrently. Awaited either way, so returning means the
    /// writes are visible.
    pub async fn refresh(&self, name: Option<&str>) -> Result<RefreshResponse> {
        let total = match name {
            Some(name) => {
                let index = self
                    .find_index(name)
                    .ok_or_else(|| SiftError::IndexNotFound(name.to_string()))?;
                index.refresh().await;
                1
            }
            None => {
                let indices: Vec<Arc<Index>> =
                    self.indices.iter().map(|r| Arc::clone(&r)).collect();
                let total = indices.len();
                let handles: Vec<JoinHandle<usize>> = indices
                    .into_iter()
                    .map(|index| tokio::spawn(async move { index.refresh().await }))
                    .collect();
                for handle in handles {
                    if let Err(e) = handle.await {
                        warn!("refresh task panicked: {}", e);
                    }
                }
                total
            }
        };

        Ok(RefreshResponse {
            shards: RefreshShards {
                total,
                successful: total,
                failed: 0,
            },
        })
    }

    /// Static cluster health object for `/_cluster/health`.
    pub fn cluster_health(&self) -> serde_json::Value {
        serde_json::json!({
            "cluster_name": self.cluster_name,
            "status": self.status.to_string(),
            "timed_out": false,
        })
    }

    /// Tabular summary for `/_cat/indices`.
    pub async fn cat_indices(&self) -> String {
        let mut out = String::from(
            "index          health status pri rep docs.count docs.deleted store.size pri.store.size\n",
        );
        let indices: Vec<Arc<Index>> = self.indices.iter().map(|r| Arc::clone(&r)).collect();
        for index in indices {
            let count = index.count().await.count;
            out.push_str(&format!(
                "{:<14} {:<6} {:<6} {:>3} {:>3} {:>10}\n",
                index.name(),
                "green",
                "open",
                index.shard_count(),
                0,
                count
            ));
        }
        out
    }

    /// Tabular summary for `/_cat/nodes`.
    pub fn cat_nodes(&self) -> String {
        self.nodes.cat_nodes()
    }

    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    pub fn indices_len(&self) -> usize {
        self.indices.len()
    }

    /// Flush and release every index.
    pub async fn close(&self) {
        let indices: Vec<Arc<Index>> = self.indices.iter().map(|r| Arc::clone(&r)).collect();
        for index in indices {
            index.close().await;
        }
    }
}
