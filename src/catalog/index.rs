use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, warn};

use super::shard::{SearchHit, Shard};
use super::shard_for;
use crate::error::{Result, SiftError};
use crate::types::Document;

/// Shard count for newly created indices. Fixed for the lifetime of an
/// index; there is no resharding.
pub const DEFAULT_SHARD_COUNT: u32 = 5;

/// Per-operation shard accounting, serialized as the `_shards` object.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ShardsHeader {
    pub total: usize,
    pub successful: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ShardsHeader {
    fn with_failures(total: usize, failed: usize) -> ShardsHeader {
        ShardsHeader {
            total,
            successful: total - failed,
            skipped: 0,
            failed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CountResponse {
    pub count: u64,
    #[serde(rename = "_shards")]
    pub shards: ShardsHeader,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TotalHits {
    pub value: usize,
    pub relation: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HitsEnvelope {
    pub total: TotalHits,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub took: u64,
    pub timed_out: bool,
    #[serde(rename = "_shards")]
    pub shards: ShardsHeader,
    pub hits: HitsEnvelope,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RefreshShards {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RefreshResponse {
    #[serde(rename = "_shards")]
    pub shards: RefreshShards,
}

/// A named federation of shards that looks like one index to the caller.
///
/// Routing is `fnv1a_32(id) % shard_count`; every read/write operation fans
/// out one blocking task per shard and joins all of them before returning,
/// so no shard task outlives its parent call.
pub struct Index {
    name: String,
    shards: BTreeMap<u32, Arc<Shard>>,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.name)
            .field("shard_count", &self.shards.len())
            .finish()
    }
}

impl Index {
    /// Load the index at `path` if it exists, otherwise create it with
    /// `shard_count` shards. A zero shard count is rejected: routing is
    /// `hash % shard_count`, which has no meaning over zero shards.
    pub fn open(name: &str, path: &Path, shard_count: u32) -> Result<Index> {
        if shard_count == 0 {
            return Err(SiftError::Config(format!(
                "index {} must have at least one shard",
                name
            )));
        }
        if path.exists() {
            Index::load(name, path, shard_count)
        } else {
            Index::create(name, path, shard_count)
        }
    }

    fn create(name: &str, path: &Path, shard_count: u32) -> Result<Index> {
        info!("creating index {} with {} shards", name, shard_count);
        std::fs::create_dir_all(path)?;

        let mut shards = BTreeMap::new();
        for number in 0..shard_count {
            let shard = Shard::open(number, name, &path.join(number.to_string()))?;
            shards.insert(number, Arc::new(shard));
        }
        Ok(Index {
            name: name.to_string(),
            shards,
        })
    }

    fn load(name: &str, path: &Path, shard_count: u32) -> Result<Index> {
        info!("loading index {}", name);

        let mut shards = BTreeMap::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let dir_name = file_name.to_string_lossy();
            let Ok(number) = dir_name.parse::<u32>() else {
                warn!("index {}: skipping bad shard directory {:?}", name, dir_name);
                continue;
            };
            let shard = Shard::open(number, name, &entry.path())?;
            shards.insert(number, Arc::new(shard));
        }

        if shards.is_empty() {
            warn!("index {}: no shards on disk, creating a fresh set", name);
            return Index::create(name, path, shard_count);
        }
        Ok(Index {
            name: name.to_string(),
            shards,
        })
    }

    /// Build an index directly from shards. Used by tests that inject
    /// stub or failing engines.
    pub fn from_shards(name: &str, shards: Vec<Shard>) -> Index {
        Index {
            name: name.to_string(),
            shards: shards
                .into_iter()
                .map(|s| (s.number(), Arc::new(s)))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Partition `docs` into per-shard buckets by routing hash and buffer
    /// each bucket concurrently. Fail-soft: a shard failure is reported in
    /// the header, sibling writes are not rolled back.
    pub async fn index(&self, docs: Vec<Document>) -> ShardsHeader {
        // Shard numbers are usually dense 0..n, but a hand-pruned data
        // directory can leave gaps; route by position so the bucket always
        // resolves to a live shard.
        let numbers: Vec<u32> = self.shards.keys().copied().collect();
        let shard_count = numbers.len() as u32;
        if shard_count == 0 {
            warn!("index {}: dropping {} docs, no shards to route to", self.name, docs.len());
            return ShardsHeader::with_failures(0, 0);
        }
        let mut buckets: HashMap<u32, Vec<Document>> = HashMap::new();
        for doc in docs {
            let position = shard_for(&doc.id, shard_count);
            buckets
                .entry(numbers[position as usize])
                .or_default()
                .push(doc);
        }

        let mut handles = Vec::with_capacity(buckets.len());
        for (number, bucket) in buckets {
            let shard = Arc::clone(&self.shards[&number]);
            handles.push((
                number,
                tokio::task::spawn_blocking(move || shard.buffer(bucket)),
            ));
        }

        let mut failed = 0;
        for (number, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("failed to index shard {}/{}: {}", self.name, number, e);
                    failed += 1;
                }
                Err(e) => {
                    error!("shard task {}/{} panicked: {}", self.name, number, e);
                    failed += 1;
                }
            }
        }
        ShardsHeader::with_failures(self.shards.len(), failed)
    }

    /// Sum committed counts across all shards. A failing shard contributes
    /// zero and bumps `failed` — degraded reads instead of a hard error.
    pub async fn count(&self) -> CountResponse {
        let mut handles = Vec::with_capacity(self.shards.len());
        for (&number, shard) in &self.shards {
            let shard = Arc::clone(shard);
            handles.push((number, tokio::task::spawn_blocking(move || shard.count())));
        }

        let mut total = 0u64;
        let mut failed = 0;
        for (number, handle) in handles {
            match handle.await {
                Ok(Ok(count)) => total += count,
                Ok(Err(e)) => {
                    warn!("failed to count shard {}/{}: {}", self.name, number, e);
                    failed += 1;
                }
                Err(e) => {
                    error!("shard task {}/{} panicked: {}", self.name, number, e);
                    failed += 1;
                }
            }
        }
        CountResponse {
            count: total,
            shards: ShardsHeader::with_failures(self.shards.len(), failed),
        }
    }

    /// Fan the query out to every shard, each independently capped at
    /// `size`, then merge: concatenate, stable-sort descending by score
    /// (ties keep shard dispatch order), truncate to `size`.
    ///
    /// Scores are commensurable across shards because each runs the same
    /// query with the same scoring function over a disjoint subset. The
    /// per-shard cap means a shard holding more than its share of the true
    /// top results can be under-represented; that approximation is inherited
    /// behavior, kept deliberately.
    pub async fn search(&self, query: &str, size: usize) -> SearchResponse {
        let start = Instant::now();

        let mut handles = Vec::with_capacity(self.shards.len());
        for (&number, shard) in &self.shards {
            let shard = Arc::clone(shard);
            let query = query.to_string();
            handles.push((
                number,
                tokio::task::spawn_blocking(move || shard.search(&query, size)),
            ));
        }

        let mut results: Vec<SearchHit> = Vec::new();
        let mut failed = 0;
        for (number, handle) in handles {
            match handle.await {
                Ok(Ok(hits)) => results.extend(hits),
                Ok(Err(e)) => {
                    error!("failed to search shard {}/{}: {}", self.name, number, e);
                    failed += 1;
                }
                Err(e) => {
                    error!("shard task {}/{} panicked: {}", self.name, number, e);
                    failed += 1;
                }
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(size);

        SearchResponse {
            took: start.elapsed().as_micros() as u64,
            timed_out: false,
            shards: ShardsHeader::with_failures(self.shards.len(), failed),
            hits: HitsEnvelope {
                total: TotalHits {
                    value: results.len(),
                    relation: "eq",
                },
                hits: results,
            },
        }
    }

    /// Flush every shard's pending batch, awaited so the caller has a
    /// reliable visibility barrier when this returns. Returns the number of
    /// documents made visible.
    pub async fn refresh(&self) -> usize {
        let mut handles = Vec::with_capacity(self.shards.len());
        for (&number, shard) in &self.shards {
            let shard = Arc::clone(shard);
            handles.push((number, tokio::task::spawn_blocking(move || shard.refresh())));
        }

        let mut flushed = 0;
        for (number, handle) in handles {
            match handle.await {
                Ok(Ok(n)) => flushed += n,
                Ok(Err(e)) => {
                    error!("failed to refresh shard {}/{}: {}", self.name, number, e);
                }
                Err(e) => {
                    error!("shard task {}/{} panicked: {}", self.name, number, e);
                }
            }
        }
        flushed
    }

    /// Flush and release every shard.
    pub async fn close(&self) {
        for (&number, shard) in &self.shards {
            let shard = Arc::clone(shard);
            match tokio::task::spawn_blocking(move || shard.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("failed to close shard {}/{}: {}", self.name, number, e),
                Err(e) => error!("shard task {}/{} panicked: {}", self.name, number, e),
            }
        }
    }
}
