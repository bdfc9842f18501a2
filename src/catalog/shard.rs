use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::engine::{TantivyEngine, TextEngine};
use crate::error::Result;
use crate::types::{Document, DocumentId};

/// Pending-batch flush threshold in bytes (approximate serialized size).
pub const SHARD_BATCH_BYTES: usize = 1 << 16;

/// One merged, ranked search result as it appears in the `hits.hits` array.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_shard")]
    pub shard: u32,
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(rename = "_score")]
    pub score: f32,
    #[serde(rename = "_source")]
    pub source: serde_json::Value,
}

#[derive(Default)]
struct PendingBatch {
    docs: Vec<Document>,
    bytes: usize,
}

/// An independently persisted partition of an index.
///
/// Owns one backing engine instance and one pending-write batch. The mutex
/// serializes batch mutation only; `count` and `search` read the engine
/// directly and therefore never observe buffered-but-unflushed writes. That
/// is the near-real-time consistency boundary: a write is invisible until
/// [`Shard::refresh`] commits it.
pub struct Shard {
    number: u32,
    index_name: String,
    engine: Box<dyn TextEngine>,
    pending: Mutex<PendingBatch>,
}

impl Shard {
    /// Open the shard's engine at `path`, creating it if absent.
    pub fn open(number: u32, index_name: &str, path: &Path) -> Result<Shard> {
        if path.join("meta.json").exists() {
            info!("loading shard {}/{}", index_name, number);
        } else {
            info!("creating shard {}/{}", index_name, number);
        }
        let engine = TantivyEngine::open_or_create(path)?;
        Ok(Shard::with_engine(number, index_name, Box::new(engine)))
    }

    /// Build a shard over an arbitrary engine. Used by the default
    /// constructor and by tests that inject failing or stubbed engines.
    pub fn with_engine(number: u32, index_name: &str, engine: Box<dyn TextEngine>) -> Shard {
        Shard {
            number,
            index_name: index_name.to_string(),
            engine,
            pending: Mutex::new(PendingBatch::default()),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Documents currently buffered and not yet visible.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().docs.len()
    }

    /// Append `docs` to the pending batch. When the next document would push
    /// the batch past [`SHARD_BATCH_BYTES`], the current batch is flushed to
    /// the engine first, then buffering continues.
    pub fn buffer(&self, docs: Vec<Document>) -> Result<()> {
        let mut pending = self.pending.lock().unwrap();
        for doc in docs {
            let size = doc.approx_size();
            if !pending.docs.is_empty() && pending.bytes + size >= SHARD_BATCH_BYTES {
                self.flush_locked(&mut pending)?;
            }
            pending.bytes += size;
            pending.docs.push(doc);
        }
        Ok(())
    }

    /// Commit the pending batch as one atomic unit. No-op when nothing is
    /// pending, so back-to-back refreshes are idempotent. Returns the number
    /// of documents committed.
    pub fn refresh(&self) -> Result<usize> {
        let mut pending = self.pending.lock().unwrap();
        self.flush_locked(&mut pending)
    }

    fn flush_locked(&self, pending: &mut PendingBatch) -> Result<usize> {
        if pending.docs.is_empty() {
            return Ok(0);
        }
        let flushed = pending.docs.len();
        debug!(
            "flushing {} docs ({} bytes) to shard {}/{}",
            flushed, pending.bytes, self.index_name, self.number
        );
        self.engine.put_batch(&pending.docs)?;
        pending.docs.clear();
        pending.bytes = 0;
        Ok(flushed)
    }

    /// Committed document count. Excludes anything still pending.
    pub fn count(&self) -> Result<u64> {
        self.engine.count()
    }

    /// Delegate the query expression verbatim to the engine, keep its
    /// ranking order, truncate to `max_hits`, then hydrate stored fields.
    /// Truncation happens before hydration to bound per-hit I/O.
    pub fn search(&self, query: &str, max_hits: usize) -> Result<Vec<SearchHit>> {
        let mut engine_hits = self.engine.query(query, max_hits)?;
        engine_hits.truncate(max_hits);

        let mut hits = Vec::with_capacity(engine_hits.len());
        for engine_hit in engine_hits {
            let Some(doc) = self.engine.fetch(&engine_hit.id)? else {
                warn!(
                    "shard {}/{}: hit {} vanished before hydration",
                    self.index_name, self.number, engine_hit.id
                );
                continue;
            };
            hits.push(SearchHit {
                index: self.index_name.clone(),
                shard: self.number,
                id: engine_hit.id,
                score: engine_hit.score,
                source: doc.to_json(),
            });
        }
        Ok(hits)
    }

    /// Final flush before the engine handle is released. The handle itself
    /// is freed when the shard is dropped.
    pub fn close(&self) -> Result<()> {
        let flushed = self.refresh()?;
        if flushed > 0 {
            info!(
                "closed shard {}/{} with {} docs flushed",
                self.index_name, self.number, flushed
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(id: &str, title: &str) -> Document {
        Document::from_json_tagged(id, &json!({ "title": title })).unwrap()
    }

    #[test]
    fn buffered_writes_are_invisible_until_refresh() {
        let tmp = TempDir::new().unwrap();
        let shard = Shard::open(0, "t", tmp.path()).unwrap();

        shard.buffer(vec![doc("1", "hello world")]).unwrap();
        assert_eq!(shard.pending_count(), 1);
        assert_eq!(shard.count().unwrap(), 0);
        assert!(shard.search("title:hello", 10).unwrap().is_empty());

        assert_eq!(shard.refresh().unwrap(), 1);
        assert_eq!(shard.pending_count(), 0);
        assert_eq!(shard.count().unwrap(), 1);
        let hits = shard.search("title:hello", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");
        assert_eq!(hits[0].source, json!({"id": "1", "title": "hello world"}));
    }

    #[test]
    fn refresh_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let shard = Shard::open(0, "t", tmp.path()).unwrap();

        shard.buffer(vec![doc("1", "a")]).unwrap();
        assert_eq!(shard.refresh().unwrap(), 1);
        assert_eq!(shard.refresh().unwrap(), 0);
        assert_eq!(shard.count().unwrap(), 1);
    }

    #[test]
    fn oversized_batch_flushes_early() {
        let tmp = TempDir::new().unwrap();
        let shard = Shard::open(0, "t", tmp.path()).unwrap();

        // Each doc is ~20 KiB, so the fourth append crosses the 64 KiB
        // threshold and forces a flush of the first three.
        let big = "x".repeat(20 * 1024);
        let docs: Vec<Document> = (0..4)
            .map(|i| Document::from_json_tagged(i.to_string(), &json!({ "body": big })).unwrap())
            .collect();
        shard.buffer(docs).unwrap();

        assert!(shard.count().unwrap() > 0, "early flush did not happen");
        assert!(shard.pending_count() < 4);

        shard.refresh().unwrap();
        assert_eq!(shard.count().unwrap(), 4);
    }

    #[test]
    fn search_truncates_to_max_hits() {
        let tmp = TempDir::new().unwrap();
        let shard = Shard::open(0, "t", tmp.path()).unwrap();

        let docs: Vec<Document> = (0..10).map(|i| doc(&i.to_string(), "same text")).collect();
        shard.buffer(docs).unwrap();
        shard.refresh().unwrap();

        assert_eq!(shard.search("title:same", 3).unwrap().len(), 3);
    }

    #[test]
    fn close_flushes_pending_writes() {
        let tmp = TempDir::new().unwrap();
        {
            let shard = Shard::open(0, "t", tmp.path()).unwrap();
            shard.buffer(vec![doc("1", "a")]).unwrap();
            shard.close().unwrap();
        }
        let shard = Shard::open(0, "t", tmp.path()).unwrap();
        assert_eq!(shard.count().unwrap(), 1);
    }
}
