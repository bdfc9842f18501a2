//! The backing full-text engine, consumed through a capability interface.
//!
//! The orchestration layer (shards, indices, catalog) never touches
//! tokenization, scoring, or the on-disk format directly. It needs exactly
//! four capabilities: commit a batch of documents by id, run a query string
//! and get a ranked hit list, count committed documents, and fetch the
//! stored fields of one document. [`TextEngine`] is that seam; the default
//! implementation is [`TantivyEngine`].

mod tantivy;

pub use self::tantivy::TantivyEngine;

use crate::error::Result;
use crate::types::{Document, DocumentId};

/// One ranked hit from an engine query: identifier and relevance score,
/// no stored fields yet. Hydration is a separate [`TextEngine::fetch`] so
/// callers can truncate before paying for field retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineHit {
    pub id: DocumentId,
    pub score: f32,
}

/// Capability interface over a full-text index instance.
///
/// Implementations must be safe to share across threads: `put_batch` is
/// serialized by the owning shard's mutex, but `count`/`query`/`fetch` may
/// run concurrently with it and only observe committed state.
pub trait TextEngine: Send + Sync {
    /// Commit `docs` as one atomic unit, replacing any existing document
    /// with the same id. Documents become visible to `query`/`count`/`fetch`
    /// when this returns.
    fn put_batch(&self, docs: &[Document]) -> Result<()>;

    /// Number of committed documents.
    fn count(&self) -> Result<u64>;

    /// Run `expr` verbatim and return up to `limit` hits, best first.
    fn query(&self, expr: &str, limit: usize) -> Result<Vec<EngineHit>>;

    /// Stored fields of a committed document, or `None` if unknown.
    fn fetch(&self, id: &str) -> Result<Option<Document>>;
}
