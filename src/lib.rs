//! Sharded full-text document search with an Elasticsearch-compatible
//! surface.
//!
//! A [`Catalog`] owns a home directory of named indices; each [`Index`]
//! partitions its documents across a fixed set of [`Shard`]s by identifier
//! hash, and each shard buffers writes in front of a tantivy instance.
//! Writes become searchable on refresh, explicit or via the periodic
//! background loop. That is the near-real-time model.
//!
//! ```rust,no_run
//! use sift::{Catalog, Document};
//!
//! # async fn example() -> sift::Result<()> {
//! let catalog = Catalog::open("/tmp/sift".as_ref(), "sift", "node-1")?;
//! let doc = Document::from_json_tagged("1", &serde_json::json!({"title": "hello"}))?;
//! catalog.index("docs", vec![doc]).await?;
//! catalog.refresh(Some("docs")).await?;
//! let res = catalog.search("docs", "title:hello", 10).await?;
//! assert_eq!(res.hits.total.value, 1);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod cluster;
pub mod engine;
pub mod error;
pub mod types;

pub use catalog::{
    shard_for, Catalog, ClusterStatus, CountResponse, HitsEnvelope, Index, RefreshResponse,
    RefreshShards, SearchHit, SearchResponse, Shard, ShardsHeader, TotalHits,
    DEFAULT_SHARD_COUNT, REFRESH_INTERVAL, SHARD_BATCH_BYTES,
};
pub use cluster::{Node, NodeRegistry};
pub use engine::{EngineHit, TantivyEngine, TextEngine};
pub use error::{Result, SiftError};
pub use types::{Document, DocumentId, FieldValue, IndexName, DEFAULT_ID_FIELD};
