/// End-to-end library coverage: catalog lifecycle, sharded indexing,
/// near-real-time visibility, ranked merge, and on-disk persistence.
use serde_json::json;
use tempfile::TempDir;

use sift::{Catalog, Document, Index, SiftError};

fn doc(id: &str, title: &str) -> Document {
    Document::from_json_tagged(id, &json!({"title": title, "body": "filler text"})).unwrap()
}

/// A write is invisible until refresh, then searchable with its exact
/// identifier and source.
#[tokio::test]
async fn index_refresh_search_round_trip() {
    let tmp = TempDir::new().unwrap();
    let catalog = Catalog::open(tmp.path(), "test-cluster", "node-1").unwrap();

    let source = json!({"title": "the quick brown fox", "views": 7});
    let docs = vec![Document::from_json_tagged("42", &source).unwrap()];
    let header = catalog.index("articles", docs).await.unwrap();
    assert_eq!(header.failed, 0);

    // Buffered but not committed yet.
    let r = catalog.search("articles", "title:fox", 10).await.unwrap();
    assert_eq!(r.hits.total.value, 0, "uncommitted write leaked into search");
    assert_eq!(catalog.count("articles").await.unwrap().count, 0);

    catalog.refresh(Some("articles")).await.unwrap();

    let r = catalog.search("articles", "title:fox", 10).await.unwrap();
    assert_eq!(r.hits.total.value, 1);
    let hit = &r.hits.hits[0];
    assert_eq!(hit.id, "42");
    assert_eq!(hit.index, "articles");
    assert!(hit.score > 0.0);
    assert_eq!(hit.source["title"], "the quick brown fox");
    assert_eq!(hit.source["views"], 7);
    assert_eq!(hit.source["id"], "42");

    catalog.close().await;
}

/// Count sums every shard regardless of where routing placed each document.
#[tokio::test]
async fn count_spans_all_shards() {
    let tmp = TempDir::new().unwrap();
    let index = Index::open("logs", &tmp.path().join("logs"), 5).unwrap();
    assert_eq!(index.shard_count(), 5);

    let docs: Vec<Document> = (0..50).map(|i| doc(&i.to_string(), "entry")).collect();
    index.index(docs).await;
    index.refresh().await;

    let r = index.count().await;
    assert_eq!(r.count, 50);
    assert_eq!(r.shards.total, 5);
    assert_eq!(r.shards.failed, 0);

    index.close().await;
}

#[tokio::test]
async fn single_shard_index_holds_everything() {
    let tmp = TempDir::new().unwrap();
    let index = Index::open("tiny", &tmp.path().join("tiny"), 1).unwrap();

    let docs: Vec<Document> = (0..8).map(|i| doc(&i.to_string(), "solo")).collect();
    index.index(docs).await;
    index.refresh().await;

    assert_eq!(index.count().await.count, 8);
    let r = index.search("title:solo", 100).await;
    assert_eq!(r.hits.total.value, 8);

    index.close().await;
}

/// Refresh with nothing pending is a no-op on every shard.
#[tokio::test]
async fn refresh_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let catalog = Catalog::open(tmp.path(), "test-cluster", "node-1").unwrap();

    catalog
        .index("idem", vec![doc("1", "once")])
        .await
        .unwrap();
    let r = catalog.refresh(Some("idem")).await.unwrap();
    assert_eq!(r.shards.failed, 0);

    // Second pass commits nothing and still succeeds.
    let r = catalog.refresh(Some("idem")).await.unwrap();
    assert_eq!(r.shards.failed, 0);
    assert_eq!(catalog.count("idem").await.unwrap().count, 1);

    catalog.close().await;
}

/// The bare refresh endpoint walks every index in the catalog.
#[tokio::test]
async fn refresh_all_covers_every_index() {
    let tmp = TempDir::new().unwrap();
    let catalog = Catalog::open(tmp.path(), "test-cluster", "node-1").unwrap();

    catalog.index("alpha", vec![doc("a", "one")]).await.unwrap();
    catalog.index("beta", vec![doc("b", "two")]).await.unwrap();

    let r = catalog.refresh(None).await.unwrap();
    assert_eq!(r.shards.failed, 0);
    assert_eq!(r.shards.total, 2, "one entry per refreshed index");

    assert_eq!(catalog.count("alpha").await.unwrap().count, 1);
    assert_eq!(catalog.count("beta").await.unwrap().count, 1);

    catalog.close().await;
}

/// Merged results come back sorted by score descending and truncated
/// to the requested size.
#[tokio::test]
async fn search_merges_ranked_and_truncated() {
    let tmp = TempDir::new().unwrap();
    let catalog = Catalog::open(tmp.path(), "test-cluster", "node-1").unwrap();

    let mut docs = Vec::new();
    for i in 0..20 {
        // Repeating the term raises its score, giving a known ranking signal.
        let title = if i == 0 {
            "needle needle needle".to_string()
        } else {
            format!("needle haystack {}", i)
        };
        docs.push(Document::from_json_tagged(i.to_string(), &json!({"title": title})).unwrap());
    }
    catalog.index("ranked", docs).await.unwrap();
    catalog.refresh(Some("ranked")).await.unwrap();

    let r = catalog.search("ranked", "title:needle", 5).await.unwrap();
    assert_eq!(r.hits.hits.len(), 5);
    assert_eq!(r.hits.total.value, 5);
    for pair in r.hits.hits.windows(2) {
        assert!(
            pair[0].score >= pair[1].score,
            "merge order broken: {} before {}",
            pair[0].score,
            pair[1].score
        );
    }
    assert_eq!(r.hits.hits[0].id, "0", "highest-frequency doc should rank first");

    catalog.close().await;
}

/// Re-opening a catalog home finds the indices and documents written by the
/// previous instance.
#[tokio::test]
async fn catalog_reopens_from_disk() {
    let tmp = TempDir::new().unwrap();

    {
        let catalog = Catalog::open(tmp.path(), "test-cluster", "node-1").unwrap();
        let docs: Vec<Document> = (0..12).map(|i| doc(&i.to_string(), "durable")).collect();
        catalog.index("persist", docs).await.unwrap();
        catalog.refresh(Some("persist")).await.unwrap();
        catalog.close().await;
    }

    let catalog = Catalog::open(tmp.path(), "test-cluster", "node-1").unwrap();
    assert_eq!(catalog.indices_len(), 1);
    assert_eq!(catalog.count("persist").await.unwrap().count, 12);
    let r = catalog.search("persist", "title:durable", 20).await.unwrap();
    assert_eq!(r.hits.total.value, 12);

    catalog.close().await;
}

/// Writing to an unknown index creates it; reading from one is an error.
#[tokio::test]
async fn lazy_create_on_write_only() {
    let tmp = TempDir::new().unwrap();
    let catalog = Catalog::open(tmp.path(), "test-cluster", "node-1").unwrap();

    assert!(matches!(
        catalog.count("ghost").await,
        Err(SiftError::IndexNotFound(_))
    ));
    assert!(matches!(
        catalog.search("ghost", "x", 10).await,
        Err(SiftError::IndexNotFound(_))
    ));
    assert!(matches!(
        catalog.refresh(Some("ghost")).await,
        Err(SiftError::IndexNotFound(_))
    ));

    catalog.index("ghost", vec![doc("1", "now real")]).await.unwrap();
    assert!(catalog.find_index("ghost").is_some());
    assert!(tmp.path().join("ghost").is_dir());

    catalog.close().await;
}

#[tokio::test]
async fn cluster_health_and_cat_output() {
    let tmp = TempDir::new().unwrap();
    let catalog = Catalog::open(tmp.path(), "my-cluster", "node-1").unwrap();
    catalog.index("books", vec![doc("1", "title")]).await.unwrap();

    let health = catalog.cluster_health();
    assert_eq!(health["cluster_name"], "my-cluster");
    assert_eq!(health["status"], "green");

    let table = catalog.cat_indices().await;
    assert!(table.contains("books"), "missing index row: {}", table);

    let nodes = catalog.cat_nodes();
    assert!(nodes.contains("node-1"), "missing node row: {}", nodes);

    catalog.close().await;
}
