//! Sharded index orchestration: shard-level write buffering, per-index
//! fan-out and result merging, and the top-level catalog that maps index
//! names to on-disk indices.

mod index;
mod manager;
mod shard;

pub use index::{
    CountResponse, HitsEnvelope, Index, RefreshResponse, RefreshShards, SearchResponse,
    ShardsHeader, TotalHits, DEFAULT_SHARD_COUNT,
};
pub use manager::{Catalog, ClusterStatus, REFRESH_INTERVAL};
pub use shard::{SearchHit, Shard, SHARD_BATCH_BYTES};

/// FNV-1a hash of a document identifier → 32-bit routing token.
fn fnv1a_32(data: &[u8]) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut h = OFFSET;
    for &b in data {
        h ^= b as u32;
        h = h.wrapping_mul(PRIME);
    }
    h
}

/// Owning shard for a document identifier. Pure function of the id and the
/// shard count; changing the shard count without a full reindex breaks
/// routing, which is why the count is fixed at index creation.
pub fn shard_for(id: &str, shard_count: u32) -> u32 {
    fnv1a_32(id.as_bytes()) % shard_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_is_deterministic() {
        for id in ["a", "b", "some-longer-id", ""] {
            assert_eq!(shard_for(id, 5), shard_for(id, 5));
        }
    }

    #[test]
    fn routing_stays_in_range() {
        for i in 0..1000 {
            let id = format!("doc-{i}");
            assert!(shard_for(&id, 5) < 5);
            assert_eq!(shard_for(&id, 1), 0);
        }
    }

    #[test]
    fn routing_spreads_across_shards() {
        let mut buckets = [0usize; 5];
        for i in 0..1000 {
            buckets[shard_for(&format!("doc-{i}"), 5) as usize] += 1;
        }
        // Uniform-ish: every shard owns a meaningful share of 1000 ids.
        for count in buckets {
            assert!(count > 100, "skewed routing: {buckets:?}");
        }
    }
}
