//! Cache Metrics
//!
//! Counters live as plain fields on the owning cache and are only mutated
//! through its methods; [`MetricsSnapshot`] is the immutable view handed to
//! callers.

/// Per-bucket statistics
#[derive(Debug, Clone, PartialEq)]
pub struct BucketMetrics {
    /// Cell size in bytes
    pub cell_bytes: usize,
    /// Cells in the bucket
    pub cell_count: usize,
    /// Occupied cells
    pub entries: usize,
    /// Occupied fraction (0.0 - 1.0)
    pub fill_ratio: f64,
    /// Bytes reserved by occupied cells (`cell_bytes * entries`)
    pub size_bytes: usize,
    /// Payload bytes actually stored
    pub payload_bytes: usize,
}

/// Cold tier statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColdMetrics {
    /// One entry per bucket in ascending cell size
    pub buckets: Vec<BucketMetrics>,
    /// Occupied cells across buckets
    pub entries: usize,
    /// Reserved bytes across buckets
    pub size_bytes: usize,
}

/// Event counters accumulated over the cache lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheCounters {
    /// `put` calls
    pub puts: u64,
    /// Puts stored compressed
    pub compressed_puts: u64,
    /// Cold to hot promotions
    pub promotions: u64,
    /// Single cold buckets flushed because they were full
    pub bucket_flushes: u64,
    /// Single hot keys flushed because they hit `max_buffer_length`
    pub hot_key_flushes: u64,
    /// Whole hot tier flushed because it hit `max_capacity`
    pub hot_tier_flushes: u64,
    /// Explicit `flush` calls
    pub full_flushes: u64,
}

/// Snapshot of all cache metrics
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    // Cold
    pub buckets: Vec<BucketMetrics>,
    pub cold_entries: usize,
    pub cold_size_bytes: usize,

    // Hot
    pub hot_entries: usize,
    pub hot_size_bytes: usize,

    /// Sink invocations so far
    pub flushes: u64,

    // Events
    pub puts: u64,
    pub compressed_puts: u64,
    pub promotions: u64,
    pub bucket_flushes: u64,
    pub hot_key_flushes: u64,
    pub hot_tier_flushes: u64,
    pub full_flushes: u64,
}

impl MetricsSnapshot {
    /// Assemble a snapshot from tier statistics and counters
    pub fn new(
        cold: ColdMetrics,
        hot_entries: usize,
        hot_size_bytes: usize,
        flushes: u64,
        counters: CacheCounters,
    ) -> Self {
        Self {
            buckets: cold.buckets,
            cold_entries: cold.entries,
            cold_size_bytes: cold.size_bytes,
            hot_entries,
            hot_size_bytes,
            flushes,
            puts: counters.puts,
            compressed_puts: counters.compressed_puts,
            promotions: counters.promotions,
            bucket_flushes: counters.bucket_flushes,
            hot_key_flushes: counters.hot_key_flushes,
            hot_tier_flushes: counters.hot_tier_flushes,
            full_flushes: counters.full_flushes,
        }
    }

    /// Keys resident in either tier
    pub fn total_entries(&self) -> usize {
        self.cold_entries + self.hot_entries
    }

    /// Fraction of puts stored compressed
    pub fn compression_ratio(&self) -> f64 {
        if self.puts == 0 {
            0.0
        } else {
            self.compressed_puts as f64 / self.puts as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(cell_bytes: usize, entries: usize) -> BucketMetrics {
        BucketMetrics {
            cell_bytes,
            cell_count: 64,
            entries,
            fill_ratio: entries as f64 / 64.0,
            size_bytes: cell_bytes * entries,
            payload_bytes: entries,
        }
    }

    #[test]
    fn test_snapshot_assembly() {
        let cold = ColdMetrics {
            buckets: vec![bucket(16, 2), bucket(32, 1)],
            entries: 3,
            size_bytes: 64,
        };
        let counters = CacheCounters {
            puts: 10,
            compressed_puts: 4,
            promotions: 2,
            ..Default::default()
        };

        let snapshot = MetricsSnapshot::new(cold, 2, 40, 7, counters);
        assert_eq!(snapshot.buckets.len(), 2);
        assert_eq!(snapshot.cold_entries, 3);
        assert_eq!(snapshot.total_entries(), 5);
        assert_eq!(snapshot.flushes, 7);
        assert_eq!(snapshot.promotions, 2);
        assert!((snapshot.compression_ratio() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_compression_ratio_without_puts() {
        let snapshot =
            MetricsSnapshot::new(ColdMetrics::default(), 0, 0, 0, CacheCounters::default());
        assert_eq!(snapshot.compression_ratio(), 0.0);
    }
}
