//! Cold Cache - Keys Seen Once
//!
//! An ascending list of [`Bucket`]s. A payload goes to the smallest bucket
//! whose cells can hold it; payloads too large for every bucket belong to
//! the hot tier instead.
//!
//! A full bucket is flushed as a whole (only that bucket, never its
//! neighbours) and the placement retried exactly once.

use tracing::debug;

use super::bucket::Bucket;
use super::metrics::{BucketMetrics, ColdMetrics};
use super::prefix::PREFIX_LEN;

/// Result of a cold placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColdPut {
    /// Cell that now holds the payload
    pub cell: usize,
    /// Payloads evicted from the bucket to make room (0 when none)
    pub evicted: usize,
}

/// Cold tier
#[derive(Debug)]
pub struct ColdCache {
    buckets: Vec<Bucket>,
}

impl ColdCache {
    /// Build one bucket per cell size.
    ///
    /// Sizes must already be validated as strictly ascending; see
    /// [`CacheConfig::validate`](super::config::CacheConfig::validate).
    pub fn new(cell_sizes: &[usize], cells_per_bucket: usize) -> Self {
        Self {
            buckets: cell_sizes
                .iter()
                .map(|&cell_bytes| Bucket::new(cell_bytes, cells_per_bucket))
                .collect(),
        }
    }

    /// Index of the first bucket whose cells fit `len` payload bytes
    pub fn smallest_fit(&self, len: usize) -> Option<usize> {
        let needed = len + PREFIX_LEN;
        self.buckets.iter().position(|b| b.cell_bytes() >= needed)
    }

    /// Store a payload in `bucket`, flushing that bucket through
    /// `on_flush` first if it is full.
    ///
    /// # Panics
    ///
    /// Panics if the bucket is still full right after being flushed.
    pub fn put<F>(&mut self, bucket: usize, payload: &[u8], compressed: bool, on_flush: F) -> ColdPut
    where
        F: FnMut(&[u8], bool),
    {
        if let Some(cell) = self.buckets[bucket].put(payload, compressed) {
            return ColdPut { cell, evicted: 0 };
        }

        let evicted = self.flush_bucket(bucket, on_flush);
        let target = &mut self.buckets[bucket];
        debug!(
            bucket,
            cell_bytes = target.cell_bytes(),
            evicted,
            "Cold bucket full, flushed"
        );

        match target.put(payload, compressed) {
            Some(cell) => ColdPut { cell, evicted },
            None => panic!(
                "cold bucket {} ({} byte cells) still full immediately after flush",
                bucket,
                target.cell_bytes()
            ),
        }
    }

    /// Payload and compressed flag at a location
    pub fn get(&self, bucket: usize, cell: usize) -> (&[u8], bool) {
        self.buckets[bucket].get(cell)
    }

    /// Copy a payload into `out` and free its cell. Returns the compressed flag.
    pub fn take(&mut self, bucket: usize, cell: usize, out: &mut Vec<u8>) -> bool {
        let (payload, compressed) = self.buckets[bucket].get(cell);
        out.clear();
        out.extend_from_slice(payload);
        self.buckets[bucket].free(cell);
        compressed
    }

    /// Flush a single bucket
    pub fn flush_bucket<F>(&mut self, bucket: usize, on_flush: F) -> usize
    where
        F: FnMut(&[u8], bool),
    {
        self.buckets[bucket].flush(on_flush)
    }

    /// Flush every bucket in configured order
    pub fn flush<F>(&mut self, mut on_flush: F) -> usize
    where
        F: FnMut(&[u8], bool),
    {
        self.buckets
            .iter_mut()
            .map(|bucket| bucket.flush(&mut on_flush))
            .sum()
    }

    /// Bucket by index
    pub fn bucket(&self, index: usize) -> &Bucket {
        &self.buckets[index]
    }

    /// All buckets in ascending cell size
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Number of stored payloads across buckets
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Bucket::num_buffers).sum()
    }

    /// Check if no payload is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregate bucket statistics
    pub fn metrics(&self) -> ColdMetrics {
        let buckets: Vec<BucketMetrics> = self
            .buckets
            .iter()
            .map(|b| BucketMetrics {
                cell_bytes: b.cell_bytes(),
                cell_count: b.cell_count(),
                entries: b.num_buffers(),
                fill_ratio: b.fill_ratio(),
                size_bytes: b.size_bytes(),
                payload_bytes: b.payload_bytes(),
            })
            .collect();

        ColdMetrics {
            entries: buckets.iter().map(|b| b.entries).sum(),
            size_bytes: buckets.iter().map(|b| b.size_bytes).sum(),
            buckets,
        }
    }
}
