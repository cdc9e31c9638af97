//! Buffer Cache - Unified Two-Tier Accumulator
//!
//! Routes puts between the cold and hot tiers, promotes keys on their
//! second put, and drives every flush through the sink.
//!
//! # Placement
//!
//! ```text
//!            put (fits a bucket)          put (same key)
//!  Absent ───────────────────────▶ Cold ─────────────────▶ Hot ──┐
//!    │                                                      ▲    │ put
//!    └──────────────── put (too large for every bucket) ────┘ ◀──┘
//!
//!  flush(): every state ──▶ Absent
//! ```
//!
//! A key never returns to cold within a flush epoch except by being flushed
//! out of the hot tier and placed again as a new key.

use tracing::{debug, info, trace};

use super::cold::ColdCache;
use super::compression::Compressor;
use super::config::CacheConfig;
use super::hot::{Admission, HotCache};
use super::location::{Location, LocationIndex};
use super::metrics::{CacheCounters, MetricsSnapshot};
use super::prefix::PREFIX_LEN;
use super::sink::{Emitter, FlushSink, NoopSink};
use crate::error::Result;

/// Write-optimized key-addressed buffer accumulator.
///
/// Single-owner: no internal locking. The sink runs synchronously inside
/// [`put`](Self::put) and [`flush`](Self::flush). Data still resident when
/// the cache is dropped is discarded; call `flush` first to keep it.
pub struct BufferCache {
    /// Configuration
    config: CacheConfig,
    /// Keys seen once
    cold: ColdCache,
    /// Keys seen repeatedly
    hot: HotCache,
    /// Key to tier/cell
    index: LocationIndex,
    /// Present when compression is enabled
    compressor: Option<Compressor>,
    /// Decompression, reassembly and the sink
    emitter: Emitter,
    /// Event counters
    counters: CacheCounters,
    /// Reused to carry a cold payload into the hot tier
    promote_buf: Vec<u8>,
}

impl BufferCache {
    /// Create a cache that discards flushed buffers
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_sink(config, NoopSink)
    }

    /// Create a cache delivering flushed buffers to `sink`
    pub fn with_sink(config: CacheConfig, sink: impl FlushSink + 'static) -> Result<Self> {
        config.validate()?;

        info!(
            max_capacity = config.max_capacity,
            max_buffer_length = config.max_buffer_length,
            cells_per_bucket = config.cells_per_bucket,
            buckets = ?config.buckets,
            compression = config.enable_compression,
            "Creating buffer cache"
        );

        Ok(Self {
            cold: ColdCache::new(&config.buckets, config.cells_per_bucket),
            hot: HotCache::new(config.max_capacity, config.max_buffer_length),
            index: LocationIndex::new(),
            compressor: config.enable_compression.then(Compressor::new),
            emitter: Emitter::new(Box::new(sink)),
            counters: CacheCounters::default(),
            promote_buf: Vec::new(),
            config,
        })
    }

    /// Append `buf` under `key`.
    ///
    /// # Panics
    ///
    /// Panics if `buf` must go to the hot tier but is larger than
    /// `max_buffer_length` (minus the 4-byte prefix).
    pub fn put(&mut self, key: &str, buf: &[u8]) {
        self.counters.puts += 1;
        trace!(key, len = buf.len(), "put");

        let mut compressor = self.compressor.take();
        match compressor.as_mut().and_then(|c| c.compress(buf)) {
            Some(zbuf) => {
                self.counters.compressed_puts += 1;
                self.place(key, zbuf, true);
            }
            None => self.place(key, buf, false),
        }
        self.compressor = compressor;
    }

    /// Deliver every stored buffer to the sink and reset both tiers
    pub fn flush(&mut self) {
        let emitter = &mut self.emitter;
        let cold = self.cold.flush(|payload, compressed| emitter.emit_payload(payload, compressed));

        let mut hot = 0;
        for (_, entry) in self.hot.drain() {
            emitter.emit_entry(&entry);
            hot += 1;
        }

        self.index.clear();
        self.counters.full_flushes += 1;
        debug!(cold, hot, "Flushed buffer cache");
    }

    /// Snapshot of tier usage and counters
    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot::new(
            self.cold.metrics(),
            self.hot.len(),
            self.hot.size_bytes(),
            self.emitter.delivered(),
            self.counters,
        )
    }

    /// Where a key currently lives
    pub fn location(&self, key: &str) -> Option<Location> {
        self.index.get(key)
    }

    /// Check if a key is resident in either tier
    pub fn contains(&self, key: &str) -> bool {
        self.index.get(key).is_some()
    }

    /// Number of resident keys
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if nothing is resident
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Get reference to the cold tier
    pub fn cold(&self) -> &ColdCache {
        &self.cold
    }

    /// Get reference to the hot tier
    pub fn hot(&self) -> &HotCache {
        &self.hot
    }

    /// Get configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn place(&mut self, key: &str, payload: &[u8], compressed: bool) {
        match self.index.get(key) {
            None => self.insert_new(key, payload, compressed),
            Some(Location::Cold { bucket, cell }) => {
                self.promote(key, bucket, cell, payload, compressed)
            }
            Some(Location::Hot) => self.append_hot(key, payload, compressed),
        }
    }

    /// Place a key that is resident nowhere
    fn insert_new(&mut self, key: &str, payload: &[u8], compressed: bool) {
        let Some(bucket) = self.cold.smallest_fit(payload.len()) else {
            self.insert_hot(key, payload, compressed);
            return;
        };

        let emitter = &mut self.emitter;
        let placed = self
            .cold
            .put(bucket, payload, compressed, |p, c| emitter.emit_payload(p, c));

        if placed.evicted > 0 {
            let dropped = self.index.remove_bucket(bucket);
            self.counters.bucket_flushes += 1;
            debug!(bucket, evicted = placed.evicted, dropped, "Evicted cold bucket");
        }

        self.index.insert(
            key,
            Location::Cold {
                bucket,
                cell: placed.cell,
            },
        );
    }

    /// Start a hot entry for a key absent from the hot tier
    fn insert_hot(&mut self, key: &str, payload: &[u8], compressed: bool) {
        if self.hot.admit(key, payload.len()) == Admission::FlushTier {
            self.flush_hot_tier();
        }
        self.hot.push(key, payload, compressed);
        self.index.insert(key, Location::Hot);
    }

    fn append_hot(&mut self, key: &str, payload: &[u8], compressed: bool) {
        match self.hot.admit(key, payload.len()) {
            Admission::Append => self.hot.push(key, payload, compressed),
            Admission::FlushKey => {
                self.flush_hot_key(key);
                self.insert_new(key, payload, compressed);
            }
            Admission::FlushTier => {
                self.flush_hot_tier();
                self.insert_new(key, payload, compressed);
            }
        }
    }

    /// Move a cold key to the hot tier, old payload first
    fn promote(&mut self, key: &str, bucket: usize, cell: usize, payload: &[u8], compressed: bool) {
        let mut old = std::mem::take(&mut self.promote_buf);
        let old_compressed = self.cold.take(bucket, cell, &mut old);
        self.index.remove(key);

        // Old and new blocks are admitted as one pair
        let need = old.len() + payload.len() + 2 * PREFIX_LEN;
        if need <= self.config.max_buffer_length {
            if self.hot.size_bytes() + need > self.hot.max_capacity() {
                self.flush_hot_tier();
            }
            self.hot.push(key, &old, old_compressed);
            self.hot.push(key, payload, compressed);
            self.index.insert(key, Location::Hot);
            self.counters.promotions += 1;
            debug!(key, bucket, cell, "Promoted key to hot tier");
        } else {
            // The pair exceeds max_buffer_length: the old payload leaves on
            // its own and the new one is placed as a fresh key
            self.emitter.emit_payload(&old, old_compressed);
            self.insert_new(key, payload, compressed);
        }

        self.promote_buf = old;
    }

    fn flush_hot_key(&mut self, key: &str) {
        if let Some(entry) = self.hot.take(key) {
            self.emitter.emit_entry(&entry);
            self.index.remove(key);
            self.counters.hot_key_flushes += 1;
            debug!(key, bytes = entry.len(), "Hot key reached max_buffer_length, flushed");
        }
    }

    fn flush_hot_tier(&mut self) {
        let size = self.hot.size_bytes();
        let mut keys = 0;
        for (key, entry) in self.hot.drain() {
            self.emitter.emit_entry(&entry);
            self.index.remove(&key);
            keys += 1;
        }
        self.counters.hot_tier_flushes += 1;
        debug!(keys, bytes = size, "Hot tier reached max_capacity, flushed");
    }
}

impl std::fmt::Debug for BufferCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferCache")
            .field("config", &self.config)
            .field("keys", &self.index.len())
            .field("cold_entries", &self.cold.len())
            .field("hot_entries", &self.hot.len())
            .field("hot_bytes", &self.hot.size_bytes())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Flushed = Rc<RefCell<Vec<Vec<u8>>>>;

    fn config(max_capacity: usize, max_buffer_length: usize, buckets: &[usize]) -> CacheConfig {
        CacheConfig {
            max_capacity,
            max_buffer_length,
            cells_per_bucket: 64,
            buckets: buckets.to_vec(),
            enable_compression: false,
        }
    }

    fn recording_cache(config: CacheConfig) -> (BufferCache, Flushed) {
        let flushed: Flushed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&flushed);
        let cache = BufferCache::with_sink(config, move |buf: &[u8]| {
            sink.borrow_mut().push(buf.to_vec())
        })
        .unwrap();
        (cache, flushed)
    }

    #[test]
    fn test_cache_creation() {
        let cache = BufferCache::new(CacheConfig::default()).unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.metrics().flushes, 0);
        assert_eq!(cache.cold().buckets().len(), 5);
    }

    #[test]
    fn test_invalid_config_creates_nothing() {
        let result = BufferCache::new(config(100, 200, &[64]));
        assert!(result.is_err());
    }

    #[test]
    fn test_scenario_cold_promotion_flush() {
        let (mut cache, flushed) = recording_cache(config(512, 128, &[64]));

        cache.put("k1", b"aaaa");
        assert_eq!(cache.location("k1"), Some(Location::Cold { bucket: 0, cell: 63 }));

        cache.put("k2", b"bbbbb");
        assert_eq!(cache.location("k2"), Some(Location::Cold { bucket: 0, cell: 62 }));

        cache.put("k1", b"cccc");
        assert_eq!(cache.location("k1"), Some(Location::Hot));
        assert!(!cache.cold().bucket(0).is_occupied(63));
        assert!(cache.cold().bucket(0).is_occupied(62));
        assert!(flushed.borrow().is_empty());

        cache.flush();
        let mut out = flushed.borrow().clone();
        out.sort();
        assert_eq!(out, vec![b"aaaa\ncccc".to_vec(), b"bbbbb".to_vec()]);
        assert!(cache.is_empty());
        assert_eq!(cache.hot().size_bytes(), 0);
        assert_eq!(cache.metrics().flushes, 2);
    }

    #[test]
    fn test_cold_bucket_auto_flush() {
        let (mut cache, flushed) = recording_cache(config(512, 128, &[64]));

        for i in 0..64 {
            cache.put(&format!("key-{}", i), format!("v{}", i).as_bytes());
        }
        assert!(flushed.borrow().is_empty());
        assert_eq!(cache.len(), 64);

        cache.put("one-more", b"x");
        assert_eq!(flushed.borrow().len(), 64);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("one-more"));
        assert!(!cache.contains("key-0"));

        let metrics = cache.metrics();
        assert_eq!(metrics.bucket_flushes, 1);
        assert_eq!(metrics.cold_entries, 1);
    }

    #[test]
    fn test_per_key_overflow_restarts_cold() {
        let (mut cache, flushed) = recording_cache(config(512, 32, &[16]));

        cache.put("k", b"xxxxxxxxxx");
        cache.put("k", b"yyyyyyyyyy"); // hot, 28 bytes
        assert_eq!(cache.hot().get("k").map(<[u8]>::len), Some(28));

        cache.put("k", b"zzzzzzzzzz"); // 28 + 14 > 32
        assert_eq!(*flushed.borrow(), vec![b"xxxxxxxxxx\nyyyyyyyyyy".to_vec()]);
        assert_eq!(cache.location("k"), Some(Location::Cold { bucket: 0, cell: 63 }));
        assert!(cache.hot().is_empty());
        assert_eq!(cache.metrics().hot_key_flushes, 1);
    }

    #[test]
    fn test_hot_tier_overflow_flushes_everything() {
        let (mut cache, flushed) = recording_cache(config(64, 32, &[]));

        cache.put("a", &[b'a'; 20]);
        cache.put("b", &[b'b'; 20]);
        assert_eq!(cache.hot().size_bytes(), 48);

        cache.put("c", &[b'c'; 20]);
        assert_eq!(flushed.borrow().len(), 2);
        assert_eq!(cache.hot().len(), 1);
        assert_eq!(cache.hot().size_bytes(), 24);
        assert_eq!(cache.location("c"), Some(Location::Hot));
        assert!(!cache.contains("a"));
        assert_eq!(cache.metrics().hot_tier_flushes, 1);
    }

    #[test]
    fn test_tier_overflow_on_append_replaces_key() {
        let (mut cache, flushed) = recording_cache(config(40, 32, &[]));

        cache.put("a", &[b'a'; 12]); // 16
        cache.put("b", &[b'b'; 12]); // 32
        cache.put("a", &[b'A'; 8]); // 32 + 12 > 40

        let mut out = flushed.borrow().clone();
        out.sort();
        assert_eq!(out, vec![vec![b'a'; 12], vec![b'b'; 12]]);
        assert_eq!(cache.hot().get("a").map(<[u8]>::len), Some(12));
        assert!(!cache.contains("b"));
    }

    #[test]
    fn test_capacity_invariants_hold_after_every_put() {
        let (mut cache, _) = recording_cache(config(256, 64, &[16, 32]));

        for i in 0..500usize {
            let key = format!("k{}", i % 7);
            let len = (i * 13) % 50;
            cache.put(&key, &vec![b'x'; len]);

            assert!(cache.hot().size_bytes() <= 256);
            for k in 0..7 {
                if let Some(entry) = cache.hot().get(&format!("k{}", k)) {
                    assert!(entry.len() <= 64);
                }
            }
        }
    }

    #[test]
    fn test_oversize_goes_directly_hot() {
        let (mut cache, _) = recording_cache(config(512, 128, &[16]));
        cache.put("big", &[0u8; 100]);

        assert_eq!(cache.location("big"), Some(Location::Hot));
        assert_eq!(cache.hot().size_bytes(), 100 + PREFIX_LEN);
        assert!(cache.cold().is_empty());
    }

    #[test]
    #[should_panic(expected = "exceeds max_buffer_length")]
    fn test_put_larger_than_max_buffer_length_panics() {
        let mut cache = BufferCache::new(config(512, 32, &[])).unwrap();
        cache.put("k", &[0u8; 29]);
    }

    #[test]
    fn test_promotion_with_cell_larger_than_hot_limit() {
        let (mut cache, flushed) = recording_cache(config(512, 32, &[64]));

        cache.put("k", &[b'o'; 50]);
        cache.put("k", b"new");

        assert_eq!(*flushed.borrow(), vec![vec![b'o'; 50]]);
        assert_eq!(cache.location("k"), Some(Location::Cold { bucket: 0, cell: 63 }));
        assert_eq!(cache.metrics().promotions, 0);
    }

    #[test]
    fn test_promotion_into_full_tier_keeps_pair_together() {
        let (mut cache, flushed) = recording_cache(config(40, 32, &[16]));

        cache.put("a", &[b'a'; 12]);
        cache.put("a", &[b'a'; 12]);
        assert_eq!(cache.hot().size_bytes(), 32);

        cache.put("k", b"old1");
        cache.put("k", b"new1"); // 32 + 16 > 40

        assert_eq!(cache.location("k"), Some(Location::Hot));
        assert_eq!(cache.hot().size_bytes(), 16);
        assert!(!cache.contains("a"));

        cache.flush();
        let mut a_joined = vec![b'a'; 12];
        a_joined.push(b'\n');
        a_joined.extend_from_slice(&[b'a'; 12]);
        assert_eq!(*flushed.borrow(), vec![a_joined, b"old1\nnew1".to_vec()]);

        let metrics = cache.metrics();
        assert_eq!(metrics.promotions, 2);
        assert_eq!(metrics.hot_tier_flushes, 1);
    }

    #[test]
    fn test_promotion_pair_above_buffer_limit_splits() {
        let (mut cache, flushed) = recording_cache(config(512, 32, &[16]));

        cache.put("k", &[b'o'; 12]);
        cache.put("k", &[b'n'; 12]); // 16 + 16 fits exactly
        assert_eq!(cache.location("k"), Some(Location::Hot));
        cache.flush();

        cache.put("k", &[b'o'; 12]);
        cache.put("k", &[b'n'; 13]); // 16 + 17 > 32
        assert_eq!(flushed.borrow().last(), Some(&vec![b'o'; 12]));
        assert_eq!(cache.location("k"), Some(Location::Hot));
        assert_eq!(cache.metrics().promotions, 1);
    }

    #[test]
    fn test_compression_transparent_to_sink() {
        let mut cfg = config(4096, 2048, &[64, 256]);
        cfg.enable_compression = true;
        let (mut cache, flushed) = recording_cache(cfg);

        let text = b"2026-10-17T00:00:00Z level=info msg=\"request served\" ".repeat(20);
        cache.put("log", &text);

        let metrics = cache.metrics();
        assert_eq!(metrics.compressed_puts, 1);
        // Compressed well below the 1060 raw bytes, so it lands in a cold cell
        assert!(matches!(cache.location("log"), Some(Location::Cold { .. })));

        cache.put("log", &text);
        cache.flush();

        let mut expected = text.clone();
        expected.push(b'\n');
        expected.extend_from_slice(&text);
        assert_eq!(*flushed.borrow(), vec![expected]);
    }

    #[test]
    fn test_compression_fallback_stores_raw() {
        let mut cfg = config(512, 128, &[64]);
        cfg.enable_compression = true;
        let (mut cache, flushed) = recording_cache(cfg);

        cache.put("k", &[0xA7]);
        assert_eq!(cache.metrics().compressed_puts, 0);
        assert_eq!(cache.cold().get(0, 63), (&[0xA7u8][..], false));

        cache.flush();
        assert_eq!(*flushed.borrow(), vec![vec![0xA7]]);
    }

    #[test]
    fn test_flush_resets_and_cache_reusable() {
        let (mut cache, flushed) = recording_cache(config(512, 128, &[64]));

        cache.put("k", b"1");
        cache.put("k", b"2");
        cache.flush();
        assert!(cache.is_empty());

        // Back to absent: the next put lands cold again
        cache.put("k", b"3");
        assert_eq!(cache.location("k"), Some(Location::Cold { bucket: 0, cell: 63 }));

        cache.flush();
        assert_eq!(*flushed.borrow(), vec![b"1\n2".to_vec(), b"3".to_vec()]);
        assert_eq!(cache.metrics().full_flushes, 2);
    }

    #[test]
    fn test_empty_buffers_round_trip() {
        let (mut cache, flushed) = recording_cache(config(512, 128, &[64]));

        cache.put("k", b"");
        cache.put("k", b"");
        cache.flush();
        assert_eq!(*flushed.borrow(), vec![b"\n".to_vec()]);
    }

    #[test]
    fn test_metrics_snapshot() {
        let (mut cache, _) = recording_cache(config(512, 128, &[16, 64]));

        cache.put("a", b"x");
        cache.put("b", &[0u8; 40]);
        cache.put("c", b"y");
        cache.put("c", b"z");

        let metrics = cache.metrics();
        assert_eq!(metrics.puts, 4);
        assert_eq!(metrics.cold_entries, 2);
        assert_eq!(metrics.cold_size_bytes, 16 + 64);
        assert_eq!(metrics.buckets[0].entries, 1);
        assert_eq!(metrics.buckets[1].entries, 1);
        assert_eq!(metrics.hot_entries, 1);
        assert_eq!(metrics.hot_size_bytes, 2 * (PREFIX_LEN + 1));
        assert_eq!(metrics.promotions, 1);
        assert_eq!(metrics.total_entries(), 3);
    }
}
