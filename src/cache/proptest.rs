//! Property-Based Tests for the Buffer Cache
//!
//! # Test Properties
//!
//! 1. **Conservation**: every put reaches the sink exactly once, per key in put order
//! 2. **Bounds**: hot tier and per-key ceilings hold after every put
//! 3. **Index Consistency**: every indexed key is resident in the tier it names
//! 4. **Codec**: compressed payloads always decompress to the original
//! 5. **Allocation**: the bitmap never hands out an occupied cell

#![cfg(test)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use proptest::prelude::*;

use super::bitmap::Bitmap;
use super::compression::{Compressor, Decompressor};
use super::config::CacheConfig;
use super::location::Location;
use super::manager::BufferCache;

// =============================================================================
// Property Strategies
// =============================================================================

/// (key index, filler length) pairs; keys drawn from a small set so that
/// promotions and per-key overflow actually happen.
fn put_strategy() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0usize..6, 0usize..60), 1..300)
}

fn config_strategy() -> impl Strategy<Value = CacheConfig> {
    (any::<bool>(), prop::sample::select(vec![64usize, 128]), 128usize..=512).prop_map(
        |(enable_compression, cells_per_bucket, max_capacity)| CacheConfig {
            max_capacity,
            max_buffer_length: 128,
            cells_per_bucket,
            buckets: vec![16, 32, 64],
            enable_compression,
        },
    )
}

/// Payload tagged with its key and sequence number, never containing `\n`
fn payload(key: usize, seq: usize, filler: usize) -> Vec<u8> {
    let mut buf = format!("{}-{}-", key, seq).into_bytes();
    buf.extend(std::iter::repeat(b'x').take(filler));
    buf
}

fn key_of(block: &[u8]) -> String {
    let end = block.iter().position(|&b| b == b'-').unwrap_or(block.len());
    String::from_utf8_lossy(&block[..end]).into_owned()
}

// =============================================================================
// Cache Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: flushed output, split back into blocks, is exactly the puts
    /// of each key in order, and no delivery mixes keys.
    #[test]
    fn prop_every_put_delivered_once_in_order(
        config in config_strategy(),
        puts in put_strategy(),
    ) {
        let delivered: Rc<RefCell<Vec<Vec<u8>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&delivered);
        let mut cache = BufferCache::with_sink(config, move |buf: &[u8]| {
            sink.borrow_mut().push(buf.to_vec())
        })?;

        let mut expected: BTreeMap<String, Vec<Vec<u8>>> = BTreeMap::new();
        for (seq, &(key, filler)) in puts.iter().enumerate() {
            let buf = payload(key, seq, filler);
            cache.put(&key.to_string(), &buf);
            expected.entry(key.to_string()).or_default().push(buf);
        }
        cache.flush();
        prop_assert!(cache.is_empty());

        let mut actual: BTreeMap<String, Vec<Vec<u8>>> = BTreeMap::new();
        for output in delivered.borrow().iter() {
            let blocks: Vec<&[u8]> = output.split(|&b| b == b'\n').collect();
            let key = key_of(blocks[0]);
            for block in blocks {
                prop_assert_eq!(key_of(block), key.clone());
                actual.entry(key.clone()).or_default().push(block.to_vec());
            }
        }

        prop_assert_eq!(actual, expected);
        prop_assert_eq!(cache.metrics().flushes as usize, delivered.borrow().len());
    }

    /// Property: the hot tier never exceeds its ceilings and the index agrees
    /// with both tiers after every put.
    #[test]
    fn prop_bounds_and_index_hold(
        config in config_strategy(),
        puts in put_strategy(),
    ) {
        let max_capacity = config.max_capacity;
        let max_buffer_length = config.max_buffer_length;
        let mut cache = BufferCache::new(config)?;

        for (seq, &(key, filler)) in puts.iter().enumerate() {
            cache.put(&key.to_string(), &payload(key, seq, filler));

            prop_assert!(cache.hot().size_bytes() <= max_capacity);

            let metrics = cache.metrics();
            prop_assert_eq!(cache.len(), metrics.total_entries());

            for k in 0..6 {
                let name = k.to_string();
                match cache.location(&name) {
                    Some(Location::Hot) => {
                        let entry = cache.hot().get(&name);
                        prop_assert!(entry.is_some());
                        prop_assert!(entry.map_or(0, <[u8]>::len) <= max_buffer_length);
                    }
                    Some(Location::Cold { bucket, cell }) => {
                        prop_assert!(cache.cold().bucket(bucket).is_occupied(cell));
                        prop_assert!(!cache.hot().contains(&name));
                    }
                    None => prop_assert!(!cache.hot().contains(&name)),
                }
            }
        }
    }
}

// =============================================================================
// Codec and Allocation Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: whenever compression is accepted, the output is smaller and
    /// decompresses to the input.
    #[test]
    fn prop_compression_roundtrip(
        data in prop::collection::vec(prop::sample::select(b"abcd \n".to_vec()), 0..4096),
    ) {
        let mut compressor = Compressor::with_capacity(0);
        let mut decompressor = Decompressor::with_capacity(0);

        if let Some(compressed) = compressor.compress(&data) {
            prop_assert!(compressed.len() < data.len());
            let compressed = compressed.to_vec();
            prop_assert_eq!(decompressor.decompress_simple(&compressed), &data[..]);
        }
    }

    /// Property: allocation never returns an occupied cell, and a bitmap
    /// with free cells always finds one.
    #[test]
    fn prop_bitmap_allocation(ops in prop::collection::vec(any::<bool>(), 1..400)) {
        let mut bitmap = Bitmap::new(128);
        let mut taken = HashSet::new();

        for allocate in ops {
            if allocate || taken.is_empty() {
                match bitmap.find_free() {
                    Some(i) => {
                        prop_assert!(taken.insert(i));
                        bitmap.set(i);
                    }
                    None => prop_assert_eq!(taken.len(), 128),
                }
            } else {
                let victim = *taken.iter().next().unwrap();
                taken.remove(&victim);
                bitmap.clear(victim);
            }
            prop_assert_eq!(bitmap.count_set(), taken.len());
        }
    }
}
