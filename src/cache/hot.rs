//! Hot Cache - Keys Seen Repeatedly
//!
//! Each key owns a growing buffer of prefixed blocks, one block per put.
//! Two ceilings apply:
//!
//! - `max_buffer_length` bounds a single key's buffer
//! - `max_capacity` bounds the sum of all buffers
//!
//! The hot cache decides which ceiling an append would break
//! ([`HotCache::admit`]); the owning [`BufferCache`](super::BufferCache)
//! performs the matching flush, since flushed keys re-enter placement.

use std::collections::HashMap;

use super::prefix::{write_block, PREFIX_LEN};

/// What an append needs before it can proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Fits as-is
    Append,
    /// The key's own buffer would overflow; flush that key first
    FlushKey,
    /// The tier would overflow; flush every key first
    FlushTier,
}

/// Hot tier
#[derive(Debug)]
pub struct HotCache {
    entries: HashMap<String, Vec<u8>>,
    size: usize,
    max_capacity: usize,
    max_buffer_length: usize,
}

impl HotCache {
    /// Create an empty tier with the given ceilings
    pub fn new(max_capacity: usize, max_buffer_length: usize) -> Self {
        Self {
            entries: HashMap::new(),
            size: 0,
            max_capacity,
            max_buffer_length,
        }
    }

    /// Whether a payload of `len` bytes can ever be held by one key
    pub fn can_hold(&self, len: usize) -> bool {
        len + PREFIX_LEN <= self.max_buffer_length
    }

    /// Decide how an append of `len` payload bytes under `key` proceeds.
    ///
    /// # Panics
    ///
    /// Panics if the block alone exceeds `max_buffer_length`; no flush can
    /// make room for it, so the caller's configuration is wrong.
    pub fn admit(&self, key: &str, len: usize) -> Admission {
        let need = len + PREFIX_LEN;
        assert!(
            need <= self.max_buffer_length,
            "buffer of {} bytes (+{} prefix) exceeds max_buffer_length {}",
            len,
            PREFIX_LEN,
            self.max_buffer_length
        );

        if let Some(entry) = self.entries.get(key) {
            if entry.len() + need > self.max_buffer_length {
                return Admission::FlushKey;
            }
        }
        if self.size + need > self.max_capacity {
            return Admission::FlushTier;
        }
        Admission::Append
    }

    /// Append a block. Callers must have received [`Admission::Append`].
    pub fn push(&mut self, key: &str, payload: &[u8], compressed: bool) {
        match self.entries.get_mut(key) {
            Some(entry) => write_block(entry, payload, compressed),
            None => {
                let mut entry = Vec::with_capacity(PREFIX_LEN + payload.len());
                write_block(&mut entry, payload, compressed);
                self.entries.insert(key.to_owned(), entry);
            }
        }
        self.size += PREFIX_LEN + payload.len();
        debug_assert!(self.size <= self.max_capacity);
    }

    /// Remove one key's buffer
    pub fn take(&mut self, key: &str) -> Option<Vec<u8>> {
        let entry = self.entries.remove(key)?;
        self.size -= entry.len();
        Some(entry)
    }

    /// Remove every buffer, leaving the tier empty
    pub fn drain(&mut self) -> impl Iterator<Item = (String, Vec<u8>)> + '_ {
        self.size = 0;
        self.entries.drain()
    }

    /// Raw prefixed blocks of a key
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Check if a key is resident
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the tier holds nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes held across keys, prefixes included
    pub fn size_bytes(&self) -> usize {
        self.size
    }

    /// Tier ceiling
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }
}
