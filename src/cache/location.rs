//! Location Index
//!
//! Maps each resident key to where its data lives. Locations are stored
//! packed into a `u32`:
//!
//! ```text
//! bit 31   bits 24..=30   bits 0..=23
//! [hot]    [bucket]       [cell]        (bucket/cell only when cold)
//! ```

use std::collections::HashMap;
use std::fmt;

/// Largest bucket count a packed location can address
pub const MAX_BUCKETS: usize = 1 << 7;

/// Largest cell count per bucket a packed location can address
pub const MAX_CELLS: usize = 1 << 24;

const HOT_BIT: u32 = 1 << 31;
const BUCKET_SHIFT: u32 = 24;
const BUCKET_MASK: u32 = (MAX_BUCKETS as u32 - 1) << BUCKET_SHIFT;
const CELL_MASK: u32 = MAX_CELLS as u32 - 1;

/// Where a key's data currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// In the hot tier, resolved by key
    Hot,
    /// In a cold bucket cell
    Cold {
        /// Bucket index in ascending cell-size order
        bucket: usize,
        /// Cell index within the bucket
        cell: usize,
    },
}

impl Location {
    /// Pack into the 32-bit representation
    pub fn encode(self) -> u32 {
        match self {
            Location::Hot => HOT_BIT,
            Location::Cold { bucket, cell } => {
                debug_assert!(bucket < MAX_BUCKETS && cell < MAX_CELLS);
                (((bucket as u32) << BUCKET_SHIFT) & BUCKET_MASK) | ((cell as u32) & CELL_MASK)
            }
        }
    }

    /// Unpack from the 32-bit representation
    pub fn decode(raw: u32) -> Self {
        if raw & HOT_BIT != 0 {
            Location::Hot
        } else {
            Location::Cold {
                bucket: ((raw & BUCKET_MASK) >> BUCKET_SHIFT) as usize,
                cell: (raw & CELL_MASK) as usize,
            }
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Hot => write!(f, "hot"),
            Location::Cold { bucket, cell } => write!(f, "cold(bucket={}, cell={})", bucket, cell),
        }
    }
}

/// Key to packed location map
#[derive(Debug, Default)]
pub struct LocationIndex {
    map: HashMap<String, u32>,
}

impl LocationIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<Location> {
        self.map.get(key).copied().map(Location::decode)
    }

    /// Record a key's location, replacing any previous one
    pub fn insert(&mut self, key: &str, location: Location) {
        match self.map.get_mut(key) {
            Some(raw) => *raw = location.encode(),
            None => {
                self.map.insert(key.to_owned(), location.encode());
            }
        }
    }

    /// Forget a key
    pub fn remove(&mut self, key: &str) -> Option<Location> {
        self.map.remove(key).map(Location::decode)
    }

    /// Forget every key stored in a cold bucket. Returns how many were dropped.
    pub fn remove_bucket(&mut self, bucket: usize) -> usize {
        let before = self.map.len();
        self.map.retain(|_, raw| match Location::decode(*raw) {
            Location::Cold { bucket: b, .. } => b != bucket,
            Location::Hot => true,
        });
        before - self.map.len()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Number of indexed keys
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if no key is indexed
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_layout() {
        assert_eq!(Location::Hot.encode(), 0x8000_0000);
        assert_eq!(Location::Cold { bucket: 0, cell: 63 }.encode(), 63);
        assert_eq!(
            Location::Cold { bucket: 3, cell: 0x00AB_CDEF }.encode(),
            0x03AB_CDEF
        );
    }

    #[test]
    fn test_decode_extremes() {
        let loc = Location::Cold {
            bucket: MAX_BUCKETS - 1,
            cell: MAX_CELLS - 1,
        };
        assert_eq!(loc.encode(), 0x7FFF_FFFF);
        assert_eq!(Location::decode(0x7FFF_FFFF), loc);
        assert_eq!(Location::decode(0xFFFF_FFFF), Location::Hot);
    }

    #[test]
    fn test_index_insert_replace_remove() {
        let mut index = LocationIndex::new();
        index.insert("k", Location::Cold { bucket: 1, cell: 5 });
        assert_eq!(index.get("k"), Some(Location::Cold { bucket: 1, cell: 5 }));

        index.insert("k", Location::Hot);
        assert_eq!(index.get("k"), Some(Location::Hot));
        assert_eq!(index.len(), 1);

        assert_eq!(index.remove("k"), Some(Location::Hot));
        assert!(index.get("k").is_none());
    }

    #[test]
    fn test_remove_bucket_keeps_others() {
        let mut index = LocationIndex::new();
        index.insert("a", Location::Cold { bucket: 0, cell: 63 });
        index.insert("b", Location::Cold { bucket: 0, cell: 62 });
        index.insert("c", Location::Cold { bucket: 1, cell: 63 });
        index.insert("d", Location::Hot);

        assert_eq!(index.remove_bucket(0), 2);
        assert!(index.get("a").is_none());
        assert!(index.get("c").is_some());
        assert!(index.get("d").is_some());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::Hot.to_string(), "hot");
        assert_eq!(
            Location::Cold { bucket: 2, cell: 7 }.to_string(),
            "cold(bucket=2, cell=7)"
        );
    }
}
