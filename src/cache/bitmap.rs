//! Occupancy Bitmap
//!
//! Fixed-size free/busy bit vector over 64-bit words.
//!
//! # Layout
//!
//! Cell `i` lives in word `i / 64` at bit `i % 64`. Scans walk the words in
//! order and, within a word, test the most significant bit first:
//!
//! ```text
//! word 0: [63 62 61 ... 1 0]   word 1: [127 126 ... 65 64]
//!          ^ first handed out          ^ first once word 0 is full
//! ```

/// Bits per backing word
pub const WORD_BITS: usize = 64;

/// Free/busy bit vector
#[derive(Debug, Clone)]
pub struct Bitmap {
    words: Vec<u64>,
}

impl Bitmap {
    /// Create an all-free bitmap covering `bits` cells.
    ///
    /// `bits` must be a multiple of [`WORD_BITS`]; validated configs
    /// guarantee it.
    pub fn new(bits: usize) -> Self {
        debug_assert_eq!(bits % WORD_BITS, 0);
        Self {
            words: vec![0; bits / WORD_BITS],
        }
    }

    /// Number of cells covered
    #[inline]
    pub fn len(&self) -> usize {
        self.words.len() * WORD_BITS
    }

    /// True when the bitmap covers no cells
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Find the first free cell in scan order
    pub fn find_free(&self) -> Option<usize> {
        self.words.iter().enumerate().find_map(|(w, &word)| {
            let free = !word;
            if free == 0 {
                return None;
            }
            let bit = WORD_BITS - 1 - free.leading_zeros() as usize;
            Some(w * WORD_BITS + bit)
        })
    }

    /// Mark a cell busy
    #[inline]
    pub fn set(&mut self, i: usize) {
        self.words[i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
    }

    /// Mark a cell free
    #[inline]
    pub fn clear(&mut self, i: usize) {
        self.words[i / WORD_BITS] &= !(1u64 << (i % WORD_BITS));
    }

    /// Check whether a cell is busy
    #[inline]
    pub fn is_set(&self, i: usize) -> bool {
        self.words[i / WORD_BITS] & (1u64 << (i % WORD_BITS)) != 0
    }

    /// Mark every cell free in one pass
    pub fn clear_all(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Number of busy cells
    pub fn count_set(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Busy cells in ascending index order
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &word)| {
            (0..WORD_BITS)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| w * WORD_BITS + bit)
        })
    }
}
