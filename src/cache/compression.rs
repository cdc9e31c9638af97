//! Cache Compression Support
//!
//! LZ4 block compression into reusable scratch buffers, so steady-state
//! puts and flushes do not allocate.
//!
//! # Format
//!
//! ```text
//! [u32 LE uncompressed length][LZ4 block]
//! ```
//!
//! # Borrowing
//!
//! Results borrow the codec's scratch buffer and stay valid only until the
//! next call on the same codec. Copy them out to keep them longer.
//!
//! # Example
//!
//! ```
//! use bufcache::cache::compression::{Compressor, Decompressor};
//!
//! let mut compressor = Compressor::new();
//! let mut decompressor = Decompressor::new();
//!
//! let data = b"Hello, Hello, Hello, Hello, Hello, Hello, Hello!".repeat(4);
//! let compressed = compressor.compress(&data).expect("repetitive data compresses").to_vec();
//!
//! assert_eq!(decompressor.decompress_simple(&compressed), &data[..]);
//! ```

use lz4::block;

/// Size of the uncompressed-length header
pub const HEADER_LEN: usize = 4;

/// Smallest scratch size a grow step produces
const MIN_SCRATCH: usize = 64;

// =============================================================================
// Scratch Buffer
// =============================================================================

/// Growable byte buffer that never shrinks
#[derive(Debug, Default)]
pub struct ScratchBuffer {
    buf: Vec<u8>,
}

impl ScratchBuffer {
    /// Create with an initial size
    pub fn with_capacity(size: usize) -> Self {
        Self { buf: vec![0; size] }
    }

    /// Current usable size
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Grow by 50% (at least to `MIN_SCRATCH`), never past `limit` unless
    /// already larger. Existing bytes are kept and new bytes are zeroed.
    pub fn grow(&mut self, limit: usize) {
        let current = self.buf.len();
        let target = (current + current / 2).max(MIN_SCRATCH).min(limit.max(current + 1));
        self.buf.resize(target, 0);
    }

    /// Write `bytes` at `pos`, growing as needed
    pub fn copy(&mut self, pos: usize, bytes: &[u8]) {
        let end = pos + bytes.len();
        while self.buf.len() < end {
            self.grow(end);
        }
        self.buf[pos..end].copy_from_slice(bytes);
    }

    /// Borrow the first `len` bytes
    pub fn slice(&self, len: usize) -> &[u8] {
        &self.buf[..len]
    }

    fn tail_mut(&mut self, from: usize) -> &mut [u8] {
        &mut self.buf[from..]
    }
}

// =============================================================================
// Compressor
// =============================================================================

/// Worst-case encoded size for `len` input bytes, or `None` when LZ4
/// cannot take an input that large
pub fn worst_case_len(len: usize) -> Option<usize> {
    block::compress_bound(len).ok().map(|bound| bound + HEADER_LEN)
}

/// LZ4 compressor with a reusable output buffer
#[derive(Debug, Default)]
pub struct Compressor {
    scratch: ScratchBuffer,
}

impl Compressor {
    /// Create a compressor whose scratch buffer grows on first use
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a pre-sized scratch buffer
    pub fn with_capacity(size: usize) -> Self {
        Self {
            scratch: ScratchBuffer::with_capacity(size),
        }
    }

    /// Current scratch size
    pub fn capacity(&self) -> usize {
        self.scratch.capacity()
    }

    /// Compress `src`, or `None` when the encoded form would not be smaller.
    ///
    /// # Panics
    ///
    /// Panics if LZ4 still fails with a scratch buffer at the worst-case
    /// bound, which means the codec itself misbehaved.
    pub fn compress(&mut self, src: &[u8]) -> Option<&[u8]> {
        if src.is_empty() {
            return None;
        }
        let bound = worst_case_len(src.len())?;

        loop {
            if self.scratch.capacity() > HEADER_LEN {
                let attempt =
                    block::compress_to_buffer(src, None, false, self.scratch.tail_mut(HEADER_LEN));
                if let Ok(written) = attempt {
                    let total = HEADER_LEN + written;
                    if total >= src.len() {
                        return None;
                    }
                    self.scratch.copy(0, &(src.len() as u32).to_le_bytes());
                    return Some(self.scratch.slice(total));
                }
            }

            if self.scratch.capacity() >= bound {
                panic!(
                    "lz4 failed to compress {} bytes into a {} byte buffer (worst-case bound {})",
                    src.len(),
                    self.scratch.capacity(),
                    bound
                );
            }
            self.scratch.grow(bound);
        }
    }
}

// =============================================================================
// Decompressor
// =============================================================================

/// LZ4 decompressor with a reusable output buffer
#[derive(Debug, Default)]
pub struct Decompressor {
    scratch: ScratchBuffer,
}

impl Decompressor {
    /// Create a decompressor whose scratch buffer grows on first use
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a pre-sized scratch buffer
    pub fn with_capacity(size: usize) -> Self {
        Self {
            scratch: ScratchBuffer::with_capacity(size),
        }
    }

    /// Current scratch size
    pub fn capacity(&self) -> usize {
        self.scratch.capacity()
    }

    /// Decompress `src` into the scratch buffer, returning the byte count.
    ///
    /// # Panics
    ///
    /// Panics on malformed input. The cache only decompresses data it
    /// compressed itself, so this indicates memory corruption or a bug.
    pub fn decompress(&mut self, src: &[u8]) -> usize {
        assert!(
            src.len() >= HEADER_LEN,
            "compressed block of {} bytes is shorter than its header",
            src.len()
        );
        let expected = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if expected == 0 {
            return 0;
        }

        while self.scratch.capacity() < expected {
            self.scratch.grow(expected);
        }

        let size = expected as i32;
        match block::decompress_to_buffer(&src[HEADER_LEN..], Some(size), self.scratch.tail_mut(0)) {
            Ok(written) if written == expected => written,
            Ok(written) => panic!(
                "lz4 block declared {} bytes but decoded {}",
                expected, written
            ),
            Err(e) => panic!("malformed lz4 block ({} bytes): {}", src.len(), e),
        }
    }

    /// Decompress `src` and borrow the result
    pub fn decompress_simple(&mut self, src: &[u8]) -> &[u8] {
        let n = self.decompress(src);
        self.scratch.slice(n)
    }
}
