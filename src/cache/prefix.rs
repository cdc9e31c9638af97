//! Block Prefix
//!
//! Every stored buffer, in a cold cell or inside a hot entry, is preceded
//! by a 4-byte little-endian header:
//!
//! ```text
//! bit 31      bits 0..=30
//! [compressed][payload length]
//! ```

/// Prefix size in bytes
pub const PREFIX_LEN: usize = 4;

/// Largest payload the 31-bit length field can describe
pub const MAX_PAYLOAD_LEN: usize = (1 << 31) - 1;

const COMPRESSED_BIT: u32 = 1 << 31;

/// Decoded block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPrefix {
    /// Payload length in bytes
    pub len: usize,
    /// Whether the payload is compressed
    pub compressed: bool,
}

impl BlockPrefix {
    /// Create a prefix for a payload
    pub fn new(len: usize, compressed: bool) -> Self {
        assert!(
            len <= MAX_PAYLOAD_LEN,
            "payload of {} bytes exceeds the 31-bit length field",
            len
        );
        Self { len, compressed }
    }

    /// Encode to the on-arena representation
    #[inline]
    pub fn encode(&self) -> [u8; PREFIX_LEN] {
        let mut raw = self.len as u32;
        if self.compressed {
            raw |= COMPRESSED_BIT;
        }
        raw.to_le_bytes()
    }

    /// Decode from the first four bytes of `bytes`
    #[inline]
    pub fn decode(bytes: &[u8]) -> Self {
        let raw = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        Self {
            len: (raw & !COMPRESSED_BIT) as usize,
            compressed: raw & COMPRESSED_BIT != 0,
        }
    }

    /// Prefix plus payload
    #[inline]
    pub fn block_len(&self) -> usize {
        PREFIX_LEN + self.len
    }
}

/// Append a prefixed block to `out`
pub fn write_block(out: &mut Vec<u8>, payload: &[u8], compressed: bool) {
    out.extend_from_slice(&BlockPrefix::new(payload.len(), compressed).encode());
    out.extend_from_slice(payload);
}

/// Read the single prefixed block at the start of `bytes`
pub fn read_block(bytes: &[u8]) -> (&[u8], bool) {
    let prefix = BlockPrefix::decode(bytes);
    (&bytes[PREFIX_LEN..prefix.block_len()], prefix.compressed)
}

/// Iterator over concatenated prefixed blocks
pub struct Blocks<'a> {
    rest: &'a [u8],
}

impl<'a> Blocks<'a> {
    /// Iterate the blocks of a hot entry
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }
}

impl<'a> Iterator for Blocks<'a> {
    type Item = (&'a [u8], bool);

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let prefix = BlockPrefix::decode(self.rest);
        let (block, rest) = self.rest.split_at(prefix.block_len());
        self.rest = rest;
        Some((&block[PREFIX_LEN..], prefix.compressed))
    }
}
