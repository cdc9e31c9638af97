//! Flush Sink
//!
//! Evicted buffers leave the cache through a [`FlushSink`] supplied at
//! construction. The sink runs synchronously on the caller's thread inside
//! `put` and `flush`, and the slice it receives borrows cache-internal
//! memory: copy whatever must outlive the call.

use super::compression::Decompressor;
use super::prefix::Blocks;

/// Receiver of evicted buffers
pub trait FlushSink {
    /// Called once per evicted logical buffer, always with decompressed bytes
    fn on_flush(&mut self, buf: &[u8]);
}

impl<F> FlushSink for F
where
    F: FnMut(&[u8]),
{
    fn on_flush(&mut self, buf: &[u8]) {
        self(buf)
    }
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl FlushSink for NoopSink {
    fn on_flush(&mut self, _buf: &[u8]) {}
}

/// Separator between blocks of a multi-put key
pub const BLOCK_SEPARATOR: u8 = b'\n';

/// Decompresses and reassembles stored blocks before handing them to the sink
pub(crate) struct Emitter {
    sink: Box<dyn FlushSink>,
    decompressor: Decompressor,
    joined: Vec<u8>,
    delivered: u64,
}

impl Emitter {
    pub(crate) fn new(sink: Box<dyn FlushSink>) -> Self {
        Self {
            sink,
            decompressor: Decompressor::new(),
            joined: Vec::new(),
            delivered: 0,
        }
    }

    /// Deliver one stored payload as-is (after decompression)
    pub(crate) fn emit_payload(&mut self, payload: &[u8], compressed: bool) {
        if compressed {
            let raw = self.decompressor.decompress_simple(payload);
            self.sink.on_flush(raw);
        } else {
            self.sink.on_flush(payload);
        }
        self.delivered += 1;
    }

    /// Deliver a hot entry: every block decompressed, joined by `\n`
    pub(crate) fn emit_entry(&mut self, entry: &[u8]) {
        self.joined.clear();
        for (i, (payload, compressed)) in Blocks::new(entry).enumerate() {
            if i > 0 {
                self.joined.push(BLOCK_SEPARATOR);
            }
            if compressed {
                let raw = self.decompressor.decompress_simple(payload);
                self.joined.extend_from_slice(raw);
            } else {
                self.joined.extend_from_slice(payload);
            }
        }
        self.sink.on_flush(&self.joined);
        self.delivered += 1;
    }

    /// Total sink invocations
    pub(crate) fn delivered(&self) -> u64 {
        self.delivered
    }
}
