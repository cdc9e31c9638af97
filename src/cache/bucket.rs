//! Cell Bucket
//!
//! A [`SlotArena`] of uniform cells where each occupied cell holds exactly
//! one prefixed payload. Buckets never grow: when every cell is taken the
//! owner flushes the bucket and retries.

use super::arena::SlotArena;
use super::prefix::{read_block, BlockPrefix, PREFIX_LEN};

/// Cold-tier bucket of `cell_count` cells of `cell_bytes` each
#[derive(Debug)]
pub struct Bucket {
    cells: SlotArena,
    payload_bytes: usize,
}

impl Bucket {
    /// Create a bucket with its arena fully allocated
    pub fn new(cell_bytes: usize, cell_count: usize) -> Self {
        Self {
            cells: SlotArena::new(cell_bytes, cell_count),
            payload_bytes: 0,
        }
    }

    /// Cell size in bytes (prefix included)
    pub fn cell_bytes(&self) -> usize {
        self.cells.slot_bytes()
    }

    /// Number of cells
    pub fn cell_count(&self) -> usize {
        self.cells.slot_count()
    }

    /// Whether a payload of `len` bytes fits in one cell
    pub fn fits(&self, len: usize) -> bool {
        len + PREFIX_LEN <= self.cell_bytes()
    }

    /// Store a payload, returning its cell or `None` when the bucket is full
    pub fn put(&mut self, payload: &[u8], compressed: bool) -> Option<usize> {
        debug_assert!(self.fits(payload.len()));
        let cell = self.cells.allocate()?;
        let slot = self.cells.slot_mut(cell);
        slot[..PREFIX_LEN].copy_from_slice(&BlockPrefix::new(payload.len(), compressed).encode());
        slot[PREFIX_LEN..PREFIX_LEN + payload.len()].copy_from_slice(payload);
        self.payload_bytes += payload.len();
        Some(cell)
    }

    /// Payload and compressed flag of an occupied cell
    pub fn get(&self, cell: usize) -> (&[u8], bool) {
        debug_assert!(self.cells.is_allocated(cell));
        read_block(self.cells.slot(cell))
    }

    /// Release one cell
    pub fn free(&mut self, cell: usize) {
        if self.cells.is_allocated(cell) {
            let len = self.get(cell).0.len();
            self.payload_bytes -= len;
            self.cells.free(cell);
        }
    }

    /// Whether a cell currently holds a payload
    pub fn is_occupied(&self, cell: usize) -> bool {
        self.cells.is_allocated(cell)
    }

    /// Hand every stored payload to `f` in ascending cell order, then mark
    /// the whole bucket free. Returns the number of payloads visited.
    pub fn flush<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&[u8], bool),
    {
        let mut visited = 0;
        for (_, slot) in self.cells.occupied() {
            let (payload, compressed) = read_block(slot);
            f(payload, compressed);
            visited += 1;
        }
        self.cells.reset();
        self.payload_bytes = 0;
        visited
    }

    /// Number of stored payloads
    pub fn num_buffers(&self) -> usize {
        self.cells.allocated()
    }

    /// Occupied fraction of cells (0.0 - 1.0)
    pub fn fill_ratio(&self) -> f64 {
        if self.cell_count() == 0 {
            return 0.0;
        }
        self.num_buffers() as f64 / self.cell_count() as f64
    }

    /// Bytes reserved by occupied cells (whole cells, not payloads)
    pub fn size_bytes(&self) -> usize {
        self.num_buffers() * self.cell_bytes()
    }

    /// Payload bytes actually stored
    pub fn payload_bytes(&self) -> usize {
        self.payload_bytes
    }
}
