//! Two-Tier Write Accumulator
//!
//! Bounded-memory buffering of many small writes, grouped by key and
//! delivered to a sink in batches.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                           BufferCache                                │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  Cold Tier (seen once)            │  Hot Tier (seen repeatedly)      │
//! │  ┌────────┐┌────────┐┌─────────┐  │  ┌────────────────────────────┐  │
//! │  │ 64 B   ││ 128 B  ││ ...     │  │  │ key -> [len|blk][len|blk]  │  │
//! │  │ cells  ││ cells  ││         │  │  │ bounded per key and total  │  │
//! │  │ bitmap ││ bitmap ││         │  │  └────────────────────────────┘  │
//! │  └────────┘└────────┘└─────────┘  │                                  │
//! │         │  second put: promote  ──┼──────────▶                       │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  Location Index (key -> packed u32)   │   LZ4 codec (optional)       │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                 FlushSink (decompressed, '\n'-joined)                │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Eviction
//!
//! - A full cold bucket is flushed alone
//! - A hot key reaching `max_buffer_length` is flushed alone
//! - A hot tier reaching `max_capacity` is flushed entirely
//! - [`BufferCache::flush`] empties everything
//!
//! Nothing is ever dropped: every put reaches the sink exactly once.

mod arena;
mod bitmap;
mod bucket;
mod cold;
pub mod compression;
mod config;
mod exporter;
mod hot;
mod location;
mod manager;
mod metrics;
mod prefix;
mod proptest;
mod sink;

pub use bitmap::Bitmap;
pub use bucket::Bucket;
pub use cold::{ColdCache, ColdPut};
pub use config::{
    CacheConfig, DEFAULT_BUCKETS, DEFAULT_CELLS_PER_BUCKET, DEFAULT_MAX_BUFFER_LENGTH,
    DEFAULT_MAX_CAPACITY,
};
pub use exporter::PrometheusExporter;
pub use hot::{Admission, HotCache};
pub use location::{Location, LocationIndex, MAX_BUCKETS, MAX_CELLS};
pub use manager::BufferCache;
pub use metrics::{BucketMetrics, CacheCounters, ColdMetrics, MetricsSnapshot};
pub use prefix::{BlockPrefix, Blocks, MAX_PAYLOAD_LEN, PREFIX_LEN};
pub use sink::{FlushSink, NoopSink, BLOCK_SEPARATOR};
