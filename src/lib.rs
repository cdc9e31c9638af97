//! bufcache - Write-Optimized Buffer Accumulator
//!
//! Collects many small byte buffers under string keys and hands them to a
//! sink in batches, in bounded memory.
//!
//! Keys written once sit in fixed-size cells of a cold tier; keys written
//! again move to a hot tier where their buffers are appended back to back.
//! Buffers can be stored LZ4-compressed, transparently to the sink.
//!
//! ```
//! use bufcache::{BufferCache, CacheConfig};
//!
//! let mut cache = BufferCache::with_sink(CacheConfig::default(), |buf: &[u8]| {
//!     // prints "login\nlogout"
//!     println!("{}", String::from_utf8_lossy(buf));
//! })
//! .unwrap();
//!
//! cache.put("user:1", b"login");
//! cache.put("user:1", b"logout");
//! cache.flush();
//! assert_eq!(cache.metrics().flushes, 1);
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Tiers, codec, facade and metrics
//! - [`error`] - Error types

pub mod cache;
pub mod error;

// Re-export commonly used types
pub use cache::{
    BufferCache, CacheConfig, FlushSink, Location, MetricsSnapshot, NoopSink, PrometheusExporter,
};
pub use error::{Error, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
