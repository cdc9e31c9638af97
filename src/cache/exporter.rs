//! Prometheus Exporter
//!
//! Mirrors [`MetricsSnapshot`]s into a private [`Registry`] so several
//! caches (or tests) never collide on the process-global default registry.

use prometheus::{
    Gauge, GaugeVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

use super::metrics::MetricsSnapshot;
use crate::error::Result;

const NAMESPACE: &str = "bufcache";

/// Publishes cache metrics in the Prometheus text format
pub struct PrometheusExporter {
    registry: Registry,

    hot_entries: IntGauge,
    hot_bytes: IntGauge,
    cold_entries: IntGauge,
    cold_bytes: IntGauge,
    compression_ratio: Gauge,
    bucket_entries: IntGaugeVec,
    bucket_fill_ratio: GaugeVec,

    puts: IntCounter,
    compressed_puts: IntCounter,
    promotions: IntCounter,
    flushes: IntCounter,
    evictions: IntCounterVec,
}

impl PrometheusExporter {
    /// Create an exporter with every metric registered
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let hot_entries = IntGauge::with_opts(opts("hot_entries", "Keys resident in the hot tier"))?;
        let hot_bytes = IntGauge::with_opts(opts("hot_bytes", "Bytes held by the hot tier"))?;
        let cold_entries =
            IntGauge::with_opts(opts("cold_entries", "Occupied cells across cold buckets"))?;
        let cold_bytes =
            IntGauge::with_opts(opts("cold_bytes", "Bytes reserved by occupied cold cells"))?;
        let compression_ratio = Gauge::with_opts(opts(
            "compression_ratio",
            "Fraction of puts stored compressed",
        ))?;
        let bucket_entries = IntGaugeVec::new(
            opts("bucket_entries", "Occupied cells per cold bucket"),
            &["cell_bytes"],
        )?;
        let bucket_fill_ratio = GaugeVec::new(
            opts("bucket_fill_ratio", "Occupied fraction per cold bucket"),
            &["cell_bytes"],
        )?;

        let puts = IntCounter::with_opts(opts("puts_total", "Buffers put"))?;
        let compressed_puts =
            IntCounter::with_opts(opts("compressed_puts_total", "Buffers stored compressed"))?;
        let promotions =
            IntCounter::with_opts(opts("promotions_total", "Keys promoted from cold to hot"))?;
        let flushes =
            IntCounter::with_opts(opts("flushes_total", "Buffers delivered to the flush sink"))?;
        let evictions = IntCounterVec::new(
            opts("evictions_total", "Flush events by cause"),
            &["cause"],
        )?;

        registry.register(Box::new(hot_entries.clone()))?;
        registry.register(Box::new(hot_bytes.clone()))?;
        registry.register(Box::new(cold_entries.clone()))?;
        registry.register(Box::new(cold_bytes.clone()))?;
        registry.register(Box::new(compression_ratio.clone()))?;
        registry.register(Box::new(bucket_entries.clone()))?;
        registry.register(Box::new(bucket_fill_ratio.clone()))?;
        registry.register(Box::new(puts.clone()))?;
        registry.register(Box::new(compressed_puts.clone()))?;
        registry.register(Box::new(promotions.clone()))?;
        registry.register(Box::new(flushes.clone()))?;
        registry.register(Box::new(evictions.clone()))?;

        Ok(Self {
            registry,
            hot_entries,
            hot_bytes,
            cold_entries,
            cold_bytes,
            compression_ratio,
            bucket_entries,
            bucket_fill_ratio,
            puts,
            compressed_puts,
            promotions,
            flushes,
            evictions,
        })
    }

    /// Update every metric from a snapshot.
    ///
    /// Counters only move forward; a snapshot older than one already
    /// observed leaves them unchanged.
    pub fn observe(&self, snapshot: &MetricsSnapshot) {
        self.hot_entries.set(snapshot.hot_entries as i64);
        self.hot_bytes.set(snapshot.hot_size_bytes as i64);
        self.cold_entries.set(snapshot.cold_entries as i64);
        self.cold_bytes.set(snapshot.cold_size_bytes as i64);
        self.compression_ratio.set(snapshot.compression_ratio());

        for bucket in &snapshot.buckets {
            let label = bucket.cell_bytes.to_string();
            self.bucket_entries
                .with_label_values(&[label.as_str()])
                .set(bucket.entries as i64);
            self.bucket_fill_ratio
                .with_label_values(&[label.as_str()])
                .set(bucket.fill_ratio);
        }

        advance(&self.puts, snapshot.puts);
        advance(&self.compressed_puts, snapshot.compressed_puts);
        advance(&self.promotions, snapshot.promotions);
        advance(&self.flushes, snapshot.flushes);

        for (cause, total) in [
            ("bucket", snapshot.bucket_flushes),
            ("hot_key", snapshot.hot_key_flushes),
            ("hot_tier", snapshot.hot_tier_flushes),
            ("explicit", snapshot.full_flushes),
        ] {
            advance(&self.evictions.with_label_values(&[cause]), total);
        }
    }

    /// Render the text exposition format
    pub fn encode(&self) -> Result<String> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }
}

fn opts(name: &str, help: &str) -> Opts {
    Opts::new(name, help).namespace(NAMESPACE)
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}
