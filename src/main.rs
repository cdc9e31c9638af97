//! bufcache driver
//!
//! Streams `key<TAB>payload` records from stdin through a [`BufferCache`]
//! and writes every flushed buffer to stdout, one per line.
//!
//! ```text
//! stdin ──▶ parse record ──▶ BufferCache::put ──▶ FlushSink ──▶ stdout
//!                                   │
//!                              EOF: flush() ──▶ metrics (stderr)
//! ```

use std::borrow::Cow;
use std::cell::RefCell;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bufcache::{BufferCache, CacheConfig, PrometheusExporter};

// =============================================================================
// CLI Arguments
// =============================================================================

/// bufcache - accumulate keyed writes from stdin and emit them in batches
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file; flags below override its values
    #[arg(long, env = "BUFCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Hot tier ceiling in bytes
    #[arg(long, env = "BUFCACHE_MAX_CAPACITY")]
    max_capacity: Option<usize>,

    /// Per-key hot buffer ceiling in bytes
    #[arg(long, env = "BUFCACHE_MAX_BUFFER_LENGTH")]
    max_buffer_length: Option<usize>,

    /// Cells per cold bucket (multiple of 64)
    #[arg(long, env = "BUFCACHE_CELLS_PER_BUCKET")]
    cells_per_bucket: Option<usize>,

    /// Cold bucket cell sizes, comma separated and ascending
    #[arg(long, env = "BUFCACHE_BUCKETS", value_delimiter = ',')]
    buckets: Option<Vec<usize>>,

    /// Store buffers LZ4-compressed when smaller
    #[arg(long, env = "BUFCACHE_COMPRESSION")]
    compression: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Write Prometheus metrics to stderr after the final flush
    #[arg(long)]
    print_metrics: bool,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = load_config(&args)?;
    info!("Starting bufcache {}", bufcache::VERSION);
    info!("  Max capacity: {} bytes", config.max_capacity);
    info!("  Max buffer length: {} bytes", config.max_buffer_length);
    info!("  Buckets: {:?} x {} cells", config.buckets, config.cells_per_bucket);
    info!("  Compression: {}", config.enable_compression);

    let output = Rc::new(RefCell::new(LineOutput::new(BufWriter::new(io::stdout().lock()))));
    let sink_output = Rc::clone(&output);
    let mut cache = BufferCache::with_sink(config, move |buf: &[u8]| {
        sink_output.borrow_mut().write_line(buf)
    })
    .context("creating buffer cache")?;

    let mut records = 0u64;
    for line in io::stdin().lock().split(b'\n') {
        let line = line.context("reading stdin")?;
        let (key, payload) = parse_record(&line);
        cache.put(&key, payload);
        records += 1;

        if output.borrow().failed() {
            warn!("stdout closed, stopping after {} records", records);
            break;
        }
    }

    cache.flush();
    output.borrow_mut().finish().context("writing stdout")?;

    let metrics = cache.metrics();
    info!(
        records,
        flushes = metrics.flushes,
        promotions = metrics.promotions,
        compressed = metrics.compressed_puts,
        "Input exhausted"
    );

    if args.print_metrics {
        let exporter = PrometheusExporter::new()?;
        exporter.observe(&metrics);
        eprint!("{}", exporter.encode()?);
    }

    Ok(())
}

// =============================================================================
// Configuration
// =============================================================================

fn load_config(args: &Args) -> Result<CacheConfig> {
    let mut config = match &args.config {
        Some(path) => CacheConfig::from_yaml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CacheConfig::default(),
    };

    if let Some(max_capacity) = args.max_capacity {
        config.max_capacity = max_capacity;
    }
    if let Some(max_buffer_length) = args.max_buffer_length {
        config.max_buffer_length = max_buffer_length;
    }
    if let Some(cells_per_bucket) = args.cells_per_bucket {
        config.cells_per_bucket = cells_per_bucket;
    }
    if let Some(buckets) = &args.buckets {
        config.buckets = buckets.clone();
    }
    if args.compression {
        config.enable_compression = true;
    }

    Ok(config)
}

// =============================================================================
// Input / Output
// =============================================================================

/// Split a record at its first tab. Records without a tab go to the empty key.
fn parse_record(line: &[u8]) -> (Cow<'_, str>, &[u8]) {
    match line.iter().position(|&b| b == b'\t') {
        Some(tab) => (String::from_utf8_lossy(&line[..tab]), &line[tab + 1..]),
        None => (Cow::Borrowed(""), line),
    }
}

/// Newline-terminated writer that keeps the first error for later
struct LineOutput<W> {
    writer: W,
    error: Option<io::Error>,
}

impl<W: Write> LineOutput<W> {
    fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    fn write_line(&mut self, buf: &[u8]) {
        if self.error.is_some() {
            return;
        }
        let result = self
            .writer
            .write_all(buf)
            .and_then(|()| self.writer.write_all(b"\n"));
        if let Err(e) = result {
            self.error = Some(e);
        }
    }

    fn failed(&self) -> bool {
        self.error.is_some()
    }

    fn finish(&mut self) -> io::Result<()> {
        match self.error.take() {
            Some(e) => Err(e),
            None => self.writer.flush(),
        }
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .init();
    }
}
