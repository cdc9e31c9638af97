//! Cache Configuration
//!
//! Shape of both tiers plus the compression switch. Loaded from YAML or
//! built in code, and always validated before a cache is created.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::location::{MAX_BUCKETS, MAX_CELLS};
use super::prefix::{MAX_PAYLOAD_LEN, PREFIX_LEN};
use crate::error::{Error, Result};

/// Default hot tier ceiling (64 MiB)
pub const DEFAULT_MAX_CAPACITY: usize = 64 * 1024 * 1024;

/// Default per-key ceiling (1 MiB)
pub const DEFAULT_MAX_BUFFER_LENGTH: usize = 1024 * 1024;

/// Default cells per cold bucket
pub const DEFAULT_CELLS_PER_BUCKET: usize = 1024;

/// Default cold bucket cell sizes
pub const DEFAULT_BUCKETS: [usize; 5] = [64, 128, 256, 512, 1024];

/// Buffer cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Hot tier ceiling in bytes
    pub max_capacity: usize,
    /// Per-key hot buffer ceiling in bytes
    pub max_buffer_length: usize,
    /// Cells per cold bucket (positive multiple of 64)
    pub cells_per_bucket: usize,
    /// Cold bucket cell sizes, strictly ascending; empty disables the cold tier
    pub buckets: Vec<usize>,
    /// Store buffers LZ4-compressed when that makes them smaller
    pub enable_compression: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_MAX_CAPACITY,
            max_buffer_length: DEFAULT_MAX_BUFFER_LENGTH,
            cells_per_bucket: DEFAULT_CELLS_PER_BUCKET,
            buckets: DEFAULT_BUCKETS.to_vec(),
            enable_compression: false,
        }
    }
}

impl CacheConfig {
    /// Check every constraint, reporting the first violation
    pub fn validate(&self) -> Result<()> {
        if self.max_buffer_length > self.max_capacity {
            return Err(Error::InvalidConfig(format!(
                "max_buffer_length ({}) must not exceed max_capacity ({})",
                self.max_buffer_length, self.max_capacity
            )));
        }

        if self.cells_per_bucket == 0 || self.cells_per_bucket % 64 != 0 {
            return Err(Error::InvalidConfig(format!(
                "cells_per_bucket ({}) must be a positive multiple of 64",
                self.cells_per_bucket
            )));
        }

        if self.cells_per_bucket > MAX_CELLS {
            return Err(Error::InvalidConfig(format!(
                "cells_per_bucket ({}) must not exceed {}",
                self.cells_per_bucket, MAX_CELLS
            )));
        }

        if self.buckets.len() > MAX_BUCKETS {
            return Err(Error::InvalidConfig(format!(
                "at most {} buckets are supported, got {}",
                MAX_BUCKETS,
                self.buckets.len()
            )));
        }

        if let Some(pair) = self.buckets.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(Error::InvalidConfig(format!(
                "bucket sizes must be strictly ascending, found {} before {}",
                pair[0], pair[1]
            )));
        }

        if let Some(&largest) = self.buckets.last() {
            if largest > MAX_PAYLOAD_LEN + PREFIX_LEN {
                return Err(Error::InvalidConfig(format!(
                    "bucket size {} exceeds the largest addressable cell ({})",
                    largest,
                    MAX_PAYLOAD_LEN + PREFIX_LEN
                )));
            }
        }

        Ok(())
    }

    /// Parse from YAML and validate
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file and validate
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn base() -> CacheConfig {
        CacheConfig {
            max_capacity: 512,
            max_buffer_length: 128,
            cells_per_bucket: 64,
            buckets: vec![64],
            enable_compression: false,
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(CacheConfig::default().validate().is_ok());
    }

    #[test]
    fn test_buffer_length_above_capacity() {
        let config = CacheConfig {
            max_buffer_length: 513,
            ..base()
        };
        assert_matches!(config.validate(), Err(Error::InvalidConfig(_)));
    }

    #[test]
    fn test_cells_not_multiple_of_64() {
        for cells in [0, 63, 65, 100] {
            let config = CacheConfig {
                cells_per_bucket: cells,
                ..base()
            };
            assert_matches!(config.validate(), Err(Error::InvalidConfig(_)), "cells={}", cells);
        }
    }

    #[test]
    fn test_unsorted_buckets() {
        let config = CacheConfig {
            buckets: vec![2, 3, 1],
            ..base()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("strictly ascending"));
    }

    #[test]
    fn test_duplicate_buckets() {
        let config = CacheConfig {
            buckets: vec![64, 64],
            ..base()
        };
        assert_matches!(config.validate(), Err(Error::InvalidConfig(_)));
    }

    #[test]
    fn test_too_many_buckets() {
        let config = CacheConfig {
            buckets: (1..=129).collect(),
            ..base()
        };
        assert_matches!(config.validate(), Err(Error::InvalidConfig(_)));
    }

    #[test]
    fn test_too_many_cells() {
        let config = CacheConfig {
            cells_per_bucket: MAX_CELLS + 64,
            ..base()
        };
        assert_matches!(config.validate(), Err(Error::InvalidConfig(_)));
    }

    #[test]
    fn test_cell_above_length_field() {
        let config = CacheConfig {
            buckets: vec![64, MAX_PAYLOAD_LEN + PREFIX_LEN + 1],
            ..base()
        };
        assert_matches!(config.validate(), Err(Error::InvalidConfig(_)));

        let config = CacheConfig {
            buckets: vec![64, MAX_PAYLOAD_LEN + PREFIX_LEN],
            ..base()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_buckets_allowed() {
        let config = CacheConfig {
            buckets: vec![],
            ..base()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_with_defaults() {
        let config = CacheConfig::from_yaml_str(
            "max_capacity: 4096\nmax_buffer_length: 1024\nbuckets: [32, 64]\nenable_compression: true\n",
        )
        .unwrap();

        assert_eq!(config.max_capacity, 4096);
        assert_eq!(config.buckets, vec![32, 64]);
        assert_eq!(config.cells_per_bucket, DEFAULT_CELLS_PER_BUCKET);
        assert!(config.enable_compression);
    }

    #[test]
    fn test_yaml_negative_size_rejected() {
        assert_matches!(
            CacheConfig::from_yaml_str("max_capacity: -1\n"),
            Err(Error::ConfigParse(_))
        );
    }

    #[test]
    fn test_yaml_invalid_shape_rejected() {
        assert_matches!(
            CacheConfig::from_yaml_str("cells_per_bucket: 63\n"),
            Err(Error::InvalidConfig(_))
        );
    }

    #[test]
    fn test_yaml_missing_file() {
        assert_matches!(
            CacheConfig::from_yaml_file("/nonexistent/bufcache.yaml"),
            Err(Error::Io(_))
        );
    }
}
