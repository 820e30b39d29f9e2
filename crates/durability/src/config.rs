//! Store configuration via `tickstore.toml`
//!
//! ```toml
//! data_dir = "/var/lib/ticks"
//! block_size = 65536
//! retry_delay_ms = 3000
//! legacy_flush_threshold = 5000
//! cache_budget_bytes = 67108864
//! default_format = "blocked"
//!
//! [[symbols]]
//! key = 1
//! name = "EURUSD"
//! min_tick = 0.0001
//! ```

use crate::cache::{FileCache, DEFAULT_CACHE_BUDGET};
use crate::format::{DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use crate::stream::{FileMode, StoreFormat, TickFileOptions, DEFAULT_LEGACY_FLUSH_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tickstore_core::{Precision, StoreError, SymbolInfo, SymbolTable};

/// Config file name placed in the data directory.
pub const CONFIG_FILE_NAME: &str = "tickstore.toml";

/// Extension of tick files.
pub const TICK_FILE_EXTENSION: &str = "tck";

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding tick files
    pub data_dir: PathBuf,
    /// Block size of new blocked files (default: 64 KiB)
    pub block_size: usize,
    /// Delay between write retries in milliseconds (default: 3000)
    pub retry_delay_ms: u64,
    /// Legacy buffer size that triggers a write (default: 5000)
    pub legacy_flush_threshold: usize,
    /// Byte budget of the legacy read cache (default: 64 MiB)
    pub cache_budget_bytes: usize,
    /// Format of new files
    pub default_format: StoreFormat,
    /// Known symbols
    pub symbols: Vec<SymbolInfo>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            data_dir: PathBuf::from("."),
            block_size: DEFAULT_BLOCK_SIZE,
            retry_delay_ms: 3_000,
            legacy_flush_threshold: DEFAULT_LEGACY_FLUSH_THRESHOLD,
            cache_budget_bytes: DEFAULT_CACHE_BUDGET,
            default_format: StoreFormat::Blocked,
            symbols: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the data directory (builder pattern).
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the block size (builder pattern).
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the retry delay (builder pattern).
    pub fn with_retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    /// Set the legacy flush threshold (builder pattern).
    pub fn with_legacy_flush_threshold(mut self, bytes: usize) -> Self {
        self.legacy_flush_threshold = bytes;
        self
    }

    /// Set the cache budget (builder pattern).
    pub fn with_cache_budget_bytes(mut self, bytes: usize) -> Self {
        self.cache_budget_bytes = bytes;
        self
    }

    /// Set the format of new files (builder pattern).
    pub fn with_default_format(mut self, format: StoreFormat) -> Self {
        self.default_format = format;
        self
    }

    /// Add a symbol (builder pattern).
    pub fn with_symbol(mut self, symbol: SymbolInfo) -> Self {
        self.symbols.push(symbol);
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            return Err(ConfigError::BlockSize(self.block_size));
        }
        if self.legacy_flush_threshold == 0 {
            return Err(ConfigError::ZeroFlushThreshold);
        }
        let mut seen = std::collections::HashSet::new();
        for symbol in &self.symbols {
            if !seen.insert(symbol.key) {
                return Err(ConfigError::DuplicateSymbol(symbol.name.clone()));
            }
            Precision::from_min_tick(symbol.min_tick)
                .map_err(|_| ConfigError::MinTick(symbol.name.clone(), symbol.min_tick))?;
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Path of the tick file for a symbol name: `<data_dir>/<name>.tck`
    pub fn tick_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.{}", name, TICK_FILE_EXTENSION))
    }

    /// Retry delay as a duration
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Symbol catalog built from `[[symbols]]`
    pub fn symbol_table(&self) -> SymbolTable {
        self.symbols.iter().cloned().collect()
    }

    /// A cache sized by `cache_budget_bytes`
    pub fn new_cache(&self) -> Arc<FileCache> {
        Arc::new(FileCache::new(self.cache_budget_bytes))
    }

    /// File options for `mode`, without a cache.
    pub fn file_options(&self, mode: FileMode) -> TickFileOptions {
        TickFileOptions::default()
            .with_mode(mode)
            .with_block_size(self.block_size)
            .with_retry_delay(self.retry_delay())
            .with_legacy_flush_threshold(self.legacy_flush_threshold)
            .with_format(self.default_format)
    }

    /// Create a configuration optimized for testing (small blocks, fast retries).
    pub fn for_testing() -> Self {
        StoreConfig {
            block_size: 1024,
            retry_delay_ms: 1,
            legacy_flush_threshold: 512,
            cache_budget_bytes: 1024 * 1024,
            ..Self::default()
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Block size outside the accepted range.
    #[error("Block size {0} must be between 256 bytes and 16 MiB")]
    BlockSize(usize),

    /// Legacy flush threshold of zero.
    #[error("Legacy flush threshold must be positive")]
    ZeroFlushThreshold,

    /// Two symbols share a key.
    #[error("Duplicate symbol key for '{0}'")]
    DuplicateSymbol(String),

    /// Minimum tick that yields no precision.
    #[error("Symbol '{0}' has invalid min_tick {1}")]
    MinTick(String, f64),

    /// Config file could not be read.
    #[error("Failed to read config file '{0}': {1}")]
    Read(String, String),

    /// TOML syntax or type error.
    #[error("Failed to parse config: {0}")]
    Parse(String),
}

impl From<ConfigError> for StoreError {
    fn from(e: ConfigError) -> Self {
        StoreError::Config(e.to_string())
    }
}
