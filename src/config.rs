//! Engine configuration with validation, defaults and environment overrides
//!
//! Every section has a `Default` so a partial TOML file only needs the values
//! it changes. `PERIODIQ_*` environment variables win over the file.

use crate::errors::{ConfigurationError, PeriodiqResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodiqConfig {
    pub ledger: LedgerConfig,
    pub selector: SelectorConfig,
    pub parallel: ParallelConfig,
    pub protection: ProtectionConfig,
    pub coordinator: CoordinatorConfig,
    pub logging: LoggingConfig,
}

/// Bet ingestion and exposure accounting
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Platform fee taken from every gross stake
    pub fee_rate: f64,
    pub exposure_ttl_secs: u64,
    /// Maintain an in-process order-statistics index per round
    pub incremental_index: bool,
    /// Largest space the incremental index is kept for
    pub incremental_max_space: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            fee_rate: 0.02,
            exposure_ttl_secs: 300,
            incremental_index: false,
            incremental_max_space: 1_000,
        }
    }
}

/// Strategy plan thresholds
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Spaces above this size use key-level exposure and sampling strategies
    pub large_space_threshold: u32,
    /// Bet count at or below which a large space is fully scanned
    pub low_volume_threshold: u64,
    /// Bet count at or below which smart sampling is used
    pub high_volume_threshold: u64,
    pub full_scan_sample_limit: usize,
    pub smart_sample_fraction: f64,
    pub statistical_sample_limit: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            large_space_threshold: 1_000,
            low_volume_threshold: 100,
            high_volume_threshold: 1_000,
            full_scan_sample_limit: 10_000,
            smart_sample_fraction: 0.1,
            statistical_sample_limit: 10_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    pub enabled: bool,
    /// Worker count, 0 = available parallelism
    pub workers: usize,
    pub timeout_ms: u64,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: 0,
            timeout_ms: 5_000,
        }
    }
}

impl ParallelConfig {
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Low-liquidity protection
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    pub enabled: bool,
    pub min_distinct_bettors: u64,
    pub batch_size: usize,
    pub max_batches: usize,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_distinct_bettors: 2,
            batch_size: 1_000,
            max_batches: 20,
        }
    }
}

/// Locking, caching and retry for round resolution
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Identifies this worker in lock tokens; defaults to `pid-<pid>`
    pub process_id: Option<String>,
    pub lock_ttl_secs: u64,
    pub result_ttl_secs: u64,
    pub precompute_ttl_secs: u64,
    pub freeze_window_secs: u64,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    pub poll_attempts: u32,
    pub poll_initial_delay_ms: u64,
    pub poll_max_delay_ms: u64,
    pub store_retry_attempts: u32,
    pub store_retry_delay_ms: u64,
    pub event_capacity: usize,
    /// Secret mixed into verification tokens
    pub verification_key: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            process_id: None,
            lock_ttl_secs: 30,
            result_ttl_secs: 300,
            precompute_ttl_secs: 10,
            freeze_window_secs: 5,
            cache_ttl_secs: 300,
            cache_capacity: 1_024,
            poll_attempts: 10,
            poll_initial_delay_ms: 50,
            poll_max_delay_ms: 1_000,
            store_retry_attempts: 3,
            store_retry_delay_ms: 20,
            event_capacity: 256,
            verification_key: "periodiq-dev".to_string(),
        }
    }
}

impl CoordinatorConfig {
    pub fn process_id(&self) -> String {
        self.process_id
            .clone()
            .unwrap_or_else(|| format!("pid-{}", std::process::id()))
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }

    pub fn precompute_ttl(&self) -> Duration {
        Duration::from_secs(self.precompute_ttl_secs)
    }

    pub fn freeze_window(&self) -> Duration {
        Duration::from_secs(self.freeze_window_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,
    pub ansi: bool,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "periodiq=info".to_string(),
            ansi: true,
            with_target: false,
        }
    }
}

impl PeriodiqConfig {
    /// Deterministic settings for tests: fast polling, no parallel timeout surprises
    pub fn for_testing() -> Self {
        let mut config = Self::default();
        config.coordinator.process_id = Some("test".to_string());
        config.coordinator.poll_initial_delay_ms = 1;
        config.coordinator.poll_max_delay_ms = 5;
        config.coordinator.store_retry_delay_ms = 1;
        config.parallel.workers = 4;
        config.parallel.timeout_ms = 30_000;
        config
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |field: &str, value: String, reason: &str| ConfigurationError::InvalidValue {
            field: field.to_string(),
            value,
            reason: reason.to_string(),
        };

        if !(0.0..1.0).contains(&self.ledger.fee_rate) {
            return Err(invalid(
                "ledger.fee_rate",
                self.ledger.fee_rate.to_string(),
                "Fee rate must be in [0, 1)",
            ));
        }
        if self.ledger.exposure_ttl_secs == 0 {
            return Err(invalid("ledger.exposure_ttl_secs", "0".to_string(), "TTL cannot be zero"));
        }
        if self.selector.low_volume_threshold > self.selector.high_volume_threshold {
            return Err(ConfigurationError::ValidationFailed(format!(
                "selector.low_volume_threshold ({}) exceeds high_volume_threshold ({})",
                self.selector.low_volume_threshold, self.selector.high_volume_threshold
            )));
        }
        if self.selector.full_scan_sample_limit == 0 {
            return Err(invalid(
                "selector.full_scan_sample_limit",
                "0".to_string(),
                "Sample limit cannot be zero",
            ));
        }
        if !(self.selector.smart_sample_fraction > 0.0 && self.selector.smart_sample_fraction <= 1.0) {
            return Err(invalid(
                "selector.smart_sample_fraction",
                self.selector.smart_sample_fraction.to_string(),
                "Fraction must be in (0, 1]",
            ));
        }
        if self.parallel.enabled && self.parallel.timeout_ms == 0 {
            return Err(invalid(
                "parallel.timeout_ms",
                "0".to_string(),
                "Timeout cannot be zero when parallel evaluation is enabled",
            ));
        }
        if self.protection.batch_size == 0 || self.protection.max_batches == 0 {
            return Err(ConfigurationError::ValidationFailed(
                "protection.batch_size and protection.max_batches must be positive".to_string(),
            ));
        }
        if self.coordinator.lock_ttl_secs == 0 {
            return Err(invalid(
                "coordinator.lock_ttl_secs",
                "0".to_string(),
                "Lock TTL cannot be zero",
            ));
        }
        if self.coordinator.verification_key.is_empty() {
            return Err(ConfigurationError::MissingRequired(
                "coordinator.verification_key".to_string(),
            ));
        }
        if self.logging.filter.is_empty() {
            return Err(ConfigurationError::MissingRequired("logging.filter".to_string()));
        }
        Ok(())
    }
}

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> PeriodiqResult<PeriodiqConfig> {
        let mut config = if let Some(ref path) = self.config_path {
            self.load_from_file(path)?
        } else {
            PeriodiqConfig::default()
        };

        self.apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> PeriodiqResult<PeriodiqConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_env_overrides(&self, config: &mut PeriodiqConfig) -> PeriodiqResult<()> {
        if let Some(rate) = env_parse("PERIODIQ_FEE_RATE", "Invalid fee rate")? {
            config.ledger.fee_rate = rate;
        }
        if let Some(enabled) = env_parse("PERIODIQ_INCREMENTAL_INDEX", "Invalid boolean value")? {
            config.ledger.incremental_index = enabled;
        }
        if let Some(enabled) = env_parse("PERIODIQ_PARALLEL_ENABLED", "Invalid boolean value")? {
            config.parallel.enabled = enabled;
        }
        if let Some(workers) = env_parse("PERIODIQ_PARALLEL_WORKERS", "Invalid worker count")? {
            config.parallel.workers = workers;
        }
        if let Some(min) = env_parse("PERIODIQ_PROTECTION_MIN_BETTORS", "Invalid bettor count")? {
            config.protection.min_distinct_bettors = min;
        }
        if let Some(ttl) = env_parse("PERIODIQ_LOCK_TTL_SECS", "Invalid TTL")? {
            config.coordinator.lock_ttl_secs = ttl;
        }
        if let Ok(process_id) = env::var("PERIODIQ_PROCESS_ID") {
            config.coordinator.process_id = Some(process_id);
        }
        if let Ok(key) = env::var("PERIODIQ_VERIFICATION_KEY") {
            config.coordinator.verification_key = key;
        }
        if let Ok(filter) = env::var("PERIODIQ_LOG_FILTER") {
            config.logging.filter = filter;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &PeriodiqConfig, path: &str) -> PeriodiqResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn env_parse<T: FromStr>(name: &str, reason: &str) -> Result<Option<T>, ConfigurationError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigurationError::InvalidValue {
                field: name.to_string(),
                value: raw,
                reason: reason.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

/// Builder pattern for creating configurations
pub struct ConfigBuilder {
    config: PeriodiqConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PeriodiqConfig::default(),
        }
    }

    pub fn ledger(mut self, ledger: LedgerConfig) -> Self {
        self.config.ledger = ledger;
        self
    }

    pub fn selector(mut self, selector: SelectorConfig) -> Self {
        self.config.selector = selector;
        self
    }

    pub fn parallel(mut self, parallel: ParallelConfig) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn protection(mut self, protection: ProtectionConfig) -> Self {
        self.config.protection = protection;
        self
    }

    pub fn coordinator(mut self, coordinator: CoordinatorConfig) -> Self {
        self.config.coordinator = coordinator;
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self
    }

    pub fn build(self) -> PeriodiqConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config(path: &str) -> PeriodiqResult<()> {
    let config = PeriodiqConfig::default();
    ConfigLoader::new().save(&config, path)
}
