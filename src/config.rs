use std::env;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;

const DEFAULT_CACHE_SIZE: usize = 100_000;
const DEFAULT_VIN_DECODE_TIMEOUT_MS: u64 = 10_000;

/// Matching engine knobs. All recognized options with their defaults; the
/// engine never reads configuration from anywhere else.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum combined similarity for the fuzzy parts strategy
    pub fuzzy_threshold: f64,
    /// Minimum token-recall score for the keyword strategy
    pub description_threshold: f64,
    /// Maximum |offset| tried by the vehicle year-tolerance strategy
    pub year_range_tolerance: u32,
    pub enable_fuzzy: bool,
    pub enable_cache: bool,
    pub cache_size: usize,
    pub vin_decode_timeout_ms: u64,
    pub max_fuzzy_candidates_per_batch: usize,
    pub max_alternatives_part: usize,
    pub max_alternatives_vehicle: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.7,
            description_threshold: 0.6,
            year_range_tolerance: 2,
            enable_fuzzy: true,
            enable_cache: true,
            cache_size: DEFAULT_CACHE_SIZE,
            vin_decode_timeout_ms: DEFAULT_VIN_DECODE_TIMEOUT_MS,
            max_fuzzy_candidates_per_batch: 1_000,
            max_alternatives_part: 4,
            max_alternatives_vehicle: 3,
        }
    }
}

impl MatcherConfig {
    /// Reject out-of-range thresholds before the engine is built.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            anyhow::bail!("fuzzy_threshold must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.description_threshold) {
            anyhow::bail!("description_threshold must be in [0, 1]");
        }
        if self.enable_cache && self.cache_size == 0 {
            anyhow::bail!("cache_size must be positive when the cache is enabled");
        }
        Ok(())
    }
}

/// Top-level application configuration loaded from file + environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: CatalogSection,
    pub matcher: MatcherConfig,
    pub batch: BatchSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load configuration from disk and environment.
    pub fn load() -> Result<Self> {
        let config_path = env::var("AUTOCAT_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

        let mut builder = config::Config::builder();

        if Path::new(&config_path).exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(&config_path)));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("AUTOCAT")
                .separator("_")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        let mut config: Self = settings.try_deserialize()?;

        if config.logging.level.trim().is_empty() {
            config.logging.level = "info".to_string();
        }
        config.matcher.validate()?;

        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    pub pcdb_dir: String,
    pub vcdb_dir: String,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            pcdb_dir: "./data/pcdb".to_string(),
            vcdb_dir: "./data/vcdb".to_string(),
        }
    }
}

/// What the batch binary processes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    /// JSONL input file; one query object per line with an `id` field
    pub input: String,
    /// JSONL output file; one result object per line
    pub output: String,
    /// `parts` or `vehicles`
    pub kind: BatchKind,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            input: "./batch_input.jsonl".to_string(),
            output: "./batch_output.jsonl".to_string(),
            kind: BatchKind::Parts,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    #[default]
    Parts,
    Vehicles,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MatcherConfig::default();
        assert_eq!(config.fuzzy_threshold, 0.7);
        assert_eq!(config.description_threshold, 0.6);
        assert_eq!(config.year_range_tolerance, 2);
        assert_eq!(config.cache_size, 100_000);
        assert_eq!(config.vin_decode_timeout_ms, 10_000);
        assert_eq!(config.max_alternatives_part, 4);
        assert_eq!(config.max_alternatives_vehicle, 3);
        assert!(config.enable_fuzzy);
        assert!(config.enable_cache);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let config = MatcherConfig {
            fuzzy_threshold: 1.5,
            ..MatcherConfig::default()
        };
        assert!(config.validate().is_err());

        let config = MatcherConfig {
            cache_size: 0,
            ..MatcherConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
