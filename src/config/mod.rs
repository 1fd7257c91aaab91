//! Configuration for the metering core.
//!
//! Embedders deserialize these structs from their own configuration file and
//! pass them into the services explicitly. There is no process-wide mutable
//! configuration; two services constructed with different configs coexist.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Root configuration for the metering core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeteringConfig {
    /// Cache-efficiency estimator tuning.
    #[serde(default)]
    pub cache_estimator: CacheEstimatorConfig,

    /// Reporting window used when a caller does not name one.
    #[serde(default)]
    pub default_window: crate::db::ReportingWindow,
}

impl MeteringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache_estimator.validate()
    }
}

/// Tuning for the cache-efficiency heuristic.
///
/// When a reporting window contains no explicit cache aggregates, hit and
/// miss counts are estimated from raw usage records as
/// `hits = floor(requests * (base_hit_ratio + cache_read_tokens /
/// tokens_scale * tokens_weight))`, clamped to the request count. The result
/// is an estimate and is flagged as such on the reports that carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheEstimatorConfig {
    /// Baseline fraction of requests assumed to have hit the cache.
    #[serde(default = "default_base_hit_ratio")]
    pub base_hit_ratio: f64,

    /// Additional hit fraction contributed per `tokens_scale` cache-read
    /// tokens observed in the window.
    #[serde(default = "default_tokens_weight")]
    pub tokens_weight: f64,

    /// Cache-read token count that contributes one `tokens_weight` step.
    #[serde(default = "default_tokens_scale")]
    pub tokens_scale: f64,
}

impl Default for CacheEstimatorConfig {
    fn default() -> Self {
        Self {
            base_hit_ratio: default_base_hit_ratio(),
            tokens_weight: default_tokens_weight(),
            tokens_scale: default_tokens_scale(),
        }
    }
}

impl CacheEstimatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.base_hit_ratio) {
            return Err(ConfigError::Validation(
                "cache_estimator.base_hit_ratio must be within 0.0..=1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.tokens_weight) {
            return Err(ConfigError::Validation(
                "cache_estimator.tokens_weight must be within 0.0..=1.0".to_string(),
            ));
        }
        if self.tokens_scale <= 0.0 {
            return Err(ConfigError::Validation(
                "cache_estimator.tokens_scale must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_base_hit_ratio() -> f64 {
    0.3
}

fn default_tokens_weight() -> f64 {
    0.2
}

fn default_tokens_scale() -> f64 {
    1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MeteringConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_estimator.base_hit_ratio, 0.3);
        assert_eq!(config.cache_estimator.tokens_weight, 0.2);
        assert_eq!(config.cache_estimator.tokens_scale, 1_000_000.0);
    }

    #[test]
    fn test_out_of_range_ratio_rejected() {
        let config = CacheEstimatorConfig {
            base_hit_ratio: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_scale_rejected() {
        let config = CacheEstimatorConfig {
            tokens_scale: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: MeteringConfig = serde_json::from_str("{}").expect("empty config");
        assert_eq!(config.cache_estimator.tokens_scale, 1_000_000.0);
    }
}
