// src/config/mod.rs
//! Layered engine configuration

pub mod constants;
pub mod loader;
pub mod schema_validator;

pub use constants::*;
pub use loader::{ConfigError, ConfigLoader};
pub use schema_validator::{FieldConstraint, SchemaValidator, SchemaViolation};

use crate::feed::FeedConfig;
use crate::simulation::GeneratorConfig;
use crate::trend::TimeRange;
use crate::utils::validation::validate_range;
use serde::{Deserialize, Serialize};

/// Complete system configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct SystemConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Data source controller and trend sizing
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EngineConfig {
    /// Silence after which a live source is considered stale
    #[serde(default = "defaults::staleness_window_ms")]
    pub staleness_window_ms: u64,

    /// Simulation tick period
    #[serde(default = "defaults::tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "defaults::staleness_check_interval_ms")]
    pub staleness_check_interval_ms: u64,

    #[serde(default = "defaults::points_per_hour")]
    pub points_per_hour: usize,

    #[serde(default)]
    pub initial_range: TimeRange,

    #[serde(default = "defaults::command_queue_size")]
    pub command_queue_size: usize,
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::*;

    pub fn staleness_window_ms() -> u64 { engine::DEFAULT_STALENESS_WINDOW_MS }
    pub fn tick_interval_ms() -> u64 { engine::DEFAULT_TICK_INTERVAL_MS }
    pub fn staleness_check_interval_ms() -> u64 { engine::DEFAULT_STALENESS_CHECK_INTERVAL_MS }
    pub fn points_per_hour() -> usize { trend::DEFAULT_POINTS_PER_HOUR }
    pub fn command_queue_size() -> usize { engine::DEFAULT_COMMAND_QUEUE_SIZE }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            staleness_window_ms: defaults::staleness_window_ms(),
            tick_interval_ms: defaults::tick_interval_ms(),
            staleness_check_interval_ms: defaults::staleness_check_interval_ms(),
            points_per_hour: defaults::points_per_hour(),
            initial_range: TimeRange::default(),
            command_queue_size: defaults::command_queue_size(),
        }
    }
}

impl EngineConfig {
    /// Buffer capacity for the configured initial range
    pub fn initial_capacity(&self) -> usize {
        self.initial_range.max_points(self.points_per_hour)
    }
}

impl SystemConfig {
    /// Validate ranges and cross-field consistency
    pub fn validate_consistency(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let checks = [
            validate_range(
                self.engine.staleness_window_ms,
                engine::MIN_STALENESS_WINDOW_MS,
                engine::MAX_STALENESS_WINDOW_MS,
                "engine.staleness_window_ms",
            ),
            validate_range(
                self.engine.tick_interval_ms,
                engine::MIN_TICK_INTERVAL_MS,
                engine::MAX_TICK_INTERVAL_MS,
                "engine.tick_interval_ms",
            ),
            validate_range(
                self.engine.points_per_hour,
                trend::MIN_POINTS_PER_HOUR,
                trend::MAX_POINTS_PER_HOUR,
                "engine.points_per_hour",
            ),
            validate_range(self.engine.command_queue_size, 1, 4_096, "engine.command_queue_size"),
            self.generator.validate(),
            self.feed.validate(),
        ];
        errors.extend(checks.into_iter().filter_map(Result::err).map(|e| e.to_string()));

        if self.engine.staleness_check_interval_ms == 0
            || self.engine.staleness_check_interval_ms > self.engine.staleness_window_ms
        {
            errors.push(format!(
                "Staleness check interval ({} ms) must be positive and no longer than the staleness window ({} ms)",
                self.engine.staleness_check_interval_ms, self.engine.staleness_window_ms
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Get configuration summary
    pub fn get_summary(&self) -> ConfigSummary {
        ConfigSummary {
            staleness_window_ms: self.engine.staleness_window_ms,
            tick_interval_ms: self.engine.tick_interval_ms,
            initial_range: self.engine.initial_range,
            initial_capacity: self.engine.initial_capacity(),
            live_feed_enabled: self.feed.enabled,
            unit: self.feed.unit.clone(),
            seeded: self.generator.seed.is_some(),
        }
    }
}

/// Configuration summary for display/logging
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub staleness_window_ms: u64,
    pub tick_interval_ms: u64,
    pub initial_range: TimeRange,
    pub initial_capacity: usize,
    pub live_feed_enabled: bool,
    pub unit: String,
    pub seeded: bool,
}
