//! Generator configuration structures
//! Location: src/simulation/config.rs

use crate::config::constants::generator;
use crate::utils::validation::{validate_probability, validate_range, ValidationResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GeneratorConfig {
    #[serde(default = "defaults::live_reversion")]
    pub live_reversion: f64,

    #[serde(default = "defaults::backfill_reversion")]
    pub backfill_reversion: f64,

    #[serde(default = "defaults::live_jitter_scale")]
    pub live_jitter_scale: f64,

    #[serde(default = "defaults::backfill_jitter_scale")]
    pub backfill_jitter_scale: f64,

    #[serde(default = "defaults::excursion_probability")]
    pub excursion_probability: f64,

    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

mod defaults {
    use crate::config::constants::generator::*;

    pub fn live_reversion() -> f64 { LIVE_REVERSION_FACTOR }
    pub fn backfill_reversion() -> f64 { BACKFILL_REVERSION_FACTOR }
    pub fn live_jitter_scale() -> f64 { LIVE_JITTER_SCALE }
    pub fn backfill_jitter_scale() -> f64 { BACKFILL_JITTER_SCALE }
    pub fn excursion_probability() -> f64 { DEFAULT_EXCURSION_PROBABILITY }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            live_reversion: defaults::live_reversion(),
            backfill_reversion: defaults::backfill_reversion(),
            live_jitter_scale: defaults::live_jitter_scale(),
            backfill_jitter_scale: defaults::backfill_jitter_scale(),
            excursion_probability: defaults::excursion_probability(),
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_range(self.live_reversion, 0.0, generator::MAX_REVERSION_FACTOR, "generator.live_reversion")?;
        validate_range(
            self.backfill_reversion,
            0.0,
            generator::MAX_REVERSION_FACTOR,
            "generator.backfill_reversion",
        )?;
        validate_range(self.live_jitter_scale, 0.0, 10.0, "generator.live_jitter_scale")?;
        validate_range(self.backfill_jitter_scale, 0.0, 10.0, "generator.backfill_jitter_scale")?;
        validate_probability(self.excursion_probability, "generator.excursion_probability")?;
        Ok(())
    }
}
