//! Live feed configuration
//! Location: src/feed/config.rs

use crate::config::constants::feed;
use crate::types::PatientId;
use crate::utils::validation::{validate_range, ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeedConfig {
    /// Attempt a live subscription at all; false pins views to simulation
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    #[serde(default = "defaults::redis_url")]
    pub redis_url: String,

    /// Ward segment of the topic
    #[serde(default = "defaults::unit")]
    pub unit: String,

    #[serde(default = "defaults::connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    #[serde(default = "defaults::reconnect_attempts")]
    pub reconnect_attempts: u32,

    #[serde(default = "defaults::reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "defaults::channel_capacity")]
    pub channel_capacity: usize,
}

mod defaults {
    use crate::config::constants::feed::*;

    pub fn enabled() -> bool { true }
    pub fn redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
    pub fn unit() -> String { DEFAULT_UNIT.to_string() }
    pub fn connection_timeout_ms() -> u64 { DEFAULT_CONNECTION_TIMEOUT_MS }
    pub fn reconnect_attempts() -> u32 { DEFAULT_RECONNECT_ATTEMPTS }
    pub fn reconnect_delay_ms() -> u64 { DEFAULT_RECONNECT_DELAY_MS }
    pub fn channel_capacity() -> usize { DEFAULT_CHANNEL_CAPACITY }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            redis_url: defaults::redis_url(),
            unit: defaults::unit(),
            connection_timeout_ms: defaults::connection_timeout_ms(),
            reconnect_attempts: defaults::reconnect_attempts(),
            reconnect_delay_ms: defaults::reconnect_delay_ms(),
            channel_capacity: defaults::channel_capacity(),
        }
    }
}

impl FeedConfig {
    pub fn validate(&self) -> ValidationResult<()> {
        if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://") {
            return Err(ValidationError::InvalidFormat {
                field: "feed.redis_url".to_string(),
                value: self.redis_url.clone(),
                expected: "redis:// or rediss:// URL".to_string(),
            });
        }
        if self.unit.is_empty() || self.unit.contains('/') {
            return Err(ValidationError::InvalidFormat {
                field: "feed.unit".to_string(),
                value: self.unit.clone(),
                expected: "non-empty topic segment without '/'".to_string(),
            });
        }
        validate_range(self.connection_timeout_ms, 100, 60_000, "feed.connection_timeout_ms")?;
        validate_range(self.reconnect_attempts, 0, feed::MAX_RECONNECT_ATTEMPTS, "feed.reconnect_attempts")?;
        validate_range(self.reconnect_delay_ms, 100, 600_000, "feed.reconnect_delay_ms")?;
        validate_range(self.channel_capacity, 1, 65_536, "feed.channel_capacity")?;
        Ok(())
    }

    /// Subscription pattern for one patient's camera and monitor vitals
    pub fn topic_pattern(&self, patient: &PatientId) -> String {
        format!("nicu/{}/patient/{}/vitals/*", self.unit, patient)
    }
}
