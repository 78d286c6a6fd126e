//! nicu-vitals: vitals data and alarm engine for NICU bedside monitoring
//!
//! For every open patient view the engine keeps rolling trend windows of six
//! vital signs filled from one of two producers:
//!
//! - a live feed (Redis pub/sub or any [`feed::VitalsChannel`]) whose
//!   messages are validated field by field
//! - a seeded random-walk generator that takes over whenever the feed is
//!   unavailable, with synthetic backfill on every range change
//!
//! Each sample is tagged with its origin, and alarm severity is derived on
//! read from the newest sample and the patient's current limits.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use nicu_vitals::{SignalKind, StaticProfiles, PatientProfile, SystemConfig, VitalsContext};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let profiles = Arc::new(StaticProfiles::with_fallback(PatientProfile::neonatal_default()));
//!     let context = VitalsContext::new(SystemConfig::default(), profiles)?;
//!
//!     // No channel: the view runs on simulation
//!     let view = context.open_view("42".into(), None)?;
//!     println!("{:?}", view.stats(SignalKind::HeartRate));
//!     println!("{:?}", view.severity(SignalKind::SpO2));
//!
//!     view.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod alarm;
pub mod config;
pub mod error;
pub mod export;
pub mod feed;
pub mod simulation;
pub mod source;
pub mod trend;
pub mod types;
pub mod utils;

// Re-export commonly used types for convenience
pub use alarm::{AlarmSeverity, Limits, PatientLimits};
pub use config::{ConfigLoader, SystemConfig};
pub use error::{VitalsError, VitalsResult};
pub use feed::{in_process_channel, ChannelPublisher, FeedError, InProcessChannel, VitalsChannel};
pub use simulation::{Acuity, Baseline, PatientProfile, PatientProfileSource, StaticProfiles};
pub use source::{DataSourceState, MonitorView, ReseedOutcome, SourceStatus, VitalsContext};
pub use trend::{TimeRange, TrendStats};
pub use types::{PatientId, Sample, SampleOrigin, SignalKind};

pub use utils::{
    time::{current_timestamp_millis, TimeProvider},
    validation::{ValidationError, ValidationResult},
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    let mut features = vec![
        "Live feed with per-field validation".to_string(),
        "Simulation fallback with synthetic backfill".to_string(),
        "Rolling trend windows".to_string(),
        "Alarm evaluation against patient limits".to_string(),
        "CSV export".to_string(),
    ];
    if cfg!(feature = "redis") {
        features.push("Redis pub/sub channel".to_string());
    }

    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Vitals data and alarm engine for NICU bedside monitoring".to_string(),
        features,
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert_eq!(info.name, NAME);
        assert_eq!(info.version, VERSION);
        assert!(!info.features.is_empty());
    }

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert!(!NAME.is_empty());
    }
}
