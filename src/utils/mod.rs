//! Common utility functions for nicu-vitals
//!
//! - Time and timestamp management with injectable clocks
//! - Validation helpers for configuration and clinical inputs

pub mod time;
pub mod validation;

// Re-export commonly used functions for convenience
pub use time::{
    current_timestamp_millis,
    MockTimeProvider,
    SystemTimeProvider,
    TimeProvider,
    MILLIS_PER_HOUR,
};

pub use validation::{
    validate_finite,
    validate_ordered_pair,
    validate_probability,
    validate_range,
    ValidationError,
    ValidationResult,
};
