//! Validation utilities for nicu-vitals
//!
//! Provides validation helpers for configuration parameters, generator
//! inputs and patient limits. Bounds come from the constants in the
//! config module rather than literals at call sites.

use std::fmt;

/// Validation result type
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Value out of valid range
    OutOfRange {
        field: String,
        value: String,
        min: String,
        max: String,
    },
    /// Value is NaN or infinite
    NotFinite { field: String },
    /// Invalid field format
    InvalidFormat {
        field: String,
        value: String,
        expected: String,
    },
    /// Cross-field validation failure
    ConstraintViolation {
        fields: Vec<String>,
        message: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::OutOfRange { field, value, min, max } => {
                write!(f, "Field '{}' value '{}' is out of range [{}, {}]", field, value, min, max)
            }
            ValidationError::NotFinite { field } => {
                write!(f, "Field '{}' must be a finite number", field)
            }
            ValidationError::InvalidFormat { field, value, expected } => {
                write!(f, "Field '{}' has invalid format '{}', expected {}", field, value, expected)
            }
            ValidationError::ConstraintViolation { fields, message } => {
                write!(f, "Constraint violation for fields [{}]: {}", fields.join(", "), message)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate numeric range
pub fn validate_range<T>(value: T, min: T, max: T, field: &str) -> ValidationResult<()>
where
    T: PartialOrd + fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        });
    }
    Ok(())
}

/// Validate a float is finite
pub fn validate_finite(value: f64, field: &str) -> ValidationResult<()> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validate a probability lies in [0, 1]
pub fn validate_probability(value: f64, field: &str) -> ValidationResult<()> {
    validate_finite(value, field)?;
    validate_range(value, 0.0, 1.0, field)
}

/// Validate an ordered `(low, high)` pair
pub fn validate_ordered_pair(low: f64, high: f64, field: &str) -> ValidationResult<()> {
    validate_finite(low, field)?;
    validate_finite(high, field)?;
    if low > high {
        return Err(ValidationError::ConstraintViolation {
            fields: vec![format!("{}.low", field), format!("{}.high", field)],
            message: format!("low {} must not exceed high {}", low, high),
        });
    }
    Ok(())
}
