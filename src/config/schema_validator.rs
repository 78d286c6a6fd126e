// src/config/schema_validator.rs
//! Configuration schema validation on the raw merged TOML tree

use crate::config::constants::*;
use crate::trend::TimeRange;
use std::collections::HashMap;

/// One schema violation
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaViolation {
    pub field: String,
    pub message: String,
    pub value: String,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error for '{}': {} (value: {})", self.field, self.message, self.value)
    }
}

impl std::error::Error for SchemaViolation {}

#[derive(Debug, Clone)]
pub struct SchemaValidator {
    constraints: HashMap<String, FieldConstraint>,
}

/// Field validation constraints
#[derive(Debug, Clone)]
pub enum FieldConstraint {
    Range { min: f64, max: f64 },
    IntRange { min: i64, max: i64 },
    OneOf(Vec<String>),
    MinLength(usize),
    Custom(fn(&str) -> bool),
}

fn is_redis_url(value: &str) -> bool {
    value.starts_with("redis://") || value.starts_with("rediss://")
}

impl SchemaValidator {
    /// Create new schema validator with default constraints
    pub fn new() -> Self {
        let mut constraints = HashMap::new();

        // Engine
        constraints.insert(
            "engine.staleness_window_ms".to_string(),
            FieldConstraint::IntRange {
                min: engine::MIN_STALENESS_WINDOW_MS as i64,
                max: engine::MAX_STALENESS_WINDOW_MS as i64,
            },
        );
        constraints.insert(
            "engine.tick_interval_ms".to_string(),
            FieldConstraint::IntRange {
                min: engine::MIN_TICK_INTERVAL_MS as i64,
                max: engine::MAX_TICK_INTERVAL_MS as i64,
            },
        );
        constraints.insert(
            "engine.staleness_check_interval_ms".to_string(),
            FieldConstraint::IntRange { min: 100, max: 60_000 },
        );
        constraints.insert(
            "engine.points_per_hour".to_string(),
            FieldConstraint::IntRange {
                min: trend::MIN_POINTS_PER_HOUR as i64,
                max: trend::MAX_POINTS_PER_HOUR as i64,
            },
        );
        constraints.insert(
            "engine.command_queue_size".to_string(),
            FieldConstraint::IntRange { min: 1, max: 4_096 },
        );
        constraints.insert(
            "engine.initial_range".to_string(),
            FieldConstraint::OneOf(TimeRange::ALL.iter().map(|r| r.label().to_string()).collect()),
        );

        // Generator
        for field in ["generator.live_reversion", "generator.backfill_reversion"] {
            constraints.insert(
                field.to_string(),
                FieldConstraint::Range {
                    min: 0.0,
                    max: generator::MAX_REVERSION_FACTOR,
                },
            );
        }
        for field in ["generator.live_jitter_scale", "generator.backfill_jitter_scale"] {
            constraints.insert(field.to_string(), FieldConstraint::Range { min: 0.0, max: 10.0 });
        }
        constraints.insert(
            "generator.excursion_probability".to_string(),
            FieldConstraint::Range { min: 0.0, max: 1.0 },
        );
        constraints.insert(
            "generator.seed".to_string(),
            FieldConstraint::IntRange { min: 0, max: i64::MAX },
        );

        // Feed
        constraints.insert(
            "feed.connection_timeout_ms".to_string(),
            FieldConstraint::IntRange { min: 100, max: 60_000 },
        );
        constraints.insert(
            "feed.reconnect_attempts".to_string(),
            FieldConstraint::IntRange {
                min: 0,
                max: feed::MAX_RECONNECT_ATTEMPTS as i64,
            },
        );
        constraints.insert(
            "feed.reconnect_delay_ms".to_string(),
            FieldConstraint::IntRange { min: 100, max: 600_000 },
        );
        constraints.insert(
            "feed.channel_capacity".to_string(),
            FieldConstraint::IntRange { min: 1, max: 65_536 },
        );
        constraints.insert("feed.unit".to_string(), FieldConstraint::MinLength(1));
        constraints.insert("feed.redis_url".to_string(), FieldConstraint::Custom(is_redis_url));

        Self { constraints }
    }

    /// Validate configuration value against schema
    pub fn validate_field(&self, field_path: &str, value: &toml::Value) -> Result<(), SchemaViolation> {
        match self.constraints.get(field_path) {
            Some(constraint) => self.check_constraint(field_path, value, constraint),
            // Unknown fields are allowed
            None => Ok(()),
        }
    }

    /// Validate entire configuration
    pub fn validate_config(&self, config: &toml::Value) -> Result<(), Vec<SchemaViolation>> {
        let mut errors = Vec::new();
        self.validate_recursive("", config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Check cross-field dependencies
    pub fn validate_dependencies(&self, config: &toml::Value) -> Result<(), Vec<SchemaViolation>> {
        let mut errors = Vec::new();

        if let (Some(check), Some(window)) = (
            self.get_nested_value(config, "engine.staleness_check_interval_ms"),
            self.get_nested_value(config, "engine.staleness_window_ms"),
        ) {
            if let (Some(check), Some(window)) = (check.as_integer(), window.as_integer()) {
                if check > window {
                    errors.push(SchemaViolation {
                        field: "engine.staleness_check_interval_ms".to_string(),
                        message: "Staleness check interval must not exceed the staleness window".to_string(),
                        value: format!("check: {}, window: {}", check, window),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_recursive(&self, prefix: &str, value: &toml::Value, errors: &mut Vec<SchemaViolation>) {
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    self.validate_recursive(&path, val, errors);
                }
            }
            _ => {
                if let Err(err) = self.validate_field(prefix, value) {
                    errors.push(err);
                }
            }
        }
    }

    fn check_constraint(
        &self,
        field: &str,
        value: &toml::Value,
        constraint: &FieldConstraint,
    ) -> Result<(), SchemaViolation> {
        let violation = |message: String, value: String| SchemaViolation {
            field: field.to_string(),
            message,
            value,
        };

        match constraint {
            FieldConstraint::Range { min, max } => {
                let number = value.as_float().or_else(|| value.as_integer().map(|i| i as f64));
                if let Some(val) = number {
                    if !val.is_finite() || val < *min || val > *max {
                        return Err(violation(format!("Value must be between {} and {}", min, max), val.to_string()));
                    }
                }
            }
            FieldConstraint::IntRange { min, max } => {
                if let Some(val) = value.as_integer() {
                    if val < *min || val > *max {
                        return Err(violation(format!("Value must be between {} and {}", min, max), val.to_string()));
                    }
                }
            }
            FieldConstraint::OneOf(options) => {
                if let Some(val) = value.as_str() {
                    if !options.iter().any(|opt| opt.eq_ignore_ascii_case(val)) {
                        return Err(violation(format!("Value must be one of: {}", options.join(", ")), val.to_string()));
                    }
                }
            }
            FieldConstraint::MinLength(min_len) => {
                if let Some(val) = value.as_str() {
                    if val.len() < *min_len {
                        return Err(violation(format!("Minimum length is {}", min_len), val.to_string()));
                    }
                }
            }
            FieldConstraint::Custom(validator) => {
                if let Some(val) = value.as_str() {
                    if !validator(val) {
                        return Err(violation("Custom validation failed".to_string(), val.to_string()));
                    }
                }
            }
        }
        Ok(())
    }

    fn get_nested_value<'a>(&self, config: &'a toml::Value, path: &str) -> Option<&'a toml::Value> {
        let mut current = config;
        for part in path.split('.') {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tick_interval() {
        let validator = SchemaValidator::new();
        assert!(validator
            .validate_field("engine.tick_interval_ms", &toml::Value::Integer(2_000))
            .is_ok());
    }

    #[test]
    fn test_invalid_tick_interval() {
        let validator = SchemaValidator::new();
        assert!(validator
            .validate_field("engine.tick_interval_ms", &toml::Value::Integer(5))
            .is_err());
    }

    #[test]
    fn test_initial_range_validation() {
        let validator = SchemaValidator::new();
        let valid = toml::Value::String("12h".to_string());
        assert!(validator.validate_field("engine.initial_range", &valid).is_ok());

        let invalid = toml::Value::String("2h".to_string());
        assert!(validator.validate_field("engine.initial_range", &invalid).is_err());
    }

    #[test]
    fn test_probability_accepts_integer_literal() {
        let validator = SchemaValidator::new();
        assert!(validator
            .validate_field("generator.excursion_probability", &toml::Value::Integer(1))
            .is_ok());
        assert!(validator
            .validate_field("generator.excursion_probability", &toml::Value::Integer(2))
            .is_err());
    }

    #[test]
    fn test_redis_url() {
        let validator = SchemaValidator::new();
        let bad = toml::Value::String("tcp://broker".to_string());
        assert!(validator.validate_field("feed.redis_url", &bad).is_err());
    }

    #[test]
    fn test_dependency_check() {
        let validator = SchemaValidator::new();
        let config: toml::Value = toml::from_str(
            r#"
[engine]
staleness_window_ms = 5000
staleness_check_interval_ms = 8000
"#,
        )
        .unwrap();
        assert!(validator.validate_dependencies(&config).is_err());
    }
}
