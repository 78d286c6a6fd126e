// src/error.rs
//! Unified error handling for the vitals engine
//!
//! Module errors (`FeedError`, `TrendBufferError`, `ConfigError`,
//! `ValidationError`) convert into [`VitalsError`], which carries an
//! [`ErrorContext`] naming the component and operation that failed.

use crate::config::loader::ConfigError;
use crate::feed::FeedError;
use crate::trend::TrendBufferError;
use crate::types::{PatientId, SignalKind};
use crate::utils::validation::ValidationError;
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::time::SystemTime;

/// Unified error type for the engine
#[derive(Debug, Clone)]
pub enum VitalsError {
    /// Configuration loading or consistency errors
    Configuration {
        component: String,
        reason: String,
        context: ErrorContext,
    },

    /// Live channel errors that escaped the fallback policy
    Feed {
        endpoint: String,
        error: FeedError,
        retry_count: u32,
        context: ErrorContext,
    },

    /// Trend buffer invariant violations
    Buffer {
        patient: Option<PatientId>,
        signal: Option<SignalKind>,
        error: TrendBufferError,
        context: ErrorContext,
    },

    /// Parameter validation failures
    Validation {
        error: ValidationError,
        context: ErrorContext,
    },

    /// A second producer was requested for a patient
    ViewConflict {
        patient: PatientId,
        context: ErrorContext,
    },

    /// Operation on a view that has been torn down
    ViewClosed {
        patient: PatientId,
        context: ErrorContext,
    },

    /// CSV export failures
    Export {
        path: Option<String>,
        reason: String,
        context: ErrorContext,
    },

    /// Runtime and I/O failures
    System {
        subsystem: String,
        reason: String,
        context: ErrorContext,
    },
}

/// Error context for debugging and analysis
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    pub timestamp: SystemTime,
    pub component: String,
    pub operation: String,
    pub file: Option<&'static str>,
    pub line: Option<u32>,
    pub additional_info: HashMap<String, String>,
}

impl ErrorContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            timestamp: SystemTime::now(),
            component: component.to_string(),
            operation: operation.to_string(),
            file: None,
            line: None,
            additional_info: HashMap::new(),
        }
    }

    /// Create error context with file and line information
    pub fn with_location(component: &str, operation: &str, file: &'static str, line: u32) -> Self {
        let mut context = Self::new(component, operation);
        context.file = Some(file);
        context.line = Some(line);
        context
    }

    pub fn add_info<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.additional_info.insert(key.into(), value.into());
        self
    }
}

/// Macro for creating error context with file and line info
#[macro_export]
macro_rules! error_context {
    ($component:expr, $operation:expr) => {
        $crate::error::ErrorContext::with_location($component, $operation, file!(), line!())
    };
}

impl VitalsError {
    pub fn context(&self) -> &ErrorContext {
        match self {
            VitalsError::Configuration { context, .. }
            | VitalsError::Feed { context, .. }
            | VitalsError::Buffer { context, .. }
            | VitalsError::Validation { context, .. }
            | VitalsError::ViewConflict { context, .. }
            | VitalsError::ViewClosed { context, .. }
            | VitalsError::Export { context, .. }
            | VitalsError::System { context, .. } => context,
        }
    }

    /// Attach a key/value pair to the context
    pub fn with_info<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        let context = match &mut self {
            VitalsError::Configuration { context, .. }
            | VitalsError::Feed { context, .. }
            | VitalsError::Buffer { context, .. }
            | VitalsError::Validation { context, .. }
            | VitalsError::ViewConflict { context, .. }
            | VitalsError::ViewClosed { context, .. }
            | VitalsError::Export { context, .. }
            | VitalsError::System { context, .. } => context,
        };
        context.additional_info.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for VitalsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VitalsError::Configuration { component, reason, context } => {
                write!(f, "[CONFIG] Configuration error in {}: {} ({})", component, reason, context.operation)
            }
            VitalsError::Feed { endpoint, error, retry_count, context } => {
                write!(
                    f,
                    "[FEED] {} on {} (retries: {}) ({})",
                    error, endpoint, retry_count, context.operation
                )
            }
            VitalsError::Buffer { patient, signal, error, context } => match (patient, signal) {
                (Some(patient), Some(signal)) => write!(
                    f,
                    "[BUFFER] patient {} signal {}: {} ({})",
                    patient, signal, error, context.operation
                ),
                _ => write!(f, "[BUFFER] {} ({})", error, context.operation),
            },
            VitalsError::Validation { error, context } => {
                write!(f, "[VALIDATION] {} ({})", error, context.operation)
            }
            VitalsError::ViewConflict { patient, context } => {
                write!(f, "[VIEW] Patient {} already has an active producer ({})", patient, context.operation)
            }
            VitalsError::ViewClosed { patient, context } => {
                write!(f, "[VIEW] View for patient {} is closed ({})", patient, context.operation)
            }
            VitalsError::Export { path, reason, context } => match path {
                Some(path) => write!(f, "[EXPORT] {} failed: {} ({})", path, reason, context.operation),
                None => write!(f, "[EXPORT] {} ({})", reason, context.operation),
            },
            VitalsError::System { subsystem, reason, context } => {
                write!(f, "[SYSTEM] {} error: {} ({})", subsystem, reason, context.operation)
            }
        }
    }
}

impl Error for VitalsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            VitalsError::Feed { error, .. } => Some(error),
            VitalsError::Buffer { error, .. } => Some(error),
            VitalsError::Validation { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<FeedError> for VitalsError {
    fn from(err: FeedError) -> Self {
        VitalsError::Feed {
            endpoint: "unknown".to_string(),
            error: err,
            retry_count: 0,
            context: error_context!("feed", "channel_operation"),
        }
    }
}

impl From<TrendBufferError> for VitalsError {
    fn from(err: TrendBufferError) -> Self {
        VitalsError::Buffer {
            patient: None,
            signal: None,
            error: err,
            context: error_context!("trend", "buffer_operation"),
        }
    }
}

impl From<ValidationError> for VitalsError {
    fn from(err: ValidationError) -> Self {
        VitalsError::Validation {
            error: err,
            context: error_context!("validation", "parameter_check"),
        }
    }
}

impl From<ConfigError> for VitalsError {
    fn from(err: ConfigError) -> Self {
        VitalsError::Configuration {
            component: "config_loader".to_string(),
            reason: err.to_string(),
            context: error_context!("config", "load"),
        }
    }
}

impl From<std::io::Error> for VitalsError {
    fn from(err: std::io::Error) -> Self {
        VitalsError::System {
            subsystem: "io".to_string(),
            reason: err.to_string(),
            context: error_context!("io", "io_operation"),
        }
    }
}

/// Result type alias for engine operations
pub type VitalsResult<T> = Result<T, VitalsError>;

/// Error builder for convenient error construction
pub struct VitalsErrorBuilder {
    component: String,
    operation: String,
}

impl VitalsErrorBuilder {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
        }
    }

    fn context(&self) -> ErrorContext {
        ErrorContext::new(&self.component, &self.operation)
    }

    pub fn configuration(self, reason: &str) -> VitalsError {
        let context = self.context();
        VitalsError::Configuration {
            component: self.component,
            reason: reason.to_string(),
            context,
        }
    }

    pub fn buffer(self, patient: &PatientId, signal: SignalKind, error: TrendBufferError) -> VitalsError {
        VitalsError::Buffer {
            patient: Some(patient.clone()),
            signal: Some(signal),
            error,
            context: self.context(),
        }
    }

    pub fn view_conflict(self, patient: &PatientId) -> VitalsError {
        VitalsError::ViewConflict {
            patient: patient.clone(),
            context: self.context(),
        }
    }

    pub fn view_closed(self, patient: &PatientId) -> VitalsError {
        VitalsError::ViewClosed {
            patient: patient.clone(),
            context: self.context(),
        }
    }

    pub fn export(self, path: Option<&str>, reason: &str) -> VitalsError {
        VitalsError::Export {
            path: path.map(str::to_string),
            reason: reason.to_string(),
            context: self.context(),
        }
    }
}

/// Convenience trait for error building
pub trait IntoVitalsError<T> {
    fn vitals_err(self, component: &str, operation: &str) -> VitalsResult<T>;
}

impl<T, E> IntoVitalsError<T> for Result<T, E>
where
    E: Error + Send + Sync + 'static,
{
    fn vitals_err(self, component: &str, operation: &str) -> VitalsResult<T> {
        self.map_err(|err| VitalsError::System {
            subsystem: component.to_string(),
            reason: err.to_string(),
            context: ErrorContext::new(component, operation),
        })
    }
}
