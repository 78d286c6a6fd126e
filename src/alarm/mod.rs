// src/alarm/mod.rs
//! Alarm evaluation against patient-specific limits

pub mod evaluator;
pub mod limits;

pub use evaluator::{evaluate, evaluate_latest, worst, AlarmSeverity, SeverityPolicy};
pub use limits::{Limits, PatientLimits};
