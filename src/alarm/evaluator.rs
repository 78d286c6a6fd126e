// src/alarm/evaluator.rs
//! Threshold evaluation of the latest sample against patient limits

use crate::alarm::limits::{Limits, PatientLimits};
use crate::types::{Sample, SignalKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alarm severity for one (patient, signal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlarmSeverity {
    Normal,
    Warning,
    Critical,
}

impl fmt::Display for AlarmSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlarmSeverity::Normal => write!(f, "NORMAL"),
            AlarmSeverity::Warning => write!(f, "WARNING"),
            AlarmSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Severity tier applied on each side of a signal's limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityPolicy {
    pub below: AlarmSeverity,
    pub above: AlarmSeverity,
}

impl SeverityPolicy {
    pub const SINGLE_TIER: SeverityPolicy = SeverityPolicy {
        below: AlarmSeverity::Warning,
        above: AlarmSeverity::Warning,
    };

    /// Escalation table; desaturation goes straight to critical
    pub fn for_signal(kind: SignalKind) -> Self {
        match kind {
            SignalKind::SpO2 => SeverityPolicy {
                below: AlarmSeverity::Critical,
                above: AlarmSeverity::Warning,
            },
            _ => Self::SINGLE_TIER,
        }
    }
}

/// Classify a value. No hysteresis: a value sitting on a boundary may flap
/// between severities from one sample to the next.
pub fn evaluate(kind: SignalKind, value: f64, limits: Option<Limits>) -> AlarmSeverity {
    let Some(limits) = limits else {
        return AlarmSeverity::Normal;
    };

    let policy = SeverityPolicy::for_signal(kind);
    if value < limits.low {
        policy.below
    } else if value > limits.high {
        policy.above
    } else {
        AlarmSeverity::Normal
    }
}

/// Severity of the latest sample, `Normal` when there is none
pub fn evaluate_latest(kind: SignalKind, latest: Option<Sample>, limits: &PatientLimits) -> AlarmSeverity {
    latest
        .map(|sample| evaluate(kind, sample.value, limits.get(kind)))
        .unwrap_or(AlarmSeverity::Normal)
}

/// Highest severity over a set of per-signal evaluations
pub fn worst<I>(severities: I) -> AlarmSeverity
where
    I: IntoIterator<Item = AlarmSeverity>,
{
    severities.into_iter().max().unwrap_or(AlarmSeverity::Normal)
}
