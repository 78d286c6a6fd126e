// src/alarm/limits.rs
//! Patient-specific acceptable ranges

use crate::types::SignalKind;
use crate::utils::validation::{validate_ordered_pair, ValidationResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Acceptable range `[low, high]` for one signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub low: f64,
    pub high: f64,
}

impl Limits {
    pub fn new(low: f64, high: f64) -> ValidationResult<Self> {
        validate_ordered_pair(low, high, "limits")?;
        Ok(Self { low, high })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

/// Per-signal limits for one patient, supplied by the patient profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientLimits {
    limits: HashMap<SignalKind, Limits>,
}

impl PatientLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard neonatal alarm limits
    pub fn neonatal_default() -> Self {
        let table = [
            (SignalKind::HeartRate, 100.0, 180.0),
            (SignalKind::SpO2, 90.0, 100.0),
            (SignalKind::RespiratoryRate, 30.0, 60.0),
            (SignalKind::Temperature, 36.5, 37.5),
            (SignalKind::SystolicBp, 50.0, 80.0),
            (SignalKind::DiastolicBp, 25.0, 50.0),
        ];

        Self {
            limits: table
                .into_iter()
                .map(|(kind, low, high)| (kind, Limits { low, high }))
                .collect(),
        }
    }

    /// Builder-style setter
    pub fn with(mut self, kind: SignalKind, limits: Limits) -> Self {
        self.limits.insert(kind, limits);
        self
    }

    pub fn set(&mut self, kind: SignalKind, limits: Limits) {
        self.limits.insert(kind, limits);
    }

    pub fn get(&self, kind: SignalKind) -> Option<Limits> {
        self.limits.get(&kind).copied()
    }
}
