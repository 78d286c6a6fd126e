// src/types.rs
//! Core vitals types shared by every component

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque patient identifier; all per-patient state is keyed by it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(String);

impl PatientId {
    /// Create a patient id from anything string-like
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PatientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<u64> for PatientId {
    fn from(id: u64) -> Self {
        Self::new(id.to_string())
    }
}

/// Physiological measurement stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    HeartRate,
    SpO2,
    RespiratoryRate,
    Temperature,
    SystolicBp,
    DiastolicBp,
}

impl SignalKind {
    /// All signal kinds in display/export column order
    pub const ALL: [SignalKind; 6] = [
        SignalKind::HeartRate,
        SignalKind::SpO2,
        SignalKind::RespiratoryRate,
        SignalKind::Temperature,
        SignalKind::SystolicBp,
        SignalKind::DiastolicBp,
    ];

    /// Key used on the live wire and as CSV column header
    pub fn wire_key(self) -> &'static str {
        match self {
            SignalKind::HeartRate => "hr",
            SignalKind::SpO2 => "spo2",
            SignalKind::RespiratoryRate => "rr",
            SignalKind::Temperature => "temp",
            SignalKind::SystolicBp => "bp_sys",
            SignalKind::DiastolicBp => "bp_dia",
        }
    }

    /// Parse a wire key back into a signal kind
    pub fn from_wire_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.wire_key() == key)
    }

    /// Hard physiological clamp range `(min, max)`, independent of patient limits
    pub fn hard_range(self) -> (f64, f64) {
        match self {
            SignalKind::HeartRate => (60.0, 220.0),
            SignalKind::SpO2 => (70.0, 100.0),
            SignalKind::RespiratoryRate => (15.0, 100.0),
            SignalKind::Temperature => (34.0, 40.0),
            SignalKind::SystolicBp => (40.0, 120.0),
            SignalKind::DiastolicBp => (20.0, 80.0),
        }
    }

    /// Clamp a value into the hard range
    pub fn clamp(self, value: f64) -> f64 {
        let (min, max) = self.hard_range();
        value.clamp(min, max)
    }

    /// Whether a value lies within the hard range
    pub fn is_physiological(self, value: f64) -> bool {
        let (min, max) = self.hard_range();
        value.is_finite() && value >= min && value <= max
    }

    /// Distance past a limit used when injecting a simulated alarm excursion
    pub fn excursion_margin(self) -> f64 {
        match self {
            SignalKind::HeartRate => 8.0,
            SignalKind::SpO2 => 3.0,
            SignalKind::RespiratoryRate => 5.0,
            SignalKind::Temperature => 0.3,
            SignalKind::SystolicBp => 5.0,
            SignalKind::DiastolicBp => 4.0,
        }
    }

    /// Display unit
    pub fn unit(self) -> &'static str {
        match self {
            SignalKind::HeartRate => "bpm",
            SignalKind::SpO2 => "%",
            SignalKind::RespiratoryRate => "/min",
            SignalKind::Temperature => "°C",
            SignalKind::SystolicBp | SignalKind::DiastolicBp => "mmHg",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_key())
    }
}

/// Where a sample came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleOrigin {
    /// Received from the live messaging channel
    Live,
    /// Produced by the generator while ticking in simulation mode
    Simulated,
    /// Synthetic history produced during a buffer reseed
    Backfill,
}

impl SampleOrigin {
    /// True for anything the generator produced
    pub fn is_synthetic(self) -> bool {
        !matches!(self, SampleOrigin::Live)
    }
}

/// Single timestamped measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Epoch milliseconds
    pub time: u64,
    pub value: f64,
    pub origin: SampleOrigin,
}

impl Sample {
    pub fn new(time: u64, value: f64, origin: SampleOrigin) -> Self {
        Self { time, value, origin }
    }

    pub fn live(time: u64, value: f64) -> Self {
        Self::new(time, value, SampleOrigin::Live)
    }

    pub fn simulated(time: u64, value: f64) -> Self {
        Self::new(time, value, SampleOrigin::Simulated)
    }
}
