// src/feed/types.rs
//! Typed live vitals message and feed errors

use crate::types::{PatientId, SignalKind};
use serde::Serialize;
use thiserror::Error;

/// Live feed error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Channel not connected")]
    NotConnected,

    #[error("Channel closed by publisher")]
    Closed,

    #[error("Connection attempt timed out after {0} ms")]
    Timeout(u64),

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Message for patient {received} delivered to view of patient {expected}")]
    PatientMismatch { expected: String, received: String },
}

impl FeedError {
    /// Whether the error means the subscription is gone
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            FeedError::ConnectionLost(_) | FeedError::NotConnected | FeedError::Closed
        )
    }
}

/// One value per signal; `None` when the field was absent or rejected
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VitalReadings {
    pub hr: Option<f64>,
    pub spo2: Option<f64>,
    pub rr: Option<f64>,
    pub temp: Option<f64>,
    pub bp_sys: Option<f64>,
    pub bp_dia: Option<f64>,
}

impl VitalReadings {
    pub fn get(&self, kind: SignalKind) -> Option<f64> {
        match kind {
            SignalKind::HeartRate => self.hr,
            SignalKind::SpO2 => self.spo2,
            SignalKind::RespiratoryRate => self.rr,
            SignalKind::Temperature => self.temp,
            SignalKind::SystolicBp => self.bp_sys,
            SignalKind::DiastolicBp => self.bp_dia,
        }
    }

    pub fn set(&mut self, kind: SignalKind, value: Option<f64>) {
        let slot = match kind {
            SignalKind::HeartRate => &mut self.hr,
            SignalKind::SpO2 => &mut self.spo2,
            SignalKind::RespiratoryRate => &mut self.rr,
            SignalKind::Temperature => &mut self.temp,
            SignalKind::SystolicBp => &mut self.bp_sys,
            SignalKind::DiastolicBp => &mut self.bp_dia,
        };
        *slot = value;
    }

    /// Present readings in column order
    pub fn present(&self) -> impl Iterator<Item = (SignalKind, f64)> + '_ {
        SignalKind::ALL
            .into_iter()
            .filter_map(move |kind| self.get(kind).map(|value| (kind, value)))
    }

    pub fn count(&self) -> usize {
        self.present().count()
    }
}

/// Why a single vitals field was dropped
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRejection {
    Null,
    NotNumeric(String),
    OutOfRange(f64),
}

/// Dropped field with its reason
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedField {
    pub kind: SignalKind,
    pub reason: FieldRejection,
}

/// Validated live message
#[derive(Debug, Clone, PartialEq)]
pub struct VitalsMessage {
    pub patient_id: PatientId,
    pub camera_id: Option<String>,
    pub readings: VitalReadings,
    pub confidence: Option<f64>,
    /// Publisher timestamp, informational only; samples use arrival time
    pub timestamp: Option<String>,
    pub monitor_type: Option<String>,
    pub dropped: Vec<DroppedField>,
}
