// src/simulation/profiles.rs
//! Patient profile collaborator: acuity, limits and nominal baselines.
//!
//! The engine only reads profiles. [`StaticProfiles`] is an in-memory
//! implementation for embedding applications and tests.

use crate::alarm::{Limits, PatientLimits};
use crate::types::{PatientId, SignalKind};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Patient status flag from the acuity profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acuity {
    #[default]
    Normal,
    Warning,
    Critical,
}

/// Nominal value and tick-to-tick volatility of one signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub base: f64,
    pub variance: f64,
}

impl Baseline {
    /// Neonatal nominal values
    pub fn neonatal(kind: SignalKind) -> Self {
        let (base, variance) = match kind {
            SignalKind::HeartRate => (140.0, 10.0),
            SignalKind::SpO2 => (96.0, 2.0),
            SignalKind::RespiratoryRate => (45.0, 6.0),
            SignalKind::Temperature => (36.8, 0.2),
            SignalKind::SystolicBp => (65.0, 5.0),
            SignalKind::DiastolicBp => (40.0, 4.0),
        };
        Self { base, variance }
    }
}

/// Everything the engine reads about one patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub acuity: Acuity,
    pub limits: PatientLimits,
    #[serde(default)]
    pub baselines: HashMap<SignalKind, Baseline>,
}

impl PatientProfile {
    pub fn neonatal_default() -> Self {
        Self {
            acuity: Acuity::Normal,
            limits: PatientLimits::neonatal_default(),
            baselines: SignalKind::ALL
                .into_iter()
                .map(|kind| (kind, Baseline::neonatal(kind)))
                .collect(),
        }
    }

    pub fn with_acuity(mut self, acuity: Acuity) -> Self {
        self.acuity = acuity;
        self
    }

    /// Baseline for a signal, neonatal default when the profile has none
    pub fn baseline(&self, kind: SignalKind) -> Baseline {
        self.baselines
            .get(&kind)
            .copied()
            .unwrap_or_else(|| Baseline::neonatal(kind))
    }

    /// Signals the generator produces for this patient, in column order
    pub fn simulated_signals(&self) -> Vec<SignalKind> {
        SignalKind::ALL
            .into_iter()
            .filter(|kind| self.baselines.contains_key(kind))
            .collect()
    }
}

impl Default for PatientProfile {
    fn default() -> Self {
        Self::neonatal_default()
    }
}

/// Read-only source of patient profiles
pub trait PatientProfileSource: Send + Sync {
    fn profile(&self, patient: &PatientId) -> Option<PatientProfile>;
}

/// In-memory profile registry
#[derive(Debug, Default)]
pub struct StaticProfiles {
    profiles: RwLock<HashMap<PatientId, PatientProfile>>,
    fallback: Option<PatientProfile>,
}

impl StaticProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry answering unknown patients with `fallback`
    pub fn with_fallback(fallback: PatientProfile) -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
            fallback: Some(fallback),
        }
    }

    pub fn insert(&self, patient: PatientId, profile: PatientProfile) {
        self.profiles.write().insert(patient, profile);
    }

    /// Change one alarm limit; returns false when the patient is unknown
    pub fn update_limits(&self, patient: &PatientId, kind: SignalKind, limits: Limits) -> bool {
        match self.profiles.write().get_mut(patient) {
            Some(profile) => {
                profile.limits.set(kind, limits);
                true
            }
            None => false,
        }
    }

    pub fn set_acuity(&self, patient: &PatientId, acuity: Acuity) -> bool {
        match self.profiles.write().get_mut(patient) {
            Some(profile) => {
                profile.acuity = acuity;
                true
            }
            None => false,
        }
    }
}

impl PatientProfileSource for StaticProfiles {
    fn profile(&self, patient: &PatientId) -> Option<PatientProfile> {
        self.profiles
            .read()
            .get(patient)
            .cloned()
            .or_else(|| self.fallback.clone())
    }
}
