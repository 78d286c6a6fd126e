//! Mean-reverting random walk for synthetic vitals
//! Location: src/simulation/random_walk.rs

use super::config::GeneratorConfig;
use super::profiles::{Acuity, PatientProfile};
use crate::alarm::Limits;
use crate::trend::{BackfillWindow, TrendBuffer, TrendBufferError};
use crate::types::{Sample, SampleOrigin, SignalKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Which regime the walk is stepping in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkPhase {
    /// Populating a window during reseed
    Backfill,
    /// Steady-state ticking
    Live,
}

/// Per-(patient, signal) walk memory
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WalkState {
    pub previous: Option<f64>,
}

/// Walk state for every signal of one patient
pub type WalkStates = HashMap<SignalKind, WalkState>;

/// Inputs for one signal's walk
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkInput {
    pub base: f64,
    pub variance: f64,
    pub limits: Option<Limits>,
    pub acuity: Acuity,
}

impl WalkInput {
    pub fn from_profile(profile: &PatientProfile, kind: SignalKind) -> Self {
        let baseline = profile.baseline(kind);
        Self {
            base: baseline.base,
            variance: baseline.variance,
            limits: profile.limits.get(kind),
            acuity: profile.acuity,
        }
    }
}

fn midpoint(kind: SignalKind) -> f64 {
    let (min, max) = kind.hard_range();
    (min + max) / 2.0
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Advance the walk by one step and return the new value.
///
/// Pure apart from the random source: all memory lives in `state`.
/// The result always lies within the signal's hard range.
pub fn step<R: Rng + ?Sized>(
    kind: SignalKind,
    input: &WalkInput,
    state: &mut WalkState,
    phase: WalkPhase,
    config: &GeneratorConfig,
    rng: &mut R,
) -> f64 {
    let base = if input.base.is_finite() { input.base } else { midpoint(kind) };
    let variance = if input.variance.is_finite() { input.variance.abs() } else { 0.0 };

    let (reversion, jitter_scale) = match phase {
        WalkPhase::Backfill => (config.backfill_reversion, config.backfill_jitter_scale),
        WalkPhase::Live => (config.live_reversion, config.live_jitter_scale),
    };

    let mut current = state.previous.filter(|v| v.is_finite()).unwrap_or(base);
    current += (base - current) * reversion;
    current += (rng.gen::<f64>() - 0.5) * variance * jitter_scale;

    if input.acuity != Acuity::Normal {
        if let Some(limits) = input.limits {
            if rng.gen::<f64>() < config.excursion_probability {
                let margin = kind.excursion_margin();
                current = if rng.gen_bool(0.5) {
                    limits.high + margin
                } else {
                    limits.low - margin
                };
            }
        }
    }

    // Clamp after any excursion
    let value = round_one_decimal(kind.clamp(current));
    state.previous = Some(value);
    value
}

/// Seeded random walk driver
pub struct SampleGenerator {
    config: GeneratorConfig,
    rng: StdRng,
}

impl SampleGenerator {
    /// Seeded from `config.seed`, or from OS entropy when unset
    pub fn new(config: GeneratorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    pub fn with_seed(config: GeneratorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn next_value(
        &mut self,
        kind: SignalKind,
        input: &WalkInput,
        state: &mut WalkState,
        phase: WalkPhase,
    ) -> f64 {
        step(kind, input, state, phase, &self.config, &mut self.rng)
    }

    /// One steady-state simulated sample stamped at `time`
    pub fn tick(&mut self, kind: SignalKind, input: &WalkInput, state: &mut WalkState, time: u64) -> Sample {
        let value = self.next_value(kind, input, state, WalkPhase::Live);
        Sample::new(time, value, SampleOrigin::Simulated)
    }

    /// Internally consistent synthetic history of `points` samples.
    ///
    /// Starts from `base` and threads the walk through every point; `state`
    /// ends at the newest value so live ticking continues from there.
    pub fn backfill(
        &mut self,
        kind: SignalKind,
        input: &WalkInput,
        state: &mut WalkState,
        points: usize,
        window: BackfillWindow,
    ) -> Result<Vec<Sample>, TrendBufferError> {
        let mut walk = WalkState::default();
        let samples = TrendBuffer::build_backfill(points, window, |_| {
            self.next_value(kind, input, &mut walk, WalkPhase::Backfill)
        })?;
        *state = walk;
        Ok(samples)
    }
}
