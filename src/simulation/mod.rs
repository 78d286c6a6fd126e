//! Synthetic vitals generation for when no live feed is available
//! Location: src/simulation/mod.rs

pub mod config;
pub mod profiles;
pub mod random_walk;

pub use config::GeneratorConfig;
pub use profiles::{Acuity, Baseline, PatientProfile, PatientProfileSource, StaticProfiles};
pub use random_walk::{step, SampleGenerator, WalkInput, WalkPhase, WalkState, WalkStates};
