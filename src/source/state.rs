// src/source/state.rs
//! Data source state machine

use crate::trend::TimeRange;
use serde::Serialize;
use std::fmt;

/// Where the samples of a view currently come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DataSourceState {
    /// Live channel delivered within the staleness window
    Live,
    /// Connected but silent past the staleness window; last values retained
    Stale,
    /// No live subscription; the generator drives the buffers
    Simulation,
}

impl fmt::Display for DataSourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceState::Live => write!(f, "LIVE"),
            DataSourceState::Stale => write!(f, "STALE"),
            DataSourceState::Simulation => write!(f, "SIMULATION"),
        }
    }
}

/// Inputs to the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    ConnectionEstablished,
    ConnectionLost,
    /// A valid message arrived (possibly with zero usable fields)
    MessageReceived,
    StalenessExpired,
    /// Live source switched off by configuration or operator
    Disabled,
}

impl DataSourceState {
    /// Transition table.
    ///
    /// Stale never falls back to Simulation on its own: only a lost
    /// connection or an explicit disable does.
    pub fn on(self, event: SourceEvent) -> DataSourceState {
        use DataSourceState::*;
        use SourceEvent::*;

        match (self, event) {
            (_, Disabled) => Simulation,
            (_, MessageReceived) => Live,
            (Live | Stale, ConnectionLost) => Simulation,
            (Simulation, ConnectionLost) => Simulation,
            // Subscribed but nothing delivered yet
            (Simulation, ConnectionEstablished) => Stale,
            (state, ConnectionEstablished) => state,
            (Live, StalenessExpired) => Stale,
            (state, StalenessExpired) => state,
        }
    }
}

/// Read model of one view's source, published on every change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub state: DataSourceState,
    /// Epoch ms of the last sample written by either producer
    pub last_update_ms: Option<u64>,
    pub paused: bool,
    pub time_range: TimeRange,
    pub connected: bool,
    pub live_enabled: bool,
    pub reseeds: u64,
    pub messages_accepted: u64,
    pub messages_rejected: u64,
    pub fields_dropped: u64,
    pub simulated_ticks: u64,
}

impl SourceStatus {
    pub fn new(time_range: TimeRange, live_enabled: bool) -> Self {
        Self {
            state: DataSourceState::Simulation,
            last_update_ms: None,
            paused: false,
            time_range,
            connected: false,
            live_enabled,
            reseeds: 0,
            messages_accepted: 0,
            messages_rejected: 0,
            fields_dropped: 0,
            simulated_ticks: 0,
        }
    }
}
