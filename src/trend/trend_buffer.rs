// src/trend/trend_buffer.rs
//! Bounded, time-ordered sample window for one (patient, signal) pair

use crate::types::{Sample, SampleOrigin};
use serde::Serialize;
use std::collections::VecDeque;

/// Rolling window of samples with FIFO eviction
#[derive(Debug, Clone)]
pub struct TrendBuffer {
    samples: VecDeque<Sample>,
    max_points: usize,
}

/// Summary statistics over the current window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TrendStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Span of synthetic history produced during a reseed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillWindow {
    /// Timestamp of the newest backfilled point, epoch ms
    pub end: u64,
    /// Total span covered, ms
    pub span: u64,
}

/// Outcome of a successful append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    pub evicted: usize,
}

/// Trend buffer error types
#[derive(Debug, Clone, PartialEq)]
pub enum TrendBufferError {
    InvalidCapacity,
    OutOfOrder { last: u64, attempted: u64 },
}

impl std::fmt::Display for TrendBufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendBufferError::InvalidCapacity => write!(f, "Invalid trend buffer capacity (must be at least 1)"),
            TrendBufferError::OutOfOrder { last, attempted } => write!(
                f,
                "Sample at {} ms is older than newest buffered sample at {} ms",
                attempted, last
            ),
        }
    }
}

impl std::error::Error for TrendBufferError {}

impl TrendBuffer {
    /// Create an empty buffer holding at most `max_points` samples
    pub fn new(max_points: usize) -> Result<Self, TrendBufferError> {
        if max_points == 0 {
            return Err(TrendBufferError::InvalidCapacity);
        }

        Ok(Self {
            samples: VecDeque::with_capacity(max_points),
            max_points,
        })
    }

    /// Append a sample, evicting from the front while over capacity.
    ///
    /// Samples older than the newest buffered sample are rejected so the
    /// window stays non-decreasing by time.
    pub fn append(&mut self, sample: Sample) -> Result<AppendOutcome, TrendBufferError> {
        if let Some(last) = self.samples.back() {
            if sample.time < last.time {
                return Err(TrendBufferError::OutOfOrder {
                    last: last.time,
                    attempted: sample.time,
                });
            }
        }

        self.samples.push_back(sample);

        let mut evicted = 0;
        while self.samples.len() > self.max_points {
            self.samples.pop_front();
            evicted += 1;
        }

        Ok(AppendOutcome { evicted })
    }

    /// Discard the window and backfill `new_max_points` synthetic samples.
    ///
    /// `next_value` is invoked once per point, oldest first, with the
    /// point's timestamp; it is expected to carry its own walk state so the
    /// series is internally consistent.
    pub fn reseed<F>(
        &mut self,
        new_max_points: usize,
        window: BackfillWindow,
        next_value: F,
    ) -> Result<(), TrendBufferError>
    where
        F: FnMut(u64) -> f64,
    {
        let samples = Self::build_backfill(new_max_points, window, next_value)?;
        self.replace(new_max_points, samples)
    }

    /// Produce a backfilled series without touching any buffer
    pub fn build_backfill<F>(
        points: usize,
        window: BackfillWindow,
        mut next_value: F,
    ) -> Result<Vec<Sample>, TrendBufferError>
    where
        F: FnMut(u64) -> f64,
    {
        if points == 0 {
            return Err(TrendBufferError::InvalidCapacity);
        }

        let step = window.span / points as u64;
        let samples = (0..points)
            .map(|i| {
                let back = (points - 1 - i) as u64 * step;
                let time = window.end.saturating_sub(back);
                Sample::new(time, next_value(time), SampleOrigin::Backfill)
            })
            .collect();

        Ok(samples)
    }

    /// Swap in a prepared series and capacity
    pub fn replace(&mut self, max_points: usize, samples: Vec<Sample>) -> Result<(), TrendBufferError> {
        if max_points == 0 {
            return Err(TrendBufferError::InvalidCapacity);
        }
        if let Some(pair) = samples.windows(2).find(|pair| pair[1].time < pair[0].time) {
            return Err(TrendBufferError::OutOfOrder {
                last: pair[0].time,
                attempted: pair[1].time,
            });
        }

        let skip = samples.len().saturating_sub(max_points);
        self.samples = samples.into_iter().skip(skip).collect();
        self.max_points = max_points;
        Ok(())
    }

    /// Summary statistics; all zero for an empty buffer
    pub fn stats(&self) -> TrendStats {
        if self.samples.is_empty() {
            return TrendStats::default();
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for sample in &self.samples {
            min = min.min(sample.value);
            max = max.max(sample.value);
            sum += sample.value;
        }

        TrendStats {
            min,
            max,
            avg: sum / self.samples.len() as f64,
        }
    }

    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Copy of the window, oldest first
    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }
}
