// src/trend/mod.rs
//! Rolling trend windows and their statistics

pub mod store;
pub mod time_range;
pub mod trend_buffer;

pub use store::{ReseedTicket, StoreMetrics, TrendStore};
pub use time_range::TimeRange;
pub use trend_buffer::{AppendOutcome, BackfillWindow, TrendBuffer, TrendBufferError, TrendStats};
