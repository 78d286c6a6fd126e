// src/trend/time_range.rs
//! Operator-selected trend window

use crate::utils::MILLIS_PER_HOUR;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Time range shown on the trend charts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "24h")]
    TwentyFourHours,
}

impl TimeRange {
    pub const ALL: [TimeRange; 4] = [
        TimeRange::OneHour,
        TimeRange::FourHours,
        TimeRange::TwelveHours,
        TimeRange::TwentyFourHours,
    ];

    pub fn hours(self) -> u64 {
        match self {
            TimeRange::OneHour => 1,
            TimeRange::FourHours => 4,
            TimeRange::TwelveHours => 12,
            TimeRange::TwentyFourHours => 24,
        }
    }

    /// Buffer capacity for this range
    pub fn max_points(self, points_per_hour: usize) -> usize {
        (self.hours() as usize).saturating_mul(points_per_hour).max(1)
    }

    /// Window span in milliseconds
    pub fn span_millis(self) -> u64 {
        self.hours() * MILLIS_PER_HOUR
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeRange::OneHour => "1h",
            TimeRange::FourHours => "4h",
            TimeRange::TwelveHours => "12h",
            TimeRange::TwentyFourHours => "24h",
        }
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        TimeRange::OneHour
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1h" => Ok(TimeRange::OneHour),
            "4h" => Ok(TimeRange::FourHours),
            "12h" => Ok(TimeRange::TwelveHours),
            "24h" => Ok(TimeRange::TwentyFourHours),
            other => Err(format!("unknown time range '{}', expected 1h, 4h, 12h or 24h", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_points() {
        assert_eq!(TimeRange::OneHour.max_points(30), 30);
        assert_eq!(TimeRange::TwentyFourHours.max_points(30), 720);
    }

    #[test]
    fn test_parse_labels() {
        for range in [
            TimeRange::OneHour,
            TimeRange::FourHours,
            TimeRange::TwelveHours,
            TimeRange::TwentyFourHours,
        ] {
            assert_eq!(range.label().parse::<TimeRange>(), Ok(range));
        }
        assert!("2d".parse::<TimeRange>().is_err());
    }
}
