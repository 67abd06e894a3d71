//! The period registry: the fixed set of calendar periods a boundary can be
//! computed for, in a stable order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PeriodError;

/// One of the supported calendar periods.
///
/// Ordering follows declaration order, from the finest period to the coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PeriodKind {
    #[serde(rename = "10 minutes")]
    TenMinutes,
    #[serde(rename = "hour")]
    Hour,
    #[serde(rename = "day")]
    Day,
    #[serde(rename = "week")]
    Week,
    #[serde(rename = "month")]
    Month,
}

/// The registry, in declaration order.
static PERIODS: [PeriodKind; 5] = [
    PeriodKind::TenMinutes,
    PeriodKind::Hour,
    PeriodKind::Day,
    PeriodKind::Week,
    PeriodKind::Month,
];

impl PeriodKind {
    /// The wire key used to name this period (`"10 minutes"`, `"hour"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            PeriodKind::TenMinutes => "10 minutes",
            PeriodKind::Hour => "hour",
            PeriodKind::Day => "day",
            PeriodKind::Week => "week",
            PeriodKind::Month => "month",
        }
    }

    /// The human-readable label (`"10 minutes"`, `"Hour"`, ...).
    pub fn label(self) -> &'static str {
        match self {
            PeriodKind::TenMinutes => "10 minutes",
            PeriodKind::Hour => "Hour",
            PeriodKind::Day => "Day",
            PeriodKind::Week => "Week",
            PeriodKind::Month => "Month",
        }
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodKind {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PERIODS
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PeriodError::UnknownPeriod(format!("'{s}'")))
    }
}

/// All supported periods, always in the order
/// `[TenMinutes, Hour, Day, Week, Month]`.
pub fn period_keys() -> &'static [PeriodKind] {
    &PERIODS
}

/// Look up the display label for a period key.
///
/// # Errors
///
/// Returns [`PeriodError::UnknownPeriod`] if `key` does not name one of the
/// supported periods.
pub fn period_label(key: &str) -> Result<&'static str, PeriodError> {
    key.parse::<PeriodKind>().map(PeriodKind::label)
}
