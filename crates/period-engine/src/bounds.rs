//! Serializable period bounds, for callers that want both edges at once.

use serde::Serialize;

use crate::calendar::{CivilInstant, Instant};
use crate::error::Result;
use crate::periods::{period_keys, PeriodKind};
use crate::resolver::{end_of, start_of};

/// Both boundaries of one period containing an instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodBounds {
    /// The period key (e.g., "day").
    pub period: PeriodKind,
    /// The period's display label.
    pub label: &'static str,
    /// The IANA timezone the boundaries were computed in.
    pub timezone: String,
    /// First instant of the period (RFC 3339 with offset).
    pub start: String,
    /// First instant after the period (RFC 3339 with offset).
    pub end: String,
    pub start_epoch: i64,
    pub end_epoch: i64,
    /// `end_epoch - start_epoch`. Not constant for a period: DST days run 23 or 25 hours.
    pub duration_seconds: i64,
}

impl PeriodBounds {
    fn compute(instant: &Instant, period: PeriodKind) -> Self {
        let start = start_of(instant, period);
        let end = end_of(instant, period);
        PeriodBounds {
            period,
            label: period.label(),
            timezone: instant.timezone_name().to_string(),
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
            start_epoch: start.epoch(),
            end_epoch: end.epoch(),
            duration_seconds: end.epoch() - start.epoch(),
        }
    }
}

/// Bounds of the period named `key` containing `instant`.
///
/// # Errors
///
/// Returns [`PeriodError::UnknownPeriod`](crate::PeriodError::UnknownPeriod)
/// for an unrecognized key.
pub fn period_bounds(instant: &Instant, key: &str) -> Result<PeriodBounds> {
    let period = key.parse::<PeriodKind>()?;
    Ok(PeriodBounds::compute(instant, period))
}

/// Bounds of every registered period containing `instant`, in registry order.
pub fn all_period_bounds(instant: &Instant) -> Vec<PeriodBounds> {
    period_keys()
        .iter()
        .map(|period| PeriodBounds::compute(instant, *period))
        .collect()
}
