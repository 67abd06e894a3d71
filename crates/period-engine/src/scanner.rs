//! Fallback scanner for boundaries that fall inside a DST gap.
//!
//! When the canonical boundary of a unit (midnight, Monday midnight, the first
//! of the month, the top of the hour, a 10-minute mark) does not exist in
//! local time, the resolver falls back to walking the timeline in fixed
//! 5-minute steps and watching the civil field that identifies the unit.
//! Steps are absolute durations, so every step is well-defined.
//!
//! Offset changes are assumed to happen on a 5-minute grid; transitions that
//! are not aligned to it are not located exactly.

use tracing::debug;

use crate::calendar::{CalendarUnit, CivilInstant};
use crate::periods::PeriodKind;
use crate::resolver::start_of;

/// Scan step, in seconds.
pub const SCAN_STEP_SECONDS: i64 = 5 * 60;

/// Upper bound on scan length: a 31-day month of 5-minute steps plus a day.
const MAX_SCAN_STEPS: usize = 32 * 288;

/// The civil field whose change marks the edge of `unit`.
fn unit_field<T: CivilInstant>(instant: &T, unit: CalendarUnit) -> u32 {
    match unit {
        CalendarUnit::Minute => instant.minute(),
        CalendarUnit::TenMinutes => instant.hour() * 6 + instant.minute() / 10,
        CalendarUnit::Hour => instant.hour(),
        CalendarUnit::Day => instant.day(),
        CalendarUnit::Week => instant.iso_week(),
        CalendarUnit::Month => instant.month(),
    }
}

/// Walk backward from `from` while `unit`'s field still equals `target`.
///
/// Returns the earliest lattice point still inside the unit and the number
/// of steps taken.
fn scan_back<T: CivilInstant>(from: T, unit: CalendarUnit, target: u32) -> (T, usize) {
    let mut cursor = from;
    let mut steps = 0;
    while steps < MAX_SCAN_STEPS {
        let previous = cursor.add_seconds(-SCAN_STEP_SECONDS);
        if previous.epoch_nanos() == cursor.epoch_nanos() || unit_field(&previous, unit) != target
        {
            break;
        }
        cursor = previous;
        steps += 1;
    }
    (cursor, steps)
}

/// Start of the `unit` containing `instant`, found by scanning.
///
/// Steps back in 5-minute decrements until the unit's field changes, steps
/// forward once to land back inside the unit, then snaps to the start of the
/// containing 10-minute bucket. The snap is dropped when it would leave the
/// unit, which happens when a gap ends off the 10-minute grid (Kathmandu
/// 1986-01-01 00:00 → 00:15).
pub fn safe_start<T: CivilInstant>(instant: &T, unit: CalendarUnit) -> T {
    let target = unit_field(instant, unit);
    let (first, steps) = scan_back(*instant, unit, target);
    debug!(?unit, epoch = instant.epoch(), steps, "scanned back to unit start");
    snap_within(&first, unit, target)
}

/// First instant after the `unit` containing `instant`, found by scanning.
///
/// Steps forward in 5-minute increments until the unit's field changes, then
/// snaps like [`safe_start`]. The result is always after `instant`.
pub fn safe_end<T: CivilInstant>(instant: &T, unit: CalendarUnit) -> T {
    let target = unit_field(instant, unit);
    let mut cursor = instant.add_seconds(SCAN_STEP_SECONDS);
    let mut steps = 1;
    while steps < MAX_SCAN_STEPS && unit_field(&cursor, unit) == target {
        let next = cursor.add_seconds(SCAN_STEP_SECONDS);
        if next.epoch_nanos() == cursor.epoch_nanos() {
            break;
        }
        cursor = next;
        steps += 1;
    }
    debug!(?unit, epoch = instant.epoch(), steps, "scanned forward to unit end");
    let end = snap_within(&cursor, unit, unit_field(&cursor, unit));
    if end.epoch_nanos() > instant.epoch_nanos() {
        end
    } else {
        cursor
    }
}

/// Earliest 5-minute mark of the local hour containing `instant`.
///
/// Used when the top of the hour itself falls in a gap. Gaps that end on a
/// quarter hour (Chatham, Lord Howe) leave the result inside the current
/// hour, so no 10-minute snap is applied here.
pub fn hour_floor<T: CivilInstant>(instant: &T) -> T {
    floor_within(instant, CalendarUnit::Hour)
}

/// Earliest 5-minute mark of the local 10-minute bucket containing `instant`.
///
/// Used when the bucket's first minute falls in a gap (Guyana 1975-08-01
/// 00:00 → 00:45 starts the `:40` bucket at 00:45).
pub fn ten_minute_floor<T: CivilInstant>(instant: &T) -> T {
    floor_within(instant, CalendarUnit::TenMinutes)
}

/// `instant` moved back onto the 5-minute grid of its local minute field.
pub fn five_minute_mark<T: CivilInstant>(instant: &T) -> T {
    let minute_mark = minute_floor(instant);
    minute_mark.add_seconds(-i64::from(minute_mark.minute() % 5) * 60)
}

fn floor_within<T: CivilInstant>(instant: &T, unit: CalendarUnit) -> T {
    let (first, steps) = scan_back(five_minute_mark(instant), unit, unit_field(instant, unit));
    debug!(?unit, epoch = instant.epoch(), steps, "scanned back to bucket start");
    first
}

/// Snap `point` to its 10-minute bucket start, or failing that to its
/// 5-minute mark, as long as the result keeps `unit`'s field at `target`.
fn snap_within<T: CivilInstant>(point: &T, unit: CalendarUnit, target: u32) -> T {
    let bucket = start_of(point, PeriodKind::TenMinutes);
    if bucket.epoch_nanos() <= point.epoch_nanos() && unit_field(&bucket, unit) == target {
        return bucket;
    }
    let mark = five_minute_mark(point);
    if unit_field(&mark, unit) == target {
        mark
    } else {
        *point
    }
}

/// `instant` with seconds and sub-seconds removed, by absolute arithmetic.
pub fn minute_floor<T: CivilInstant>(instant: &T) -> T {
    instant.at_epoch(instant.epoch() - i64::from(instant.second()))
}
