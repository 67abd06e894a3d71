//! Period boundary resolution.
//!
//! [`get_start`] and [`get_end`] compute the first instant of the period
//! containing a given instant and the first instant after it. Both first try
//! direct truncation and calendar addition on the calendar layer, which is
//! correct for nearly every instant in every timezone. When the canonical
//! boundary does not exist in local time (a DST gap), the calendar layer
//! reports [`NonexistentLocalTime`](crate::calendar::NonexistentLocalTime) and
//! the computation switches to the [`scanner`](crate::scanner). When the
//! boundary occurs twice and its later occurrence is after the instant, the
//! earlier occurrence is used instead.
//!
//! For every supported period the result satisfies
//! `start.epoch() <= instant.epoch() < end.epoch()`, and `start` is a fixed
//! point of [`start_of`].
//!
//! # Examples
//!
//! ```
//! use period_engine::{get_end, get_start, CivilInstant, Instant};
//!
//! // Chicago springs forward on 2003-04-06, so that day is 23 hours long.
//! let t = Instant::from_civil(2003, 4, 6, 3, 59, 59, "America/Chicago").unwrap();
//! let start = get_start(&t, "day").unwrap();
//! let end = get_end(&t, "day").unwrap();
//! assert_eq!(end.epoch() - start.epoch(), 23 * 3600);
//! ```

use tracing::{debug, trace};

use crate::calendar::{CalendarUnit, CivilInstant};
use crate::error::Result;
use crate::periods::PeriodKind;
use crate::scanner;

const TEN_MINUTES: i64 = 10 * 60;
const ONE_HOUR: i64 = 60 * 60;

/// Start of the period named `key` that contains `instant`.
///
/// # Errors
///
/// Returns [`PeriodError::UnknownPeriod`](crate::PeriodError::UnknownPeriod)
/// if `key` is not one of the registry's period keys. No other error is
/// possible.
pub fn get_start<T: CivilInstant>(instant: &T, key: &str) -> Result<T> {
    let period = key.parse::<PeriodKind>()?;
    Ok(start_of(instant, period))
}

/// First instant after the period named `key` that contains `instant`; the
/// start of the next period.
///
/// # Errors
///
/// Returns [`PeriodError::UnknownPeriod`](crate::PeriodError::UnknownPeriod)
/// if `key` is not one of the registry's period keys. No other error is
/// possible.
pub fn get_end<T: CivilInstant>(instant: &T, key: &str) -> Result<T> {
    let period = key.parse::<PeriodKind>()?;
    Ok(end_of(instant, period))
}

/// Start of `period` containing `instant`.
pub fn start_of<T: CivilInstant>(instant: &T, period: PeriodKind) -> T {
    match period {
        PeriodKind::TenMinutes => ten_minute_start(instant),
        PeriodKind::Hour => hour_start(instant),
        PeriodKind::Day => calendar_start(instant, period, CalendarUnit::Day),
        PeriodKind::Week => calendar_start(instant, period, CalendarUnit::Week),
        PeriodKind::Month => calendar_start(instant, period, CalendarUnit::Month),
    }
}

/// First instant after `period` containing `instant`.
pub fn end_of<T: CivilInstant>(instant: &T, period: PeriodKind) -> T {
    let start = start_of(instant, period);
    match period {
        PeriodKind::TenMinutes => start.add_seconds(TEN_MINUTES),
        PeriodKind::Hour => start.add_seconds(ONE_HOUR),
        PeriodKind::Day => calendar_end(&start, period, CalendarUnit::Day),
        PeriodKind::Week => calendar_end(&start, period, CalendarUnit::Week),
        PeriodKind::Month => calendar_end(&start, period, CalendarUnit::Month),
    }
}

fn ten_minute_start<T: CivilInstant>(instant: &T) -> T {
    let candidate = truncated_start(instant, PeriodKind::TenMinutes, CalendarUnit::TenMinutes)
        .unwrap_or_else(|| scanner::ten_minute_floor(instant));
    step_up_to(candidate, instant, TEN_MINUTES)
}

fn hour_start<T: CivilInstant>(instant: &T) -> T {
    let candidate = truncated_start(instant, PeriodKind::Hour, CalendarUnit::Hour)
        .unwrap_or_else(|| scanner::hour_floor(instant));
    step_up_to(candidate, instant, ONE_HOUR)
}

fn calendar_start<T: CivilInstant>(instant: &T, period: PeriodKind, unit: CalendarUnit) -> T {
    truncated_start(instant, period, unit).unwrap_or_else(|| scanner::safe_start(instant, unit))
}

/// The truncated boundary of `unit` at or before `instant`, if one exists.
///
/// Tries the later occurrence first, then the earlier one. `None` means the
/// boundary is missing from local time and the caller has to scan.
fn truncated_start<T: CivilInstant>(
    instant: &T,
    period: PeriodKind,
    unit: CalendarUnit,
) -> Option<T> {
    let not_after = |start: &T| start.epoch_nanos() <= instant.epoch_nanos();
    match instant.truncate(unit) {
        Ok(start) if not_after(&start) => Some(start),
        Ok(_) => match instant.truncate_earliest(unit) {
            Ok(start) if not_after(&start) => {
                trace!(%period, epoch = instant.epoch(), "using earlier occurrence of boundary");
                Some(start)
            }
            _ => {
                debug!(%period, epoch = instant.epoch(), "boundary resolved past instant, scanning");
                None
            }
        },
        Err(gap) => {
            debug!(%period, epoch = instant.epoch(), %gap, "boundary missing, scanning");
            None
        }
    }
}

fn calendar_end<T: CivilInstant>(start: &T, period: PeriodKind, unit: CalendarUnit) -> T {
    let advanced = start.shift(unit, 1).and_then(|next| {
        if next.is_midnight() {
            Ok(next)
        } else {
            next.truncate(unit)
        }
    });
    match advanced {
        Ok(end) if end.epoch_nanos() > start.epoch_nanos() => end,
        Ok(_) => {
            debug!(%period, epoch = start.epoch(), "next boundary not after start, scanning");
            scanner::safe_end(start, unit)
        }
        Err(gap) => {
            debug!(%period, epoch = start.epoch(), %gap, "next boundary missing, scanning");
            scanner::safe_end(start, unit)
        }
    }
}

/// Move `candidate` forward by whole `step`s until `instant < candidate + step`.
///
/// A truncated boundary that is not itself repeated can sit more than one
/// step before an instant in the second pass through a repeated hour
/// (Chatham 02:45–02:59 on 2019-04-07).
fn step_up_to<T: CivilInstant>(mut candidate: T, instant: &T, step: i64) -> T {
    let target = instant.epoch_nanos();
    let step_nanos = i128::from(step) * 1_000_000_000;
    let mut corrections = 0u32;

    while candidate.epoch_nanos() + step_nanos <= target {
        let later = candidate.add_seconds(step);
        if later.epoch_nanos() == candidate.epoch_nanos() {
            break;
        }
        candidate = later;
        corrections += 1;
    }

    if corrections > 0 {
        trace!(epoch = instant.epoch(), step, corrections, "stepped past repeated hour");
    }
    candidate
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Instant;
    use crate::error::PeriodError;
    use crate::periods::period_keys;

    const SEPT_1_2014: i64 = 1_409_529_600;

    fn utc(epoch: i64) -> Instant {
        Instant::from_epoch(epoch, "UTC").unwrap()
    }

    fn day_length(t: &Instant) -> i64 {
        end_of(t, PeriodKind::Day).epoch() - start_of(t, PeriodKind::Day).epoch()
    }

    // ── Ordinary instants ───────────────────────────────────────────────

    #[test]
    fn test_boundary_instant_is_start_of_every_period() {
        // 2014-09-01T00:00:00Z is a Monday, the first of the month.
        let t = utc(SEPT_1_2014);
        for key in period_keys() {
            let start = get_start(&t, key.as_str()).unwrap();
            assert_eq!(start.epoch(), SEPT_1_2014, "period {key}");
        }
    }

    #[test]
    fn test_day_late_in_the_day() {
        let t = utc(SEPT_1_2014 + 23 * 3600);
        assert_eq!(get_start(&t, "day").unwrap().epoch(), SEPT_1_2014);
        assert_eq!(get_end(&t, "day").unwrap().epoch(), SEPT_1_2014 + 86400);
    }

    #[test]
    fn test_ten_minute_bucket() {
        let t = Instant::from_civil(2014, 9, 17, 13, 47, 12, "UTC").unwrap();
        let start = get_start(&t, "10 minutes").unwrap();
        let end = get_end(&t, "10 minutes").unwrap();
        assert_eq!(start.to_rfc3339(), "2014-09-17T13:40:00+00:00");
        assert_eq!(end.to_rfc3339(), "2014-09-17T13:50:00+00:00");
    }

    #[test]
    fn test_ten_minute_bucket_with_fraction() {
        let t = Instant::parse("2014-09-17T13:40:00.5Z", "UTC").unwrap();
        let start = start_of(&t, PeriodKind::TenMinutes);
        assert_eq!(start.to_rfc3339(), "2014-09-17T13:40:00+00:00");
    }

    #[test]
    fn test_week_and_month_boundaries() {
        // Wednesday 2014-09-17.
        let t = Instant::from_civil(2014, 9, 17, 13, 47, 12, "Europe/Berlin").unwrap();
        let week_start = start_of(&t, PeriodKind::Week);
        let week_end = end_of(&t, PeriodKind::Week);
        assert_eq!(week_start.to_rfc3339(), "2014-09-15T00:00:00+02:00");
        assert_eq!(week_end.to_rfc3339(), "2014-09-22T00:00:00+02:00");

        let month_start = start_of(&t, PeriodKind::Month);
        let month_end = end_of(&t, PeriodKind::Month);
        assert_eq!(month_start.to_rfc3339(), "2014-09-01T00:00:00+02:00");
        assert_eq!(month_end.to_rfc3339(), "2014-10-01T00:00:00+02:00");
    }

    #[test]
    fn test_month_end_crosses_year() {
        let t = Instant::from_civil(2014, 12, 31, 23, 59, 59, "UTC").unwrap();
        let end = end_of(&t, PeriodKind::Month);
        assert_eq!(end.to_rfc3339(), "2015-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_hour_adjacency_without_dst() {
        for offset in [0, 59, 3599, 7 * 3600 + 1234] {
            let t = Instant::from_epoch(SEPT_1_2014 + offset, "Asia/Tokyo").unwrap();
            let start = get_start(&t, "hour").unwrap();
            let end = get_end(&t, "hour").unwrap();
            assert_eq!(start.epoch() + 3600, end.epoch());
        }
    }

    #[test]
    fn test_caller_instant_is_untouched() {
        let t = Instant::from_civil(2014, 9, 17, 13, 47, 12, "UTC").unwrap();
        let copy = t;
        let _ = end_of(&t, PeriodKind::Month);
        assert_eq!(t, copy);
        assert_eq!(t.minute(), 47);
    }

    // ── Unknown keys ────────────────────────────────────────────────────

    #[test]
    fn test_unknown_period_key() {
        let t = utc(SEPT_1_2014);
        let start_err = get_start(&t, "doesnotexist").unwrap_err();
        let end_err = get_end(&t, "doesnotexist").unwrap_err();
        assert!(matches!(start_err, PeriodError::UnknownPeriod(_)));
        assert!(matches!(end_err, PeriodError::UnknownPeriod(_)));
    }

    // ── DST gaps ────────────────────────────────────────────────────────

    #[test]
    fn test_spring_forward_short_day() {
        let t = Instant::from_civil(2003, 4, 6, 3, 59, 59, "America/Chicago").unwrap();
        assert_eq!(day_length(&t), 23 * 3600);
    }

    #[test]
    fn test_midnight_gap_day_starts_at_first_existing_instant() {
        // Santiago: 2019-09-08 00:00 → 01:00.
        let t = Instant::from_civil(2019, 9, 8, 15, 30, 0, "America/Santiago").unwrap();
        let start = start_of(&t, PeriodKind::Day);
        assert_eq!(start.to_rfc3339(), "2019-09-08T01:00:00-03:00");
        let end = end_of(&t, PeriodKind::Day);
        assert_eq!(end.to_rfc3339(), "2019-09-09T00:00:00-03:00");
        assert_eq!(end.epoch() - start.epoch(), 23 * 3600);
    }

    #[test]
    fn test_midnight_gap_previous_day_ends_where_next_begins() {
        let saturday = Instant::from_civil(2019, 9, 7, 20, 0, 0, "America/Santiago").unwrap();
        let sunday = Instant::from_civil(2019, 9, 8, 9, 0, 0, "America/Santiago").unwrap();
        let saturday_end = end_of(&saturday, PeriodKind::Day);
        assert_eq!(saturday_end, start_of(&sunday, PeriodKind::Day));
        assert_eq!(day_length(&saturday), 24 * 3600);
    }

    #[test]
    fn test_midnight_gap_on_monday_and_first_of_month() {
        // Damascus: 2002-04-01 (a Monday) 00:00 → 01:00.
        let t = Instant::from_civil(2002, 4, 3, 12, 0, 0, "Asia/Damascus").unwrap();
        for period in [PeriodKind::Week, PeriodKind::Month] {
            let start = start_of(&t, period);
            assert_eq!(start.day(), 1, "{period}");
            assert_eq!(start.hour(), 1, "{period}");
            assert_eq!(start.minute(), 0, "{period}");
        }

        let march = Instant::from_civil(2002, 3, 15, 12, 0, 0, "Asia/Damascus").unwrap();
        assert_eq!(
            end_of(&march, PeriodKind::Month),
            start_of(&t, PeriodKind::Month)
        );
        let previous_week = Instant::from_civil(2002, 3, 27, 12, 0, 0, "Asia/Damascus").unwrap();
        assert_eq!(
            end_of(&previous_week, PeriodKind::Week),
            start_of(&t, PeriodKind::Week)
        );
    }

    #[test]
    fn test_month_after_gap_start_ends_at_midnight() {
        let t = Instant::from_civil(2002, 4, 3, 12, 0, 0, "Asia/Damascus").unwrap();
        let end = end_of(&t, PeriodKind::Month);
        assert_eq!(end.month(), 5);
        assert_eq!(end.day(), 1);
        assert!(end.is_midnight());
    }

    #[test]
    fn test_half_hour_gap_hour_start() {
        // Lord Howe: 2019-10-06 02:00 → 02:30.
        let t = Instant::from_civil(2019, 10, 6, 2, 45, 0, "Australia/Lord_Howe").unwrap();
        let start = get_start(&t, "hour").unwrap();
        assert_eq!(start.hour(), 2);
        assert_eq!(start.minute(), 30);
        assert_eq!(get_start(&start, "hour").unwrap(), start);
        let end = get_end(&t, "hour").unwrap();
        assert_eq!(end.epoch() - start.epoch(), 3600);
    }

    #[test]
    fn test_gap_ending_off_ten_minute_grid_day_and_month() {
        // Kathmandu: 1986-01-01 00:00 +05:30 → 00:15 +05:45.
        let t = Instant::from_civil(1986, 1, 1, 12, 0, 0, "Asia/Kathmandu").unwrap();
        for period in [PeriodKind::Day, PeriodKind::Month] {
            let start = start_of(&t, period);
            let end = end_of(&t, period);
            assert_eq!(start.to_rfc3339(), "1986-01-01T00:15:00+05:45", "{period}");
            assert!(start.epoch() <= t.epoch(), "{period}");
            assert!(t.epoch() < end.epoch(), "{period}");
        }
        assert_eq!(day_length(&t), 24 * 3600 - 15 * 60);
        assert_eq!(
            end_of(&t, PeriodKind::Month).to_rfc3339(),
            "1986-02-01T00:00:00+05:45"
        );

        let new_years_eve = Instant::from_civil(1985, 12, 31, 18, 0, 0, "Asia/Kathmandu").unwrap();
        assert_eq!(
            end_of(&new_years_eve, PeriodKind::Day),
            start_of(&t, PeriodKind::Day)
        );
        assert_eq!(day_length(&new_years_eve), 24 * 3600);
    }

    #[test]
    fn test_gap_ending_at_quarter_to_day_start() {
        // Guyana: 1975-08-01 00:00 -03:45 → 00:45 -03:00.
        let t = Instant::from_civil(1975, 8, 1, 12, 0, 0, "America/Guyana").unwrap();
        let start = get_start(&t, "day").unwrap();
        assert_eq!(start.to_rfc3339(), "1975-08-01T00:45:00-03:00");
        assert_eq!(get_start(&start, "day").unwrap(), start);
        let end = get_end(&t, "day").unwrap();
        assert_eq!(end.to_rfc3339(), "1975-08-02T00:00:00-03:00");

        let july = Instant::from_civil(1975, 7, 31, 12, 0, 0, "America/Guyana").unwrap();
        assert_eq!(get_end(&july, "day").unwrap(), start);
        assert_eq!(get_end(&july, "month").unwrap(), start);
    }

    #[test]
    fn test_ten_minute_bucket_after_gap_ending_at_quarter_to() {
        // 03:49:44 UTC is 00:49:44 -03:00, just after Guyana's gap.
        let t = Instant::parse("1975-08-01T03:49:44Z", "America/Guyana").unwrap();
        let start = start_of(&t, PeriodKind::TenMinutes);
        assert_eq!(start.to_rfc3339(), "1975-08-01T00:45:00-03:00");
        assert_eq!(start_of(&start, PeriodKind::TenMinutes), start);
        let end = end_of(&t, PeriodKind::TenMinutes);
        assert_eq!(end.to_rfc3339(), "1975-08-01T00:55:00-03:00");
    }

    #[test]
    fn test_quarter_hour_gap_ten_minute_bucket() {
        // 00:17 +05:45: the 00:10 bucket lost its first five minutes to the gap.
        let t = Instant::from_civil(1986, 1, 1, 0, 17, 0, "Asia/Kathmandu").unwrap();
        let start = start_of(&t, PeriodKind::TenMinutes);
        assert_eq!(start.to_rfc3339(), "1986-01-01T00:15:00+05:45");
        assert_eq!(start_of(&start, PeriodKind::TenMinutes), start);
        assert_eq!(get_start(&t, "hour").unwrap(), start);
    }

    // ── DST overlaps ────────────────────────────────────────────────────

    #[test]
    fn test_chatham_fall_back_long_day_and_repeated_hour() {
        // Chatham falls back 03:45 → 02:45 on 2019-04-07.
        let t = Instant::from_civil(2019, 4, 7, 2, 44, 0, "Pacific/Chatham").unwrap();
        assert_eq!(day_length(&t), 25 * 3600);

        let first = t.get_end("hour").unwrap();
        let second = first.get_end("hour").unwrap();
        assert_eq!((first.hour(), first.minute(), first.second()), (3, 0, 0));
        assert_eq!((second.hour(), second.minute(), second.second()), (3, 0, 0));
        assert_eq!(second.epoch() - first.epoch(), 3600);
    }

    #[test]
    fn test_first_occurrence_of_ambiguous_time_ten_minutes() {
        // 06:35 UTC is 01:35 CDT, the first of two 01:35s in Chicago.
        let t = Instant::parse("2003-10-26T06:35:00Z", "America/Chicago").unwrap();
        let start = start_of(&t, PeriodKind::TenMinutes);
        let end = end_of(&t, PeriodKind::TenMinutes);
        assert_eq!(start.to_rfc3339(), "2003-10-26T01:30:00-05:00");
        assert_eq!(end.to_rfc3339(), "2003-10-26T01:40:00-05:00");
    }

    #[test]
    fn test_first_occurrence_of_ambiguous_time_hour() {
        let t = Instant::parse("2003-10-26T06:35:00Z", "America/Chicago").unwrap();
        let start = start_of(&t, PeriodKind::Hour);
        assert_eq!(start.to_rfc3339(), "2003-10-26T01:00:00-05:00");
        let end = end_of(&t, PeriodKind::Hour);
        assert_eq!(end.to_rfc3339(), "2003-10-26T01:00:00-06:00");
    }

    #[test]
    fn test_second_occurrence_of_ambiguous_time_hour() {
        // 07:35 UTC is 01:35 CST, the second 01:35.
        let t = Instant::parse("2003-10-26T07:35:00Z", "America/Chicago").unwrap();
        let start = start_of(&t, PeriodKind::Hour);
        assert_eq!(start.to_rfc3339(), "2003-10-26T01:00:00-06:00");
        assert!(start.epoch() <= t.epoch());
        assert!(t.epoch() < end_of(&t, PeriodKind::Hour).epoch());
    }

    #[test]
    fn test_half_hour_overlap_first_occurrence() {
        // Colombo falls back 1996-10-26 00:30 +06:30 → 00:00 +06:00.
        // 17:35:18 UTC is 00:05:18 +06:30, the first 00:05:18.
        let t = Instant::parse("1996-10-25T17:35:18Z", "Asia/Colombo").unwrap();
        for period in [PeriodKind::TenMinutes, PeriodKind::Hour, PeriodKind::Day] {
            let start = start_of(&t, period);
            assert_eq!(start.to_rfc3339(), "1996-10-26T00:00:00+06:30", "{period}");
            assert_eq!(start_of(&start, period), start, "{period}");
        }
        let hour_end = get_end(&t, "hour").unwrap();
        assert_eq!(hour_end.to_rfc3339(), "1996-10-26T00:30:00+06:00");
    }

    #[test]
    fn test_half_hour_overlap_second_occurrence() {
        // 18:20 UTC is 00:20 +06:00, after the clocks went back.
        let t = Instant::parse("1996-10-25T18:20:00Z", "Asia/Colombo").unwrap();
        let start = get_start(&t, "hour").unwrap();
        assert_eq!(start.to_rfc3339(), "1996-10-26T00:00:00+06:00");
        assert_eq!(get_start(&start, "hour").unwrap(), start);
        assert!(t.epoch() < get_end(&t, "hour").unwrap().epoch());
    }

    #[test]
    fn test_overlap_before_midnight_long_day() {
        // Sao Paulo falls back 2019-02-17 00:00 → 2019-02-16 23:00.
        let t = Instant::parse("2019-02-17T02:30:00Z", "America/Sao_Paulo").unwrap();
        // 02:30 UTC is 23:30 -03, the second 23:30 of the 16th.
        assert_eq!(t.day(), 16);
        let start = start_of(&t, PeriodKind::Day);
        let end = end_of(&t, PeriodKind::Day);
        assert_eq!(start.to_rfc3339(), "2019-02-16T00:00:00-02:00");
        assert_eq!(end.to_rfc3339(), "2019-02-17T00:00:00-03:00");
        assert_eq!(end.epoch() - start.epoch(), 25 * 3600);
    }

    #[test]
    fn test_starts_are_fixed_points_around_transitions() {
        let instants = [
            Instant::from_civil(2019, 9, 8, 15, 30, 0, "America/Santiago").unwrap(),
            Instant::from_civil(2019, 4, 7, 2, 44, 0, "Pacific/Chatham").unwrap(),
            Instant::parse("2003-10-26T06:35:00Z", "America/Chicago").unwrap(),
            Instant::from_civil(2002, 4, 3, 12, 0, 0, "Asia/Damascus").unwrap(),
            Instant::from_civil(2019, 10, 6, 2, 45, 0, "Australia/Lord_Howe").unwrap(),
            Instant::from_civil(1986, 1, 1, 0, 17, 0, "Asia/Kathmandu").unwrap(),
            Instant::parse("1975-08-01T03:49:44Z", "America/Guyana").unwrap(),
            Instant::parse("1996-10-25T17:35:18Z", "Asia/Colombo").unwrap(),
            Instant::parse("1996-10-25T18:20:00Z", "Asia/Colombo").unwrap(),
        ];
        for t in instants {
            for period in period_keys() {
                let start = start_of(&t, *period);
                assert_eq!(start_of(&start, *period), start, "{t} {period}");
                assert!(start.epoch_nanos() <= t.epoch_nanos(), "{t} {period}");
                assert!(t.epoch_nanos() < end_of(&t, *period).epoch_nanos(), "{t} {period}");
            }
        }
    }
}
