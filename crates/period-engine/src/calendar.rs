//! Civil-time calendar layer.
//!
//! The resolver never touches `chrono` directly. It works against the
//! [`CivilInstant`] capability trait: copy, absolute and calendar arithmetic,
//! fallible truncation, epoch projection and civil field accessors. [`Instant`]
//! implements it on top of `chrono::DateTime<chrono_tz::Tz>`.
//!
//! # Local-time resolution
//!
//! Whenever a civil (wall-clock) value has to be turned back into an instant,
//! the rules are:
//!
//! - a civil time inside a DST gap does not exist, and the operation fails
//!   with [`NonexistentLocalTime`];
//! - a civil time inside a DST overlap occurs twice, and the **later** of the
//!   two instants is chosen. [`CivilInstant::truncate_earliest`] is the one
//!   exception and picks the earlier one.

use std::fmt;

use chrono::{
    DateTime, Datelike, Days, LocalResult, Months, NaiveDate, NaiveDateTime, TimeDelta, TimeZone,
    Timelike, Weekday,
};
use chrono_tz::Tz;
use thiserror::Error;

use crate::error::{PeriodError, Result};
use crate::periods::PeriodKind;
use crate::resolver;

/// Calendar units the layer can truncate to or shift by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalendarUnit {
    Minute,
    /// Ten-minute bucket of the hour (`:00`, `:10`, ... `:50`).
    TenMinutes,
    Hour,
    Day,
    /// ISO week, starting Monday.
    Week,
    Month,
}

/// A civil time that falls inside a DST gap and therefore has no instant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("local time {local} does not exist in {timezone}")]
pub struct NonexistentLocalTime {
    pub local: NaiveDateTime,
    pub timezone: String,
}

/// Capabilities the period resolver needs from a calendar type.
///
/// Values are `Copy`: every operation returns a new value and never aliases
/// the receiver.
pub trait CivilInstant: Copy {
    /// Whole seconds since the Unix epoch (floored).
    fn epoch(&self) -> i64;

    /// Nanoseconds since the Unix epoch.
    fn epoch_nanos(&self) -> i128;

    /// The instant at `seconds` since the Unix epoch, in the same timezone.
    fn at_epoch(&self, seconds: i64) -> Self;

    /// Absolute-duration arithmetic. Always defined; returns `self` unchanged
    /// if the result would leave the representable range.
    fn add_seconds(&self, seconds: i64) -> Self;

    /// Calendar arithmetic.
    ///
    /// `Minute`, `TenMinutes` and `Hour` shift by an absolute duration and always succeed.
    /// `Day`, `Week` and `Month` keep the wall-clock time of day and fail if
    /// the resulting civil time does not exist. Month arithmetic clamps the
    /// day of month to the length of the target month.
    fn shift(
        &self,
        unit: CalendarUnit,
        amount: i32,
    ) -> std::result::Result<Self, NonexistentLocalTime>;

    /// Zero every civil field finer than `unit`. Fails if the truncated civil
    /// time does not exist.
    fn truncate(&self, unit: CalendarUnit) -> std::result::Result<Self, NonexistentLocalTime>;

    /// Like [`truncate`](CivilInstant::truncate), but a truncated civil time
    /// that occurs twice resolves to its **earlier** occurrence.
    fn truncate_earliest(
        &self,
        unit: CalendarUnit,
    ) -> std::result::Result<Self, NonexistentLocalTime>;

    fn year(&self) -> i32;
    fn month(&self) -> u32;
    fn day(&self) -> u32;
    fn hour(&self) -> u32;
    fn minute(&self) -> u32;
    fn second(&self) -> u32;
    fn nanosecond(&self) -> u32;
    fn weekday(&self) -> Weekday;
    /// ISO 8601 week number.
    fn iso_week(&self) -> u32;

    /// True when the civil time of day is exactly 00:00:00.
    fn is_midnight(&self) -> bool {
        self.hour() == 0 && self.minute() == 0 && self.second() == 0 && self.nanosecond() == 0
    }
}

/// A point in time with an IANA timezone attached.
///
/// Equality and ordering compare the absolute instant, not the timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant(DateTime<Tz>);

/// Civil formats accepted by [`Instant::parse`] besides RFC 3339.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

impl Instant {
    /// Build an instant from seconds since the Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError::InvalidTimezone`] for an unknown IANA name, or
    /// [`PeriodError::InvalidDatetime`] if the epoch is out of range.
    pub fn from_epoch(seconds: i64, timezone: &str) -> Result<Self> {
        let tz = parse_timezone(timezone)?;
        from_epoch_in(seconds, tz)
    }

    /// Build an instant from civil fields in the given timezone.
    ///
    /// A civil time that occurs twice resolves to the later occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError::InvalidDatetime`] if the fields do not form a
    /// valid date and time, or if that civil time falls in a DST gap.
    pub fn from_civil(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        timezone: &str,
    ) -> Result<Self> {
        let tz = parse_timezone(timezone)?;
        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .ok_or_else(|| {
                PeriodError::InvalidDatetime(format!(
                    "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02} is not a valid civil time"
                ))
            })?;
        from_naive_in(naive, tz)
    }

    /// Parse an instant from text.
    ///
    /// Accepts RFC 3339 (`2014-09-01T00:00:00Z`, converted into `timezone`),
    /// a civil time without offset (`2003-04-06T03:59:59`, `2019-04-07 02:44`,
    /// `2014-09-01`, interpreted in `timezone`), or integer epoch seconds.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError::InvalidTimezone`] for an unknown IANA name and
    /// [`PeriodError::InvalidDatetime`] if the text matches none of the forms
    /// or names a civil time that does not exist.
    pub fn parse(text: &str, timezone: &str) -> Result<Self> {
        let tz = parse_timezone(timezone)?;
        let text = text.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(Instant(dt.with_timezone(&tz)));
        }
        if let Some(naive) = NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        {
            return from_naive_in(naive, tz);
        }
        if let Some(naive) = NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        {
            return from_naive_in(naive, tz);
        }
        if let Ok(seconds) = text.parse::<i64>() {
            return from_epoch_in(seconds, tz);
        }

        Err(PeriodError::InvalidDatetime(format!(
            "cannot parse '{text}' as RFC 3339, civil time, or epoch seconds"
        )))
    }

    /// The same instant expressed in another timezone.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError::InvalidTimezone`] for an unknown IANA name.
    pub fn in_timezone(&self, timezone: &str) -> Result<Self> {
        let tz = parse_timezone(timezone)?;
        Ok(Instant(self.0.with_timezone(&tz)))
    }

    /// The IANA name of this instant's timezone.
    pub fn timezone_name(&self) -> &'static str {
        self.0.timezone().name()
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    pub fn as_datetime(&self) -> &DateTime<Tz> {
        &self.0
    }

    /// Start of the period named `key` that contains this instant.
    ///
    /// See [`resolver::get_start`].
    pub fn get_start(&self, key: &str) -> Result<Self> {
        resolver::get_start(self, key)
    }

    /// First instant after the period named `key` that contains this instant.
    ///
    /// See [`resolver::get_end`].
    pub fn get_end(&self, key: &str) -> Result<Self> {
        resolver::get_end(self, key)
    }

    /// Typed form of [`Instant::get_start`].
    pub fn start_of(&self, period: PeriodKind) -> Self {
        resolver::start_of(self, period)
    }

    /// Typed form of [`Instant::get_end`].
    pub fn end_of(&self, period: PeriodKind) -> Self {
        resolver::end_of(self, period)
    }

    fn truncate_to(
        &self,
        unit: CalendarUnit,
        occurrence: Occurrence,
    ) -> std::result::Result<Self, NonexistentLocalTime> {
        let local = self.0.naive_local();
        let date = local.date();
        let target = match unit {
            CalendarUnit::Minute => date.and_hms_opt(local.hour(), local.minute(), 0),
            CalendarUnit::TenMinutes => {
                date.and_hms_opt(local.hour(), local.minute() - local.minute() % 10, 0)
            }
            CalendarUnit::Hour => date.and_hms_opt(local.hour(), 0, 0),
            CalendarUnit::Day => date.and_hms_opt(0, 0, 0),
            CalendarUnit::Week => date
                .checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
                .and_then(|monday| monday.and_hms_opt(0, 0, 0)),
            CalendarUnit::Month => date
                .with_day(1)
                .and_then(|first| first.and_hms_opt(0, 0, 0)),
        };
        let tz = self.0.timezone();
        let target = target.ok_or_else(|| nonexistent(local, tz))?;
        resolve_local(tz, target, occurrence).map(Instant)
    }
}

impl From<DateTime<Tz>> for Instant {
    fn from(dt: DateTime<Tz>) -> Self {
        Instant(dt)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}

impl CivilInstant for Instant {
    fn epoch(&self) -> i64 {
        self.0.timestamp()
    }

    fn epoch_nanos(&self) -> i128 {
        i128::from(self.0.timestamp()) * 1_000_000_000
            + i128::from(self.0.timestamp_subsec_nanos())
    }

    fn at_epoch(&self, seconds: i64) -> Self {
        DateTime::from_timestamp(seconds, 0)
            .map_or(*self, |utc| Instant(utc.with_timezone(&self.0.timezone())))
    }

    fn add_seconds(&self, seconds: i64) -> Self {
        TimeDelta::try_seconds(seconds)
            .and_then(|delta| self.0.checked_add_signed(delta))
            .map_or(*self, Instant)
    }

    fn shift(
        &self,
        unit: CalendarUnit,
        amount: i32,
    ) -> std::result::Result<Self, NonexistentLocalTime> {
        let local = self.0.naive_local();
        let target = match unit {
            CalendarUnit::Minute => return Ok(self.add_seconds(i64::from(amount) * 60)),
            CalendarUnit::TenMinutes => return Ok(self.add_seconds(i64::from(amount) * 600)),
            CalendarUnit::Hour => return Ok(self.add_seconds(i64::from(amount) * 3600)),
            CalendarUnit::Day => shift_days(local, i64::from(amount)),
            CalendarUnit::Week => shift_days(local, i64::from(amount) * 7),
            CalendarUnit::Month => {
                let months = Months::new(amount.unsigned_abs());
                if amount >= 0 {
                    local.checked_add_months(months)
                } else {
                    local.checked_sub_months(months)
                }
            }
        };
        let tz = self.0.timezone();
        let target = target.ok_or_else(|| nonexistent(local, tz))?;
        resolve_local(tz, target, Occurrence::Later).map(Instant)
    }

    fn truncate(&self, unit: CalendarUnit) -> std::result::Result<Self, NonexistentLocalTime> {
        self.truncate_to(unit, Occurrence::Later)
    }

    fn truncate_earliest(
        &self,
        unit: CalendarUnit,
    ) -> std::result::Result<Self, NonexistentLocalTime> {
        self.truncate_to(unit, Occurrence::Earlier)
    }

    fn year(&self) -> i32 {
        self.0.year()
    }

    fn month(&self) -> u32 {
        self.0.month()
    }

    fn day(&self) -> u32 {
        self.0.day()
    }

    fn hour(&self) -> u32 {
        self.0.hour()
    }

    fn minute(&self) -> u32 {
        self.0.minute()
    }

    fn second(&self) -> u32 {
        self.0.second()
    }

    fn nanosecond(&self) -> u32 {
        self.0.nanosecond()
    }

    fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    fn iso_week(&self) -> u32 {
        self.0.iso_week().week()
    }
}

// ── Internal helpers ────────────────────────────────────────────────────────

/// Parse an IANA timezone string into `Tz`.
pub(crate) fn parse_timezone(s: &str) -> Result<Tz> {
    s.parse::<Tz>()
        .map_err(|_| PeriodError::InvalidTimezone(format!("'{}'", s)))
}

/// Which candidate an ambiguous civil time resolves to.
#[derive(Debug, Clone, Copy)]
enum Occurrence {
    Earlier,
    Later,
}

/// Map a civil time to an instant: the chosen candidate in an overlap, error
/// in a gap.
fn resolve_local(
    tz: Tz,
    local: NaiveDateTime,
    occurrence: Occurrence,
) -> std::result::Result<DateTime<Tz>, NonexistentLocalTime> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(a, b) => Ok(match occurrence {
            Occurrence::Earlier => a.min(b),
            Occurrence::Later => a.max(b),
        }),
        LocalResult::None => Err(nonexistent(local, tz)),
    }
}

fn nonexistent(local: NaiveDateTime, tz: Tz) -> NonexistentLocalTime {
    NonexistentLocalTime {
        local,
        timezone: tz.name().to_string(),
    }
}

fn shift_days(local: NaiveDateTime, days: i64) -> Option<NaiveDateTime> {
    let n = Days::new(days.unsigned_abs());
    if days >= 0 {
        local.checked_add_days(n)
    } else {
        local.checked_sub_days(n)
    }
}

fn from_epoch_in(seconds: i64, tz: Tz) -> Result<Instant> {
    DateTime::from_timestamp(seconds, 0)
        .map(|utc| Instant(utc.with_timezone(&tz)))
        .ok_or_else(|| PeriodError::InvalidDatetime(format!("epoch {seconds} is out of range")))
}

fn from_naive_in(naive: NaiveDateTime, tz: Tz) -> Result<Instant> {
    resolve_local(tz, naive, Occurrence::Later)
        .map(Instant)
        .map_err(|e| PeriodError::InvalidDatetime(e.to_string()))
}

// ── Tests ───────────────────────────────────────────────────────────────────
