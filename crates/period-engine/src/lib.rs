//! # period-engine
//!
//! DST-correct calendar period boundaries.
//!
//! Given an instant in an IANA timezone, computes the first instant of the
//! 10-minute bucket, hour, day, week (ISO, Monday start) or month containing
//! it, and the first instant after that period. Truncating wall-clock fields
//! is not well-defined when the boundary falls inside a DST gap or overlap;
//! this crate detects those cases and resolves them explicitly.
//!
//! ## Modules
//!
//! - [`periods`] — The period registry: keys, labels, fixed order
//! - [`calendar`] — Calendar-layer capability trait and the `chrono-tz` backed [`Instant`]
//! - [`resolver`] — `get_start` / `get_end` with fast-path truncation
//! - [`scanner`] — Linear-scan fallback for boundaries inside DST gaps
//! - [`bounds`] — Serializable start/end pairs
//! - [`error`] — Error types

pub mod bounds;
pub mod calendar;
pub mod error;
pub mod periods;
pub mod resolver;
pub mod scanner;

pub use bounds::{all_period_bounds, period_bounds, PeriodBounds};
pub use calendar::{CalendarUnit, CivilInstant, Instant, NonexistentLocalTime};
pub use error::{PeriodError, Result};
pub use periods::{period_keys, period_label, PeriodKind};
pub use resolver::{end_of, get_end, get_start, start_of};
