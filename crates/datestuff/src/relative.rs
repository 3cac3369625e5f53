//! Deferred "now + offset" moments.
//!
//! A [`RelativeMoment`] pairs an offset [`Span`] with a [`Clock`]. Its value,
//! [`RelativeMoment::current`], is `clock() + offset`, recomputed on every
//! read: nothing is cached, so a moment built on the system clock drifts
//! forward with real time.
//!
//! # Comparison
//!
//! Two relative moments compare by **offset**, not by evaluated instant: they
//! always differ by the same margin no matter when they are observed.
//! Comparing against a plain time point evaluates the moment first.
//!
//! # Arithmetic
//!
//! | Expression | Result |
//! |---|---|
//! | `moment + moment` | offsets summed, left clock |
//! | `moment ± span` (or `TimeDelta`, `Months`) | offset shifted, same clock |
//! | `span + moment` | same as `moment + span` |
//! | `span - moment` | same as `moment - span` |
//! | `moment - point` and `point - moment` | `current - point` |

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};
use std::sync::Arc;

use chrono::format::{DelayedFormat, StrftimeItems};
use chrono::{
    DateTime, Datelike, IsoWeek, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta,
    TimeZone, Timelike, Utc, Weekday,
};
use tracing::trace;

use crate::error::{DatestuffError, Result};
use crate::point::{Fields, SystemNow, TimePoint};
use crate::span::Span;

/// Where a [`RelativeMoment`] gets "now" from.
pub enum Clock<T> {
    /// Always returns the same point, as if time had stopped.
    Fixed(T),
    /// Calls the function on every read.
    Live(Arc<dyn Fn() -> T + Send + Sync>),
}

impl<T: Copy> Clock<T> {
    /// A clock stopped at `point`.
    pub fn fixed(point: T) -> Self {
        Clock::Fixed(point)
    }

    /// A clock that calls `now` on every read.
    pub fn from_fn(now: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Clock::Live(Arc::new(now))
    }

    /// The clock's current reading.
    pub fn read(&self) -> T {
        match self {
            Clock::Fixed(point) => *point,
            Clock::Live(now) => now(),
        }
    }

    /// Whether the clock is stopped.
    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

impl<T: SystemNow + 'static> Clock<T> {
    /// The point type's natural "current moment" source.
    pub fn system() -> Self {
        Clock::Live(Arc::new(T::system_now))
    }
}

impl<T: Copy> Clone for Clock<T> {
    fn clone(&self) -> Self {
        match self {
            Clock::Fixed(point) => Clock::Fixed(*point),
            Clock::Live(now) => Clock::Live(Arc::clone(now)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Clock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clock::Fixed(point) => f.debug_tuple("Fixed").field(point).finish(),
            Clock::Live(_) => f.write_str("Live(..)"),
        }
    }
}

/// A lazily evaluated `clock() + offset`.
pub struct RelativeMoment<T> {
    offset: Span,
    clock: Clock<T>,
}

/// A relative calendar date.
pub type RelativeDate = RelativeMoment<NaiveDate>;

/// A relative local date and time.
pub type RelativeDateTime = RelativeMoment<NaiveDateTime>;

/// A relative timezone-aware date and time.
pub type RelativeZonedDateTime<Tz> = RelativeMoment<DateTime<Tz>>;

impl<T: TimePoint> RelativeMoment<T> {
    /// A moment on an explicit clock.
    pub fn with_clock(offset: impl Into<Span>, clock: Clock<T>) -> Self {
        Self {
            offset: offset.into(),
            clock,
        }
    }

    /// Pin the clock to `when`.
    pub fn fixed(when: T, offset: impl Into<Span>) -> Self {
        Self::with_clock(offset, Clock::Fixed(when))
    }

    /// The span added to every clock reading.
    pub fn offset(&self) -> Span {
        self.offset
    }

    /// The clock the moment reads.
    pub fn clock(&self) -> &Clock<T> {
        &self.clock
    }

    /// Read the clock and apply the offset.
    ///
    /// # Errors
    ///
    /// Returns [`DatestuffError::UnsupportedOperand`] if the offset carries
    /// the clock reading outside the representable range.
    pub fn try_current(&self) -> Result<T> {
        let now = self.clock.read();
        now.checked_add_span(&self.offset).ok_or_else(|| {
            DatestuffError::UnsupportedOperand(format!(
                "cannot apply offset {} to {now}",
                self.offset
            ))
        })
    }

    /// Read the clock and apply the offset.
    ///
    /// # Panics
    ///
    /// Panics if the result is not representable, like chrono's own `+`.
    /// Use [`try_current`](Self::try_current) to handle that case.
    pub fn current(&self) -> T {
        match self.try_current() {
            Ok(point) => point,
            Err(err) => panic!("{err}"),
        }
    }

    /// Whether the moment currently evaluates to a representable point.
    pub fn is_representable(&self) -> bool {
        self.try_current().is_ok()
    }

    /// Format the current value with a strftime-style pattern.
    pub fn format<'a>(&self, pattern: &'a str) -> DelayedFormat<StrftimeItems<'a>> {
        self.current().strftime(pattern)
    }

    /// Read the clock once, replace fields of that reading, and pin it.
    ///
    /// The offset carries over unless `fields.offset` overrides it, so the
    /// result still compares equal to `self`. Its value is the replaced
    /// reading plus that offset.
    pub fn replace(&self, fields: &Fields) -> Result<Self> {
        let when = self.clock.read().replace_fields(fields)?;
        let offset = fields.offset.unwrap_or(self.offset);
        trace!(%when, %offset, "pinned replaced clock reading");
        Ok(Self::fixed(when, offset))
    }

    /// Shift the offset.
    ///
    /// # Errors
    ///
    /// Returns [`DatestuffError::UnsupportedOperand`] if the offsets overflow.
    pub fn checked_add(&self, span: impl Into<Span>) -> Result<Self> {
        let span = span.into();
        let offset = self.offset.checked_add(&span).ok_or_else(|| {
            DatestuffError::UnsupportedOperand(format!("{} + {span} overflows", self.offset))
        })?;
        Ok(self.with_offset(offset))
    }

    /// Shift the offset back.
    ///
    /// # Errors
    ///
    /// Returns [`DatestuffError::UnsupportedOperand`] if the offsets overflow.
    pub fn checked_sub(&self, span: impl Into<Span>) -> Result<Self> {
        let span = span.into();
        let offset = self.offset.checked_sub(&span).ok_or_else(|| {
            DatestuffError::UnsupportedOperand(format!("{} - {span} overflows", self.offset))
        })?;
        Ok(self.with_offset(offset))
    }

    fn with_offset(&self, offset: Span) -> Self {
        Self {
            offset,
            clock: self.clock.clone(),
        }
    }

    fn rewrap(&self, replace: impl FnOnce(T) -> Option<T>) -> Option<Self> {
        let when = replace(self.clock.read())?;
        Some(Self::fixed(when, self.offset))
    }
}

impl<T: SystemNow + 'static> RelativeMoment<T> {
    /// A moment on the system clock.
    pub fn new(offset: impl Into<Span>) -> Self {
        Self::with_clock(offset, Clock::system())
    }
}

impl<T: SystemNow + 'static> Default for RelativeMoment<T> {
    fn default() -> Self {
        Self::new(Span::ZERO)
    }
}

impl<T: Copy> Clone for RelativeMoment<T> {
    fn clone(&self) -> Self {
        Self {
            offset: self.offset,
            clock: self.clock.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for RelativeMoment<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelativeMoment")
            .field("offset", &format_args!("{}", self.offset))
            .field("clock", &self.clock)
            .finish()
    }
}

impl<T: TimePoint> fmt::Display for RelativeMoment<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.current(), f)
    }
}

// ── Date variant ────────────────────────────────────────────────────────────

impl RelativeMoment<NaiveDate> {
    /// Today on the local system clock, plus `offset`.
    pub fn today(offset: impl Into<Span>) -> Self {
        Self::new(offset)
    }

    /// Pin to `when`.
    pub fn from_date(when: NaiveDate, offset: impl Into<Span>) -> Self {
        Self::fixed(when, offset)
    }

    /// Pin to the proleptic Gregorian ordinal, where January 1 of year 1 is day 1.
    ///
    /// # Errors
    ///
    /// Returns [`DatestuffError::InvalidDatetime`] if the ordinal has no date.
    pub fn from_ordinal(ordinal: i32, offset: impl Into<Span>) -> Result<Self> {
        let when = NaiveDate::from_num_days_from_ce_opt(ordinal).ok_or_else(|| {
            DatestuffError::InvalidDatetime(format!("ordinal {ordinal} is out of range"))
        })?;
        Ok(Self::fixed(when, offset))
    }

    /// Pin to the local date of a Unix timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`DatestuffError::InvalidDatetime`] if the timestamp is out of range.
    pub fn from_timestamp(timestamp: i64, offset: impl Into<Span>) -> Result<Self> {
        let when = timestamp_to_utc(timestamp)?.with_timezone(&Local).date_naive();
        Ok(Self::fixed(when, offset))
    }

    /// The current value.
    pub fn as_date(&self) -> NaiveDate {
        self.current()
    }
}

// ── Date-and-time variants ──────────────────────────────────────────────────

impl RelativeMoment<NaiveDateTime> {
    /// Now on the local system clock, plus `offset`.
    pub fn now(offset: impl Into<Span>) -> Self {
        Self::new(offset)
    }

    /// Same as [`now`](Self::now).
    pub fn today(offset: impl Into<Span>) -> Self {
        Self::now(offset)
    }

    /// Now in UTC, as a naive date and time.
    pub fn utc_now(offset: impl Into<Span>) -> Self {
        Self::with_clock(offset, Clock::from_fn(|| Utc::now().naive_utc()))
    }

    /// Now in `tz`.
    pub fn now_in<Tz>(tz: Tz, offset: impl Into<Span>) -> RelativeMoment<DateTime<Tz>>
    where
        Tz: TimeZone + Send + Sync + 'static,
        Tz::Offset: Copy + fmt::Display,
    {
        RelativeMoment::with_clock(offset, Clock::from_fn(move || Utc::now().with_timezone(&tz)))
    }

    /// Pin to `date` at `time`.
    pub fn combine(date: NaiveDate, time: NaiveTime, offset: impl Into<Span>) -> Self {
        Self::fixed(date.and_time(time), offset)
    }

    /// Pin to midnight at the start of `date`.
    pub fn from_date(date: NaiveDate, offset: impl Into<Span>) -> Self {
        Self::combine(date, NaiveTime::MIN, offset)
    }

    /// Pin to `when`.
    pub fn from_datetime(when: NaiveDateTime, offset: impl Into<Span>) -> Self {
        Self::fixed(when, offset)
    }

    /// Pin to the local date and time of a Unix timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`DatestuffError::InvalidDatetime`] if the timestamp is out of range.
    pub fn from_timestamp(timestamp: i64, offset: impl Into<Span>) -> Result<Self> {
        let when = timestamp_to_utc(timestamp)?.with_timezone(&Local).naive_local();
        Ok(Self::fixed(when, offset))
    }

    /// Pin to the UTC date and time of a Unix timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`DatestuffError::InvalidDatetime`] if the timestamp is out of range.
    pub fn utc_from_timestamp(timestamp: i64, offset: impl Into<Span>) -> Result<Self> {
        Ok(Self::fixed(timestamp_to_utc(timestamp)?.naive_utc(), offset))
    }

    /// Pin to a datetime parsed with a strftime-style pattern.
    ///
    /// # Errors
    ///
    /// Returns [`DatestuffError::InvalidDatetime`] if `text` does not match `pattern`.
    pub fn parse_from_str(text: &str, pattern: &str, offset: impl Into<Span>) -> Result<Self> {
        let when = NaiveDateTime::parse_from_str(text, pattern)
            .map_err(|e| DatestuffError::InvalidDatetime(format!("'{text}': {e}")))?;
        Ok(Self::fixed(when, offset))
    }

    /// The current value.
    pub fn as_datetime(&self) -> NaiveDateTime {
        self.current()
    }

    /// The current date, with the time of day truncated.
    pub fn as_date(&self) -> NaiveDate {
        self.current().date()
    }

    /// A relative date that truncates this moment on every read.
    ///
    /// An offset of whole days and months carries over, with the clock
    /// reading truncated to its date. An offset with a time-of-day part
    /// cannot be expressed on dates, so it is folded into the clock instead
    /// and the relative date has a zero offset.
    pub fn to_relative_date(&self) -> RelativeDate {
        if self.offset.truncated_to(TimeDelta::days(1)) == self.offset {
            let clock = match &self.clock {
                Clock::Fixed(when) => Clock::Fixed(when.date()),
                Clock::Live(now) => {
                    let now = Arc::clone(now);
                    Clock::from_fn(move || now().date())
                }
            };
            return RelativeMoment::with_clock(self.offset, clock);
        }
        let source = self.clone();
        RelativeMoment::with_clock(Span::ZERO, Clock::from_fn(move || source.current().date()))
    }
}

impl<Tz> RelativeMoment<DateTime<Tz>>
where
    Tz: TimeZone,
    Tz::Offset: Copy + fmt::Display,
{
    /// Pin to the clock's current reading expressed in `tz`, keeping the offset.
    pub fn astimezone<Tz2>(&self, tz: &Tz2) -> RelativeMoment<DateTime<Tz2>>
    where
        Tz2: TimeZone,
        Tz2::Offset: Copy + fmt::Display,
    {
        RelativeMoment::fixed(self.clock.read().with_timezone(tz), self.offset)
    }

    /// The current value.
    pub fn as_datetime(&self) -> DateTime<Tz> {
        self.current()
    }

    /// The current local date, with the time of day truncated.
    pub fn as_date(&self) -> NaiveDate {
        self.current().date_naive()
    }
}

// ── Comparison ──────────────────────────────────────────────────────────────

impl<T> PartialEq for RelativeMoment<T> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}

impl<T> PartialOrd for RelativeMoment<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.offset.partial_cmp(&other.offset)
    }
}

impl<T: TimePoint> PartialEq<T> for RelativeMoment<T> {
    fn eq(&self, other: &T) -> bool {
        self.try_current().is_ok_and(|current| current == *other)
    }
}

impl<T: TimePoint> PartialOrd<T> for RelativeMoment<T> {
    fn partial_cmp(&self, other: &T) -> Option<Ordering> {
        Some(self.try_current().ok()?.cmp(other))
    }
}

// ── Arithmetic ──────────────────────────────────────────────────────────────

impl<T: TimePoint> Add for RelativeMoment<T> {
    type Output = RelativeMoment<T>;

    fn add(self, rhs: RelativeMoment<T>) -> Self::Output {
        self + rhs.offset
    }
}

impl<T: TimePoint> Sub for RelativeMoment<T> {
    type Output = RelativeMoment<T>;

    fn sub(self, rhs: RelativeMoment<T>) -> Self::Output {
        self - rhs.offset
    }
}

impl<T: TimePoint> Sub<T> for RelativeMoment<T> {
    type Output = TimeDelta;

    fn sub(self, rhs: T) -> TimeDelta {
        self.current().elapsed_since(rhs)
    }
}

/// Implements `moment ± offset` and the reflected `offset ± moment` for each
/// duration-like operand type.
macro_rules! impl_offset_operands {
    ($($offset:ty),*) => {$(
        impl<T: TimePoint> Add<$offset> for RelativeMoment<T> {
            type Output = RelativeMoment<T>;

            fn add(self, rhs: $offset) -> Self::Output {
                self.checked_add(rhs).unwrap_or_else(|err| panic!("{err}"))
            }
        }

        impl<T: TimePoint> Sub<$offset> for RelativeMoment<T> {
            type Output = RelativeMoment<T>;

            fn sub(self, rhs: $offset) -> Self::Output {
                self.checked_sub(rhs).unwrap_or_else(|err| panic!("{err}"))
            }
        }

        impl<T: TimePoint> Add<RelativeMoment<T>> for $offset {
            type Output = RelativeMoment<T>;

            fn add(self, rhs: RelativeMoment<T>) -> Self::Output {
                rhs + self
            }
        }

        impl<T: TimePoint> Sub<RelativeMoment<T>> for $offset {
            type Output = RelativeMoment<T>;

            fn sub(self, rhs: RelativeMoment<T>) -> Self::Output {
                rhs - self
            }
        }
    )*};
}

impl_offset_operands!(Span, TimeDelta, Months);

/// Implements the reflected point operations for a concrete point type.
macro_rules! impl_point_operands {
    ($($point:ty),*) => {$(
        impl Sub<RelativeMoment<$point>> for $point {
            type Output = TimeDelta;

            fn sub(self, rhs: RelativeMoment<$point>) -> TimeDelta {
                rhs - self
            }
        }

        impl PartialEq<RelativeMoment<$point>> for $point {
            fn eq(&self, other: &RelativeMoment<$point>) -> bool {
                other == self
            }
        }

        impl PartialOrd<RelativeMoment<$point>> for $point {
            fn partial_cmp(&self, other: &RelativeMoment<$point>) -> Option<Ordering> {
                other.partial_cmp(self).map(Ordering::reverse)
            }
        }
    )*};
}

impl_point_operands!(NaiveDate, NaiveDateTime);

impl<Tz> Sub<RelativeMoment<DateTime<Tz>>> for DateTime<Tz>
where
    Tz: TimeZone,
    Tz::Offset: Copy + fmt::Display,
{
    type Output = TimeDelta;

    fn sub(self, rhs: RelativeMoment<DateTime<Tz>>) -> TimeDelta {
        rhs - self
    }
}

impl<Tz> PartialEq<RelativeMoment<DateTime<Tz>>> for DateTime<Tz>
where
    Tz: TimeZone,
    Tz::Offset: Copy + fmt::Display,
{
    fn eq(&self, other: &RelativeMoment<DateTime<Tz>>) -> bool {
        other == self
    }
}

impl<Tz> PartialOrd<RelativeMoment<DateTime<Tz>>> for DateTime<Tz>
where
    Tz: TimeZone,
    Tz::Offset: Copy + fmt::Display,
{
    fn partial_cmp(&self, other: &RelativeMoment<DateTime<Tz>>) -> Option<Ordering> {
        other.partial_cmp(self).map(Ordering::reverse)
    }
}

// ── Field delegation ────────────────────────────────────────────────────────

/// Calendar accessors read the current value. `with_*` methods replace the
/// field on one clock reading and pin it, keeping the offset, like
/// [`RelativeMoment::replace`].
impl<T: TimePoint> Datelike for RelativeMoment<T> {
    fn year(&self) -> i32 {
        self.current().year()
    }

    fn month(&self) -> u32 {
        self.current().month()
    }

    fn month0(&self) -> u32 {
        self.current().month0()
    }

    fn day(&self) -> u32 {
        self.current().day()
    }

    fn day0(&self) -> u32 {
        self.current().day0()
    }

    fn ordinal(&self) -> u32 {
        self.current().ordinal()
    }

    fn ordinal0(&self) -> u32 {
        self.current().ordinal0()
    }

    fn weekday(&self) -> Weekday {
        self.current().weekday()
    }

    fn iso_week(&self) -> IsoWeek {
        self.current().iso_week()
    }

    fn with_year(&self, year: i32) -> Option<Self> {
        self.rewrap(|point| point.with_year(year))
    }

    fn with_month(&self, month: u32) -> Option<Self> {
        self.rewrap(|point| point.with_month(month))
    }

    fn with_month0(&self, month0: u32) -> Option<Self> {
        self.rewrap(|point| point.with_month0(month0))
    }

    fn with_day(&self, day: u32) -> Option<Self> {
        self.rewrap(|point| point.with_day(day))
    }

    fn with_day0(&self, day0: u32) -> Option<Self> {
        self.rewrap(|point| point.with_day0(day0))
    }

    fn with_ordinal(&self, ordinal: u32) -> Option<Self> {
        self.rewrap(|point| point.with_ordinal(ordinal))
    }

    fn with_ordinal0(&self, ordinal0: u32) -> Option<Self> {
        self.rewrap(|point| point.with_ordinal0(ordinal0))
    }
}

impl<T: TimePoint + Timelike> Timelike for RelativeMoment<T> {
    fn hour(&self) -> u32 {
        self.current().hour()
    }

    fn minute(&self) -> u32 {
        self.current().minute()
    }

    fn second(&self) -> u32 {
        self.current().second()
    }

    fn nanosecond(&self) -> u32 {
        self.current().nanosecond()
    }

    fn with_hour(&self, hour: u32) -> Option<Self> {
        self.rewrap(|point| point.with_hour(hour))
    }

    fn with_minute(&self, minute: u32) -> Option<Self> {
        self.rewrap(|point| point.with_minute(minute))
    }

    fn with_second(&self, second: u32) -> Option<Self> {
        self.rewrap(|point| point.with_second(second))
    }

    fn with_nanosecond(&self, nanosecond: u32) -> Option<Self> {
        self.rewrap(|point| point.with_nanosecond(nanosecond))
    }
}

fn timestamp_to_utc(timestamp: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp, 0).ok_or_else(|| {
        DatestuffError::InvalidDatetime(format!("timestamp {timestamp} is out of range"))
    })
}

// ── Tests ───────────────────────────────────────────────────────────────────
