//! The time-point contract shared by [`TimeRange`](crate::range::TimeRange)
//! and [`RelativeMoment`](crate::relative::RelativeMoment).
//!
//! Implemented for chrono's date-only [`NaiveDate`] and for the
//! date-and-time types [`NaiveDateTime`] and [`DateTime<Tz>`].

use std::fmt;

use chrono::format::{DelayedFormat, StrftimeItems};
use chrono::{
    DateTime, Datelike, Local, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeDelta, TimeZone, Timelike, Utc,
};

use crate::error::{DatestuffError, Result};
use crate::span::Span;

/// A fixed point in time that can be shifted by a [`Span`].
pub trait TimePoint: Copy + Ord + Datelike + fmt::Debug + fmt::Display {
    /// The smallest exact step this type distinguishes.
    fn resolution() -> TimeDelta;

    /// Shift by whole months, clamping the day to the end of the target month.
    fn shift_months(self, months: i64) -> Option<Self>;

    /// Shift by an exact delta. Date-only points ignore sub-day components.
    fn shift_exact(self, delta: TimeDelta) -> Option<Self>;

    /// The exact delta from `earlier` to `self`.
    fn elapsed_since(self, earlier: Self) -> TimeDelta;

    /// Replace calendar and clock fields. [`Fields::offset`] is ignored here.
    fn replace_fields(self, fields: &Fields) -> Result<Self>;

    /// Format with a strftime-style pattern.
    fn strftime<'a>(&self, pattern: &'a str) -> DelayedFormat<StrftimeItems<'a>>;

    /// Apply a span: months first, then the exact part.
    fn checked_add_span(self, span: &Span) -> Option<Self> {
        self.shift_months(span.calendar_months())?
            .shift_exact(span.exact())
    }

    /// Apply the negation of a span.
    fn checked_sub_span(self, span: &Span) -> Option<Self> {
        self.checked_add_span(&span.checked_neg()?)
    }
}

/// Point types with a natural "current moment" source.
pub trait SystemNow: TimePoint {
    /// Read the system clock.
    fn system_now() -> Self;
}

/// Field overrides for [`TimePoint::replace_fields`] and
/// [`RelativeMoment::replace`](crate::relative::RelativeMoment::replace).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fields {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub second: Option<u32>,
    pub nanosecond: Option<u32>,
    /// Only consulted by relative moments: the offset of the rewrapped value.
    pub offset: Option<Span>,
}

impl Fields {
    /// No overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the year.
    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Override the month, 1 to 12.
    pub fn month(mut self, month: u32) -> Self {
        self.month = Some(month);
        self
    }

    /// Override the day of the month.
    pub fn day(mut self, day: u32) -> Self {
        self.day = Some(day);
        self
    }

    /// Override the hour.
    pub fn hour(mut self, hour: u32) -> Self {
        self.hour = Some(hour);
        self
    }

    /// Override the minute.
    pub fn minute(mut self, minute: u32) -> Self {
        self.minute = Some(minute);
        self
    }

    /// Override the second.
    pub fn second(mut self, second: u32) -> Self {
        self.second = Some(second);
        self
    }

    /// Override the nanosecond.
    pub fn nanosecond(mut self, nanosecond: u32) -> Self {
        self.nanosecond = Some(nanosecond);
        self
    }

    /// Override the offset of a replaced relative moment.
    pub fn offset(mut self, offset: impl Into<Span>) -> Self {
        self.offset = Some(offset.into());
        self
    }

    fn has_clock_fields(&self) -> bool {
        self.hour.is_some()
            || self.minute.is_some()
            || self.second.is_some()
            || self.nanosecond.is_some()
    }
}

// ── chrono implementations ──────────────────────────────────────────────────

impl TimePoint for NaiveDate {
    fn resolution() -> TimeDelta {
        TimeDelta::days(1)
    }

    fn shift_months(self, months: i64) -> Option<Self> {
        if months >= 0 {
            self.checked_add_months(to_months(months)?)
        } else {
            self.checked_sub_months(to_months(months)?)
        }
    }

    fn shift_exact(self, delta: TimeDelta) -> Option<Self> {
        self.checked_add_signed(delta)
    }

    fn elapsed_since(self, earlier: Self) -> TimeDelta {
        self.signed_duration_since(earlier)
    }

    fn replace_fields(self, fields: &Fields) -> Result<Self> {
        if fields.has_clock_fields() {
            return Err(DatestuffError::InvalidDatetime(
                "a date has no hour, minute, second or nanosecond".to_string(),
            ));
        }
        replace_date(self, fields)
    }

    fn strftime<'a>(&self, pattern: &'a str) -> DelayedFormat<StrftimeItems<'a>> {
        self.format(pattern)
    }
}

impl TimePoint for NaiveDateTime {
    fn resolution() -> TimeDelta {
        TimeDelta::nanoseconds(1)
    }

    fn shift_months(self, months: i64) -> Option<Self> {
        if months >= 0 {
            self.checked_add_months(to_months(months)?)
        } else {
            self.checked_sub_months(to_months(months)?)
        }
    }

    fn shift_exact(self, delta: TimeDelta) -> Option<Self> {
        self.checked_add_signed(delta)
    }

    fn elapsed_since(self, earlier: Self) -> TimeDelta {
        self.signed_duration_since(earlier)
    }

    fn replace_fields(self, fields: &Fields) -> Result<Self> {
        let date = replace_date(self.date(), fields)?;
        let time = replace_time(self.time(), fields)?;
        Ok(NaiveDateTime::new(date, time))
    }

    fn strftime<'a>(&self, pattern: &'a str) -> DelayedFormat<StrftimeItems<'a>> {
        self.format(pattern)
    }
}

impl<Tz: TimeZone> TimePoint for DateTime<Tz>
where
    Tz::Offset: Copy + fmt::Display,
{
    fn resolution() -> TimeDelta {
        TimeDelta::nanoseconds(1)
    }

    /// Shifts the local wall-clock reading, then resolves it in the same
    /// zone: an ambiguous reading takes the earlier instant, and a reading
    /// inside a gap moves forward by the length of the gap.
    fn shift_months(self, months: i64) -> Option<Self> {
        let local = self.naive_local().shift_months(months)?;
        resolve_local(&self.timezone(), local)
    }

    fn shift_exact(self, delta: TimeDelta) -> Option<Self> {
        self.checked_add_signed(delta)
    }

    fn elapsed_since(self, earlier: Self) -> TimeDelta {
        self.signed_duration_since(earlier)
    }

    fn replace_fields(self, fields: &Fields) -> Result<Self> {
        let local = self.naive_local();
        let naive = NaiveDateTime::new(
            replace_date(local.date(), fields)?,
            replace_time(local.time(), fields)?,
        );
        self.timezone()
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| {
                DatestuffError::InvalidDatetime(format!(
                    "ambiguous or nonexistent local time {naive} after field replacement"
                ))
            })
    }

    fn strftime<'a>(&self, pattern: &'a str) -> DelayedFormat<StrftimeItems<'a>> {
        self.format(pattern)
    }
}

impl SystemNow for NaiveDate {
    fn system_now() -> Self {
        Local::now().date_naive()
    }
}

impl SystemNow for NaiveDateTime {
    fn system_now() -> Self {
        Local::now().naive_local()
    }
}

impl SystemNow for DateTime<Utc> {
    fn system_now() -> Self {
        Utc::now()
    }
}

impl SystemNow for DateTime<Local> {
    fn system_now() -> Self {
        Local::now()
    }
}

// ── Internal helpers ────────────────────────────────────────────────────────

fn to_months(months: i64) -> Option<Months> {
    u32::try_from(months.unsigned_abs()).ok().map(Months::new)
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(resolved) => Some(resolved),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => {
            // Read the skipped wall time with the offset in force before the gap.
            let before = tz
                .from_local_datetime(&local.checked_sub_signed(TimeDelta::days(1))?)
                .earliest()?;
            let offset = i64::from(before.offset().fix().local_minus_utc());
            let utc = local.checked_sub_signed(TimeDelta::seconds(offset))?;
            Some(tz.from_utc_datetime(&utc))
        }
    }
}

fn replace_date(date: NaiveDate, fields: &Fields) -> Result<NaiveDate> {
    let year = fields.year.unwrap_or(date.year());
    let month = fields.month.unwrap_or(date.month());
    let day = fields.day.unwrap_or(date.day());
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        DatestuffError::InvalidDatetime(format!(
            "{year:04}-{month:02}-{day:02} is not a valid date"
        ))
    })
}

fn replace_time(time: NaiveTime, fields: &Fields) -> Result<NaiveTime> {
    let hour = fields.hour.unwrap_or(time.hour());
    let minute = fields.minute.unwrap_or(time.minute());
    let second = fields.second.unwrap_or(time.second());
    let nanosecond = fields.nanosecond.unwrap_or(time.nanosecond());
    NaiveTime::from_hms_nano_opt(hour, minute, second, nanosecond).ok_or_else(|| {
        DatestuffError::InvalidDatetime(format!(
            "{hour:02}:{minute:02}:{second:02}.{nanosecond:09} is not a valid time"
        ))
    })
}

// ── Tests ───────────────────────────────────────────────────────────────────
