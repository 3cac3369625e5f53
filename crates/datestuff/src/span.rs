//! Duration-like offsets for stepping and shifting time points.
//!
//! A [`Span`] is the one offset type used throughout the crate. It carries a
//! calendar part (whole months; a year is twelve of them) and an exact part
//! (a [`TimeDelta`]). Applying a span to a time point shifts the months first,
//! clamping the day to the end of the target month, and then adds the exact
//! part. A span with no calendar part behaves exactly like a `TimeDelta`.
//!
//! # Text Form
//!
//! Spans parse from and display as a compact string: an optional sign
//! followed by one or more components.
//!
//! - `Ny` — years
//! - `Nmo` — months
//! - `Nw` — weeks
//! - `Nd` — days
//! - `Nh` — hours
//! - `Nm` — minutes
//! - `Ns` — seconds (fractional values allowed, e.g. `1.5s`)
//!
//! A sign applies to every component after it, so `+1mo-2d` is one month
//! forward and two days back.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use chrono::{Months, TimeDelta};
use serde::{Serialize, Serializer};

use crate::error::DatestuffError;

const NANOS_PER_SEC: i128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SEC as u128;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: u128 = 24 * NANOS_PER_HOUR;

/// Which way a span moves a time point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
    /// Moves nothing.
    Zero,
    /// The calendar and exact parts point in opposite directions.
    Mixed,
}

/// A calendar-aware offset: whole months plus an exact [`TimeDelta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    months: i64,
    delta: TimeDelta,
}

impl Span {
    pub const ZERO: Span = Span {
        months: 0,
        delta: TimeDelta::zero(),
    };

    /// Build a span from both parts.
    pub const fn new(months: i64, delta: TimeDelta) -> Span {
        Span { months, delta }
    }

    /// Twelve months per year.
    pub fn years(years: i64) -> Span {
        Span::months(years * 12)
    }

    /// A purely calendar span.
    pub const fn months(months: i64) -> Span {
        Span::new(months, TimeDelta::zero())
    }

    /// Exactly seven days per week.
    pub fn weeks(weeks: i64) -> Span {
        Span::from(TimeDelta::weeks(weeks))
    }

    /// Exact 24-hour days.
    pub fn days(days: i64) -> Span {
        Span::from(TimeDelta::days(days))
    }

    /// Exact hours.
    pub fn hours(hours: i64) -> Span {
        Span::from(TimeDelta::hours(hours))
    }

    /// Exact minutes.
    pub fn minutes(minutes: i64) -> Span {
        Span::from(TimeDelta::minutes(minutes))
    }

    /// Exact seconds.
    pub fn seconds(seconds: i64) -> Span {
        Span::from(TimeDelta::seconds(seconds))
    }

    /// Exact milliseconds.
    pub fn milliseconds(milliseconds: i64) -> Span {
        Span::from(TimeDelta::milliseconds(milliseconds))
    }

    /// The calendar part, in months.
    pub fn calendar_months(&self) -> i64 {
        self.months
    }

    /// The exact part.
    pub fn exact(&self) -> TimeDelta {
        self.delta
    }

    /// Whether both parts are zero.
    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.delta.is_zero()
    }

    /// Whether applying this span depends on the calendar (month lengths).
    pub fn is_calendar(&self) -> bool {
        self.months != 0
    }

    /// Which way the span moves a point in time.
    pub fn direction(&self) -> Direction {
        let months = self.months.cmp(&0);
        let exact = self.delta.cmp(&TimeDelta::zero());
        match (months, exact) {
            (Ordering::Equal, Ordering::Equal) => Direction::Zero,
            (Ordering::Less, Ordering::Greater) | (Ordering::Greater, Ordering::Less) => {
                Direction::Mixed
            }
            (Ordering::Greater, _) | (_, Ordering::Greater) => Direction::Forward,
            _ => Direction::Backward,
        }
    }

    /// Add both parts, or `None` on overflow.
    pub fn checked_add(&self, rhs: &Span) -> Option<Span> {
        Some(Span {
            months: self.months.checked_add(rhs.months)?,
            delta: self.delta.checked_add(&rhs.delta)?,
        })
    }

    /// Subtract both parts, or `None` on overflow.
    pub fn checked_sub(&self, rhs: &Span) -> Option<Span> {
        Some(Span {
            months: self.months.checked_sub(rhs.months)?,
            delta: self.delta.checked_sub(&rhs.delta)?,
        })
    }

    /// Scale both parts by `factor`.
    pub fn checked_mul(&self, factor: i64) -> Option<Span> {
        let nanos = total_nanos(self.delta).checked_mul(i128::from(factor))?;
        Some(Span {
            months: self.months.checked_mul(factor)?,
            delta: delta_from_nanos(nanos)?,
        })
    }

    /// Negate both parts, or `None` on overflow.
    pub fn checked_neg(&self) -> Option<Span> {
        Some(Span {
            months: self.months.checked_neg()?,
            delta: -self.delta,
        })
    }

    /// Drop whatever part of the exact component is finer than `resolution`,
    /// rounding toward zero.
    pub(crate) fn truncated_to(&self, resolution: TimeDelta) -> Span {
        let unit = total_nanos(resolution);
        if unit <= 1 {
            return *self;
        }
        let nanos = total_nanos(self.delta);
        // Truncating never grows the magnitude, so the conversion back cannot fail.
        let delta = delta_from_nanos(nanos - nanos % unit).unwrap_or(self.delta);
        Span {
            months: self.months,
            delta,
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Span::ZERO
    }
}

impl From<TimeDelta> for Span {
    fn from(delta: TimeDelta) -> Self {
        Span::new(0, delta)
    }
}

impl From<Months> for Span {
    fn from(months: Months) -> Self {
        Span::months(i64::from(months.as_u32()))
    }
}

impl Add for Span {
    type Output = Span;

    fn add(self, rhs: Span) -> Span {
        self.checked_add(&rhs).expect("`Span + Span` overflowed")
    }
}

impl Sub for Span {
    type Output = Span;

    fn sub(self, rhs: Span) -> Span {
        self.checked_sub(&rhs).expect("`Span - Span` overflowed")
    }
}

impl Neg for Span {
    type Output = Span;

    fn neg(self) -> Span {
        self.checked_neg().expect("`-Span` overflowed")
    }
}

impl Mul<i64> for Span {
    type Output = Span;

    fn mul(self, rhs: i64) -> Span {
        self.checked_mul(rhs).expect("`Span * i64` overflowed")
    }
}

/// Spans order by the direction of their difference: `a < b` when `b - a`
/// moves strictly forward. Spans whose difference is [`Direction::Mixed`]
/// (e.g. one month versus thirty days) are incomparable.
impl PartialOrd for Span {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.checked_sub(other)?.direction() {
            Direction::Zero => Some(Ordering::Equal),
            Direction::Forward => Some(Ordering::Greater),
            Direction::Backward => Some(Ordering::Less),
            Direction::Mixed => None,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = total_nanos(self.delta);
        if self.months == 0 && nanos == 0 {
            return f.write_str("+0s");
        }

        let mut out = String::new();
        let mut sign = 0;
        if self.months != 0 {
            sign = self.months.signum() as i128;
            out.push(if sign < 0 { '-' } else { '+' });
            write_calendar(&mut out, self.months.unsigned_abs());
        }
        if nanos != 0 {
            if nanos.signum() != sign {
                out.push(if nanos < 0 { '-' } else { '+' });
            }
            write_exact(&mut out, nanos.unsigned_abs());
        }
        f.write_str(&out)
    }
}

impl Serialize for Span {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for Span {
    type Err = DatestuffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DatestuffError::InvalidSpan("empty span".to_string()));
        }

        let mut span = Span::ZERO;
        let mut sign = 1i64;
        let mut num_buf = String::new();
        let mut found_any = false;
        let mut chars = s.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch.is_ascii_digit() || ch == '.' {
                num_buf.push(ch);
                continue;
            }
            if ch == '+' || ch == '-' {
                if !num_buf.is_empty() {
                    return Err(DatestuffError::InvalidSpan(format!(
                        "number without unit before '{ch}' in '{s}'"
                    )));
                }
                sign = if ch == '+' { 1 } else { -1 };
                continue;
            }
            if num_buf.is_empty() {
                return Err(DatestuffError::InvalidSpan(format!(
                    "expected number before '{ch}' in '{s}'"
                )));
            }

            let unit = match ch.to_ascii_lowercase() {
                'm' if chars.peek().is_some_and(|c| c.eq_ignore_ascii_case(&'o')) => {
                    chars.next();
                    Unit::Months
                }
                'y' => Unit::Years,
                'w' => Unit::Weeks,
                'd' => Unit::Days,
                'h' => Unit::Hours,
                'm' => Unit::Minutes,
                's' => Unit::Seconds,
                _ => {
                    return Err(DatestuffError::InvalidSpan(format!(
                        "unknown unit '{ch}' in '{s}'"
                    )));
                }
            };

            let component = parse_component(&num_buf, unit, sign)
                .ok_or_else(|| DatestuffError::InvalidSpan(format!("invalid component in '{s}'")))?;
            span = span
                .checked_add(&component)
                .ok_or_else(|| DatestuffError::InvalidSpan(format!("'{s}' is out of range")))?;
            num_buf.clear();
            found_any = true;
        }

        // Trailing number without unit
        if !num_buf.is_empty() {
            return Err(DatestuffError::InvalidSpan(format!(
                "number without unit at end of '{s}'"
            )));
        }

        if !found_any {
            return Err(DatestuffError::InvalidSpan(format!(
                "no valid components in '{s}'"
            )));
        }

        Ok(span)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Years,
    Months,
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
}

fn parse_component(num: &str, unit: Unit, sign: i64) -> Option<Span> {
    if unit == Unit::Seconds {
        let (whole, frac) = num.split_once('.').unwrap_or((num, ""));
        if frac.len() > 9 || frac.contains('.') || (whole.is_empty() && frac.is_empty()) {
            return None;
        }
        let whole: i128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let frac: i128 = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<9}").parse().ok()?
        };
        let nanos = (whole * NANOS_PER_SEC + frac) * i128::from(sign);
        return delta_from_nanos(nanos).map(Span::from);
    }

    let n = num.parse::<i64>().ok()?.checked_mul(sign)?;
    match unit {
        Unit::Years => Some(Span::months(n.checked_mul(12)?)),
        Unit::Months => Some(Span::months(n)),
        Unit::Weeks => TimeDelta::try_weeks(n).map(Span::from),
        Unit::Days => TimeDelta::try_days(n).map(Span::from),
        Unit::Hours => TimeDelta::try_hours(n).map(Span::from),
        Unit::Minutes => TimeDelta::try_minutes(n).map(Span::from),
        Unit::Seconds => TimeDelta::try_seconds(n).map(Span::from),
    }
}

fn write_calendar(out: &mut String, months: u64) {
    let (years, months) = (months / 12, months % 12);
    if years != 0 {
        out.push_str(&format!("{years}y"));
    }
    if months != 0 {
        out.push_str(&format!("{months}mo"));
    }
}

fn write_exact(out: &mut String, nanos: u128) {
    let days = nanos / NANOS_PER_DAY;
    let hours = nanos % NANOS_PER_DAY / NANOS_PER_HOUR;
    let minutes = nanos % NANOS_PER_HOUR / NANOS_PER_MINUTE;
    let seconds = nanos % NANOS_PER_MINUTE / NANOS_PER_SEC as u128;
    let frac = nanos % NANOS_PER_SEC as u128;

    if days != 0 {
        out.push_str(&format!("{days}d"));
    }
    if hours != 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes != 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if frac != 0 {
        let frac = format!("{frac:09}");
        out.push_str(&format!("{seconds}.{}s", frac.trim_end_matches('0')));
    } else if seconds != 0 {
        out.push_str(&format!("{seconds}s"));
    }
}

/// Total nanoseconds in a `TimeDelta`, without the `i64` overflow of
/// `num_nanoseconds`.
pub(crate) fn total_nanos(delta: TimeDelta) -> i128 {
    i128::from(delta.num_seconds()) * NANOS_PER_SEC + i128::from(delta.subsec_nanos())
}

pub(crate) fn delta_from_nanos(nanos: i128) -> Option<TimeDelta> {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SEC)).ok()?;
    let subsec = u32::try_from(nanos.rem_euclid(NANOS_PER_SEC)).ok()?;
    TimeDelta::new(secs, subsec)
}

// ── Tests ───────────────────────────────────────────────────────────────────
