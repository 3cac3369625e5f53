//! Lazy arithmetic sequences of time points.
//!
//! A [`TimeRange`] is the time-point analogue of `start..stop` stepped by a
//! [`Span`]: it never materializes its elements. Length, containment and
//! indexing are answered from `start`, `stop` and `step` alone, slicing and
//! reversal produce new ranges, and iteration computes each element on
//! demand.
//!
//! # Semantics
//!
//! - The range is half-open: `stop` is never produced, even when it lies
//!   exactly on the grid.
//! - A range without `stop` is unbounded in the direction of `step`. It has
//!   no length and cannot be reversed or indexed from the end.
//! - Element `k` is always `start + step * k`. The span is scaled, never
//!   applied cumulatively, so month-based steps keep their anchor day:
//!   stepping monthly from January 31 gives February 29, March 31, April 30.
//!
//! # Calendar Steps
//!
//! For steps without a calendar part, containment is the exact test
//! "`x - start` is a whole multiple of `step`", computed in nanoseconds. For
//! month-based steps no such modulus exists, so containment asks whether some
//! `k >= 0` satisfies `start + step * k == x`, and length is the smallest `k`
//! whose element reaches `stop`. Elements are strictly monotonic in `k`, so
//! both are answered by a logarithmic search over `k`.
//!
//! Slices and reversals keep the anchor of the range they were taken from:
//! their elements are exactly the selected elements of the original, even
//! where month-end clamping is involved. Two ranges with calendar steps are
//! equal only when they also share that anchor.

use std::fmt;
use std::iter::FusedIterator;
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{DatestuffError, Result};
use crate::point::TimePoint;
use crate::span::{total_nanos, Direction, Span};

/// An arithmetic sequence of time points: `start`, `start + step`, ... up to
/// but excluding `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeRange<T> {
    start: T,
    stop: Option<T>,
    step: Span,
    #[serde(skip)]
    grid: Grid<T>,
}

/// Element `k` is `anchor + unit * (base + stride * k)`.
///
/// Ranges with exact steps are always kept at the trivial grid
/// `(start, step, 0, 1)`. `count` is set only when `stop` had to be clamped
/// and no longer determines the length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Grid<T> {
    anchor: T,
    unit: Span,
    base: i64,
    stride: i64,
    count: Option<i64>,
}

impl<T: Copy> Grid<T> {
    fn trivial(start: T, step: Span) -> Self {
        Self {
            anchor: start,
            unit: step,
            base: 0,
            stride: 1,
            count: None,
        }
    }
}

impl<T: TimePoint> TimeRange<T> {
    /// Create a range.
    ///
    /// The exact part of `step` is truncated to the point type's resolution
    /// (whole days for [`NaiveDate`](chrono::NaiveDate)).
    ///
    /// # Errors
    ///
    /// Returns [`DatestuffError::InvalidRange`] if `step` is zero after
    /// truncation, or if its calendar and exact parts point in opposite
    /// directions.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use datestuff::{Span, TimeRange};
    ///
    /// let jan = |d| NaiveDate::from_ymd_opt(2016, 1, d).unwrap();
    /// let range = TimeRange::new(jan(1), Some(jan(31)), Span::days(2)).unwrap();
    /// assert_eq!(range.len().unwrap(), 15);
    /// assert!(range.contains(&jan(29)));
    /// assert!(!range.contains(&jan(30)));
    /// ```
    pub fn new(start: T, stop: Option<T>, step: impl Into<Span>) -> Result<Self> {
        let requested = step.into();
        let step = requested.truncated_to(T::resolution());
        match step.direction() {
            Direction::Zero => {
                return Err(DatestuffError::InvalidRange(format!(
                    "step {requested} is zero at a resolution of {}",
                    Span::from(T::resolution())
                )));
            }
            Direction::Mixed => {
                return Err(DatestuffError::InvalidRange(format!(
                    "step {requested} mixes forward and backward components"
                )));
            }
            Direction::Forward | Direction::Backward => {}
        }

        trace!(?start, ?stop, %step, "constructed time range");
        Ok(Self {
            start,
            stop,
            step,
            grid: Grid::trivial(start, step),
        })
    }

    /// Create a range that stops before `stop`.
    pub fn bounded(start: T, stop: T, step: impl Into<Span>) -> Result<Self> {
        Self::new(start, Some(stop), step)
    }

    /// Create a range that continues in the direction of `step` forever.
    pub fn unbounded(start: T, step: impl Into<Span>) -> Result<Self> {
        Self::new(start, None, step)
    }

    /// Start assembling a range field by field.
    pub fn builder() -> TimeRangeBuilder<T> {
        TimeRangeBuilder {
            start: None,
            stop: None,
            step: None,
        }
    }

    /// The first element, whether or not the range is empty.
    pub fn start(&self) -> T {
        self.start
    }

    /// The exclusive end, or `None` when unbounded.
    pub fn stop(&self) -> Option<T> {
        self.stop
    }

    /// The step between consecutive elements, after truncation.
    pub fn step(&self) -> Span {
        self.step
    }

    /// Whether the range has a stop.
    pub fn is_bounded(&self) -> bool {
        self.stop.is_some()
    }

    /// Number of elements.
    ///
    /// # Errors
    ///
    /// Returns [`DatestuffError::UndefinedLength`] for an unbounded range.
    pub fn len(&self) -> Result<usize> {
        let len = self.len_i64().ok_or_else(|| {
            DatestuffError::UndefinedLength(format!("{self} has no stop"))
        })?;
        usize::try_from(len).map_err(|_| {
            DatestuffError::UndefinedLength(format!("length {len} of {self} does not fit in usize"))
        })
    }

    /// Whether the range produces no elements. Unbounded ranges never are.
    pub fn is_empty(&self) -> bool {
        self.len_i64() == Some(0)
    }

    /// Whether `point` is one of the range's elements, without iterating.
    pub fn contains(&self, point: &T) -> bool {
        if !self.reaches(point, &self.start) {
            return false;
        }

        let index = match self.exact_step_nanos() {
            Some(step) => {
                let distance = total_nanos(point.elapsed_since(self.start));
                if distance % step != 0 {
                    return false;
                }
                match i64::try_from(distance / step) {
                    Ok(index) => index,
                    Err(_) => return false,
                }
            }
            None => {
                let index = self.search_reaching(point);
                if self.point_at(index).as_ref() != Some(point) {
                    return false;
                }
                index
            }
        };
        self.len_i64().is_none_or(|len| index < len)
    }

    /// The element at `index`. Negative indices count back from the end.
    ///
    /// # Errors
    ///
    /// Returns [`DatestuffError::IndexOutOfRange`] if the index is past the
    /// end, if a negative index is used on an unbounded range, or if the
    /// element is not representable.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use datestuff::{Span, TimeRange};
    ///
    /// let jan = |d| NaiveDate::from_ymd_opt(2016, 1, d).unwrap();
    /// let range = TimeRange::unbounded(jan(1), Span::days(2)).unwrap();
    /// assert_eq!(range.get(9).unwrap(), jan(19));
    /// assert!(range.get(-1).is_err());
    /// ```
    pub fn get(&self, index: isize) -> Result<T> {
        let requested = index as i64;
        let resolved = match self.len_i64() {
            Some(len) => {
                let resolved = if requested < 0 {
                    requested + len
                } else {
                    requested
                };
                if resolved < 0 || resolved >= len {
                    return Err(DatestuffError::IndexOutOfRange(format!(
                        "index {index} is out of range for length {len}"
                    )));
                }
                resolved
            }
            None if requested < 0 => {
                return Err(DatestuffError::IndexOutOfRange(format!(
                    "negative index {index} on unbounded {self}"
                )));
            }
            None => requested,
        };

        self.point_at(resolved).ok_or_else(|| {
            DatestuffError::IndexOutOfRange(format!("element {index} of {self} is not representable"))
        })
    }

    /// A sub-range with the same elements as slicing the materialized
    /// sequence with Python-style `start:stop:step` semantics.
    ///
    /// # Errors
    ///
    /// Returns [`DatestuffError::InvalidRange`] for a zero slice step,
    /// and [`DatestuffError::IndexOutOfRange`] when a bound of an unbounded
    /// range would have to be resolved from its end.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use datestuff::{Slice, Span, TimeRange};
    ///
    /// let day = |m, d| NaiveDate::from_ymd_opt(2016, m, d).unwrap();
    /// let range = TimeRange::bounded(day(1, 1), day(2, 1), Span::days(1)).unwrap();
    /// let odd = range.slice(Slice::new(Some(1), Some(-1), Some(2))).unwrap();
    /// assert_eq!(odd, TimeRange::bounded(day(1, 2), day(1, 31), Span::days(2)).unwrap());
    /// ```
    pub fn slice(&self, slice: impl Into<Slice>) -> Result<Self> {
        let slice = slice.into();
        let k = slice.step.unwrap_or(1);
        if k == 0 {
            return Err(DatestuffError::InvalidRange(
                "slice step cannot be zero".to_string(),
            ));
        }
        let k = k as i64;
        let step = self.step.checked_mul(k).ok_or_else(|| {
            DatestuffError::InvalidRange(format!("slice step {k} overflows {}", self.step))
        })?;

        let len = self.len_i64();
        let (first, end) = match len {
            Some(len) => {
                let (first, end) = adjust_indices(&slice, len);
                if k == 1 && first == 0 && end == len {
                    return Ok(*self);
                }
                (first, Some(end))
            }
            None => {
                let first = match non_negative_bound(slice.start, "start")? {
                    Some(first) => first,
                    None if k > 0 => 0,
                    None => {
                        return Err(DatestuffError::IndexOutOfRange(
                            "a backward slice of an unbounded range needs a start".to_string(),
                        ));
                    }
                };
                let end = match non_negative_bound(slice.stop, "stop")? {
                    Some(end) => Some(end),
                    None if k > 0 => None,
                    None => Some(-1),
                };
                (first, end)
            }
        };

        debug!(?slice, first, ?end, "slicing time range");
        let count = end.map(|end| index_count(first, end, k));
        if count == Some(0) {
            return Ok(Self {
                start: self.start,
                stop: Some(self.start),
                step,
                grid: Grid::trivial(self.start, step),
            });
        }

        let out_of_range = || {
            DatestuffError::IndexOutOfRange(format!("slice {slice:?} of {self} overflows"))
        };
        let start = self.index_point(first)?;
        let grid = Grid {
            anchor: self.grid.anchor,
            unit: self.grid.unit,
            base: self
                .grid
                .stride
                .checked_mul(first)
                .and_then(|offset| offset.checked_add(self.grid.base))
                .ok_or_else(out_of_range)?,
            stride: self.grid.stride.checked_mul(k).ok_or_else(out_of_range)?,
            count: None,
        };

        let stop = match (end, count) {
            (Some(end), Some(count)) => {
                if k > 0 && len == Some(end) {
                    self.stop
                } else {
                    // Clamp to the last selected element when the exclusive
                    // end falls outside the representable range.
                    let last = first + k * (count - 1);
                    let stop = self.point_at(end).or_else(|| self.point_at(last));
                    Some(stop.ok_or_else(out_of_range)?)
                }
            }
            _ => None,
        };

        let mut sliced = Self {
            start,
            stop,
            step,
            grid,
        };
        if !step.is_calendar() {
            sliced.grid = Grid::trivial(start, step);
        }
        if let Some(count) = count {
            if sliced.len_from_stop() != Some(count) {
                sliced.grid.count = Some(count);
            }
        }
        Ok(sliced)
    }

    /// Index or slice, depending on the key.
    pub fn select(&self, key: impl Into<Key>) -> Result<Selection<T>> {
        match key.into() {
            Key::Index(index) => self.get(index).map(Selection::Point),
            Key::Slice(slice) => self.slice(slice).map(Selection::Range),
        }
    }

    /// The same elements in the opposite order, as a new range.
    ///
    /// # Errors
    ///
    /// Returns [`DatestuffError::UnreversibleRange`] for an unbounded range.
    pub fn reversed(&self) -> Result<Self> {
        if !self.is_bounded() {
            return Err(DatestuffError::UnreversibleRange(format!(
                "{self} has no stop"
            )));
        }
        self.slice(Slice::FULL.step_by(-1)).map_err(|err| {
            DatestuffError::UnreversibleRange(format!("{self} cannot be reversed: {err}"))
        })
    }

    /// Iterate over the elements from `start`.
    pub fn iter(&self) -> Iter<T> {
        Iter {
            range: *self,
            next: 0,
            end: self.len_i64(),
        }
    }

    // ── internal arithmetic ─────────────────────────────────────────────

    /// Element `k`, for any integer `k`. `None` only past the representable
    /// range of `T`.
    fn point_at(&self, k: i64) -> Option<T> {
        let grid = &self.grid;
        let n = grid.stride.checked_mul(k)?.checked_add(grid.base)?;
        grid.anchor.checked_add_span(&grid.unit.checked_mul(n)?)
    }

    fn index_point(&self, k: i64) -> Result<T> {
        self.point_at(k).ok_or_else(|| {
            DatestuffError::IndexOutOfRange(format!("element {k} of {self} is not representable"))
        })
    }

    /// Whether `point` is at or past `bound` in the direction of travel.
    fn reaches(&self, point: &T, bound: &T) -> bool {
        match self.step.direction() {
            Direction::Backward => point <= bound,
            _ => point >= bound,
        }
    }

    fn exact_step_nanos(&self) -> Option<i128> {
        (!self.step.is_calendar()).then(|| total_nanos(self.step.exact()))
    }

    fn len_i64(&self) -> Option<i64> {
        self.grid.count.or_else(|| self.len_from_stop())
    }

    fn len_from_stop(&self) -> Option<i64> {
        self.stop.as_ref().map(|stop| self.search_reaching(stop))
    }

    /// The smallest `k >= 0` whose element reaches `target`.
    fn search_reaching(&self, target: &T) -> i64 {
        if let Some(step) = self.exact_step_nanos() {
            let distance = total_nanos(target.elapsed_since(self.start));
            if distance == 0 || distance.signum() != step.signum() {
                return 0;
            }
            let (distance, step) = (distance.abs(), step.abs());
            let steps = (distance + step - 1) / step;
            return i64::try_from(steps).unwrap_or(i64::MAX);
        }

        // Elements are strictly monotonic in `k`, and `point_at` only fails
        // beyond the representable range, which lies past every target.
        let reached = |k: i64| {
            self.point_at(k)
                .is_none_or(|point| self.reaches(&point, target))
        };
        if reached(0) {
            return 0;
        }

        let (mut lo, mut hi) = (0i64, 1i64);
        while !reached(hi) {
            if hi == i64::MAX {
                return hi;
            }
            lo = hi;
            hi = hi.saturating_mul(2);
        }
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if reached(mid) {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        trace!(%target, index = hi, "searched calendar grid");
        hi
    }
}

impl<T: TimePoint> fmt::Display for TimeRange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stop {
            Some(stop) => write!(f, "{}..{} by {}", self.start, stop, self.step),
            None => write!(f, "{}.. by {}", self.start, self.step),
        }
    }
}

impl<T: TimePoint> IntoIterator for TimeRange<T> {
    type Item = T;
    type IntoIter = Iter<T>;

    fn into_iter(self) -> Iter<T> {
        self.iter()
    }
}

impl<T: TimePoint> IntoIterator for &TimeRange<T> {
    type Item = T;
    type IntoIter = Iter<T>;

    fn into_iter(self) -> Iter<T> {
        self.iter()
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

/// Assembles a [`TimeRange`] field by field; `start` and `step` are required.
#[derive(Debug, Clone)]
pub struct TimeRangeBuilder<T> {
    start: Option<T>,
    stop: Option<T>,
    step: Option<Span>,
}

impl<T: TimePoint> TimeRangeBuilder<T> {
    /// Set the first element.
    pub fn start(mut self, start: T) -> Self {
        self.start = Some(start);
        self
    }

    /// Set the exclusive end. Leave unset for an unbounded range.
    pub fn stop(mut self, stop: T) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Set the step between elements.
    pub fn step(mut self, step: impl Into<Span>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// Create the range.
    ///
    /// # Errors
    ///
    /// Returns [`DatestuffError::InvalidRange`] if `start` or `step` was
    /// never set, or for any reason [`TimeRange::new`] rejects.
    pub fn build(self) -> Result<TimeRange<T>> {
        let start = self
            .start
            .ok_or_else(|| DatestuffError::InvalidRange("start is required".to_string()))?;
        let step = self
            .step
            .ok_or_else(|| DatestuffError::InvalidRange("step is required".to_string()))?;
        TimeRange::new(start, self.stop, step)
    }
}

// ── Iteration ───────────────────────────────────────────────────────────────

/// Lazily computes the elements of a [`TimeRange`]. Each call to
/// [`TimeRange::iter`] starts over from `start`.
#[derive(Debug, Clone)]
pub struct Iter<T> {
    range: TimeRange<T>,
    next: i64,
    end: Option<i64>,
}

impl<T: TimePoint> Iterator for Iter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.end.is_some_and(|end| self.next >= end) {
            return None;
        }
        let point = self.range.point_at(self.next)?;
        match self.next.checked_add(1) {
            Some(next) => self.next = next,
            None => self.end = Some(self.next),
        }
        Some(point)
    }

    fn nth(&mut self, n: usize) -> Option<T> {
        match i64::try_from(n).ok().and_then(|n| self.next.checked_add(n)) {
            Some(next) => self.next = next,
            None => {
                self.end = Some(self.next);
                return None;
            }
        }
        self.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.end {
            Some(end) => {
                let remaining = usize::try_from(end.saturating_sub(self.next).max(0))
                    .unwrap_or(usize::MAX);
                (remaining, Some(remaining))
            }
            None => (0, None),
        }
    }
}

impl<T: TimePoint> FusedIterator for Iter<T> {}

// ── Keys ────────────────────────────────────────────────────────────────────

/// Python-style `start:stop:step` slice bounds. Missing bounds take the
/// usual defaults for the direction of `step`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Slice {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: Option<isize>,
}

impl Slice {
    /// `[:]`, every element in order.
    pub const FULL: Slice = Slice::new(None, None, None);

    /// A slice from its three optional bounds.
    pub const fn new(start: Option<isize>, stop: Option<isize>, step: Option<isize>) -> Self {
        Self { start, stop, step }
    }

    /// The same bounds with a different step.
    pub const fn step_by(mut self, step: isize) -> Self {
        self.step = Some(step);
        self
    }
}

impl From<RangeFull> for Slice {
    fn from(_: RangeFull) -> Self {
        Slice::FULL
    }
}

impl From<Range<isize>> for Slice {
    fn from(range: Range<isize>) -> Self {
        Slice::new(Some(range.start), Some(range.end), None)
    }
}

impl From<RangeFrom<isize>> for Slice {
    fn from(range: RangeFrom<isize>) -> Self {
        Slice::new(Some(range.start), None, None)
    }
}

impl From<RangeTo<isize>> for Slice {
    fn from(range: RangeTo<isize>) -> Self {
        Slice::new(None, Some(range.end), None)
    }
}

/// What [`TimeRange::select`] accepts: an index or a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Index(isize),
    Slice(Slice),
}

impl From<isize> for Key {
    fn from(index: isize) -> Self {
        Key::Index(index)
    }
}

impl From<Slice> for Key {
    fn from(slice: Slice) -> Self {
        Key::Slice(slice)
    }
}

/// Parses `"3"`, `"-1"`, `"1:"`, `":10"`, `"1:-1:2"` or `"::-1"`.
impl FromStr for Key {
    type Err = DatestuffError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if !s.contains(':') {
            return s.parse::<isize>().map(Key::Index).map_err(|_| {
                DatestuffError::UnsupportedKeyType(format!("'{s}' is not an integer or a slice"))
            });
        }

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() > 3 {
            return Err(DatestuffError::UnsupportedKeyType(format!(
                "'{s}' has more than three slice components"
            )));
        }
        let bound = |part: &str| -> Result<Option<isize>> {
            let part = part.trim();
            if part.is_empty() {
                return Ok(None);
            }
            part.parse().map(Some).map_err(|_| {
                DatestuffError::UnsupportedKeyType(format!(
                    "slice bound '{part}' in '{s}' is not an integer"
                ))
            })
        };

        let step = match parts.get(2) {
            Some(part) => bound(part)?,
            None => None,
        };
        Ok(Key::Slice(Slice::new(bound(parts[0])?, bound(parts[1])?, step)))
    }
}

/// The result of [`TimeRange::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Selection<T> {
    Point(T),
    Range(TimeRange<T>),
}

// ── Internal helpers ────────────────────────────────────────────────────────

/// Resolve slice bounds against a known length, clamping the way Python's
/// `slice.indices` does.
fn adjust_indices(slice: &Slice, len: i64) -> (i64, i64) {
    let backward = slice.step.is_some_and(|step| step < 0);
    let clamp = |index: isize| -> i64 {
        let index = index as i64;
        if index < 0 {
            let index = index + len;
            if index >= 0 {
                index
            } else if backward {
                -1
            } else {
                0
            }
        } else if index >= len {
            if backward {
                len - 1
            } else {
                len
            }
        } else {
            index
        }
    };

    let first = slice
        .start
        .map_or(if backward { len - 1 } else { 0 }, clamp);
    let end = slice.stop.map_or(if backward { -1 } else { len }, clamp);
    (first, end)
}

/// How many indices `first, first + k, ...` lie before `end`.
fn index_count(first: i64, end: i64, k: i64) -> i64 {
    let (distance, stride) = if k > 0 {
        (i128::from(end) - i128::from(first), i128::from(k))
    } else {
        (i128::from(first) - i128::from(end), -i128::from(k))
    };
    if distance <= 0 {
        return 0;
    }
    i64::try_from((distance + stride - 1) / stride).unwrap_or(i64::MAX)
}

fn non_negative_bound(bound: Option<isize>, which: &str) -> Result<Option<i64>> {
    match bound {
        Some(bound) if bound < 0 => Err(DatestuffError::IndexOutOfRange(format!(
            "negative slice {which} {bound} on an unbounded range"
        ))),
        Some(bound) => Ok(Some(bound as i64)),
        None => Ok(None),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Months, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, 0).unwrap()
    }

    // ── construction ────────────────────────────────────────────────────

    #[test]
    fn test_builder_requires_start() {
        let err = TimeRange::<NaiveDateTime>::builder()
            .stop(datetime(2016, 1, 1, 0, 0))
            .step(Span::days(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, DatestuffError::InvalidRange(_)), "got: {err}");
    }

    #[test]
    fn test_builder_requires_step() {
        let err = TimeRange::builder()
            .start(datetime(2016, 1, 1, 0, 0))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("step is required"), "got: {err}");
    }

    #[test]
    fn test_builder_builds() {
        let range = TimeRange::builder()
            .start(date(2016, 1, 1))
            .stop(date(2016, 1, 6))
            .step(TimeDelta::days(1))
            .build()
            .unwrap();
        assert_eq!(range, TimeRange::bounded(date(2016, 1, 1), date(2016, 1, 6), Span::days(1)).unwrap());
    }

    #[test]
    fn test_zero_step_is_invalid() {
        let result = TimeRange::unbounded(date(2016, 1, 1), TimeDelta::zero());
        assert!(matches!(result, Err(DatestuffError::InvalidRange(_))));
    }

    #[test]
    fn test_sub_day_step_on_dates_is_invalid() {
        let result = TimeRange::unbounded(date(2016, 1, 1), Span::hours(12));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("zero at a resolution of +1d"), "got: {err}");
    }

    #[test]
    fn test_date_step_truncates_to_whole_days() {
        let range = TimeRange::unbounded(date(2016, 1, 1), Span::hours(36)).unwrap();
        assert_eq!(range.step(), Span::days(1));
    }

    #[test]
    fn test_mixed_step_is_invalid() {
        let result = TimeRange::unbounded(date(2016, 1, 1), Span::months(1) - Span::days(1));
        assert!(matches!(result, Err(DatestuffError::InvalidRange(_))));
    }

    // ── len ─────────────────────────────────────────────────────────────

    #[test]
    fn test_properly_calculates_length() {
        let range = TimeRange::bounded(date(2016, 1, 1), date(2016, 1, 6), Span::days(1)).unwrap();
        assert_eq!(range.len().unwrap(), 5);
    }

    #[test]
    fn test_length_rounds_partial_steps_up() {
        let range = TimeRange::bounded(date(2016, 1, 1), date(2016, 1, 31), Span::days(2)).unwrap();
        assert_eq!(range.len().unwrap(), 15);
        let range = TimeRange::bounded(date(2016, 1, 1), date(2016, 1, 30), Span::days(2)).unwrap();
        assert_eq!(range.len().unwrap(), 15);
    }

    #[test]
    fn test_length_with_negative_step() {
        let range = TimeRange::bounded(date(2016, 1, 23), date(2016, 1, 1), Span::days(-1)).unwrap();
        assert_eq!(range.len().unwrap(), 22);
    }

    #[test]
    fn test_length_is_zero_when_direction_disagrees() {
        let range = TimeRange::bounded(date(2016, 1, 31), date(2016, 1, 1), Span::days(1)).unwrap();
        assert_eq!(range.len().unwrap(), 0);
        assert!(range.is_empty());
        assert_eq!(range.iter().count(), 0);
    }

    #[test]
    fn test_raises_error_if_infinite_length() {
        let range = TimeRange::unbounded(date(2016, 1, 1), Span::days(1)).unwrap();
        assert!(matches!(range.len(), Err(DatestuffError::UndefinedLength(_))));
        assert!(!range.is_empty());
    }

    // ── contains ────────────────────────────────────────────────────────

    #[test]
    fn test_properly_reports_a_contained_date() {
        let range = TimeRange::bounded(date(2016, 1, 1), date(2016, 1, 31), Span::days(2)).unwrap();
        for day in (1..31).step_by(2) {
            assert!(range.contains(&date(2016, 1, day)), "day {day}");
        }
        for day in (2..31).step_by(2) {
            assert!(!range.contains(&date(2016, 1, day)), "day {day}");
        }
    }

    #[test]
    fn test_does_not_contain_end() {
        let range = TimeRange::bounded(date(2016, 1, 1), date(2016, 1, 31), Span::days(2)).unwrap();
        assert!(!range.contains(&date(2016, 1, 31)));
        assert_eq!(range.stop(), Some(date(2016, 1, 31)));
    }

    #[test]
    fn test_properly_reports_a_contained_datetime() {
        let range = TimeRange::bounded(
            datetime(2016, 1, 1, 0, 0),
            datetime(2016, 1, 1, 23, 0),
            Span::minutes(60),
        )
        .unwrap();
        for hour in 0..23 {
            assert!(range.contains(&datetime(2016, 1, 1, hour, 0)), "hour {hour}");
        }
        assert!(!range.contains(&datetime(2016, 1, 1, 5, 30)));
    }

    #[test]
    fn test_reports_contains_a_precise_datetime() {
        let range = TimeRange::unbounded(datetime(2000, 4, 25, 18, 30), Span::minutes(57)).unwrap();
        assert!(range.contains(&datetime(2000, 4, 29, 7, 3)));
        assert!(!range.contains(&datetime(2000, 4, 29, 7, 4)));
    }

    #[test]
    fn test_reports_contains_with_stop_and_negative_step() {
        let range = TimeRange::bounded(
            datetime(2016, 1, 23, 0, 0),
            datetime(2016, 1, 1, 0, 0),
            Span::days(-1),
        )
        .unwrap();
        assert!(range.contains(&datetime(2016, 1, 20, 0, 0)));
        assert!(!range.contains(&datetime(2016, 1, 31, 0, 0)));
        assert!(!range.contains(&datetime(2016, 1, 1, 0, 0)));
        assert!(range.contains(&datetime(2016, 1, 23, 0, 0)));
    }

    #[test]
    fn test_does_not_contain_greater_than_start_with_negative_step() {
        let range = TimeRange::unbounded(datetime(2016, 1, 23, 0, 0), Span::days(-1)).unwrap();
        assert!(!range.contains(&datetime(2016, 1, 31, 0, 0)));
        assert!(range.contains(&datetime(1999, 1, 31, 0, 0)));
    }

    #[test]
    fn test_contains_with_negative_hourly_step() {
        let range = TimeRange::bounded(
            datetime(2000, 1, 1, 23, 0),
            datetime(2000, 1, 1, 0, 0),
            Span::minutes(-60),
        )
        .unwrap();
        for hour in 1..23 {
            assert!(range.contains(&datetime(2000, 1, 1, hour, 0)), "hour {hour}");
        }
    }

    #[test]
    fn test_contains_on_zoned_grid() {
        let start = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).single().unwrap();
        let range = TimeRange::unbounded(start, Span::hours(6)).unwrap();
        let later = Utc.with_ymd_and_hms(2016, 3, 1, 18, 0, 0).single().unwrap();
        assert!(range.contains(&later));
        assert!(!range.contains(&(later + TimeDelta::seconds(1))));
    }

    // ── calendar steps ──────────────────────────────────────────────────

    #[test]
    fn test_monthly_steps_keep_anchor_day() {
        let range = TimeRange::unbounded(date(2016, 1, 31), Span::months(1)).unwrap();
        let firsts: Vec<_> = range.iter().take(4).collect();
        assert_eq!(
            firsts,
            vec![date(2016, 1, 31), date(2016, 2, 29), date(2016, 3, 31), date(2016, 4, 30)]
        );
    }

    #[test]
    fn test_monthly_contains_uses_exact_grid() {
        let range = TimeRange::unbounded(date(2016, 1, 31), Span::months(1)).unwrap();
        assert!(range.contains(&date(2016, 2, 29)));
        assert!(range.contains(&date(2026, 10, 31)));
        assert!(!range.contains(&date(2016, 2, 28)));
        assert!(!range.contains(&date(2015, 12, 31)));
    }

    #[test]
    fn test_monthly_length() {
        let range = TimeRange::bounded(date(2016, 1, 31), date(2016, 6, 1), Span::months(1)).unwrap();
        assert_eq!(range.len().unwrap(), 5);
        let range = TimeRange::bounded(date(2016, 1, 31), date(2016, 5, 31), Span::months(1)).unwrap();
        assert_eq!(range.len().unwrap(), 4);
    }

    #[test]
    fn test_yearly_backward_steps() {
        let range = TimeRange::bounded(date(2016, 2, 29), date(2010, 1, 1), -Span::years(1)).unwrap();
        assert_eq!(range.len().unwrap(), 7);
        assert_eq!(range.get(1).unwrap(), date(2015, 2, 28));
        assert_eq!(range.get(-1).unwrap(), date(2010, 2, 28));
        assert!(range.contains(&date(2012, 2, 29)));
        assert!(!range.contains(&date(2012, 2, 28)));
    }

    #[test]
    fn test_month_and_day_step() {
        let step = Span::months(1) + Span::days(1);
        let range = TimeRange::bounded(date(2016, 1, 1), date(2017, 1, 1), step).unwrap();
        let all: Vec<_> = range.iter().collect();
        assert_eq!(all.len(), range.len().unwrap());
        assert_eq!(all[2], date(2016, 3, 3));
        assert!(all.iter().all(|d| range.contains(d)));
    }

    #[test]
    fn test_monthly_zoned_range_across_dst_gap() {
        let tz: chrono_tz::Tz = "America/New_York".parse().unwrap();
        let at = |m, d, h| tz.with_ymd_and_hms(2026, m, d, h, 30, 0).single().unwrap();
        let stop = tz.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).single().unwrap();
        let range = TimeRange::bounded(at(2, 8, 2), stop, Span::months(1)).unwrap();

        assert_eq!(range.len().unwrap(), 11);
        assert_eq!(range.iter().count(), 11);
        assert_eq!(range.get(1).unwrap().to_rfc3339(), "2026-03-08T03:30:00-04:00");
        assert!(range.contains(&at(3, 8, 3)));
        assert!(range.contains(&at(4, 8, 2)));
        assert!(!range.contains(&at(4, 8, 3)));
    }

    // ── iteration ───────────────────────────────────────────────────────

    #[test]
    fn test_iterates_properly() {
        let range = TimeRange::bounded(date(2016, 1, 1), date(2016, 1, 31), Span::days(1)).unwrap();
        let expected: Vec<_> = (1..31).map(|d| date(2016, 1, d)).collect();
        assert_eq!(range.iter().collect::<Vec<_>>(), expected);
        // Restartable
        assert_eq!(range.into_iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_iterates_unbounded_lazily() {
        let range = TimeRange::unbounded(date(2016, 1, 1), Span::weeks(1)).unwrap();
        let mut iter = range.iter();
        assert_eq!(iter.size_hint(), (0, None));
        assert_eq!(iter.nth(52), Some(date(2016, 12, 30)));
        assert_eq!(iter.next(), Some(date(2017, 1, 6)));
    }

    #[test]
    fn test_iteration_stops_at_representable_limit() {
        let range = TimeRange::unbounded(NaiveDate::MAX - TimeDelta::days(2), Span::days(1)).unwrap();
        assert_eq!(range.iter().count(), 3);
    }

    #[test]
    fn test_size_hint_is_exact_for_bounded() {
        let range = TimeRange::bounded(date(2016, 1, 1), date(2016, 1, 11), Span::days(1)).unwrap();
        let mut iter = range.iter();
        iter.next();
        assert_eq!(iter.size_hint(), (9, Some(9)));
    }

    // ── reversed ────────────────────────────────────────────────────────

    #[test]
    fn test_reverses_properly() {
        let range = TimeRange::bounded(
            datetime(2016, 1, 1, 0, 0),
            datetime(2016, 1, 1, 23, 0),
            Span::minutes(60),
        )
        .unwrap();
        let reversed: Vec<_> = range.reversed().unwrap().iter().collect();
        let expected: Vec<_> = (0..23).rev().map(|h| datetime(2016, 1, 1, h, 0)).collect();
        assert_eq!(reversed, expected);
    }

    #[test]
    fn test_reversed_off_grid_stop() {
        let range = TimeRange::bounded(date(2016, 1, 1), date(2016, 1, 8), Span::days(3)).unwrap();
        let reversed = range.reversed().unwrap();
        assert_eq!(reversed.start(), date(2016, 1, 7));
        assert_eq!(
            reversed.iter().collect::<Vec<_>>(),
            vec![date(2016, 1, 7), date(2016, 1, 4), date(2016, 1, 1)]
        );
    }

    #[test]
    fn test_reversed_empty_range_is_empty() {
        let range = TimeRange::bounded(date(2016, 1, 31), date(2016, 1, 1), Span::days(1)).unwrap();
        assert_eq!(range.reversed().unwrap().iter().count(), 0);
    }

    #[test]
    fn test_reversed_monthly_keeps_clamped_elements() {
        let range = TimeRange::bounded(date(2016, 1, 31), date(2016, 5, 1), Span::months(1)).unwrap();
        let reversed = range.reversed().unwrap();
        assert_eq!(
            reversed.iter().collect::<Vec<_>>(),
            vec![date(2016, 4, 30), date(2016, 3, 31), date(2016, 2, 29), date(2016, 1, 31)]
        );
        assert_eq!(reversed.len().unwrap(), 4);
        assert_eq!(reversed.get(-1).unwrap(), date(2016, 1, 31));
        assert!(reversed.contains(&date(2016, 3, 31)));
        assert!(!reversed.contains(&date(2016, 3, 30)));
    }

    #[test]
    fn test_reversed_at_representable_limits() {
        let min = NaiveDate::MIN;
        let range = TimeRange::bounded(min, min + TimeDelta::days(3), Span::days(1)).unwrap();
        let reversed = range.reversed().unwrap();
        assert_eq!(reversed.len().unwrap(), 3);
        assert_eq!(
            reversed.iter().collect::<Vec<_>>(),
            vec![min + TimeDelta::days(2), min + TimeDelta::days(1), min]
        );
        assert!(reversed.contains(&min));
        assert_eq!(reversed.reversed().unwrap(), range);

        let max = NaiveDate::MAX;
        let range = TimeRange::bounded(max, max - TimeDelta::days(2), Span::days(-1)).unwrap();
        assert_eq!(
            range.reversed().unwrap().iter().collect::<Vec<_>>(),
            vec![max - TimeDelta::days(1), max]
        );
    }

    #[test]
    fn test_cant_reverse_infinite_range() {
        let range = TimeRange::unbounded(datetime(2016, 1, 1, 0, 0), Span::days(1)).unwrap();
        assert!(matches!(range.reversed(), Err(DatestuffError::UnreversibleRange(_))));
    }

    // ── equality ────────────────────────────────────────────────────────

    #[test]
    fn test_equals_other_range() {
        let a = TimeRange::unbounded(datetime(2016, 1, 23, 0, 0), TimeDelta::days(1)).unwrap();
        let b = TimeRange::unbounded(datetime(2016, 1, 23, 0, 0), TimeDelta::days(1)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_not_equal_other_range() {
        let a = TimeRange::unbounded(datetime(2016, 1, 23, 0, 0), Span::days(10)).unwrap();
        let b = TimeRange::unbounded(datetime(2016, 1, 23, 0, 0), Span::days(1)).unwrap();
        assert_ne!(a, b);
    }

    // ── get / select ────────────────────────────────────────────────────

    #[test]
    fn test_indexes_properly() {
        let range = TimeRange::unbounded(datetime(2016, 1, 1, 0, 0), Span::days(2)).unwrap();
        for idx in 0..10u32 {
            assert_eq!(
                range.get(idx as isize).unwrap(),
                datetime(2016, 1, 1 + idx * 2, 0, 0)
            );
        }
    }

    #[test]
    fn test_negative_index() {
        let range = TimeRange::bounded(
            datetime(2016, 1, 1, 0, 0),
            datetime(2016, 2, 1, 0, 0),
            Span::days(1),
        )
        .unwrap();
        assert_eq!(range.get(-1).unwrap(), datetime(2016, 1, 31, 0, 0));
        assert_eq!(range.get(-31).unwrap(), datetime(2016, 1, 1, 0, 0));
    }

    #[test]
    fn test_negative_index_out_of_range() {
        let range = TimeRange::bounded(
            datetime(2016, 1, 1, 0, 0),
            datetime(2016, 2, 1, 0, 0),
            Span::days(1),
        )
        .unwrap();
        assert!(matches!(range.get(-32), Err(DatestuffError::IndexOutOfRange(_))));
    }

    #[test]
    fn test_raises_if_out_of_range() {
        let range = TimeRange::bounded(
            datetime(2016, 1, 1, 0, 0),
            datetime(2016, 1, 11, 0, 0),
            Span::days(1),
        )
        .unwrap();
        assert!(range.get(9).is_ok());
        assert!(matches!(range.get(10), Err(DatestuffError::IndexOutOfRange(_))));
        assert!(matches!(range.get(11), Err(DatestuffError::IndexOutOfRange(_))));
    }

    #[test]
    fn test_raises_with_infinite_range_and_negative_index() {
        let range = TimeRange::unbounded(datetime(2016, 1, 1, 0, 0), Span::days(-1)).unwrap();
        assert!(matches!(range.get(-1), Err(DatestuffError::IndexOutOfRange(_))));
    }

    #[test]
    fn test_unrepresentable_index_is_out_of_range() {
        let range = TimeRange::unbounded(date(2016, 1, 1), Span::days(1)).unwrap();
        assert!(matches!(range.get(isize::MAX), Err(DatestuffError::IndexOutOfRange(_))));
    }

    #[test]
    fn test_raises_with_bad_subscription() {
        for bad in ["a", "1.4", "1:b", "1:2:3:4"] {
            let err = bad.parse::<Key>().unwrap_err();
            assert!(matches!(err, DatestuffError::UnsupportedKeyType(_)), "{bad}: {err}");
        }
    }

    #[test]
    fn test_parses_keys() {
        assert_eq!("-1".parse::<Key>().unwrap(), Key::Index(-1));
        assert_eq!(":".parse::<Key>().unwrap(), Key::Slice(Slice::FULL));
        assert_eq!(
            "1:-1:2".parse::<Key>().unwrap(),
            Key::Slice(Slice::new(Some(1), Some(-1), Some(2)))
        );
        assert_eq!(
            "::-1".parse::<Key>().unwrap(),
            Key::Slice(Slice::FULL.step_by(-1))
        );
    }

    #[test]
    fn test_select_dispatches_on_key() {
        let range = TimeRange::unbounded(date(2016, 1, 1), Span::days(2)).unwrap();
        assert_eq!(
            range.select("9".parse::<Key>().unwrap()).unwrap(),
            Selection::Point(date(2016, 1, 19))
        );
        assert_eq!(
            range.select(Slice::from(..2)).unwrap(),
            Selection::Range(TimeRange::bounded(date(2016, 1, 1), date(2016, 1, 5), Span::days(2)).unwrap())
        );
    }

    // ── slice ───────────────────────────────────────────────────────────

    #[test]
    fn test_empty_slice_is_a_copy() {
        let range = TimeRange::unbounded(datetime(2016, 1, 1, 0, 0), Span::days(1)).unwrap();
        let copy = range.slice(..).unwrap();
        assert_eq!(range, copy);
    }

    #[test]
    fn test_full_slice_of_off_grid_range_is_equal() {
        let range = TimeRange::bounded(date(2016, 1, 1), date(2016, 1, 8), Span::days(3)).unwrap();
        assert_eq!(range.slice(..).unwrap(), range);
        assert_eq!(range.slice(0..3).unwrap(), range);
        assert_eq!(range.slice(1..).unwrap().stop(), Some(date(2016, 1, 8)));
        let every_other = range.slice(Slice::FULL.step_by(2)).unwrap();
        assert_eq!(every_other.stop(), Some(date(2016, 1, 8)));
        assert_eq!(
            every_other.iter().collect::<Vec<_>>(),
            vec![date(2016, 1, 1), date(2016, 1, 7)]
        );
    }

    #[test]
    fn test_monthly_slice_keeps_anchor() {
        let range = TimeRange::unbounded(date(2016, 1, 31), Span::months(1)).unwrap();
        let sliced = range.slice(1..).unwrap();
        assert_eq!(sliced.start(), date(2016, 2, 29));
        assert_eq!(
            sliced.iter().take(3).collect::<Vec<_>>(),
            vec![date(2016, 2, 29), date(2016, 3, 31), date(2016, 4, 30)]
        );
        assert!(sliced.contains(&date(2016, 5, 31)));
        assert!(!sliced.contains(&date(2016, 3, 29)));
        assert_ne!(sliced, TimeRange::unbounded(date(2016, 2, 29), Span::months(1)).unwrap());

        let every_other = range.slice(Slice::new(Some(1), Some(7), Some(2))).unwrap();
        assert_eq!(
            every_other.iter().collect::<Vec<_>>(),
            vec![date(2016, 2, 29), date(2016, 4, 30), date(2016, 6, 30)]
        );
        assert_eq!(every_other.stop(), Some(date(2016, 8, 31)));
        assert!(!every_other.contains(&date(2016, 3, 31)));
    }

    #[test]
    fn test_empty_slice_skips_unrepresentable_endpoints() {
        let max = NaiveDate::MAX;
        let range = TimeRange::unbounded(max - TimeDelta::days(1), Span::days(1)).unwrap();
        let empty = range.slice(Slice::new(Some(5), Some(3), None)).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.iter().count(), 0);

        let tail = range.slice(0..2).unwrap();
        assert_eq!(tail.len().unwrap(), 2);
        assert_eq!(tail.iter().collect::<Vec<_>>(), vec![max - TimeDelta::days(1), max]);
        assert!(matches!(range.slice(0..5), Err(DatestuffError::IndexOutOfRange(_))));
    }

    #[test]
    fn test_fails_to_negative_slice_infinite_range() {
        let range = TimeRange::unbounded(datetime(2016, 1, 1, 0, 0), Span::days(-1)).unwrap();
        for slice in [-1isize..1, 1..-1] {
            assert!(matches!(
                range.slice(slice),
                Err(DatestuffError::IndexOutOfRange(_))
            ));
        }
    }

    #[test]
    fn test_backward_slice_of_infinite_range() {
        let range = TimeRange::unbounded(date(2016, 1, 1), Span::days(1)).unwrap();
        let sliced = range.slice(Slice::new(Some(3), None, Some(-1))).unwrap();
        assert_eq!(
            sliced.iter().collect::<Vec<_>>(),
            vec![date(2016, 1, 4), date(2016, 1, 3), date(2016, 1, 2), date(2016, 1, 1)]
        );
        assert!(range.slice(Slice::FULL.step_by(-1)).is_err());
    }

    #[test]
    fn test_gets_slice() {
        let range = TimeRange::bounded(
            datetime(2016, 1, 1, 0, 0),
            datetime(2016, 2, 1, 0, 0),
            Span::days(1),
        )
        .unwrap();
        let expected = TimeRange::bounded(
            datetime(2016, 1, 2, 0, 0),
            datetime(2016, 2, 1, 0, 0),
            Span::days(1),
        )
        .unwrap();
        assert_eq!(range.slice(1..).unwrap(), expected);
    }

    #[test]
    fn test_slice_without_start() {
        let range = TimeRange::bounded(
            datetime(2016, 1, 1, 0, 0),
            datetime(2016, 2, 1, 0, 0),
            Span::days(1),
        )
        .unwrap();
        let expected = TimeRange::bounded(
            datetime(2016, 1, 1, 0, 0),
            datetime(2016, 1, 11, 0, 0),
            Span::days(1),
        )
        .unwrap();
        assert_eq!(range.slice(..10).unwrap(), expected);
    }

    #[test]
    fn test_full_slice() {
        let range = TimeRange::bounded(
            datetime(2016, 1, 1, 0, 0),
            datetime(2016, 2, 1, 0, 0),
            Span::days(1),
        )
        .unwrap();
        let expected = TimeRange::bounded(
            datetime(2016, 1, 2, 0, 0),
            datetime(2016, 1, 31, 0, 0),
            Span::days(2),
        )
        .unwrap();
        assert_eq!(range.slice(Slice::new(Some(1), Some(-1), Some(2))).unwrap(), expected);
    }

    #[test]
    fn test_zero_slice_step_is_invalid() {
        let range = TimeRange::unbounded(date(2016, 1, 1), Span::days(1)).unwrap();
        assert!(matches!(
            range.slice(Slice::FULL.step_by(0)),
            Err(DatestuffError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_display() {
        let range = TimeRange::bounded(date(2016, 1, 1), date(2016, 2, 1), Span::days(2)).unwrap();
        assert_eq!(range.to_string(), "2016-01-01..2016-02-01 by +2d");
        let range = TimeRange::unbounded(date(2016, 1, 1), Span::months(-1)).unwrap();
        assert_eq!(range.to_string(), "2016-01-01.. by -1mo");
    }

    #[test]
    fn test_serializes_fields() {
        let range = TimeRange::unbounded(date(2016, 1, 1), Span::days(2)).unwrap();
        let json = serde_json::to_value(range).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"start": "2016-01-01", "stop": null, "step": "+2d"})
        );
    }

    // ── properties ──────────────────────────────────────────────────────

    /// Materialize by repeated addition, independently of `TimeRange`.
    fn materialize(start: NaiveDate, stop: NaiveDate, step_days: i64) -> Vec<NaiveDate> {
        let step = TimeDelta::days(step_days);
        let mut out = Vec::new();
        let mut current = start;
        while (step_days > 0 && current < stop) || (step_days < 0 && current > stop) {
            out.push(current);
            current += step;
        }
        out
    }

    /// Python list slicing, spelled out from the language reference.
    fn python_slice<V: Clone>(
        items: &[V],
        start: Option<isize>,
        stop: Option<isize>,
        step: isize,
    ) -> Vec<V> {
        let n = items.len() as isize;
        let norm = |i: isize, lo: isize, hi: isize| {
            let i = if i < 0 { i + n } else { i };
            i.clamp(lo, hi)
        };
        let mut out = Vec::new();
        if step > 0 {
            let mut i = start.map_or(0, |s| norm(s, 0, n));
            let end = stop.map_or(n, |s| norm(s, 0, n));
            while i < end {
                out.push(items[i as usize].clone());
                i += step;
            }
        } else {
            let mut i = start.map_or(n - 1, |s| norm(s, -1, n - 1));
            let end = stop.map_or(-1, |s| norm(s, -1, n - 1));
            while i > end {
                out.push(items[i as usize].clone());
                i += step;
            }
        }
        out
    }

    fn step_days() -> impl Strategy<Value = i64> {
        prop_oneof![-9i64..=-1, 1i64..=9]
    }

    fn shift(date: NaiveDate, months: i64) -> NaiveDate {
        let magnitude = Months::new(months.unsigned_abs() as u32);
        if months >= 0 {
            date.checked_add_months(magnitude).unwrap()
        } else {
            date.checked_sub_months(magnitude).unwrap()
        }
    }

    /// Element `k` is `start` shifted by `k * step_months`, clamped on its own.
    fn materialize_monthly(start: NaiveDate, stop: NaiveDate, step_months: i64) -> Vec<NaiveDate> {
        let mut out = Vec::new();
        for k in 0i64.. {
            let point = shift(start, k * step_months);
            if (step_months > 0 && point >= stop) || (step_months < 0 && point <= stop) {
                break;
            }
            out.push(point);
        }
        out
    }

    proptest! {
        #[test]
        fn prop_len_and_iteration_match_materialized(
            start_offset in -400i64..400,
            stop_offset in -400i64..400,
            step in step_days(),
        ) {
            let base = date(2016, 1, 1);
            let start = base + TimeDelta::days(start_offset);
            let stop = base + TimeDelta::days(stop_offset);
            let range = TimeRange::bounded(start, stop, Span::days(step)).unwrap();
            let expected = materialize(start, stop, step);

            prop_assert_eq!(range.len().unwrap(), expected.len());
            prop_assert_eq!(range.iter().collect::<Vec<_>>(), expected);
        }

        #[test]
        fn prop_contains_matches_materialized(
            stop_offset in -200i64..200,
            step in step_days(),
            point_days in -250i64..250,
        ) {
            let start = date(2016, 1, 1);
            let stop = start + TimeDelta::days(stop_offset);
            let range = TimeRange::bounded(start, stop, Span::days(step)).unwrap();
            let point = start + TimeDelta::days(point_days);

            prop_assert_eq!(range.contains(&point), materialize(start, stop, step).contains(&point));
            prop_assert!(!range.contains(&stop));
        }

        #[test]
        fn prop_indexing_matches_materialized(
            stop_offset in -100i64..100,
            step in step_days(),
            index in -120isize..120,
        ) {
            let start = date(2016, 1, 1);
            let stop = start + TimeDelta::days(stop_offset);
            let range = TimeRange::bounded(start, stop, Span::days(step)).unwrap();
            let items = materialize(start, stop, step);
            let len = items.len() as isize;

            let expected = if index >= 0 && index < len {
                Some(items[index as usize])
            } else if index < 0 && -index <= len {
                Some(items[(len + index) as usize])
            } else {
                None
            };
            prop_assert_eq!(range.get(index).ok(), expected);
            if len > 0 {
                prop_assert_eq!(range.get(-1).unwrap(), range.get(len - 1).unwrap());
            }
            prop_assert!(range.get(len).is_err());
            prop_assert!(range.get(-(len + 1)).is_err());
        }

        #[test]
        fn prop_slice_matches_materialized(
            stop_offset in -60i64..60,
            step in step_days(),
            slice_start in proptest::option::of(-20isize..20),
            slice_stop in proptest::option::of(-20isize..20),
            slice_step in prop_oneof![-4isize..=-1, 1isize..=4],
        ) {
            let start = date(2016, 1, 1);
            let stop = start + TimeDelta::days(stop_offset);
            let range = TimeRange::bounded(start, stop, Span::days(step)).unwrap();
            let items = materialize(start, stop, step);

            let sliced = range
                .slice(Slice::new(slice_start, slice_stop, Some(slice_step)))
                .unwrap();
            prop_assert_eq!(
                sliced.iter().collect::<Vec<_>>(),
                python_slice(&items, slice_start, slice_stop, slice_step)
            );
        }

        #[test]
        fn prop_reversed_matches_materialized(
            stop_offset in -200i64..200,
            step in step_days(),
        ) {
            let start = date(2016, 1, 1);
            let stop = start + TimeDelta::days(stop_offset);
            let range = TimeRange::bounded(start, stop, Span::days(step)).unwrap();
            let mut expected = materialize(start, stop, step);
            expected.reverse();

            prop_assert_eq!(range.reversed().unwrap().iter().collect::<Vec<_>>(), expected);
        }

        #[test]
        fn prop_monthly_slice_matches_materialized(
            start_day in 28u32..=31,
            stop_months in -30i64..30,
            step in prop_oneof![-3i64..=-1, 1i64..=3],
            slice_start in proptest::option::of(-12isize..12),
            slice_stop in proptest::option::of(-12isize..12),
            slice_step in prop_oneof![-3isize..=-1, 1isize..=3],
        ) {
            let start = date(2016, 1, start_day);
            let stop = shift(date(2016, 1, 15), stop_months);
            let range = TimeRange::bounded(start, stop, Span::months(step)).unwrap();
            let items = materialize_monthly(start, stop, step);
            let expected = python_slice(&items, slice_start, slice_stop, slice_step);

            let sliced = range
                .slice(Slice::new(slice_start, slice_stop, Some(slice_step)))
                .unwrap();
            prop_assert_eq!(sliced.len().unwrap(), expected.len());
            prop_assert_eq!(sliced.iter().collect::<Vec<_>>(), expected.clone());
            for item in &items {
                prop_assert_eq!(sliced.contains(item), expected.contains(item));
            }
        }

        #[test]
        fn prop_monthly_reversed_matches_materialized(
            start_day in 28u32..=31,
            stop_months in -30i64..30,
            step in prop_oneof![-3i64..=-1, 1i64..=3],
        ) {
            let start = date(2016, 1, start_day);
            let stop = shift(date(2016, 1, 15), stop_months);
            let range = TimeRange::bounded(start, stop, Span::months(step)).unwrap();
            let items = materialize_monthly(start, stop, step);
            let mut expected = items.clone();
            expected.reverse();

            let reversed = range.reversed().unwrap();
            prop_assert_eq!(reversed.iter().collect::<Vec<_>>(), expected);
            prop_assert_eq!(reversed.reversed().unwrap().iter().collect::<Vec<_>>(), items);
        }

        #[test]
        fn prop_sub_second_grid_contains(
            step_nanos in 1i64..5_000_000_000,
            k in 0i64..10_000,
            jitter in 1i64..1_000,
        ) {
            let start = datetime(2016, 1, 1, 0, 0);
            let step = TimeDelta::nanoseconds(step_nanos);
            let range = TimeRange::unbounded(start, step).unwrap();
            let on_grid = start + step * (k as i32);
            prop_assert!(range.contains(&on_grid));
            if jitter % step_nanos != 0 {
                prop_assert!(!range.contains(&(on_grid + TimeDelta::nanoseconds(jitter))));
            }
        }
    }
}
