//! # datestuff
//!
//! Value types for working with time as data.
//!
//! [`TimeRange`] is an arithmetic progression of time points: a start, an
//! optional stop and a step. It answers length, membership and indexing in
//! closed form, without walking the sequence. [`RelativeMoment`] is a deferred
//! "now plus offset" whose value is recomputed from its clock every time it is
//! read.
//!
//! Both work over any [`TimePoint`]: chrono's [`NaiveDate`](chrono::NaiveDate),
//! [`NaiveDateTime`](chrono::NaiveDateTime) and [`DateTime<Tz>`](chrono::DateTime).
//! Steps and offsets are [`Span`]s, which combine calendar months with an exact
//! duration.
//!
//! ## Modules
//!
//! - [`range`]: bounded and unbounded time ranges, slicing and iteration
//! - [`relative`]: relative dates and datetimes with pluggable clocks
//! - [`span`]: calendar-aware durations and their text form
//! - [`point`]: the time-point contract shared by both value types
//! - [`error`]: error types
//!
//! ```
//! use chrono::NaiveDate;
//! use datestuff::{Span, TimeRange};
//!
//! let start = NaiveDate::from_ymd_opt(2016, 1, 1).unwrap();
//! let stop = NaiveDate::from_ymd_opt(2016, 1, 30).unwrap();
//! let range = TimeRange::bounded(start, stop, Span::days(2)).unwrap();
//!
//! assert_eq!(range.len().unwrap(), 15);
//! assert!(range.contains(&NaiveDate::from_ymd_opt(2016, 1, 29).unwrap()));
//! ```

pub mod error;
pub mod point;
pub mod range;
pub mod relative;
pub mod span;

pub use error::DatestuffError;
pub use point::{Fields, SystemNow, TimePoint};
pub use range::{Iter, Key, Selection, Slice, TimeRange, TimeRangeBuilder};
pub use relative::{
    Clock, RelativeDate, RelativeDateTime, RelativeMoment, RelativeZonedDateTime,
};
pub use span::{Direction, Span};
