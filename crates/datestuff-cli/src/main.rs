use std::fmt::{self, Write as _};
use std::io::{self, Write};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use datestuff::{
    DatestuffError, Key, RelativeDate, RelativeDateTime, RelativeMoment, RelativeZonedDateTime,
    Selection, Span, TimePoint, TimeRange,
};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "datestuff", version, about = "Step through time ranges and evaluate relative moments")]
struct Cli {
    /// Log library decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List, measure or query a range of dates or datetimes
    Range(RangeArgs),

    /// Evaluate "now + offset" once and print it
    Relative(RelativeArgs),
}

#[derive(Args, Debug)]
struct RangeArgs {
    /// First element (YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS])
    #[arg(long)]
    start: Point,

    /// Exclusive end; omit for an unbounded range
    #[arg(long)]
    stop: Option<Point>,

    /// Step between elements, e.g. 2d, -1w, 1mo, 1h30m
    #[arg(long, allow_hyphen_values = true)]
    step: Span,

    /// Index ("-1") or slice ("1:-1:2") to select
    #[arg(long, allow_hyphen_values = true)]
    select: Option<Key>,

    /// Reverse the range before selecting
    #[arg(long)]
    reverse: bool,

    /// Print whether the point is an element instead of listing
    #[arg(long, conflicts_with_all = ["len", "select"])]
    contains: Option<Point>,

    /// Print the number of elements instead of listing
    #[arg(long, conflicts_with = "select")]
    len: bool,

    /// Maximum elements listed from an unbounded range
    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Print JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct RelativeArgs {
    /// Offset from now, e.g. 4d, -1y, 1mo2d
    #[arg(long, allow_hyphen_values = true)]
    offset: Option<Span>,

    /// Pin the clock to this point instead of reading the system clock
    #[arg(long)]
    at: Option<Point>,

    /// Read the clock in UTC
    #[arg(long, conflicts_with_all = ["tz", "at"])]
    utc: bool,

    /// Evaluate in an IANA timezone, e.g. Asia/Tokyo
    #[arg(long)]
    tz: Option<String>,

    /// strftime-style output pattern
    #[arg(long)]
    format: Option<String>,

    /// Print JSON
    #[arg(long)]
    json: bool,
}

// ── Points ──────────────────────────────────────────────────────────────────

/// A command-line time point. The form picks the grid: dates or datetimes.
#[derive(Debug, Clone, Copy)]
enum Point {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Point {
    fn into_date(self) -> Result<NaiveDate> {
        match self {
            Point::Date(date) => Ok(date),
            Point::DateTime(datetime) => {
                bail!("expected a date like the start, got datetime {datetime}")
            }
        }
    }

    fn into_datetime(self) -> Result<NaiveDateTime> {
        match self {
            Point::DateTime(datetime) => Ok(datetime),
            Point::Date(date) => bail!("expected a datetime like the start, got date {date}"),
        }
    }
}

impl FromStr for Point {
    type Err = DatestuffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Point::Date(date));
        }
        ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
            .iter()
            .find_map(|pattern| NaiveDateTime::parse_from_str(s, pattern).ok())
            .map(Point::DateTime)
            .ok_or_else(|| {
                DatestuffError::InvalidDatetime(format!(
                    "'{s}' is neither YYYY-MM-DD nor YYYY-MM-DDTHH:MM[:SS]"
                ))
            })
    }
}

// ── Reports ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum Report<T> {
    Len(usize),
    Contains(bool),
    Point(T),
    Elements(Vec<T>),
}

impl<T: fmt::Display> fmt::Display for Report<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Len(len) => writeln!(f, "{len}"),
            Report::Contains(found) => writeln!(f, "{found}"),
            Report::Point(point) => writeln!(f, "{point}"),
            Report::Elements(elements) => elements.iter().try_for_each(|e| writeln!(f, "{e}")),
        }
    }
}

#[derive(Debug, Serialize)]
struct MomentReport {
    offset: Span,
    value: String,
}

fn emit<R: Serialize + fmt::Display>(out: &mut impl Write, report: &R, json: bool) -> Result<()> {
    if json {
        serde_json::to_writer(&mut *out, report).context("failed to write JSON")?;
        writeln!(out)?;
    } else {
        write!(out, "{report}")?;
    }
    Ok(())
}

// ── Commands ────────────────────────────────────────────────────────────────

fn run_range(args: &RangeArgs, out: &mut impl Write) -> Result<()> {
    match args.start {
        Point::Date(start) => {
            let stop = args.stop.map(Point::into_date).transpose()?;
            let contains = args.contains.map(Point::into_date).transpose()?;
            range_report(args, start, stop, contains, out)
        }
        Point::DateTime(start) => {
            let stop = args.stop.map(Point::into_datetime).transpose()?;
            let contains = args.contains.map(Point::into_datetime).transpose()?;
            range_report(args, start, stop, contains, out)
        }
    }
}

fn range_report<T>(
    args: &RangeArgs,
    start: T,
    stop: Option<T>,
    contains: Option<T>,
    out: &mut impl Write,
) -> Result<()>
where
    T: TimePoint + Serialize,
{
    let mut range = TimeRange::new(start, stop, args.step)?;
    if args.reverse {
        range = range.reversed()?;
    }
    debug!(%range, "evaluating range");

    let report = if let Some(point) = contains {
        Report::Contains(range.contains(&point))
    } else if args.len {
        Report::Len(range.len()?)
    } else {
        match args.select.clone().map(|key| range.select(key)).transpose()? {
            Some(Selection::Point(point)) => Report::Point(point),
            Some(Selection::Range(selected)) => Report::Elements(elements(&selected, args.limit)),
            None => Report::Elements(elements(&range, args.limit)),
        }
    };
    emit(out, &report, args.json)
}

fn elements<T: TimePoint>(range: &TimeRange<T>, limit: usize) -> Vec<T> {
    if range.is_bounded() {
        range.iter().collect()
    } else {
        range.iter().take(limit).collect()
    }
}

fn run_relative(args: &RelativeArgs, out: &mut impl Write) -> Result<()> {
    let offset = args.offset.unwrap_or(Span::ZERO);

    if let Some(name) = &args.tz {
        let tz: Tz = name
            .parse()
            .map_err(|e| anyhow!("unknown timezone '{name}': {e}"))?;
        let moment = match args.at {
            Some(Point::DateTime(at)) => {
                let pinned = tz.from_local_datetime(&at).single().with_context(|| {
                    format!("{at} is ambiguous or does not exist in {tz}")
                })?;
                RelativeZonedDateTime::fixed(pinned, offset)
            }
            Some(Point::Date(at)) => bail!("--tz needs a datetime for --at, got date {at}"),
            None => RelativeDateTime::now_in(tz, offset),
        };
        return moment_report(&moment, args, out);
    }

    match args.at {
        Some(Point::Date(at)) => moment_report(&RelativeDate::fixed(at, offset), args, out),
        Some(Point::DateTime(at)) => moment_report(&RelativeDateTime::fixed(at, offset), args, out),
        None if args.utc => moment_report(&RelativeDateTime::utc_now(offset), args, out),
        None => moment_report(&RelativeDateTime::now(offset), args, out),
    }
}

fn moment_report<T: TimePoint>(
    moment: &RelativeMoment<T>,
    args: &RelativeArgs,
    out: &mut impl Write,
) -> Result<()> {
    let current = moment.try_current()?;
    debug!(?moment, %current, "evaluated relative moment");

    let mut value = String::new();
    match &args.format {
        Some(pattern) => write!(value, "{}", current.strftime(pattern))
            .map_err(|_| anyhow!("invalid format pattern '{pattern}'"))?,
        None => write!(value, "{current}")?,
    }

    let report = MomentReport {
        offset: moment.offset(),
        value,
    };
    emit(out, &report, args.json)
}

impl fmt::Display for MomentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.value)
    }
}

// ── Entry point ─────────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let mut out = io::stdout().lock();
    match &cli.command {
        Command::Range(args) => run_range(args, &mut out),
        Command::Relative(args) => run_relative(args, &mut out),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
