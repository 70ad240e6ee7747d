// src/schedule.rs

//! Cron-like schedule expressions.
//!
//! Two shapes are accepted:
//!
//! - five fields: `minute hour day-of-month month day-of-week`
//! - six fields: `second minute hour day-of-month month day-of-week`
//!
//! Each field takes `*`, `?`, single values, ranges (`1-5`), steps (`*/15`,
//! `10-40/10`) and comma lists. Months accept `JAN`..`DEC` and days of the
//! week accept `SUN`..`SAT`; numeric days of the week run `0`..`7` with both
//! `0` and `7` meaning Sunday. When both day fields are restricted, a day
//! matches if either of them does.
//!
//! The same type backs a job's `time_restriction` window and the watchdog
//! cadence.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::errors::{FlowError, Result};

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// How far ahead `next_after` searches before giving up (e.g. `0 0 30 2 *`).
const SEARCH_DAYS: i64 = 366 * 5;

/// Set of allowed values for one field, as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet(u64);

impl FieldSet {
    fn contains(self, value: u32) -> bool {
        value < 64 && self.0 & (1u64 << value) != 0
    }

    fn first_at_or_after(self, value: u32) -> Option<u32> {
        (value..64).find(|v| self.contains(*v))
    }
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Value of the first entry in `names`.
    names_base: u32,
}

const SECONDS: FieldSpec = FieldSpec { name: "second", min: 0, max: 59, names: &[], names_base: 0 };
const MINUTES: FieldSpec = FieldSpec { name: "minute", min: 0, max: 59, names: &[], names_base: 0 };
const HOURS: FieldSpec = FieldSpec { name: "hour", min: 0, max: 23, names: &[], names_base: 0 };
const DAYS_OF_MONTH: FieldSpec = FieldSpec { name: "day-of-month", min: 1, max: 31, names: &[], names_base: 1 };
const MONTHS: FieldSpec = FieldSpec { name: "month", min: 1, max: 12, names: &MONTH_NAMES, names_base: 1 };
const DAYS_OF_WEEK: FieldSpec = FieldSpec { name: "day-of-week", min: 0, max: 7, names: &DAY_NAMES, names_base: 0 };

/// A parsed schedule expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    source: String,
    seconds: FieldSet,
    minutes: FieldSet,
    hours: FieldSet,
    days_of_month: FieldSet,
    months: FieldSet,
    days_of_week: FieldSet,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl Schedule {
    /// Parse a five- or six-field expression.
    pub fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();

        let (sec, rest) = match fields.len() {
            5 => ("0", &fields[..]),
            6 => (fields[0], &fields[1..]),
            n => {
                return Err(FlowError::Schedule(format!(
                    "{expr:?}: expected 5 or 6 fields, got {n}"
                )));
            }
        };

        let seconds = parse_field(sec, SECONDS, expr)?;
        let minutes = parse_field(rest[0], MINUTES, expr)?;
        let hours = parse_field(rest[1], HOURS, expr)?;
        let days_of_month = parse_field(rest[2], DAYS_OF_MONTH, expr)?;
        let months = parse_field(rest[3], MONTHS, expr)?;
        let mut days_of_week = parse_field(rest[4], DAYS_OF_WEEK, expr)?;

        // 7 is an alias for Sunday.
        if days_of_week.contains(7) {
            days_of_week = FieldSet(days_of_week.0 | 1);
        }

        Ok(Self {
            source: expr.trim().to_string(),
            seconds,
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_restricted: !is_wildcard(rest[2]),
            dow_restricted: !is_wildcard(rest[4]),
        })
    }

    /// The expression as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `at` falls on a second selected by this schedule.
    pub fn matches(&self, at: NaiveDateTime) -> bool {
        self.seconds.contains(at.second())
            && self.minutes.contains(at.minute())
            && self.hours.contains(at.hour())
            && self.day_matches(at.date())
    }

    /// Whether `at` falls inside the minute-level window of this schedule,
    /// ignoring the seconds field.
    ///
    /// Time restrictions are evaluated at this granularity: `* 8-18 * * *`
    /// means "any time between 08:00 and 18:59".
    pub fn matches_minute(&self, at: NaiveDateTime) -> bool {
        self.minutes.contains(at.minute())
            && self.hours.contains(at.hour())
            && self.day_matches(at.date())
    }

    /// First instant strictly after `after` selected by this schedule.
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let start = after.with_nanosecond(0)? + Duration::seconds(1);
        let mut cursor = start.with_second(0)?;
        let limit = cursor + Duration::days(SEARCH_DAYS);

        while cursor <= limit {
            if !self.day_matches(cursor.date()) {
                cursor = cursor.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }

            if !self.hours.contains(cursor.hour()) {
                cursor = cursor.with_minute(0)? + Duration::hours(1);
                continue;
            }

            if self.minutes.contains(cursor.minute()) {
                let floor = if cursor.date() == start.date()
                    && cursor.hour() == start.hour()
                    && cursor.minute() == start.minute()
                {
                    start.second()
                } else {
                    0
                };

                if let Some(second) = self.seconds.first_at_or_after(floor) {
                    return Some(cursor + Duration::seconds(i64::from(second)));
                }
            }

            cursor += Duration::minutes(1);
        }

        None
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        if !self.months.contains(date.month()) {
            return false;
        }

        let dom = self.days_of_month.contains(date.day());
        let dow = self
            .days_of_week
            .contains(date.weekday().num_days_from_sunday());

        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Schedule {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        Schedule::parse(s)
    }
}

fn is_wildcard(field: &str) -> bool {
    field == "*" || field == "?"
}

fn parse_field(field: &str, spec: FieldSpec, expr: &str) -> Result<FieldSet> {
    let mut set = 0u64;

    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| invalid(expr, spec, part))?;
                (range, step)
            }
            None => (part, 1),
        };

        let (low, high) = if is_wildcard(range) {
            (spec.min, spec.max)
        } else if let Some((a, b)) = range.split_once('-') {
            (value_of(a, spec, expr)?, value_of(b, spec, expr)?)
        } else {
            let value = value_of(range, spec, expr)?;
            // `5/10` means "from 5 to the end, every 10".
            if part.contains('/') {
                (value, spec.max)
            } else {
                (value, value)
            }
        };

        if low > high {
            return Err(invalid(expr, spec, part));
        }

        let mut v = low;
        while v <= high {
            set |= 1u64 << v;
            v += step;
        }
    }

    Ok(FieldSet(set))
}

fn value_of(token: &str, spec: FieldSpec, expr: &str) -> Result<u32> {
    let upper = token.trim().to_ascii_uppercase();

    let value = match spec.names.iter().position(|n| *n == upper) {
        Some(idx) => idx as u32 + spec.names_base,
        None => upper.parse::<u32>().map_err(|_| invalid(expr, spec, token))?,
    };

    if value < spec.min || value > spec.max {
        return Err(invalid(expr, spec, token));
    }

    Ok(value)
}

fn invalid(expr: &str, spec: FieldSpec, part: &str) -> FlowError {
    FlowError::Schedule(format!("{expr:?}: invalid {} field {part:?}", spec.name))
}
