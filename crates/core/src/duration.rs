//! Subscription calendar arithmetic.
//!
//! Subscription periods are described by free-text duration descriptors such
//! as `"1 month"`, `"6 months"` or `"1 year"`. All arithmetic works on UTC
//! calendar dates; time of day never matters.

use core::fmt;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Length used when a descriptor names no recognizable unit.
pub const FALLBACK_DAYS: u32 = 30;

/// Errors from duration arithmetic.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    /// The descriptor is empty or whitespace.
    #[error("duration descriptor cannot be empty")]
    Empty,
    /// The quantity does not fit, or the end date falls outside the calendar.
    #[error("duration {0:?} is out of range")]
    OutOfRange(String),
}

/// A parsed duration descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "unit", content = "count", rename_all = "snake_case")]
pub enum SubscriptionTerm {
    Days(u32),
    Months(u32),
    Years(u32),
}

impl SubscriptionTerm {
    /// Parse a descriptor of the form `<integer> (day|days|month|months|year|years)`.
    ///
    /// Matching is a case-insensitive substring match. A missing integer means
    /// one unit; a descriptor naming neither months, years nor days means
    /// [`FALLBACK_DAYS`] days.
    ///
    /// # Errors
    ///
    /// Returns `DurationError::Empty` for blank input and
    /// `DurationError::OutOfRange` when the quantity overflows `u32`.
    pub fn parse(descriptor: &str) -> Result<Self, DurationError> {
        let lower = descriptor.trim().to_lowercase();
        if lower.is_empty() {
            return Err(DurationError::Empty);
        }

        let digits: String = lower
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(char::is_ascii_digit)
            .collect();
        let count = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<u32>()
                .map_err(|_| DurationError::OutOfRange(descriptor.to_owned()))?
        };

        let term = if lower.contains("month") {
            Self::Months(count)
        } else if lower.contains("year") {
            Self::Years(count)
        } else if lower.contains("day") {
            Self::Days(count)
        } else {
            Self::Days(FALLBACK_DAYS)
        };
        Ok(term)
    }

    /// End date of a term beginning on `start`.
    ///
    /// Whole months and years clamp to the last valid day of the resulting
    /// month, so Jan 31 + 1 month is Feb 29 in a leap year and Feb 28 otherwise.
    ///
    /// # Errors
    ///
    /// Returns `DurationError::OutOfRange` if the result leaves chrono's calendar.
    pub fn end_date(self, start: NaiveDate) -> Result<NaiveDate, DurationError> {
        let end = match self {
            Self::Days(n) => start.checked_add_days(Days::new(u64::from(n))),
            Self::Months(n) => start.checked_add_months(Months::new(n)),
            Self::Years(n) => n
                .checked_mul(12)
                .and_then(|months| start.checked_add_months(Months::new(months))),
        };
        end.ok_or_else(|| DurationError::OutOfRange(self.to_string()))
    }
}

impl fmt::Display for SubscriptionTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (n, unit) = match *self {
            Self::Days(n) => (n, "day"),
            Self::Months(n) => (n, "month"),
            Self::Years(n) => (n, "year"),
        };
        write!(f, "{}", plural(n, unit))
    }
}

/// Add a duration descriptor to a start date.
///
/// ```
/// use chrono::NaiveDate;
/// use listing_portal_core::add_duration;
///
/// let jan31 = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
/// let end = add_duration(jan31, "1 month").unwrap();
/// assert_eq!(end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
/// ```
///
/// # Errors
///
/// See [`SubscriptionTerm::parse`] and [`SubscriptionTerm::end_date`].
pub fn add_duration(start: NaiveDate, descriptor: &str) -> Result<NaiveDate, DurationError> {
    SubscriptionTerm::parse(descriptor)?.end_date(start)
}

/// Calendar time left until a subscription ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Remaining {
    Left { years: u32, months: u32, days: u32 },
    Expired,
}

impl Remaining {
    /// Whether the end date has passed.
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self::Left {
            years,
            months,
            days,
        } = *self
        else {
            return write!(f, "Expired");
        };

        let parts: Vec<String> = [(years, "year"), (months, "month"), (days, "day")]
            .into_iter()
            .filter(|(n, _)| *n > 0)
            .map(|(n, unit)| plural(n, unit))
            .collect();

        if parts.is_empty() {
            write!(f, "0 days remaining")
        } else {
            write!(f, "{} remaining", parts.join(", "))
        }
    }
}

/// Years, months and days from `today` until `end`, both UTC dates.
///
/// An `end` before `today` is [`Remaining::Expired`]; the same day is zero
/// remaining, not expired. When the day difference is negative, a month is
/// borrowed and the length of the month preceding `end`'s month is added,
/// repeating with earlier months while still negative; a negative month
/// difference borrows a year.
///
/// ```
/// use chrono::NaiveDate;
/// use listing_portal_core::remaining;
///
/// let d = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
/// assert_eq!(
///     remaining(d(2024, 1, 1), d(2025, 3, 15)).to_string(),
///     "1 year, 2 months, 14 days remaining",
/// );
/// ```
#[must_use]
pub fn remaining(today: NaiveDate, end: NaiveDate) -> Remaining {
    if end < today {
        return Remaining::Expired;
    }

    let mut years = end.year() - today.year();
    let mut months = i64::from(end.month()) - i64::from(today.month());
    let mut days = i64::from(end.day()) - i64::from(today.day());

    let mut borrow_from = end;
    while days < 0 {
        borrow_from = last_day_of_previous_month(borrow_from);
        days += i64::from(borrow_from.day());
        months -= 1;
    }
    while months < 0 {
        months += 12;
        years -= 1;
    }

    Remaining::Left {
        years: u32::try_from(years).unwrap_or(0),
        months: u32::try_from(months).unwrap_or(0),
        days: u32::try_from(days).unwrap_or(0),
    }
}

fn last_day_of_previous_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(date)
}

fn plural(n: u32, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
