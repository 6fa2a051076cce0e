//! Listing quotas.
//!
//! A profile's quota is a [`ListingLimit`]: at most `value` listings per
//! `period`. Periods are calendar windows in UTC.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Calendar window a listing limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuotaPeriod {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

impl QuotaPeriod {
    /// First day of the window containing `today`.
    ///
    /// Weeks are ISO weeks starting on Monday.
    #[must_use]
    pub fn window_start(self, today: NaiveDate) -> NaiveDate {
        match self {
            Self::Day => today,
            Self::Week => {
                let back = u64::from(today.weekday().num_days_from_monday());
                today.checked_sub_days(chrono::Days::new(back)).unwrap_or(today)
            }
            Self::Month => today.with_day(1).unwrap_or(today),
            Self::Year => today.with_ordinal(1).unwrap_or(today),
        }
    }

    /// UTC instant at which the window containing `now` opened.
    #[must_use]
    pub fn window_start_instant(self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.window_start(now.date_naive())
            .and_time(NaiveTime::MIN)
            .and_utc()
    }
}

impl std::fmt::Display for QuotaPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Day => write!(f, "day"),
            Self::Week => write!(f, "week"),
            Self::Month => write!(f, "month"),
            Self::Year => write!(f, "year"),
        }
    }
}

/// Maximum number of listings per period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListingLimit {
    pub period: QuotaPeriod,
    pub value: u32,
}

impl ListingLimit {
    /// Listings per month granted to every new (free) profile.
    pub const FREE_MONTHLY_LISTINGS: u32 = 5;

    /// The quota every profile starts with: five listings per month.
    #[must_use]
    pub const fn free_default() -> Self {
        Self {
            period: QuotaPeriod::Month,
            value: Self::FREE_MONTHLY_LISTINGS,
        }
    }

    /// A monthly quota of `value` listings.
    #[must_use]
    pub const fn monthly(value: u32) -> Self {
        Self {
            period: QuotaPeriod::Month,
            value,
        }
    }
}

impl Default for ListingLimit {
    fn default() -> Self {
        Self::free_default()
    }
}

/// Percentage of a quota consumed, rounded and clamped to `0..=100`.
///
/// A zero limit counts as fully used.
///
/// ```
/// use listing_portal_core::usage_percentage;
///
/// assert_eq!(usage_percentage(9, 10), 90);
/// assert_eq!(usage_percentage(5, 0), 100);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to 0..=100
pub fn usage_percentage(used: u32, limit: u32) -> u8 {
    if limit == 0 {
        return 100;
    }
    let pct = (f64::from(used) / f64::from(limit) * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_usage_percentage() {
        assert_eq!(usage_percentage(9, 10), 90);
        assert_eq!(usage_percentage(0, 10), 0);
        assert_eq!(usage_percentage(1, 3), 33);
        assert_eq!(usage_percentage(2, 3), 67);
        assert_eq!(usage_percentage(1, 8), 13);
    }

    #[test]
    fn test_usage_percentage_clamps() {
        assert_eq!(usage_percentage(15, 10), 100);
        assert_eq!(usage_percentage(u32::MAX, 1), 100);
    }

    #[test]
    fn test_usage_percentage_zero_limit() {
        assert_eq!(usage_percentage(5, 0), 100);
        assert_eq!(usage_percentage(0, 0), 100);
    }

    #[test]
    fn test_window_start() {
        // 2024-03-14 is a Thursday
        let today = date(2024, 3, 14);
        assert_eq!(QuotaPeriod::Day.window_start(today), today);
        assert_eq!(QuotaPeriod::Week.window_start(today), date(2024, 3, 11));
        assert_eq!(QuotaPeriod::Month.window_start(today), date(2024, 3, 1));
        assert_eq!(QuotaPeriod::Year.window_start(today), date(2024, 1, 1));
    }

    #[test]
    fn test_week_window_on_monday_is_today() {
        let monday = date(2024, 3, 11);
        assert_eq!(QuotaPeriod::Week.window_start(monday), monday);
    }

    #[test]
    fn test_window_start_instant_is_midnight() {
        let now = date(2024, 3, 14).and_hms_opt(17, 45, 3).unwrap().and_utc();
        let start = QuotaPeriod::Month.window_start_instant(now);
        assert_eq!(start.to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }

    #[test]
    fn test_free_default() {
        let limit = ListingLimit::default();
        assert_eq!(limit.period, QuotaPeriod::Month);
        assert_eq!(limit.value, 5);
        assert_eq!(
            serde_json::to_value(limit).unwrap(),
            serde_json::json!({"period": "month", "value": 5})
        );
    }
}
