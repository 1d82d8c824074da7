//! Period resolution: maps a period identifier to its time window and bucket
//! granularity.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, SubsecRound, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Selectable reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodId {
    /// Last 24 hours, hourly buckets.
    Today,
    /// Last 7 days, daily buckets.
    Week,
    /// Last 30 days, daily buckets.
    Month,
    /// Last 12 months, monthly buckets.
    Year,
    /// Everything, monthly buckets from the earliest record.
    All,
}

impl PeriodId {
    /// Every period, shortest first.
    pub const ALL: [Self; 5] = [Self::Today, Self::Week, Self::Month, Self::Year, Self::All];

    /// Parses English or Portuguese identifiers; anything unrecognized is
    /// [`PeriodId::All`].
    pub fn parse(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "today" | "hoje" => Self::Today,
            "week" | "semana" => Self::Week,
            "month" | "mes" | "mês" => Self::Month,
            "year" | "ano" => Self::Year,
            "all" | "total" => Self::All,
            other => {
                debug!(period = other, "Unrecognized period, using all-time");
                Self::All
            }
        }
    }

    /// English identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }

    /// Identifier used by the dashboard front end.
    pub const fn product_id(self) -> &'static str {
        match self {
            Self::Today => "hoje",
            Self::Week => "semana",
            Self::Month => "mes",
            Self::Year => "ano",
            Self::All => "total",
        }
    }

    /// Bucket size used for this period's time series.
    pub const fn granularity(self) -> Granularity {
        match self {
            Self::Today => Granularity::Hour,
            Self::Week | Self::Month => Granularity::Day,
            Self::Year | Self::All => Granularity::Month,
        }
    }

    /// Number of buckets, or `None` when it depends on the data.
    pub const fn bucket_count(self) -> Option<usize> {
        match self {
            Self::Today => Some(24),
            Self::Week => Some(7),
            Self::Month => Some(30),
            Self::Year => Some(12),
            Self::All => None,
        }
    }
}

impl FromStr for PeriodId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket size of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One bucket per local clock hour.
    Hour,
    /// One bucket per local calendar day.
    Day,
    /// One bucket per calendar month.
    Month,
}

/// Resolved period window. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodSpec {
    /// Period this window was resolved from.
    pub id: PeriodId,
    /// Bucket size.
    pub granularity: Granularity,
    /// Fixed bucket count, `None` for all-time.
    pub bucket_count: Option<usize>,
    /// Clock reading in the local calendar.
    pub now: DateTime<Tz>,
    /// Inclusive lower bound of the window; `None` for all-time.
    ///
    /// Always the start of the oldest bucket, so per-bucket figures add up
    /// to the period totals.
    pub start: Option<DateTime<Tz>>,
}

impl PeriodSpec {
    /// Local calendar date of `now`.
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    /// Local midnight of today.
    pub fn today_start(&self) -> DateTime<Tz> {
        start_of_day(&self.now.timezone(), self.today())
    }

    /// Calendar timezone of this window.
    pub fn timezone(&self) -> Tz {
        self.now.timezone()
    }

    /// Inclusive upper bound of the window: the clock reading, as UTC.
    ///
    /// Rows dated later (clock skew between backend and host) are outside
    /// every bucket and every total.
    pub fn end_utc(&self) -> DateTime<Utc> {
        self.now.with_timezone(&Utc)
    }

    /// Lower bound as UTC, for backend filters.
    pub fn start_utc(&self) -> Option<DateTime<Utc>> {
        self.start.map(|s| s.with_timezone(&Utc))
    }

    /// The equal-length window immediately before this one, as
    /// `[start, end)`; `None` for all-time.
    pub fn previous_window(&self) -> Option<(DateTime<Tz>, DateTime<Tz>)> {
        let start = self.start?;
        let length = self.now.signed_duration_since(start);
        Some((start - length, start))
    }
}

/// Turns period identifiers into [`PeriodSpec`] windows in one calendar.
#[derive(Debug, Clone, Copy)]
pub struct PeriodResolver {
    timezone: Tz,
}

impl PeriodResolver {
    /// Creates a resolver for the given calendar timezone.
    pub const fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Calendar timezone.
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Resolves `id` against the clock reading `now`.
    pub fn resolve(&self, id: PeriodId, now: DateTime<Utc>) -> PeriodSpec {
        let now = now.with_timezone(&self.timezone);
        let today = now.date_naive();

        let start = match id {
            PeriodId::Today => Some(start_of_hour(now) - Duration::hours(23)),
            PeriodId::Week => Some(start_of_day(&self.timezone, today - Duration::days(6))),
            PeriodId::Month => Some(start_of_day(&self.timezone, today - Duration::days(29))),
            PeriodId::Year => {
                let (year, month) = shift_month(today.year(), today.month(), -11);
                first_of_month(year, month).map(|date| start_of_day(&self.timezone, date))
            }
            PeriodId::All => None,
        };

        PeriodSpec {
            id,
            granularity: id.granularity(),
            bucket_count: id.bucket_count(),
            now,
            start,
        }
    }
}

/// First instant of `date` in `tz`.
///
/// Skips forward over local times erased by a DST jump.
pub fn start_of_day(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    (0..24)
        .find_map(|hour| {
            tz.from_local_datetime(&date.and_hms_opt(hour, 0, 0)?)
                .earliest()
        })
        .unwrap_or_else(|| tz.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

/// `now` truncated to the start of its local hour.
pub fn start_of_hour(now: DateTime<Tz>) -> DateTime<Tz> {
    now.trunc_subsecs(0)
        - Duration::minutes(i64::from(now.minute()))
        - Duration::seconds(i64::from(now.second()))
}

/// Moves a `(year, month)` pair by `delta` months.
pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    #[allow(clippy::cast_possible_wrap)]
    let index = year * 12 + (month as i32 - 1) + delta;
    #[allow(clippy::cast_sign_loss)]
    let month = (index.rem_euclid(12) + 1) as u32;
    (index.div_euclid(12), month)
}

/// First day of a month.
pub fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowmetrics_common::test_utils::mock_timestamp;

    fn resolver() -> PeriodResolver {
        PeriodResolver::new(Tz::UTC)
    }

    #[test]
    fn test_parse_both_languages() {
        assert_eq!(PeriodId::parse("hoje"), PeriodId::Today);
        assert_eq!(PeriodId::parse("Week"), PeriodId::Week);
        assert_eq!(PeriodId::parse(" mes "), PeriodId::Month);
        assert_eq!(PeriodId::parse("ano"), PeriodId::Year);
        assert_eq!(PeriodId::parse("total"), PeriodId::All);
    }

    #[test]
    fn test_unknown_period_is_all() {
        assert_eq!(PeriodId::parse("fortnight"), PeriodId::All);
        assert_eq!(PeriodId::parse(""), PeriodId::All);
        assert_eq!("quarter".parse::<PeriodId>(), Ok(PeriodId::All));
    }

    #[test]
    fn test_today_window() {
        let now = mock_timestamp(2024, 5, 10, 14, 35, 12);
        let spec = resolver().resolve(PeriodId::Today, now);
        assert_eq!(spec.granularity, Granularity::Hour);
        assert_eq!(
            spec.start_utc(),
            Some(mock_timestamp(2024, 5, 9, 15, 0, 0))
        );
    }

    #[test]
    fn test_week_and_month_windows() {
        let now = mock_timestamp(2024, 5, 10, 14, 35, 12);
        let week = resolver().resolve(PeriodId::Week, now);
        assert_eq!(week.start_utc(), Some(mock_timestamp(2024, 5, 4, 0, 0, 0)));
        assert_eq!(week.bucket_count, Some(7));

        let month = resolver().resolve(PeriodId::Month, now);
        assert_eq!(month.start_utc(), Some(mock_timestamp(2024, 4, 11, 0, 0, 0)));
    }

    #[test]
    fn test_year_window_crosses_year_boundary() {
        let now = mock_timestamp(2024, 3, 15, 8, 0, 0);
        let spec = resolver().resolve(PeriodId::Year, now);
        assert_eq!(spec.start_utc(), Some(mock_timestamp(2023, 4, 1, 0, 0, 0)));
    }

    #[test]
    fn test_all_has_no_start() {
        let now = mock_timestamp(2024, 3, 15, 8, 0, 0);
        let spec = resolver().resolve(PeriodId::All, now);
        assert!(spec.start.is_none());
        assert!(spec.previous_window().is_none());
        assert_eq!(spec.bucket_count, None);
    }

    #[test]
    fn test_previous_window_has_equal_length() {
        let now = mock_timestamp(2024, 5, 10, 12, 0, 0);
        let spec = resolver().resolve(PeriodId::Week, now);
        let (prev_start, prev_end) = spec.previous_window().unwrap();
        assert_eq!(prev_end, spec.start.unwrap());
        assert_eq!(
            prev_end - prev_start,
            spec.now - spec.start.unwrap()
        );
    }

    #[test]
    fn test_local_calendar_is_used() {
        // 01:30 UTC is still the previous evening in São Paulo (UTC-3)
        let now = mock_timestamp(2024, 5, 10, 1, 30, 0);
        let spec = PeriodResolver::new(chrono_tz::America::Sao_Paulo).resolve(PeriodId::Week, now);
        assert_eq!(spec.today(), NaiveDate::from_ymd_opt(2024, 5, 9).unwrap());
        assert_eq!(spec.start_utc(), Some(mock_timestamp(2024, 5, 3, 3, 0, 0)));
    }

    #[test]
    fn test_shift_month() {
        assert_eq!(shift_month(2024, 3, -11), (2023, 4));
        assert_eq!(shift_month(2024, 1, -1), (2023, 12));
        assert_eq!(shift_month(2023, 12, 1), (2024, 1));
        assert_eq!(shift_month(2024, 6, 0), (2024, 6));
    }
}
