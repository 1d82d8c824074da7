//! Bucketizer: ordered, contiguous time buckets for a period and the
//! assignment of rows to them.

use crate::period::{first_of_month, shift_month, start_of_day, start_of_hour, Granularity, PeriodId, PeriodSpec};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use flowmetrics_common::{parse_date, parse_timestamp};
use flowmetrics_i18n::Localizer;
use std::collections::HashMap;

/// Identity of a bucket in the local calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BucketKey {
    /// A local clock hour, identified by the instant it starts.
    ///
    /// Keyed by instant so a repeated DST hour yields two distinct buckets.
    Hour(DateTime<Utc>),
    /// A local calendar day.
    Day(NaiveDate),
    /// A calendar month as `(year, month)`.
    Month(i32, u32),
}

/// One time slot of a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Display label.
    pub label: String,
    /// First instant covered by the bucket.
    pub start: DateTime<Tz>,
    /// Key rows are matched against.
    pub key: BucketKey,
}

/// Groups rows into the buckets of one period.
#[derive(Debug, Clone)]
pub struct Bucketizer {
    timezone: Tz,
    end: DateTime<Utc>,
    granularity: Granularity,
    buckets: Vec<Bucket>,
    index: HashMap<BucketKey, usize>,
}

impl Bucketizer {
    /// Builds the buckets of `spec`, oldest first.
    ///
    /// `earliest` is the oldest known record; it only matters for
    /// [`PeriodId::All`], which gets one monthly bucket per month from the
    /// earliest record's month through the current month, or none at all
    /// when there are no records.
    pub fn for_period(
        spec: &PeriodSpec,
        earliest: Option<DateTime<Utc>>,
        localizer: &Localizer,
    ) -> Self {
        let tz = spec.timezone();
        let today = spec.today();

        let buckets: Vec<Bucket> = match spec.id {
            PeriodId::Today => {
                let current = start_of_hour(spec.now);
                (0..24i64)
                    .rev()
                    .map(|back| {
                        let start = current - Duration::hours(back);
                        Bucket {
                            label: start.format("%H:00").to_string(),
                            key: BucketKey::Hour(start.with_timezone(&Utc)),
                            start,
                        }
                    })
                    .collect()
            }
            PeriodId::Week | PeriodId::Month => {
                let days = spec.bucket_count.unwrap_or(0);
                (0..days)
                    .rev()
                    .map(|back| {
                        #[allow(clippy::cast_possible_wrap)]
                        let date = today - Duration::days(back as i64);
                        Bucket {
                            label: date.format("%d/%m").to_string(),
                            start: start_of_day(&tz, date),
                            key: BucketKey::Day(date),
                        }
                    })
                    .collect()
            }
            PeriodId::Year => (0..12)
                .rev()
                .filter_map(|back| {
                    let (year, month) = shift_month(today.year(), today.month(), -back);
                    month_bucket(&tz, year, month, localizer.month_abbrev(month))
                })
                .collect(),
            PeriodId::All => earliest
                .map(|earliest| {
                    let first = earliest.with_timezone(&tz).date_naive().min(today);
                    let span = (today.year() - first.year()) * 12
                        + today.month() as i32
                        - first.month() as i32;
                    (0..=span)
                        .filter_map(|offset| {
                            let (year, month) = shift_month(first.year(), first.month(), offset);
                            month_bucket(&tz, year, month, localizer.month_year(month, year))
                        })
                        .collect()
                })
                .unwrap_or_default(),
        };

        let index = buckets
            .iter()
            .enumerate()
            .map(|(i, bucket)| (bucket.key, i))
            .collect();

        Self {
            timezone: tz,
            end: spec.end_utc(),
            granularity: spec.granularity,
            buckets,
            index,
        }
    }

    /// Buckets, oldest first.
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Bucket granularity.
    pub const fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Key of the bucket an instant falls into.
    pub fn key_of(&self, timestamp: DateTime<Utc>) -> BucketKey {
        let local = timestamp.with_timezone(&self.timezone);
        match self.granularity {
            Granularity::Hour => BucketKey::Hour(start_of_hour(local).with_timezone(&Utc)),
            Granularity::Day => BucketKey::Day(local.date_naive()),
            Granularity::Month => BucketKey::Month(local.year(), local.month()),
        }
    }

    /// Key of the bucket a calendar day falls into; `None` for hourly
    /// buckets, which a whole day cannot be assigned to.
    pub fn key_of_date(&self, date: NaiveDate) -> Option<BucketKey> {
        match self.granularity {
            Granularity::Hour => None,
            Granularity::Day => Some(BucketKey::Day(date)),
            Granularity::Month => Some(BucketKey::Month(date.year(), date.month())),
        }
    }

    /// Per-bucket count of the given timestamps. Unparseable timestamps,
    /// instants after the clock reading and instants outside every bucket
    /// are ignored.
    pub fn count_timestamps<'a>(&self, timestamps: impl IntoIterator<Item = &'a str>) -> Vec<u64> {
        let mut counts = vec![0; self.buckets.len()];
        for timestamp in timestamps {
            let Some(parsed) = parse_timestamp(timestamp).filter(|ts| *ts <= self.end) else {
                continue;
            };
            if let Some(&i) = self.index.get(&self.key_of(parsed)) {
                counts[i] += 1;
            }
        }
        counts
    }

    /// Per-bucket sum of values keyed by a `YYYY-MM-DD` calendar day.
    /// Days after the local today are ignored. All zeros for hourly
    /// buckets.
    pub fn sum_by_date<'a>(&self, rows: impl IntoIterator<Item = (&'a str, u64)>) -> Vec<u64> {
        let today = self.end.with_timezone(&self.timezone).date_naive();
        let mut sums = vec![0; self.buckets.len()];
        for (date, value) in rows {
            let Some(key) = parse_date(date)
                .filter(|d| *d <= today)
                .and_then(|d| self.key_of_date(d))
            else {
                continue;
            };
            if let Some(&i) = self.index.get(&key) {
                sums[i] += value;
            }
        }
        sums
    }
}

fn month_bucket(tz: &Tz, year: i32, month: u32, label: String) -> Option<Bucket> {
    first_of_month(year, month).map(|date| Bucket {
        label,
        start: start_of_day(tz, date),
        key: BucketKey::Month(year, month),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::PeriodResolver;
    use flowmetrics_common::test_utils::mock_timestamp;

    fn localizer() -> Localizer {
        Localizer::new("pt-BR").unwrap()
    }

    fn bucketizer(id: PeriodId, now: DateTime<Utc>, earliest: Option<DateTime<Utc>>) -> Bucketizer {
        let spec = PeriodResolver::new(Tz::UTC).resolve(id, now);
        Bucketizer::for_period(&spec, earliest, &localizer())
    }

    #[test]
    fn test_fixed_bucket_counts() {
        let now = mock_timestamp(2024, 5, 10, 14, 35, 0);
        for (id, expected) in [
            (PeriodId::Today, 24),
            (PeriodId::Week, 7),
            (PeriodId::Month, 30),
            (PeriodId::Year, 12),
        ] {
            assert_eq!(bucketizer(id, now, None).buckets().len(), expected, "{id}");
        }
    }

    #[test]
    fn test_buckets_are_contiguous() {
        let now = mock_timestamp(2024, 3, 10, 14, 35, 0);
        for id in [PeriodId::Today, PeriodId::Week, PeriodId::Month, PeriodId::Year] {
            let b = bucketizer(id, now, None);
            let spec = PeriodResolver::new(Tz::UTC).resolve(id, now);
            assert_eq!(Some(b.buckets()[0].start), spec.start, "{id}");
            for pair in b.buckets().windows(2) {
                assert!(pair[0].start < pair[1].start, "{id}");
                assert_ne!(pair[0].key, pair[1].key, "{id}");
            }
        }
    }

    #[test]
    fn test_labels() {
        let now = mock_timestamp(2024, 5, 10, 14, 35, 0);
        let today = bucketizer(PeriodId::Today, now, None);
        assert_eq!(today.buckets()[0].label, "15:00");
        assert_eq!(today.buckets()[23].label, "14:00");

        let week = bucketizer(PeriodId::Week, now, None);
        assert_eq!(week.buckets()[0].label, "04/05");
        assert_eq!(week.buckets()[6].label, "10/05");

        let year = bucketizer(PeriodId::Year, now, None);
        assert_eq!(year.buckets()[0].label, "Jun");
        assert_eq!(year.buckets()[11].label, "Mai");
    }

    #[test]
    fn test_all_time_spans_from_earliest_month() {
        let now = mock_timestamp(2024, 2, 10, 0, 0, 0);
        let b = bucketizer(PeriodId::All, now, Some(mock_timestamp(2023, 11, 20, 8, 0, 0)));
        let labels: Vec<&str> = b.buckets().iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Nov/23", "Dez/23", "Jan/24", "Fev/24"]);
    }

    #[test]
    fn test_all_time_without_records_is_empty() {
        let now = mock_timestamp(2024, 2, 10, 0, 0, 0);
        assert!(bucketizer(PeriodId::All, now, None).buckets().is_empty());
    }

    #[test]
    fn test_count_timestamps_ignores_garbage_and_out_of_range() {
        let now = mock_timestamp(2024, 5, 10, 14, 35, 0);
        let b = bucketizer(PeriodId::Week, now, None);
        let counts = b.count_timestamps([
            "2024-05-10T09:00:00Z",
            "2024-05-10 23:59:59",
            "2024-05-04T00:00:00+00:00",
            "2024-05-03T23:59:59Z",
            "not a date",
            "",
        ]);
        // 23:59:59 on the 10th is after the clock reading
        assert_eq!(counts, vec![1, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_rows_after_the_clock_reading_are_ignored() {
        let now = mock_timestamp(2024, 5, 10, 14, 59, 50);
        let today = bucketizer(PeriodId::Today, now, None);
        let counts = today.count_timestamps(["2024-05-10T14:10:00Z", "2024-05-10T15:00:10Z", "2024-05-10T14:59:59Z"]);
        assert_eq!(counts[23], 1);
        assert_eq!(counts.iter().sum::<u64>(), 1);

        let year = bucketizer(PeriodId::Year, now, None);
        assert_eq!(year.sum_by_date([("2024-05-10", 10), ("2024-05-11", 5)])[11], 10);
    }

    #[test]
    fn test_hour_key_includes_the_day() {
        let now = mock_timestamp(2024, 5, 10, 14, 35, 0);
        let b = bucketizer(PeriodId::Today, now, None);
        // 10:00 yesterday is outside the window, 10:00 today is inside
        let counts = b.count_timestamps(["2024-05-09T10:15:00Z", "2024-05-10T10:15:00Z"]);
        assert_eq!(counts.iter().sum::<u64>(), 1);
        assert_eq!(counts[19], 1);
    }

    #[test]
    fn test_sum_by_date() {
        let now = mock_timestamp(2024, 5, 10, 14, 35, 0);
        let week = bucketizer(PeriodId::Week, now, None);
        let sums = week.sum_by_date([("2024-05-09", 3600), ("2024-05-09", 1800), ("bad", 99)]);
        assert_eq!(sums[5], 5400);
        assert_eq!(sums.iter().sum::<u64>(), 5400);

        let year = bucketizer(PeriodId::Year, now, None);
        assert_eq!(year.sum_by_date([("2024-05-01", 10), ("2023-06-30", 5)])[11], 10);
        assert_eq!(year.sum_by_date([("2023-06-30", 5)])[0], 5);

        let today = bucketizer(PeriodId::Today, now, None);
        assert!(today.sum_by_date([("2024-05-10", 3600)]).iter().all(|s| *s == 0));
    }

    #[test]
    fn test_local_calendar_assignment() {
        // 02:00 UTC on the 10th is still the 9th in São Paulo
        let now = mock_timestamp(2024, 5, 10, 15, 0, 0);
        let spec = PeriodResolver::new(chrono_tz::America::Sao_Paulo).resolve(PeriodId::Week, now);
        let b = Bucketizer::for_period(&spec, None, &localizer());
        let counts = b.count_timestamps(["2024-05-10T02:00:00Z"]);
        assert_eq!(counts[5], 1);
    }
}
