//! Aggregator: per-bucket series, growth figures, activation, device split
//! and the user ranking, computed from the rows of one fetch.

use crate::bucket::Bucketizer;
use crate::data_fetcher::RawData;
use crate::period::{start_of_day, PeriodId, PeriodSpec};
use crate::ranking::rank_users;
use crate::rows::{AccessLogRow, PlanRow, ProfileRow, TrackingRow};
use crate::snapshot::{AcquisitionPoint, DeviceStat, UsagePoint, UserRanking};
use chrono::{DateTime, Duration, Utc};
use flowmetrics_common::{first_integer, growth_rate, parse_date, parse_timestamp, percentage, seconds_to_hours};
use flowmetrics_i18n::Localizer;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Chart colour of desktop accesses.
pub const DESKTOP_COLOR: &str = "#d946ef";
/// Chart colour of mobile accesses.
pub const MOBILE_COLOR: &str = "#3b82f6";

/// Signup counts and growth figures.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignupFigures {
    /// Signups since local midnight.
    pub new_users_today: u64,
    /// Signups during the previous local day.
    pub new_users_yesterday: u64,
    /// Trailing 7 days against the 7 days before; 0 on an empty baseline.
    pub weekly_growth: f64,
    /// Signups since the period start.
    pub period_users: u64,
    /// Period against the previous equal-length window; 0 on an empty
    /// baseline and for all-time.
    pub period_growth: f64,
}

/// Every computed figure of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregates {
    /// Mean plan duration, or the fallback.
    pub avg_plan_duration: f64,
    /// Desktop and mobile split.
    pub device_stats: Vec<DeviceStat>,
    /// Signup figures.
    pub signups: SignupFigures,
    /// Percent of users owning at least one plan.
    pub activation_rate: f64,
    /// Access-log rows in the period.
    pub period_sessions: u64,
    /// Signups per bucket.
    pub acquisition_trend: Vec<AcquisitionPoint>,
    /// Sessions and hours per bucket.
    pub usage_trend: Vec<UsagePoint>,
    /// Top users.
    pub rankings: Vec<UserRanking>,
}

/// Computes [`Aggregates`] from [`RawData`].
#[derive(Debug, Clone)]
pub struct Aggregator {
    localizer: Arc<Localizer>,
    top_users_limit: usize,
    fallback_avg_plan_duration: f64,
}

impl Aggregator {
    /// Creates an aggregator.
    pub fn new(localizer: Arc<Localizer>, top_users_limit: usize, fallback_avg_plan_duration: f64) -> Self {
        Self {
            localizer,
            top_users_limit,
            fallback_avg_plan_duration,
        }
    }

    /// Aggregates one fetch for the period `spec`.
    pub fn aggregate(&self, spec: &PeriodSpec, raw: &RawData) -> Aggregates {
        let earliest = match spec.id {
            PeriodId::All => earliest_record(spec, raw),
            _ => None,
        };
        let bucketizer = Bucketizer::for_period(spec, earliest, &self.localizer);
        debug!(
            period = %spec.id,
            buckets = bucketizer.buckets().len(),
            "Bucketized period"
        );

        Aggregates {
            avg_plan_duration: average_plan_duration(&raw.plan_durations, self.fallback_avg_plan_duration),
            device_stats: device_breakdown(&raw.access_logs, &self.localizer),
            signups: signup_figures(spec, &raw.profiles),
            activation_rate: activation_rate(&raw.plan_owners, raw.total_users),
            period_sessions: period_sessions(spec, &raw.access_logs),
            acquisition_trend: acquisition_trend(&bucketizer, &raw.profiles),
            usage_trend: usage_trend(&bucketizer, &raw.access_logs, &raw.tracking),
            rankings: rank_users(&raw.profiles, &raw.tracking, self.top_users_limit, &self.localizer),
        }
    }
}

/// Desktop and mobile counts with their rounded share of all accesses.
pub fn device_breakdown(logs: &[AccessLogRow], localizer: &Localizer) -> Vec<DeviceStat> {
    let total = logs.len() as u64;
    let count_of = |device: &str| {
        logs.iter()
            .filter(|log| {
                log.device_type
                    .as_deref()
                    .is_some_and(|d| d.trim().eq_ignore_ascii_case(device))
            })
            .count() as u64
    };

    [
        ("desktop", "device-desktop", DESKTOP_COLOR),
        ("mobile", "device-mobile", MOBILE_COLOR),
    ]
    .into_iter()
    .map(|(device, message, color)| {
        let count = count_of(device);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let value = percentage(count, total).round() as u32;
        DeviceStat {
            name: localizer.get(message),
            value,
            count,
            color: color.to_string(),
        }
    })
    .collect()
}

/// Mean of the first integer in each plan's duration text, or `fallback`
/// when no plan carries one.
#[allow(clippy::cast_precision_loss)]
pub fn average_plan_duration(plans: &[PlanRow], fallback: f64) -> f64 {
    let durations: Vec<u32> = plans
        .iter()
        .filter_map(|plan| plan.duration.as_deref().and_then(first_integer))
        .collect();

    if durations.is_empty() {
        return fallback;
    }
    let sum: f64 = durations.iter().map(|d| f64::from(*d)).sum();
    sum / durations.len() as f64
}

/// Signup counts relative to the local calendar and the period window.
pub fn signup_figures(spec: &PeriodSpec, profiles: &[ProfileRow]) -> SignupFigures {
    let end = spec.end_utc();
    let signups: Vec<DateTime<Utc>> = profiles
        .iter()
        .filter_map(|p| p.created_at.as_deref().and_then(parse_timestamp))
        .filter(|ts| *ts <= end)
        .collect();

    let tz = spec.timezone();
    let today = spec.today();
    let day_start = |days_back: i64| start_of_day(&tz, today - Duration::days(days_back)).with_timezone(&Utc);
    let count_in = |from: DateTime<Utc>, until: Option<DateTime<Utc>>| {
        signups
            .iter()
            .filter(|ts| **ts >= from && until.map_or(true, |end| **ts < end))
            .count() as u64
    };

    let today_start = day_start(0);
    let last_week = day_start(7);
    let previous_week = day_start(14);

    let last_7 = count_in(last_week, None);
    let prev_7 = count_in(previous_week, Some(last_week));

    let (period_users, period_growth) = match (spec.start_utc(), spec.previous_window()) {
        (Some(start), Some((prev_start, prev_end))) => {
            let current = count_in(start, None);
            let previous = count_in(
                prev_start.with_timezone(&Utc),
                Some(prev_end.with_timezone(&Utc)),
            );
            (current, growth_rate(current, previous))
        }
        _ => (signups.len() as u64, 0.0),
    };

    SignupFigures {
        new_users_today: count_in(today_start, None),
        new_users_yesterday: count_in(day_start(1), Some(today_start)),
        weekly_growth: growth_rate(last_7, prev_7),
        period_users,
        period_growth,
    }
}

/// Percent of `total_users` owning at least one plan; 0 without users.
pub fn activation_rate(plan_owners: &[PlanRow], total_users: u64) -> f64 {
    let activated: HashSet<&str> = plan_owners
        .iter()
        .filter_map(|plan| plan.user_id.as_ref().map(|id| id.as_str()))
        .collect();
    percentage(activated.len() as u64, total_users)
}

/// Access-log rows with a readable timestamp between the period start and
/// the clock reading.
pub fn period_sessions(spec: &PeriodSpec, logs: &[AccessLogRow]) -> u64 {
    let start = spec.start_utc();
    let end = spec.end_utc();
    logs.iter()
        .filter_map(|log| log.created_at.as_deref().and_then(parse_timestamp))
        .filter(|ts| start.map_or(true, |s| *ts >= s) && *ts <= end)
        .count() as u64
}

/// Oldest signup, access or tracked day; anchors the all-time buckets.
/// Records dated after the clock reading are ignored.
pub fn earliest_record(spec: &PeriodSpec, raw: &RawData) -> Option<DateTime<Utc>> {
    let tz = spec.timezone();
    let end = spec.end_utc();
    let signups = raw
        .profiles
        .iter()
        .filter_map(|p| p.created_at.as_deref().and_then(parse_timestamp));
    let accesses = raw
        .access_logs
        .iter()
        .filter_map(|l| l.created_at.as_deref().and_then(parse_timestamp));
    let tracked = raw
        .tracking
        .iter()
        .filter_map(|t| parse_date(&t.date))
        .map(|date| start_of_day(&tz, date).with_timezone(&Utc));

    signups.chain(accesses).chain(tracked).filter(|ts| *ts <= end).min()
}

/// Signups per bucket.
pub fn acquisition_trend(bucketizer: &Bucketizer, profiles: &[ProfileRow]) -> Vec<AcquisitionPoint> {
    let counts = bucketizer.count_timestamps(profiles.iter().filter_map(|p| p.created_at.as_deref()));
    bucketizer
        .buckets()
        .iter()
        .zip(counts)
        .map(|(bucket, new_users)| AcquisitionPoint {
            day: bucket.label.clone(),
            new_users,
        })
        .collect()
}

/// Sessions and study hours per bucket. Hours are 0 for hourly buckets.
pub fn usage_trend(
    bucketizer: &Bucketizer,
    logs: &[AccessLogRow],
    tracking: &[TrackingRow],
) -> Vec<UsagePoint> {
    let sessions = bucketizer.count_timestamps(logs.iter().filter_map(|l| l.created_at.as_deref()));
    let seconds = bucketizer.sum_by_date(tracking.iter().map(|t| (t.date.as_str(), t.total_seconds)));

    bucketizer
        .buckets()
        .iter()
        .zip(sessions.into_iter().zip(seconds))
        .map(|(bucket, (sessions, seconds))| UsagePoint {
            name: bucket.label.clone(),
            sessions,
            hours: seconds_to_hours(seconds),
        })
        .collect()
}
