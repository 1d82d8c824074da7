//! The KPI snapshot handed to renderers and exporters, and its assembler.

use crate::aggregator::Aggregates;
use crate::data_fetcher::RawData;
use crate::period::PeriodId;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use flowmetrics_common::{DataOrigin, UserId};
use flowmetrics_i18n::Localizer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Share of accesses from one device class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStat {
    /// Localized device name.
    pub name: String,
    /// Rounded share of all accesses, `0..=100`.
    pub value: u32,
    /// Number of accesses.
    pub count: u64,
    /// Chart colour.
    pub color: String,
}

/// New signups in one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionPoint {
    /// Bucket label.
    pub day: String,
    /// Signups in the bucket.
    pub new_users: u64,
}

/// Sessions and study time in one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsagePoint {
    /// Bucket label.
    pub name: String,
    /// Access-log rows in the bucket.
    pub sessions: u64,
    /// Tracked study hours, one decimal.
    pub hours: f64,
}

/// Display-only content split derived from the user id.
///
/// Not measured; `origin` is always [`DataOrigin::Heuristic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticContentMix {
    /// Video share.
    pub video_percentage: u32,
    /// Reading share; `100 - video_percentage`.
    pub reading_percentage: u32,
    /// Provenance tag.
    pub origin: DataOrigin,
}

/// One row of the top-users ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRanking {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Avatar image URL.
    pub avatar: String,
    /// Accumulated study time as `"{h}h {m}m"`.
    pub study_time: String,
    /// Accumulated study seconds.
    pub study_seconds: u64,
    /// Synthetic content split.
    pub content_mix: SyntheticContentMix,
}

/// Result of one pipeline run. Replaced wholesale by the next run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSnapshot {
    /// Period the figures cover.
    pub period: PeriodId,
    /// Registered users.
    pub total_users: u64,
    /// All plans.
    pub total_plans: u64,
    /// Plans in progress.
    pub active_plans: u64,
    /// Saved links.
    pub total_links: u64,
    /// Summaries generated since the period start.
    pub summaries_generated: u64,
    /// Plans generated since the period start.
    pub plan_generations: u64,
    /// Mean plan length in the unit users typed, usually weeks.
    pub avg_plan_duration: f64,
    /// Desktop and mobile share of the period's accesses.
    pub device_stats: Vec<DeviceStat>,
    /// Signups since local midnight.
    pub new_users_today: u64,
    /// Signups during the previous local day.
    pub new_users_yesterday: u64,
    /// Signups of the trailing 7 days against the 7 days before, in percent.
    pub weekly_growth: f64,
    /// Users with at least one plan, in percent of all users.
    pub activation_rate: f64,
    /// Signups since the period start.
    pub period_users: u64,
    /// Signups against the previous equal-length window, in percent.
    pub period_growth: f64,
    /// Access-log rows since the period start.
    pub period_sessions: u64,
    /// Signups per bucket, oldest first.
    pub user_acquisition_trend: Vec<AcquisitionPoint>,
    /// Sessions and study hours per bucket, oldest first.
    pub usage_trend: Vec<UsagePoint>,
    /// Top users by accumulated study time.
    pub user_metrics: Vec<UserRanking>,
    /// Queries that failed during this run.
    pub failed_queries: Vec<String>,
    /// Set when the figures are neutral defaults rather than data.
    pub degraded: bool,
    /// When the run finished.
    pub last_update: DateTime<Utc>,
    /// `last_update` in the configured locale and timezone.
    pub last_update_display: String,
}

/// Merges fetched counts and computed figures into a [`KpiSnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotAssembler {
    localizer: Arc<Localizer>,
    timezone: Tz,
    fallback_avg_plan_duration: f64,
}

impl SnapshotAssembler {
    /// Creates an assembler rendering timestamps with `localizer` in
    /// `timezone`.
    pub fn new(localizer: Arc<Localizer>, timezone: Tz, fallback_avg_plan_duration: f64) -> Self {
        Self {
            localizer,
            timezone,
            fallback_avg_plan_duration,
        }
    }

    /// Builds the snapshot of a completed run.
    pub fn assemble(
        &self,
        period: PeriodId,
        raw: &RawData,
        aggregates: Aggregates,
        now: DateTime<Utc>,
    ) -> KpiSnapshot {
        KpiSnapshot {
            period,
            total_users: raw.total_users,
            total_plans: raw.total_plans,
            active_plans: raw.active_plans,
            total_links: raw.total_links,
            summaries_generated: raw.summaries_generated,
            plan_generations: raw.plan_generations,
            avg_plan_duration: aggregates.avg_plan_duration,
            device_stats: aggregates.device_stats,
            new_users_today: aggregates.signups.new_users_today,
            new_users_yesterday: aggregates.signups.new_users_yesterday,
            weekly_growth: aggregates.signups.weekly_growth,
            activation_rate: aggregates.activation_rate,
            period_users: aggregates.signups.period_users,
            period_growth: aggregates.signups.period_growth,
            period_sessions: aggregates.period_sessions,
            user_acquisition_trend: aggregates.acquisition_trend,
            usage_trend: aggregates.usage_trend,
            user_metrics: aggregates.rankings,
            failed_queries: raw.failed_queries.clone(),
            degraded: false,
            last_update: now,
            last_update_display: self.display_time(now),
        }
    }

    /// The neutral snapshot: zero counts, empty series, fallback average.
    pub fn fallback(&self, period: PeriodId, now: DateTime<Utc>) -> KpiSnapshot {
        KpiSnapshot {
            period,
            total_users: 0,
            total_plans: 0,
            active_plans: 0,
            total_links: 0,
            summaries_generated: 0,
            plan_generations: 0,
            avg_plan_duration: self.fallback_avg_plan_duration,
            device_stats: crate::aggregator::device_breakdown(&[], &self.localizer),
            new_users_today: 0,
            new_users_yesterday: 0,
            weekly_growth: 0.0,
            activation_rate: 0.0,
            period_users: 0,
            period_growth: 0.0,
            period_sessions: 0,
            user_acquisition_trend: Vec::new(),
            usage_trend: Vec::new(),
            user_metrics: Vec::new(),
            failed_queries: Vec::new(),
            degraded: true,
            last_update: now,
            last_update_display: self.display_time(now),
        }
    }

    fn display_time(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.timezone)
            .format(&self.localizer.datetime_format())
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowmetrics_common::test_utils::mock_timestamp;

    fn assembler() -> SnapshotAssembler {
        SnapshotAssembler::new(
            Arc::new(Localizer::new("pt-BR").unwrap()),
            chrono_tz::America::Sao_Paulo,
            4.4,
        )
    }

    #[test]
    fn test_fallback_is_neutral() {
        let now = mock_timestamp(2024, 5, 10, 15, 7, 0);
        let snapshot = assembler().fallback(PeriodId::Month, now);

        assert!(snapshot.degraded);
        assert_eq!(snapshot.total_users, 0);
        assert_eq!(snapshot.activation_rate, 0.0);
        assert_eq!(snapshot.avg_plan_duration, 4.4);
        assert!(snapshot.usage_trend.is_empty());
        assert_eq!(snapshot.device_stats.len(), 2);
        assert!(snapshot.device_stats.iter().all(|d| d.value == 0 && d.count == 0));
        assert_eq!(snapshot.last_update_display, "10/05/2024, 12:07");
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let now = mock_timestamp(2024, 5, 10, 15, 7, 0);
        let json = serde_json::to_value(assembler().fallback(PeriodId::Week, now)).unwrap();
        assert_eq!(json["period"], "week");
        assert_eq!(json["newUsersToday"], 0);
        assert!(json["userAcquisitionTrend"].as_array().unwrap().is_empty());
        assert_eq!(json["deviceStats"][0]["color"], "#d946ef");
    }

    #[test]
    fn test_content_mix_is_tagged_heuristic() {
        let mix = SyntheticContentMix {
            video_percentage: 55,
            reading_percentage: 45,
            origin: DataOrigin::Heuristic,
        };
        let json = serde_json::to_value(mix).unwrap();
        assert_eq!(json["origin"], "heuristic");
        assert_eq!(json["videoPercentage"], 55);
    }
}
