//! Raw fetcher: issues every backend query of a run concurrently and keeps
//! whatever succeeded.

use crate::query::{Filter, Query, Table};
use crate::rows::{decode_rows, AccessLogRow, PlanRow, ProfileRow, TrackingRow};
use crate::traits::RowSource;
use chrono::{DateTime, Utc};
use flowmetrics_common::Result;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Plan status counted as active.
pub const ACTIVE_PLAN_STATUS: &str = "in_progress";

/// Everything one run reads from the backend.
///
/// Counts and row sets of failed queries are zero/empty; their names are
/// listed in `failed_queries`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawData {
    /// All registered users.
    pub total_users: u64,
    /// All plans.
    pub total_plans: u64,
    /// Plans in progress.
    pub active_plans: u64,
    /// All saved links.
    pub total_links: u64,
    /// Summaries generated since the period start.
    pub summaries_generated: u64,
    /// Plans generated since the period start.
    pub plan_generations: u64,
    /// Access logs since the period start.
    pub access_logs: Vec<AccessLogRow>,
    /// Plans created since the period start, for durations.
    pub plan_durations: Vec<PlanRow>,
    /// Every profile.
    pub profiles: Vec<ProfileRow>,
    /// Every plan's owner.
    pub plan_owners: Vec<PlanRow>,
    /// Every daily tracking row.
    pub tracking: Vec<TrackingRow>,
    /// Names of the queries that failed.
    pub failed_queries: Vec<String>,
}

impl RawData {
    /// Number of queries a fetch issues.
    pub const QUERY_COUNT: usize = 11;

    /// Whether every query of the run failed.
    pub fn all_failed(&self) -> bool {
        self.failed_queries.len() >= Self::QUERY_COUNT
    }
}

/// Issues the queries of one pipeline run against a [`RowSource`].
#[derive(Clone)]
pub struct RawFetcher {
    source: Arc<dyn RowSource>,
}

impl RawFetcher {
    /// Creates a fetcher over `source`.
    pub fn new(source: Arc<dyn RowSource>) -> Self {
        Self { source }
    }

    /// Name of the underlying source.
    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Runs every query concurrently; period-scoped queries keep rows
    /// created at or after `since`.
    ///
    /// Never fails: a failed query is logged and contributes no data.
    #[instrument(skip(self), fields(source = self.source.name()))]
    pub async fn fetch(&self, since: Option<DateTime<Utc>>) -> RawData {
        let profiles = Query::table(Table::UserProfiles);
        let plans = Query::table(Table::StudyPlans);
        let active_plans = Query::table(Table::StudyPlans)
            .filter(Filter::eq("status", ACTIVE_PLAN_STATUS));
        let links = Query::table(Table::UsefulLinks);
        let access_logs = Query::table(Table::UserAccessLogs)
            .select(&["device_type", "created_at"])
            .created_since(since);
        let summaries = Query::table(Table::SummaryGenerationLogs).created_since(since);
        let generations = Query::table(Table::StudyPlanGenerationLogs).created_since(since);
        let durations = Query::table(Table::StudyPlans)
            .select(&["duration", "created_at"])
            .created_since(since);
        let profile_rows =
            Query::table(Table::UserProfiles).select(&["id", "full_name", "created_at"]);
        let owners = Query::table(Table::StudyPlans).select(&["user_id", "created_at"]);
        let tracking = Query::table(Table::UserDailyTracking)
            .select(&["user_id", "total_seconds", "date"]);

        let (
            total_users,
            total_plans,
            active_plans,
            total_links,
            access_logs,
            summaries_generated,
            plan_generations,
            plan_durations,
            profiles_rows,
            plan_owners,
            tracking,
        ) = futures::join!(
            self.source.count(&profiles),
            self.source.count(&plans),
            self.source.count(&active_plans),
            self.source.count(&links),
            self.source.select(&access_logs),
            self.source.count(&summaries),
            self.source.count(&generations),
            self.source.select(&durations),
            self.source.select(&profile_rows),
            self.source.select(&owners),
            self.source.select(&tracking),
        );

        let mut failed = Vec::new();
        let data = RawData {
            total_users: settle_count("total users", total_users, &mut failed),
            total_plans: settle_count("total plans", total_plans, &mut failed),
            active_plans: settle_count("active plans", active_plans, &mut failed),
            total_links: settle_count("total links", total_links, &mut failed),
            summaries_generated: settle_count("summaries", summaries_generated, &mut failed),
            plan_generations: settle_count("plan generations", plan_generations, &mut failed),
            access_logs: settle_rows("access logs", Table::UserAccessLogs, access_logs, &mut failed),
            plan_durations: settle_rows("plan durations", Table::StudyPlans, plan_durations, &mut failed),
            profiles: settle_rows("profiles", Table::UserProfiles, profiles_rows, &mut failed),
            plan_owners: settle_rows("plan owners", Table::StudyPlans, plan_owners, &mut failed),
            tracking: settle_rows("daily tracking", Table::UserDailyTracking, tracking, &mut failed),
            failed_queries: failed,
        };

        debug!(
            failed = data.failed_queries.len(),
            profiles = data.profiles.len(),
            access_logs = data.access_logs.len(),
            tracking = data.tracking.len(),
            "Fetch settled"
        );
        data
    }
}

impl std::fmt::Debug for RawFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFetcher")
            .field("source", &self.source.name())
            .finish()
    }
}

fn settle_count(name: &str, result: Result<u64>, failed: &mut Vec<String>) -> u64 {
    result.unwrap_or_else(|e| {
        error!(query = name, error = %e, "Query failed");
        failed.push(name.to_string());
        0
    })
}

fn settle_rows<T: DeserializeOwned>(
    name: &str,
    table: Table,
    result: Result<Vec<serde_json::Value>>,
    failed: &mut Vec<String>,
) -> Vec<T> {
    match result {
        Ok(values) => decode_rows(table.name(), values),
        Err(e) => {
            error!(query = name, error = %e, "Query failed");
            failed.push(name.to_string());
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_source::MemorySource;
    use flowmetrics_common::test_utils::{mock_timestamp, row_fixtures};

    #[tokio::test]
    async fn test_empty_source_yields_defaults() {
        let fetcher = RawFetcher::new(Arc::new(MemorySource::new()));
        let data = fetcher.fetch(None).await;
        assert_eq!(data, RawData::default());
        assert!(!data.all_failed());
    }

    #[tokio::test]
    async fn test_failed_table_does_not_abort_others() {
        let ts = mock_timestamp(2024, 5, 1, 12, 0, 0);
        let source = MemorySource::new()
            .with_rows(
                Table::UserProfiles,
                vec![row_fixtures::profile("u1", Some("Ana"), ts)],
            )
            .failing(Table::StudyPlans);

        let data = RawFetcher::new(Arc::new(source)).fetch(None).await;
        assert_eq!(data.total_users, 1);
        assert_eq!(data.profiles.len(), 1);
        assert_eq!(data.total_plans, 0);
        assert_eq!(
            data.failed_queries,
            vec!["total plans", "active plans", "plan durations", "plan owners"]
        );
    }

    #[tokio::test]
    async fn test_period_scope_applies_to_logs_only() {
        let old = mock_timestamp(2024, 1, 1, 12, 0, 0);
        let recent = mock_timestamp(2024, 5, 1, 12, 0, 0);
        let source = MemorySource::new()
            .with_rows(
                Table::UserAccessLogs,
                vec![
                    row_fixtures::access_log("desktop", old),
                    row_fixtures::access_log("mobile", recent),
                ],
            )
            .with_rows(
                Table::UserProfiles,
                vec![
                    row_fixtures::profile("u1", None, old),
                    row_fixtures::profile("u2", None, recent),
                ],
            );

        let since = Some(mock_timestamp(2024, 4, 1, 0, 0, 0));
        let data = RawFetcher::new(Arc::new(source)).fetch(since).await;
        assert_eq!(data.access_logs.len(), 1);
        assert_eq!(data.access_logs[0].device_type.as_deref(), Some("mobile"));
        assert_eq!(data.profiles.len(), 2);
    }

    #[tokio::test]
    async fn test_every_query_failing() {
        let source = Table::ALL
            .into_iter()
            .fold(MemorySource::new(), MemorySource::failing);
        let data = RawFetcher::new(Arc::new(source)).fetch(None).await;
        assert!(data.all_failed());
    }
}
