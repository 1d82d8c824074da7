//! Read-only query description shared by every row source.

use chrono::{DateTime, SecondsFormat, Utc};
use flowmetrics_common::parse_timestamp;
use serde_json::Value;
use std::fmt;

/// Row collections read by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Registered users.
    UserProfiles,
    /// Study plans created by users.
    StudyPlans,
    /// Links saved by users.
    UsefulLinks,
    /// One row per dashboard access.
    UserAccessLogs,
    /// One row per generated summary.
    SummaryGenerationLogs,
    /// One row per generated plan.
    StudyPlanGenerationLogs,
    /// Per-user, per-day study time.
    UserDailyTracking,
}

impl Table {
    /// Every table the pipeline reads.
    pub const ALL: [Self; 7] = [
        Self::UserProfiles,
        Self::StudyPlans,
        Self::UsefulLinks,
        Self::UserAccessLogs,
        Self::SummaryGenerationLogs,
        Self::StudyPlanGenerationLogs,
        Self::UserDailyTracking,
    ];

    /// Backend collection name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::UserProfiles => "user_profiles",
            Self::StudyPlans => "study_plans",
            Self::UsefulLinks => "useful_links",
            Self::UserAccessLogs => "user_access_logs",
            Self::SummaryGenerationLogs => "summary_generation_logs",
            Self::StudyPlanGenerationLogs => "study_plan_generation_logs",
            Self::UserDailyTracking => "user_daily_tracking",
        }
    }

    /// Total row order used when reading the table page by page.
    pub const fn order_key(self) -> &'static str {
        match self {
            Self::UserDailyTracking => "date.asc,user_id.asc",
            Self::UserProfiles | Self::StudyPlans | Self::UserAccessLogs => "created_at.asc,id.asc",
            Self::UsefulLinks | Self::SummaryGenerationLogs | Self::StudyPlanGenerationLogs => "id.asc",
        }
    }

    /// Looks a table up by its collection name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|table| table.name() == name)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Comparison operator of a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Column equals the value.
    Eq,
    /// Column is greater than or equal to the value.
    Gte,
}

impl FilterOp {
    /// PostgREST operator token.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gte => "gte",
        }
    }
}

/// Single column condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Column name.
    pub column: String,
    /// Operator.
    pub op: FilterOp,
    /// Right-hand value as text.
    pub value: String,
}

impl Filter {
    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    /// `column >= value`
    pub fn gte(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Gte,
            value: value.into(),
        }
    }

    /// Query-string pair, e.g. `("status", "eq.active")`.
    pub fn to_query_pair(&self) -> (String, String) {
        (
            self.column.clone(),
            format!("{}.{}", self.op.token(), self.value),
        )
    }

    /// Evaluates the filter against an in-memory row.
    ///
    /// Timestamps compare chronologically when both sides parse, numbers
    /// numerically, everything else as text. A missing column never matches.
    pub fn matches(&self, row: &Value) -> bool {
        let Some(cell) = row.get(&self.column) else {
            return false;
        };

        match self.op {
            FilterOp::Eq => match cell {
                Value::String(s) => *s == self.value,
                Value::Number(n) => self
                    .value
                    .parse::<f64>()
                    .ok()
                    .zip(n.as_f64())
                    .is_some_and(|(wanted, actual)| (wanted - actual).abs() < f64::EPSILON),
                Value::Bool(b) => b.to_string() == self.value,
                _ => false,
            },
            FilterOp::Gte => match cell {
                Value::String(s) => match (parse_timestamp(s), parse_timestamp(&self.value)) {
                    (Some(actual), Some(bound)) => actual >= bound,
                    _ => s.as_str() >= self.value.as_str(),
                },
                Value::Number(n) => self
                    .value
                    .parse::<f64>()
                    .ok()
                    .zip(n.as_f64())
                    .is_some_and(|(bound, actual)| actual >= bound),
                _ => false,
            },
        }
    }
}

/// Read request against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Target table.
    pub table: Table,
    /// Projected columns; empty selects every column.
    pub columns: Vec<String>,
    /// Conditions, all of which must hold.
    pub filters: Vec<Filter>,
}

impl Query {
    /// Selects every row of `table`.
    pub const fn table(table: Table) -> Self {
        Self {
            table,
            columns: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Restricts the returned columns.
    #[must_use]
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(ToString::to_string).collect();
        self
    }

    /// Adds a condition.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Keeps rows created at or after `since`; no-op when `since` is `None`.
    #[must_use]
    pub fn created_since(self, since: Option<DateTime<Utc>>) -> Self {
        match since {
            Some(since) => self.filter(Filter::gte(
                "created_at",
                since.to_rfc3339_opts(SecondsFormat::Millis, true),
            )),
            None => self,
        }
    }

    /// `select` parameter value, `*` when no columns were given.
    pub fn select_param(&self) -> String {
        if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(",")
        }
    }

    /// Whether `row` satisfies every filter.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|filter| filter.matches(row))
    }
}
