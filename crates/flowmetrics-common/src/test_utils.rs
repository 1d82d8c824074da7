//! Test utilities and shared test helpers for FlowMetrics.
//!
//! This module provides fixtures and helper functions used by the unit and
//! integration tests of every crate in the workspace.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize test logging once per test run.
static INIT: Once = Once::new();

/// Initialize logging for tests with a sensible default configuration.
/// This function is safe to call multiple times and will only initialize once.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        let _ = fmt().with_test_writer().with_env_filter(filter).try_init();
    });
}

/// Test fixture for creating a mock timestamp.
pub fn mock_timestamp(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    min: u32,
    sec: u32,
) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
        .unwrap()
}

/// Assert that two floating point numbers are approximately equal within a tolerance.
pub fn assert_approx_eq(left: f64, right: f64, tolerance: f64) {
    let diff = (left - right).abs();
    assert!(
        diff <= tolerance,
        "assertion failed: `{left}` is not approximately equal to `{right}` (tolerance: {tolerance}, diff: {diff})"
    );
}

/// Backend row fixtures shaped like the product's collections.
pub mod row_fixtures {
    use chrono::{DateTime, Utc};
    use serde_json::{json, Value};

    /// A `user_profiles` row.
    pub fn profile(id: &str, full_name: Option<&str>, created_at: DateTime<Utc>) -> Value {
        json!({
            "id": id,
            "full_name": full_name,
            "created_at": created_at.to_rfc3339(),
        })
    }

    /// A `study_plans` row.
    pub fn plan(
        user_id: &str,
        status: &str,
        duration: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Value {
        json!({
            "user_id": user_id,
            "status": status,
            "duration": duration,
            "created_at": created_at.to_rfc3339(),
        })
    }

    /// A `user_access_logs` row.
    pub fn access_log(device_type: &str, created_at: DateTime<Utc>) -> Value {
        json!({
            "device_type": device_type,
            "created_at": created_at.to_rfc3339(),
        })
    }

    /// A `user_daily_tracking` row; `date` is `YYYY-MM-DD`.
    pub fn tracking(user_id: &str, total_seconds: u64, date: &str) -> Value {
        json!({
            "user_id": user_id,
            "total_seconds": total_seconds,
            "date": date,
        })
    }

    /// A bare log row carrying only a creation timestamp.
    pub fn event(created_at: DateTime<Utc>) -> Value {
        json!({ "created_at": created_at.to_rfc3339() })
    }
}

/// Configuration-related test utilities.
pub mod config_fixtures {
    /// Create a minimal valid test configuration as YAML string.
    pub fn minimal_config_yaml() -> &'static str {
        r#"
backend:
  url: "http://localhost:54321"
  api_key: "test_api_key"
"#
    }

    /// Create a full test configuration as YAML string.
    pub fn full_config_yaml() -> &'static str {
        concat!(
            "backend:\n",
            "  kind: rest\n",
            "  url: \"https://project.supabase.co\"\n",
            "  api_key: \"test_api_key_full\"\n",
            "  timeout_secs: 10\n",
            "  rate_limit_per_sec: 20\n",
            "\n",
            "refresh:\n",
            "  interval_secs: 60\n",
            "  default_period: semana\n",
            "\n",
            "data:\n",
            "  timezone: \"America/Sao_Paulo\"\n",
            "  language: \"pt-BR\"\n",
            "  top_users_limit: 5\n",
            "  fallback_avg_plan_duration: 4.4\n",
            "\n",
            "logging:\n",
            "  level: debug\n",
            "  json_format: true\n"
        )
    }

    /// The same configuration as [`full_config_yaml`] in TOML.
    pub fn full_config_toml() -> &'static str {
        concat!(
            "[backend]\n",
            "kind = \"rest\"\n",
            "url = \"https://project.supabase.co\"\n",
            "api_key = \"test_api_key_full\"\n",
            "timeout_secs = 10\n",
            "rate_limit_per_sec = 20\n",
            "\n",
            "[refresh]\n",
            "interval_secs = 60\n",
            "default_period = \"semana\"\n",
            "\n",
            "[data]\n",
            "timezone = \"America/Sao_Paulo\"\n",
            "language = \"pt-BR\"\n",
            "top_users_limit = 5\n",
            "fallback_avg_plan_duration = 4.4\n",
            "\n",
            "[logging]\n",
            "level = \"debug\"\n",
            "json_format = true\n"
        )
    }
}

/// Property-based testing utilities using proptest.
#[cfg(feature = "proptest")]
pub mod property_testing {
    use crate::UserId;
    use proptest::prelude::*;

    /// Strategy for UUID-shaped user ids.
    pub fn user_id_strategy() -> impl Strategy<Value = UserId> {
        r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}".prop_map(UserId)
    }

    /// Strategy for arbitrary non-empty identifiers, including non-ASCII.
    pub fn any_id_strategy() -> impl Strategy<Value = String> {
        "\\PC{1,40}"
    }

    /// Strategy for per-day tracked seconds (0 to 24h).
    pub fn tracked_seconds_strategy() -> impl Strategy<Value = u64> {
        0u64..=86_400u64
    }
}
