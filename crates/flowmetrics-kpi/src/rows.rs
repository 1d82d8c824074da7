//! Typed views over the raw backend rows.
//!
//! Timestamps stay as the backend sent them; the bucketizer parses them and
//! silently drops the ones it cannot read.

use flowmetrics_common::UserId;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// A `user_profiles` row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileRow {
    /// Profile id.
    pub id: UserId,
    /// Display name, when the user set one.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Signup timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A `study_plans` row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlanRow {
    /// Owner of the plan.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Free-text duration, e.g. `"4 semanas"`.
    #[serde(default)]
    pub duration: Option<String>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A `user_access_logs` row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessLogRow {
    /// `desktop`, `mobile`, or anything else the client reported.
    #[serde(default)]
    pub device_type: Option<String>,
    /// Access timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A `user_daily_tracking` row: study time of one user on one day.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrackingRow {
    /// Tracked user.
    pub user_id: UserId,
    /// Seconds studied that day.
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub total_seconds: u64,
    /// Local calendar day, `YYYY-MM-DD`.
    pub date: String,
}

/// Accepts integers, non-negative floats, numeric strings and `null`.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(f64_to_seconds))
            .ok_or_else(|| de::Error::custom(format!("invalid seconds value {n}"))),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<u64>()
                .ok()
                .or_else(|| {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && *f >= 0.0)
                        .map(f64_to_seconds)
                })
                .ok_or_else(|| de::Error::custom(format!("invalid seconds value '{s}'")))
        }
        other => Err(de::Error::custom(format!("invalid seconds value {other}"))),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn f64_to_seconds(value: f64) -> u64 {
    value.round() as u64
}

/// Decodes rows of `table`, dropping rows that do not fit `T`.
pub fn decode_rows<T: DeserializeOwned>(table: &str, values: Vec<Value>) -> Vec<T> {
    let total = values.len();
    let rows: Vec<T> = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(row) => Some(row),
            Err(e) => {
                debug!(table, error = %e, "Skipping malformed row");
                None
            }
        })
        .collect();

    if rows.len() < total {
        debug!(table, kept = rows.len(), total, "Dropped malformed rows");
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tracking_seconds_forms() {
        let rows: Vec<TrackingRow> = decode_rows(
            "user_daily_tracking",
            vec![
                json!({"user_id": "a", "total_seconds": 60, "date": "2024-05-01"}),
                json!({"user_id": "a", "total_seconds": "120", "date": "2024-05-01"}),
                json!({"user_id": "a", "total_seconds": 30.4, "date": "2024-05-01"}),
                json!({"user_id": "a", "total_seconds": null, "date": "2024-05-01"}),
                json!({"user_id": "a", "date": "2024-05-01"}),
            ],
        );
        let seconds: Vec<u64> = rows.iter().map(|r| r.total_seconds).collect();
        assert_eq!(seconds, vec![60, 120, 30, 0, 0]);
    }

    #[test]
    fn test_unparseable_seconds_drop_the_row() {
        let rows: Vec<TrackingRow> = decode_rows(
            "user_daily_tracking",
            vec![
                json!({"user_id": "a", "total_seconds": "lots", "date": "2024-05-01"}),
                json!({"user_id": "a", "total_seconds": -5, "date": "2024-05-01"}),
                json!({"user_id": "b", "total_seconds": 10, "date": "2024-05-01"}),
            ],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, UserId::new("b"));
    }

    #[test]
    fn test_rows_without_required_fields_are_dropped() {
        let rows: Vec<ProfileRow> = decode_rows(
            "user_profiles",
            vec![json!({"full_name": "No Id"}), json!({"id": "u1"})],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].full_name, None);
        assert_eq!(rows[0].created_at, None);
    }
}
