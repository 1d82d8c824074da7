//! Backend seam of the pipeline.

use crate::query::Query;
use async_trait::async_trait;
use flowmetrics_common::Result;
use serde_json::Value;

/// Read-only source of backend rows.
///
/// Implementations must be safe to query concurrently; the fetcher issues
/// every query of a run at once.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Number of rows matching `query`.
    async fn count(&self, query: &Query) -> Result<u64>;

    /// Rows matching `query`, projected to its columns.
    async fn select(&self, query: &Query) -> Result<Vec<Value>>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
