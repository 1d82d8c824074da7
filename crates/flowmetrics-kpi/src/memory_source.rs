//! In-memory row source for offline mode and tests.

use crate::query::{Query, Table};
use crate::traits::RowSource;
use async_trait::async_trait;
use flowmetrics_common::{FlowMetricsError, Result};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Tables held in memory, evaluated with the same filters the REST backend
/// understands.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<Table, Vec<Value>>,
    failing: HashSet<Table>,
}

impl MemorySource {
    /// Creates an empty source; every table has zero rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the rows of `table`.
    #[must_use]
    pub fn with_rows(mut self, table: Table, rows: Vec<Value>) -> Self {
        self.tables.insert(table, rows);
        self
    }

    /// Makes every query against `table` fail.
    #[must_use]
    pub fn failing(mut self, table: Table) -> Self {
        self.failing.insert(table);
        self
    }

    /// Builds a source from a JSON object mapping table names to row arrays.
    ///
    /// Unknown table names are ignored with a warning.
    pub fn from_json(document: Value) -> Result<Self> {
        let Value::Object(map) = document else {
            return Err(FlowMetricsError::parse(
                "Fixture must be a JSON object of table name to rows",
            ));
        };

        let mut source = Self::new();
        for (name, rows) in map {
            let Some(table) = Table::from_name(&name) else {
                warn!(table = %name, "Ignoring unknown fixture table");
                continue;
            };
            let Value::Array(rows) = rows else {
                return Err(FlowMetricsError::parse(format!(
                    "Fixture table '{name}' must be an array"
                )));
            };
            source.tables.insert(table, rows);
        }
        Ok(source)
    }

    /// Loads a fixture file, see [`MemorySource::from_json`].
    pub async fn from_fixture_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let source = Self::from_json(serde_json::from_str(&content)?)?;
        info!(
            path = %path.display(),
            tables = source.tables.len(),
            "Loaded fixture data"
        );
        Ok(source)
    }

    fn rows<'a>(&'a self, query: &Query) -> Result<Vec<&'a Value>> {
        if self.failing.contains(&query.table) {
            return Err(FlowMetricsError::query(
                query.table.name(),
                "table unavailable",
            ));
        }
        Ok(self
            .tables
            .get(&query.table)
            .into_iter()
            .flatten()
            .filter(|row| query.matches(row))
            .collect())
    }
}

fn project(row: &Value, columns: &[String]) -> Value {
    if columns.is_empty() {
        return row.clone();
    }
    let projected: Map<String, Value> = columns
        .iter()
        .filter_map(|column| row.get(column).map(|v| (column.clone(), v.clone())))
        .collect();
    Value::Object(projected)
}

#[async_trait]
impl RowSource for MemorySource {
    async fn count(&self, query: &Query) -> Result<u64> {
        let count = self.rows(query)?.len() as u64;
        debug!(table = %query.table, count, "Counted in-memory rows");
        Ok(count)
    }

    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        Ok(self
            .rows(query)?
            .into_iter()
            .map(|row| project(row, &query.columns))
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
