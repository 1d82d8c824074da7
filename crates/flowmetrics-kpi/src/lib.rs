//! # FlowMetrics KPI
//!
//! The KPI aggregation pipeline of the StudyFlow dashboard.
//!
//! A run resolves the selected period into buckets, queries the backend
//! concurrently through a [`RowSource`], groups the returned rows into time
//! buckets, computes growth, activation and ranking figures, and assembles
//! everything into one immutable [`KpiSnapshot`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregator;
pub mod bucket;
pub mod data_fetcher;
pub mod memory_source;
pub mod period;
pub mod pipeline;
pub mod query;
pub mod ranking;
pub mod rest_source;
pub mod rows;
pub mod snapshot;
pub mod traits;

pub use aggregator::{Aggregates, Aggregator, SignupFigures};
pub use bucket::*;
pub use data_fetcher::*;
pub use memory_source::*;
pub use period::*;
pub use pipeline::*;
pub use query::*;
pub use ranking::*;
pub use rest_source::*;
pub use rows::*;
pub use snapshot::*;
pub use traits::*;
