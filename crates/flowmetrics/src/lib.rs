//! # FlowMetrics
//!
//! Process side of the StudyFlow KPI engine: owns the latest snapshot,
//! refreshes it on a fixed interval, and optionally exports each snapshot
//! as JSON for the dashboard renderer.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod dashboard;
pub mod error;

pub use dashboard::*;
pub use error::*;
