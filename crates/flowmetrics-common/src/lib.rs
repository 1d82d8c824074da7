//! # FlowMetrics Common
//!
//! Shared types, utilities, and common functionality for FlowMetrics.
//!
//! This crate provides the foundational error type, newtypes, time and
//! number helpers, and logging setup used across the other crates in the
//! FlowMetrics workspace.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod logging;
pub mod types;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

pub use error::*;
pub use logging::*;
pub use types::*;
pub use utils::*;
