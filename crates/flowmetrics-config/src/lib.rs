//! # FlowMetrics Config
//!
//! Type-safe configuration management for FlowMetrics.
//!
//! This crate provides configuration loading from YAML, TOML or JSON files,
//! environment overrides, validation, and lock-free caching with atomic
//! updates.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod defaults;
pub mod loader;
pub mod schema;
pub mod validator;

pub use cache::*;
pub use defaults::*;
pub use loader::*;
pub use schema::*;
pub use validator::*;
