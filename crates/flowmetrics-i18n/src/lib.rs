//! # FlowMetrics I18n
//!
//! Localized labels for FlowMetrics using the Fluent localization system.
//!
//! Translations are embedded at compile time; a [`Localizer`] owns the
//! bundle for one locale and falls back to Brazilian Portuguese for
//! unsupported language tags.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod loader;
pub mod messages;

pub use loader::*;
pub use messages::*;
