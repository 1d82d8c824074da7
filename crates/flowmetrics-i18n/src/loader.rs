//! Embedded Fluent resources and bundle construction.

use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::FluentResource;
use flowmetrics_common::{FlowMetricsError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

/// Locales shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupportedLocale {
    /// Brazilian Portuguese, the product's primary language.
    #[serde(rename = "pt-BR")]
    PtBr,
    /// American English.
    #[serde(rename = "en-US")]
    EnUs,
}

impl SupportedLocale {
    /// Every shipped locale.
    pub const ALL: [Self; 2] = [Self::PtBr, Self::EnUs];

    /// BCP 47 tag.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::PtBr => "pt-BR",
            Self::EnUs => "en-US",
        }
    }

    /// Picks the shipped locale matching the primary language of `tag`.
    ///
    /// Unknown or malformed tags resolve to [`SupportedLocale::PtBr`].
    pub fn resolve(tag: &str) -> Self {
        match tag.parse::<LanguageIdentifier>() {
            Ok(id) => match id.language.as_str() {
                "pt" => Self::PtBr,
                "en" => Self::EnUs,
                other => {
                    warn!(language = other, "Unsupported language, falling back to pt-BR");
                    Self::PtBr
                }
            },
            Err(e) => {
                warn!(tag, error = %e, "Malformed language tag, falling back to pt-BR");
                Self::PtBr
            }
        }
    }

    /// Parsed language identifier.
    pub fn language_id(self) -> Result<LanguageIdentifier> {
        self.tag().parse().map_err(|e: unic_langid::LanguageIdentifierError| {
            FlowMetricsError::localization(e.to_string(), Some(self.tag().to_string()))
        })
    }
}

impl fmt::Display for SupportedLocale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Raw `.ftl` sources keyed by locale.
static FTL_SOURCES: Lazy<HashMap<SupportedLocale, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (SupportedLocale::PtBr, include_str!("../locales/pt-BR.ftl")),
        (SupportedLocale::EnUs, include_str!("../locales/en-US.ftl")),
    ])
});

/// Returns the embedded Fluent source for `locale`.
pub fn ftl_source(locale: SupportedLocale) -> &'static str {
    FTL_SOURCES.get(&locale).copied().unwrap_or_default()
}

/// Builds a thread-safe bundle for `locale`.
pub fn load_bundle(locale: SupportedLocale) -> Result<FluentBundle<FluentResource>> {
    let resource = FluentResource::try_new(ftl_source(locale).to_string()).map_err(|(_, errors)| {
        FlowMetricsError::localization(
            format!("{} parse error(s) in embedded resource", errors.len()),
            Some(locale.tag().to_string()),
        )
    })?;

    let mut bundle = FluentBundle::new_concurrent(vec![locale.language_id()?]);
    // Labels end up in charts and spreadsheets, not bidi-aware text
    bundle.set_use_isolating(false);
    bundle.add_resource(resource).map_err(|errors| {
        FlowMetricsError::localization(
            format!("{} conflicting message(s)", errors.len()),
            Some(locale.tag().to_string()),
        )
    })?;

    debug!(locale = %locale, "Loaded Fluent bundle");
    Ok(bundle)
}
