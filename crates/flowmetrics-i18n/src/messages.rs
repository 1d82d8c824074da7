//! Message lookup for the labels the KPI pipeline emits.

use crate::loader::{load_bundle, SupportedLocale};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource};
use flowmetrics_common::Result;
use tracing::warn;

/// Localized label provider for one locale.
pub struct Localizer {
    locale: SupportedLocale,
    bundle: FluentBundle<FluentResource>,
}

impl Localizer {
    /// Creates a localizer for a language tag, falling back to `pt-BR`.
    pub fn new(language: &str) -> Result<Self> {
        Self::for_locale(SupportedLocale::resolve(language))
    }

    /// Creates a localizer for a shipped locale.
    pub fn for_locale(locale: SupportedLocale) -> Result<Self> {
        Ok(Self {
            locale,
            bundle: load_bundle(locale)?,
        })
    }

    /// Locale this localizer renders.
    pub const fn locale(&self) -> SupportedLocale {
        self.locale
    }

    /// Formats message `id`; `None` when the message does not exist.
    pub fn format(&self, id: &str, args: Option<&FluentArgs<'_>>) -> Option<String> {
        let message = self.bundle.get_message(id)?;
        let pattern = message.value()?;

        let mut errors = Vec::new();
        let text = self.bundle.format_pattern(pattern, args, &mut errors);
        if !errors.is_empty() {
            warn!(id, locale = %self.locale, ?errors, "Errors while formatting message");
        }
        Some(text.into_owned())
    }

    /// Formats message `id`, or returns the id itself when it is missing.
    pub fn get(&self, id: &str) -> String {
        self.format(id, None).unwrap_or_else(|| {
            warn!(id, locale = %self.locale, "Missing message");
            id.to_string()
        })
    }

    /// Abbreviated month name for `month` in `1..=12`.
    pub fn month_abbrev(&self, month: u32) -> String {
        self.format(&format!("month-{month}"), None)
            .unwrap_or_else(|| format!("{month:02}"))
    }

    /// Month label with a two-digit year, e.g. `Mar/24`.
    pub fn month_year(&self, month: u32, year: i32) -> String {
        let mut args = FluentArgs::new();
        args.set("month", self.month_abbrev(month));
        args.set("year", format!("{:02}", year.rem_euclid(100)));
        self.format("month-year", Some(&args))
            .unwrap_or_else(|| format!("{month:02}/{year}"))
    }

    /// Display name for users without a profile name.
    pub fn anonymous_user(&self) -> String {
        self.get("anonymous-user")
    }

    /// chrono format string for timestamps shown to users.
    pub fn datetime_format(&self) -> String {
        self.format("datetime-format", None)
            .unwrap_or_else(|| "%Y-%m-%d %H:%M".to_string())
    }
}

impl std::fmt::Debug for Localizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Localizer")
            .field("locale", &self.locale)
            .finish_non_exhaustive()
    }
}
