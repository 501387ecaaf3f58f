//! Localization contracts consumed by the builder and the resolver

use async_trait::async_trait;
use oracle_core::UserId;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::screen::Button;

/// Locale code such as `en` or `uk`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locale(Cow<'static, str>);

impl Locale {
    pub const fn from_static(code: &'static str) -> Self {
        Self(Cow::Borrowed(code))
    }

    pub fn new(code: impl Into<String>) -> Self {
        Self(Cow::Owned(code.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key -> display text lookup with a fallback chain.
///
/// `resolve` never fails: implementations return the key itself when nothing
/// matches.
pub trait Localizer: Send + Sync {
    fn resolve(&self, locale: &Locale, key: &str) -> String;

    fn default_locale(&self) -> &Locale;

    /// Every locale with a catalog, default included
    fn locales(&self) -> &[Locale];

    /// Second locale searched when matching echoed labels: the default locale,
    /// or the first other catalog when `primary` already is the default.
    fn fallback_for(&self, primary: &Locale) -> Locale {
        let default = self.default_locale();
        if primary != default {
            return default.clone();
        }
        self.locales()
            .iter()
            .find(|locale| *locale != default)
            .cloned()
            .unwrap_or_else(|| default.clone())
    }
}

/// Per-user locale preference
#[async_trait]
pub trait LocaleSource: Send + Sync {
    async fn locale_for(&self, user: UserId) -> Locale;
}

/// Display text of `button` in `locale`.
///
/// The icon is prefixed only when the localized text does not already start
/// with it.
pub fn button_label(localizer: &dyn Localizer, locale: &Locale, button: &Button) -> String {
    let text = localizer.resolve(locale, &button.label_key);
    match button.icon.as_deref() {
        Some(icon) if !icon.is_empty() && !text.starts_with(icon) => format!("{} {}", icon, text),
        _ => text,
    }
}
