//! Embedded translation catalogs

use oracle_core::{OracleError, Result};
use oracle_menu::{Locale, Localizer};
use std::collections::HashMap;
use tracing::info;

/// Catalogs compiled into the binary, one flat key -> text map per locale
const EMBEDDED: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en.json")),
    ("uk", include_str!("../locales/uk.json")),
];

/// Legacy or regional codes mapped onto a catalog locale
const ALIASES: &[(&str, &str)] = &[("ua", "uk")];

pub struct Catalog {
    translations: HashMap<Locale, HashMap<String, String>>,
    locales: Vec<Locale>,
    default: Locale,
}

impl Catalog {
    pub fn embedded(default_locale: &str) -> Result<Self> {
        Self::from_sources(default_locale, EMBEDDED)
    }

    pub fn from_sources(default_locale: &str, sources: &[(&str, &str)]) -> Result<Self> {
        let mut translations = HashMap::new();
        let mut locales = Vec::with_capacity(sources.len());

        for (code, raw) in sources {
            let entries: HashMap<String, String> = serde_json::from_str(raw)
                .map_err(|e| OracleError::Config(format!("Invalid catalog {}: {}", code, e)))?;
            let locale = Locale::new(*code);
            info!(locale = %locale, keys = entries.len(), "Loaded translations");
            locales.push(locale.clone());
            translations.insert(locale, entries);
        }

        let default = Locale::new(default_locale);
        if !translations.contains_key(&default) {
            return Err(OracleError::Config(format!(
                "DEFAULT_LOCALE {} has no catalog",
                default_locale
            )));
        }

        Ok(Self {
            translations,
            locales,
            default,
        })
    }

    /// Resolve `key` and substitute `{name}` placeholders from `args`
    pub fn resolve_with(&self, locale: &Locale, key: &str, args: &[(&str, &str)]) -> String {
        let mut text = self.resolve(locale, key);
        for (name, value) in args {
            text = text.replace(&format!("{{{}}}", name), value);
        }
        text
    }

    /// Map a transport language code (`en-US`, `ua`, ...) onto a catalog
    /// locale, the default when nothing fits
    pub fn normalize_language_code(&self, code: Option<&str>) -> Locale {
        let Some(prefix) = code.and_then(|code| code.get(..2)) else {
            return self.default.clone();
        };
        let prefix = prefix.to_ascii_lowercase();
        let prefix = ALIASES
            .iter()
            .find(|(alias, _)| *alias == prefix)
            .map(|(_, target)| target.to_string())
            .unwrap_or(prefix);

        self.locales
            .iter()
            .find(|locale| locale.as_str() == prefix)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    pub fn supports(&self, locale: &Locale) -> bool {
        self.translations.contains_key(locale)
    }
}

impl Localizer for Catalog {
    fn resolve(&self, locale: &Locale, key: &str) -> String {
        [locale, &self.default]
            .into_iter()
            .find_map(|locale| self.translations.get(locale)?.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    fn default_locale(&self) -> &Locale {
        &self.default
    }

    fn locales(&self) -> &[Locale] {
        &self.locales
    }
}
