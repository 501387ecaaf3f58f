//! Button Text Resolver
//!
//! Plain-text buttons come back from the transport as their label, so the
//! label has to be mapped back to the button that produced it. Labels are
//! pre-indexed per locale at startup; a lookup returns the earliest declared
//! button whose label matches in either candidate locale, which is the same
//! answer a scan over screens x buttons x locales would give.

use oracle_core::UserId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::builder::BACK_LABEL_KEY;
use crate::localize::{button_label, Locale, LocaleSource, Localizer};
use crate::registry::MenuRegistry;
use crate::screen::{ActionId, ButtonTarget, ScreenId};

/// Outcome of matching echoed label text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resolution {
    Action(ActionId),
    Screen(ScreenId),
    /// The synthesized back element
    Back,
}

impl From<&ButtonTarget> for Resolution {
    fn from(target: &ButtonTarget) -> Self {
        match target {
            ButtonTarget::Action(action) => Self::Action(action.clone()),
            ButtonTarget::Screen(screen) => Self::Screen(screen.clone()),
        }
    }
}

/// Two buttons rendering to the same text in one locale. The earlier one
/// wins every lookup; the later one is unreachable through text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCollision {
    pub locale: Locale,
    pub text: String,
    pub kept: Resolution,
    pub shadowed: Resolution,
}

#[derive(Debug, Clone)]
struct IndexedLabel {
    /// Declaration order of the button; back labels sort after every button
    ordinal: usize,
    locale: Locale,
    resolution: Resolution,
}

pub struct ButtonTextResolver {
    registry: Arc<MenuRegistry>,
    localizer: Arc<dyn Localizer>,
    locales: Arc<dyn LocaleSource>,
    index: HashMap<String, Vec<IndexedLabel>>,
    collisions: Vec<LabelCollision>,
}

impl ButtonTextResolver {
    pub fn new(
        registry: Arc<MenuRegistry>,
        localizer: Arc<dyn Localizer>,
        locales: Arc<dyn LocaleSource>,
    ) -> Self {
        let index = build_index(&registry, localizer.as_ref());
        let collisions = find_collisions(&index);

        for collision in &collisions {
            warn!(
                locale = %collision.locale,
                text = %collision.text,
                kept = ?collision.kept,
                shadowed = ?collision.shadowed,
                "Duplicate button label, first registered button wins"
            );
        }

        Self {
            registry,
            localizer,
            locales,
            index,
            collisions,
        }
    }

    /// Map `raw_text` sent by `user` to a menu outcome; `None` means the text
    /// is free-form input rather than a button press.
    pub async fn resolve(&self, raw_text: &str, user: UserId) -> Option<Resolution> {
        let primary = self.locales.locale_for(user).await;
        let fallback = self.localizer.fallback_for(&primary);

        let resolution = self.resolve_in(raw_text, &[primary, fallback]);
        debug!(user_id = %user, matched = ?resolution, "Resolved button text");
        resolution
    }

    /// Match against explicit candidate locales, earliest declared button first
    pub fn resolve_in(&self, raw_text: &str, candidates: &[Locale]) -> Option<Resolution> {
        let indexed = self.localizer.locales();
        if !candidates.iter().all(|locale| indexed.contains(locale)) {
            return self.scan(raw_text, candidates);
        }

        self.index
            .get(raw_text)?
            .iter()
            .filter(|label| candidates.contains(&label.locale))
            .min_by_key(|label| label.ordinal)
            .map(|label| label.resolution.clone())
    }

    /// Exhaustive search over every declared button. Used for locales without
    /// an index entry.
    pub fn scan(&self, raw_text: &str, candidates: &[Locale]) -> Option<Resolution> {
        for screen in self.registry.screens() {
            for button in &screen.buttons {
                for locale in candidates {
                    if button_label(self.localizer.as_ref(), locale, button) == raw_text {
                        return Some(Resolution::from(&button.target));
                    }
                }
            }
        }

        candidates
            .iter()
            .any(|locale| self.localizer.resolve(locale, BACK_LABEL_KEY) == raw_text)
            .then_some(Resolution::Back)
    }

    pub fn collisions(&self) -> &[LabelCollision] {
        &self.collisions
    }
}

fn build_index(registry: &MenuRegistry, localizer: &dyn Localizer) -> HashMap<String, Vec<IndexedLabel>> {
    let mut index: HashMap<String, Vec<IndexedLabel>> = HashMap::new();

    let buttons = registry.screens().flat_map(|screen| screen.buttons.iter());
    for (ordinal, button) in buttons.enumerate() {
        for locale in localizer.locales() {
            index
                .entry(button_label(localizer, locale, button))
                .or_default()
                .push(IndexedLabel {
                    ordinal,
                    locale: locale.clone(),
                    resolution: Resolution::from(&button.target),
                });
        }
    }

    for locale in localizer.locales() {
        index
            .entry(localizer.resolve(locale, BACK_LABEL_KEY))
            .or_default()
            .push(IndexedLabel {
                ordinal: usize::MAX,
                locale: locale.clone(),
                resolution: Resolution::Back,
            });
    }

    index
}

fn find_collisions(index: &HashMap<String, Vec<IndexedLabel>>) -> Vec<LabelCollision> {
    let mut collisions = Vec::new();

    for (text, labels) in index {
        let mut by_locale: HashMap<&Locale, Vec<&IndexedLabel>> = HashMap::new();
        for label in labels {
            by_locale.entry(&label.locale).or_default().push(label);
        }

        for (locale, mut same_locale) in by_locale {
            same_locale.sort_by_key(|label| label.ordinal);
            let kept = &same_locale[0].resolution;
            for other in &same_locale[1..] {
                if other.resolution != *kept {
                    collisions.push(LabelCollision {
                        locale: locale.clone(),
                        text: text.clone(),
                        kept: kept.clone(),
                        shadowed: other.resolution.clone(),
                    });
                }
            }
        }
    }

    collisions.sort_by(|a, b| (&a.locale, &a.text).cmp(&(&b.locale, &b.text)));
    collisions
}
