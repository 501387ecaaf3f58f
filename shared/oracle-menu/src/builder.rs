//! Menu Builder
//!
//! Renders a screen into a keyboard for one user and locale, and sends it
//! through the transport while keeping the navigation stack in step.

use futures_util::future::join_all;
use oracle_core::UserId;
use std::sync::Arc;
use tracing::{debug, error};

use crate::keyboard::{Element, ElementAction, Keyboard, RenderedMenu};
use crate::localize::{button_label, Locale, Localizer};
use crate::navigation::NavigationStack;
use crate::permission::{evaluate, AccessPolicy};
use crate::registry::MenuRegistry;
use crate::screen::{Button, ButtonKind, ButtonTarget, ScreenDefinition, ScreenId};
use crate::transport::{MenuTransport, TransportError};

/// Label of the synthesized back element
pub const BACK_LABEL_KEY: &str = "menu.back";

/// Message sent with screens that declare no title
pub const WELCOME_BACK_KEY: &str = "general.welcome_back";

#[derive(Clone)]
pub struct MenuBuilder {
    registry: Arc<MenuRegistry>,
    navigation: Arc<NavigationStack>,
    localizer: Arc<dyn Localizer>,
    policy: Arc<dyn AccessPolicy>,
    transport: Arc<dyn MenuTransport>,
}

impl MenuBuilder {
    pub fn new(
        registry: Arc<MenuRegistry>,
        navigation: Arc<NavigationStack>,
        localizer: Arc<dyn Localizer>,
        policy: Arc<dyn AccessPolicy>,
        transport: Arc<dyn MenuTransport>,
    ) -> Self {
        Self {
            registry,
            navigation,
            localizer,
            policy,
            transport,
        }
    }

    pub fn registry(&self) -> &Arc<MenuRegistry> {
        &self.registry
    }

    pub fn navigation(&self) -> &Arc<NavigationStack> {
        &self.navigation
    }

    /// Render `screen` for `user` in `locale`. Never fails: an unknown screen
    /// renders as a fallback holding only the back element.
    pub async fn render(&self, screen: &ScreenId, user: UserId, locale: &Locale) -> RenderedMenu {
        let fallback_definition;
        let (definition, fallback) = match self.registry.get(screen) {
            Some(definition) => (definition, false),
            None => {
                error!(screen = %screen, user_id = %user, "Menu definition not found, rendering fallback");
                fallback_definition = ScreenDefinition::fallback(screen.clone());
                (&fallback_definition, true)
            }
        };

        let elements = self
            .visible_buttons(definition, user)
            .await
            .into_iter()
            .map(|button| self.element_for(button, locale))
            .collect();

        let mut keyboard = Keyboard::new(partition(elements, &definition.layout));
        if definition.has_back {
            keyboard.push_row(vec![self.back_element(locale)]);
        }

        let title_key = definition.title_key.as_deref().unwrap_or(WELCOME_BACK_KEY);

        RenderedMenu {
            screen: screen.clone(),
            title: self.localizer.resolve(locale, title_key),
            keyboard,
            fallback,
        }
    }

    /// Render and send `screen`. With `track_navigation` the screen is pushed
    /// onto the user's history; arrivals via "back" pass `false` because the
    /// preceding pop already positioned the history.
    pub async fn show_menu(
        &self,
        screen: &ScreenId,
        user: UserId,
        locale: &Locale,
        track_navigation: bool,
    ) -> Result<RenderedMenu, TransportError> {
        self.show_menu_with_message(screen, user, locale, None, track_navigation)
            .await
    }

    /// Like [`show_menu`](Self::show_menu), replacing the title with the text
    /// of `message_key` when given
    pub async fn show_menu_with_message(
        &self,
        screen: &ScreenId,
        user: UserId,
        locale: &Locale,
        message_key: Option<&str>,
        track_navigation: bool,
    ) -> Result<RenderedMenu, TransportError> {
        let mut menu = self.render(screen, user, locale).await;
        if let Some(key) = message_key {
            menu.title = self.localizer.resolve(locale, key);
        }

        if track_navigation {
            self.navigation.push(user, screen.clone());
        }

        self.transport
            .send(user, &menu.title, Some(&menu.keyboard))
            .await?;

        Ok(menu)
    }

    /// Leave the current screen and show the one before it (the root when the
    /// history runs out)
    pub async fn navigate_back(
        &self,
        user: UserId,
        locale: &Locale,
    ) -> Result<RenderedMenu, TransportError> {
        let left = self.navigation.pop(user);
        let current = self.navigation.current(user);

        debug!(user_id = %user, from = %left, to = %current, "Navigating back");

        self.show_menu(&current, user, locale, false).await
    }

    async fn visible_buttons<'a>(
        &self,
        definition: &'a ScreenDefinition,
        user: UserId,
    ) -> Vec<&'a Button> {
        let checks = definition.buttons.iter().map(|button| async move {
            match button.permission {
                Some(permission) => {
                    evaluate(self.policy.as_ref(), permission, user, &definition.id).await
                }
                None => true,
            }
        });
        let verdicts = join_all(checks).await;

        let visible: Vec<&Button> = definition
            .buttons
            .iter()
            .zip(verdicts)
            .filter_map(|(button, granted)| granted.then_some(button))
            .collect();

        debug!(
            screen = %definition.id,
            user_id = %user,
            total = definition.buttons.len(),
            visible = visible.len(),
            "Filtered buttons"
        );

        visible
    }

    fn element_for(&self, button: &Button, locale: &Locale) -> Element {
        let text = button_label(self.localizer.as_ref(), locale, button);
        let action = match &button.target {
            ButtonTarget::Action(action) => ElementAction::Action(action.clone()),
            ButtonTarget::Screen(screen) => ElementAction::Navigate(screen.clone()),
        };

        match button.kind {
            ButtonKind::Location => Element::location(text, action),
            ButtonKind::Text => Element::text(text, action),
        }
    }

    fn back_element(&self, locale: &Locale) -> Element {
        Element::text(self.localizer.resolve(locale, BACK_LABEL_KEY), ElementAction::Back)
    }
}

/// Split elements into rows following `layout`; whatever the layout does not
/// cover goes one element per row, in order.
fn partition(elements: Vec<Element>, layout: &[usize]) -> Vec<Vec<Element>> {
    let mut rows = Vec::with_capacity(layout.len());
    let mut remaining = elements.into_iter().peekable();

    for &size in layout {
        if remaining.peek().is_none() {
            break;
        }
        let row: Vec<Element> = remaining.by_ref().take(size).collect();
        if !row.is_empty() {
            rows.push(row);
        }
    }

    rows.extend(remaining.map(|element| vec![element]));
    rows
}
