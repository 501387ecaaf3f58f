//! Menu Registry
//!
//! Populated once through [`RegistryBuilder`] and immutable afterwards, so it
//! can be shared behind an `Arc` and read without locking.

use std::collections::HashMap;

use crate::error::MenuError;
use crate::screen::{ActionId, ButtonTarget, ScreenDefinition, ScreenId};

#[derive(Debug)]
pub struct MenuRegistry {
    /// Registration order; the text resolver's first-match rule depends on it
    screens: Vec<ScreenDefinition>,
    index: HashMap<ScreenId, usize>,
    root: ScreenId,
}

impl MenuRegistry {
    pub fn builder(root: ScreenId) -> RegistryBuilder {
        RegistryBuilder {
            screens: Vec::new(),
            index: HashMap::new(),
            root,
        }
    }

    /// Absence is an expected outcome (stale or mistyped id)
    pub fn get(&self, id: &ScreenId) -> Option<&ScreenDefinition> {
        self.index.get(id).map(|&i| &self.screens[i])
    }

    pub fn contains(&self, id: &ScreenId) -> bool {
        self.index.contains_key(id)
    }

    pub fn root(&self) -> &ScreenId {
        &self.root
    }

    /// Screens in registration order
    pub fn screens(&self) -> impl Iterator<Item = &ScreenDefinition> {
        self.screens.iter()
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    /// Distinct action ids referenced by any button, in declaration order
    pub fn actions(&self) -> Vec<ActionId> {
        let mut seen = Vec::new();
        for button in self.screens.iter().flat_map(|s| s.buttons.iter()) {
            if let ButtonTarget::Action(action) = &button.target {
                if !seen.contains(action) {
                    seen.push(action.clone());
                }
            }
        }
        seen
    }
}

/// Single batch of registrations executed at startup
#[derive(Debug)]
pub struct RegistryBuilder {
    screens: Vec<ScreenDefinition>,
    index: HashMap<ScreenId, usize>,
    root: ScreenId,
}

impl RegistryBuilder {
    /// Add a screen; registering the same id twice is a declaration bug
    pub fn register(mut self, screen: ScreenDefinition) -> Result<Self, MenuError> {
        if self.index.contains_key(&screen.id) {
            return Err(MenuError::DuplicateScreen(screen.id));
        }
        if screen.buttons.iter().any(|b| b.label_key.trim().is_empty()) {
            return Err(MenuError::EmptyLabel(screen.id));
        }
        self.index.insert(screen.id.clone(), self.screens.len());
        self.screens.push(screen);
        Ok(self)
    }

    /// Freeze the registry after checking that the root and every button
    /// target are declared
    pub fn build(self) -> Result<MenuRegistry, MenuError> {
        if !self.index.contains_key(&self.root) {
            return Err(MenuError::MissingRoot(self.root));
        }

        for screen in &self.screens {
            for button in &screen.buttons {
                if let ButtonTarget::Screen(target) = &button.target {
                    if !self.index.contains_key(target) {
                        return Err(MenuError::UnknownTarget {
                            from: screen.id.clone(),
                            label_key: button.label_key.clone(),
                            to: target.clone(),
                        });
                    }
                }
            }
        }

        tracing::info!(screens = self.screens.len(), root = %self.root, "Menu registry built");

        Ok(MenuRegistry {
            screens: self.screens,
            index: self.index,
            root: self.root,
        })
    }
}
