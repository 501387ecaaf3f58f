//! Screen and button declarations

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::permission::Permission;

/// Name of one menu screen, stable for the process lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreenId(Cow<'static, str>);

impl ScreenId {
    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an external handler invoked when a button is selected
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(Cow<'static, str>);

impl ActionId {
    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What selecting a button does. Exactly one of the two, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ButtonTarget {
    Action(ActionId),
    Screen(ScreenId),
}

/// How the transport should present the element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonKind {
    #[default]
    Text,
    /// Asks the client to share its geolocation
    Location,
}

/// One selectable element of a screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label_key: String,
    pub icon: Option<String>,
    pub target: ButtonTarget,
    pub permission: Option<Permission>,
    #[serde(default)]
    pub kind: ButtonKind,
}

impl Button {
    /// Button that invokes an external handler
    pub fn action(label_key: impl Into<String>, action: ActionId) -> Self {
        Self::with_target(label_key, ButtonTarget::Action(action))
    }

    /// Button that opens a child screen
    pub fn screen(label_key: impl Into<String>, screen: ScreenId) -> Self {
        Self::with_target(label_key, ButtonTarget::Screen(screen))
    }

    fn with_target(label_key: impl Into<String>, target: ButtonTarget) -> Self {
        Self {
            label_key: label_key.into(),
            icon: None,
            target,
            permission: None,
            kind: ButtonKind::Text,
        }
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Hide the button from users the permission is not granted to
    pub fn requires(mut self, permission: Permission) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn location_prompt(mut self) -> Self {
        self.kind = ButtonKind::Location;
        self
    }

    pub fn is_location_prompt(&self) -> bool {
        self.kind == ButtonKind::Location
    }
}

/// A named, ordered collection of buttons plus presentation hints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenDefinition {
    pub id: ScreenId,
    pub title_key: Option<String>,
    pub buttons: Vec<Button>,
    /// Buttons per row; buttons past the sum of the layout get a row each
    pub layout: Vec<usize>,
    pub has_back: bool,
}

impl ScreenDefinition {
    pub fn new(id: ScreenId) -> Self {
        Self {
            id,
            title_key: None,
            buttons: Vec::new(),
            layout: Vec::new(),
            has_back: false,
        }
    }

    pub fn title(mut self, key: impl Into<String>) -> Self {
        self.title_key = Some(key.into());
        self
    }

    pub fn layout(mut self, rows: impl IntoIterator<Item = usize>) -> Self {
        self.layout = rows.into_iter().collect();
        self
    }

    pub fn with_back(mut self) -> Self {
        self.has_back = true;
        self
    }

    pub fn button(mut self, button: Button) -> Self {
        self.buttons.push(button);
        self
    }

    /// Substitute for a screen that cannot be found: nothing but "back"
    pub(crate) fn fallback(id: ScreenId) -> Self {
        Self::new(id).with_back()
    }
}
