//! Transport-neutral keyboard descriptors

use serde::{Deserialize, Serialize};

use crate::screen::{ActionId, ScreenId};

/// Separator between action id and payload inside an opaque callback token
const TOKEN_SEPARATOR: char = ':';

/// How the transport renders an element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Plain text button; the transport echoes the label back when pressed
    Text,
    /// Requests the client's geolocation
    Location,
    /// Opaque button carrying a callback token
    Callback(String),
}

/// What the element does once selected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ElementAction {
    Action(ActionId),
    Navigate(ScreenId),
    /// Return to the previous screen of the pressing user
    Back,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub text: String,
    pub kind: ElementKind,
    pub action: ElementAction,
}

impl Element {
    pub fn text(text: impl Into<String>, action: ElementAction) -> Self {
        Self {
            text: text.into(),
            kind: ElementKind::Text,
            action,
        }
    }

    pub fn location(text: impl Into<String>, action: ElementAction) -> Self {
        Self {
            text: text.into(),
            kind: ElementKind::Location,
            action,
        }
    }

    /// Opaque element; pressing it delivers `token` instead of the label
    pub fn callback(text: impl Into<String>, token: CallbackToken) -> Self {
        Self {
            text: text.into(),
            kind: ElementKind::Callback(token.encode()),
            action: ElementAction::Action(token.action),
        }
    }
}

/// Ordered rows of elements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Element>>,
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<Element>>) -> Self {
        Self { rows }
    }

    pub fn push_row(&mut self, row: Vec<Element>) {
        if !row.is_empty() {
            self.rows.push(row);
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.rows.iter().flatten()
    }

    pub fn labels(&self) -> Vec<Vec<&str>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|e| e.text.as_str()).collect())
            .collect()
    }

    /// True when any element is opaque; such keyboards attach to a message
    /// instead of replacing the reply keyboard.
    pub fn is_inline(&self) -> bool {
        self.elements()
            .any(|e| matches!(e.kind, ElementKind::Callback(_)))
    }
}

/// A rendered screen ready for the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMenu {
    pub screen: ScreenId,
    pub title: String,
    pub keyboard: Keyboard,
    /// Set when the requested screen was missing and the fallback was rendered
    pub fallback: bool,
}

/// Opaque callback payload: `action` or `action:payload`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackToken {
    pub action: ActionId,
    pub payload: Option<String>,
}

impl CallbackToken {
    pub fn new(action: ActionId) -> Self {
        Self {
            action,
            payload: None,
        }
    }

    pub fn with_payload(action: ActionId, payload: impl Into<String>) -> Self {
        Self {
            action,
            payload: Some(payload.into()),
        }
    }

    pub fn encode(&self) -> String {
        match &self.payload {
            Some(payload) => format!("{}{}{}", self.action, TOKEN_SEPARATOR, payload),
            None => self.action.to_string(),
        }
    }

    /// Returns `None` for an empty action id
    pub fn parse(raw: &str) -> Option<Self> {
        let (action, payload) = match raw.split_once(TOKEN_SEPARATOR) {
            Some((action, payload)) => (action, Some(payload.to_string())),
            None => (raw, None),
        };
        let action = action.trim();
        if action.is_empty() {
            return None;
        }
        Some(Self {
            action: ActionId::new(action),
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_token_parse() {
        let token = CallbackToken::parse("set_language:uk").unwrap();
        assert_eq!(token.action, ActionId::new("set_language"));
        assert_eq!(token.payload.as_deref(), Some("uk"));

        let bare = CallbackToken::parse("task_details").unwrap();
        assert_eq!(bare.payload, None);
        assert_eq!(bare.encode(), "task_details");

        assert!(CallbackToken::parse("").is_none());
        assert!(CallbackToken::parse(":uk").is_none());
    }

    #[test]
    fn test_keyboard_shape_helpers() {
        let mut keyboard = Keyboard::default();
        keyboard.push_row(vec![]);
        assert!(keyboard.is_empty());

        keyboard.push_row(vec![Element::text("Back", ElementAction::Back)]);
        keyboard.push_row(vec![Element::callback(
            "English",
            CallbackToken::with_payload(ActionId::new("set_language"), "en"),
        )]);

        assert_eq!(keyboard.len(), 2);
        assert_eq!(keyboard.labels(), vec![vec!["Back"], vec!["English"]]);
        assert!(keyboard.is_inline());
        assert_eq!(
            keyboard.rows[1][0].kind,
            ElementKind::Callback("set_language:en".to_string())
        );
    }
}
