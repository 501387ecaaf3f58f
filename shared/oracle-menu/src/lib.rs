//! Oracle Menu Engine
//!
//! Declarative menu screens rendered into transport-neutral keyboards:
//! - `MenuRegistry`: immutable screen tree built once at startup
//! - `MenuBuilder`: per-user, per-locale rendering with permission filtering
//! - `NavigationStack`: per-user history backing the contextual "back" element
//! - `ButtonTextResolver`: maps echoed label text back to an action or screen

pub mod builder;
pub mod error;
pub mod keyboard;
pub mod localize;
pub mod navigation;
pub mod permission;
pub mod registry;
pub mod resolver;
pub mod screen;
pub mod transport;


pub use builder::{MenuBuilder, BACK_LABEL_KEY, WELCOME_BACK_KEY};
pub use error::MenuError;
pub use keyboard::{CallbackToken, Element, ElementAction, ElementKind, Keyboard, RenderedMenu};
pub use localize::{button_label, Locale, LocaleSource, Localizer};
pub use navigation::NavigationStack;
pub use permission::{AccessError, AccessPolicy, Permission};
pub use registry::{MenuRegistry, RegistryBuilder};
pub use resolver::{ButtonTextResolver, LabelCollision, Resolution};
pub use screen::{ActionId, Button, ButtonKind, ButtonTarget, ScreenDefinition, ScreenId};
pub use transport::{MenuTransport, TransportError};
