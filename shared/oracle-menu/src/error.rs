//! Menu declaration errors

use crate::screen::ScreenId;

/// Defects in the declared menu tree, surfaced while building the registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MenuError {
    #[error("Screen '{0}' is registered more than once")]
    DuplicateScreen(ScreenId),

    #[error("Root screen '{0}' is not registered")]
    MissingRoot(ScreenId),

    #[error("Button '{label_key}' on screen '{from}' targets undeclared screen '{to}'")]
    UnknownTarget {
        from: ScreenId,
        label_key: String,
        to: ScreenId,
    },

    #[error("Screen '{0}' declares a button without a label key")]
    EmptyLabel(ScreenId),
}
