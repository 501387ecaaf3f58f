//! Button permissions
//!
//! Screens carry a [`Permission`] tag per gated button; a single evaluator asks
//! the host's [`AccessPolicy`] and converts any failure into a denial.

use async_trait::async_trait;
use oracle_core::UserId;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::screen::ScreenId;

/// Permission kinds a button may require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Only privileged (admin) users see the button
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("Permission source unavailable: {0}")]
    Unavailable(String),

    #[error("Permission check timed out")]
    Timeout,
}

/// Source of truth for user privileges. May perform I/O.
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    async fn is_privileged(&self, user: UserId) -> Result<bool, AccessError>;
}

/// Decide whether `user` may see a button gated by `permission` on `screen`.
///
/// Fails closed: an error from the policy is logged and treated as denial.
pub async fn evaluate(
    policy: &dyn AccessPolicy,
    permission: Permission,
    user: UserId,
    screen: &ScreenId,
) -> bool {
    let verdict = match permission {
        Permission::Admin => policy.is_privileged(user).await,
    };

    match verdict {
        Ok(granted) => {
            debug!(user_id = %user, screen = %screen, ?permission, granted, "Button permission check");
            granted
        }
        Err(e) => {
            warn!(
                user_id = %user,
                screen = %screen,
                ?permission,
                error = %e,
                "Permission check failed, hiding button"
            );
            false
        }
    }
}
