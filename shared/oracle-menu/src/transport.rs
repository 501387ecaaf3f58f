//! Outbound send primitive supplied by the hosting transport

use async_trait::async_trait;
use oracle_core::UserId;

use crate::keyboard::Keyboard;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Platform rejected message: {0}")]
    Rejected(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Delivers a message, optionally with a keyboard, to one user
#[async_trait]
pub trait MenuTransport: Send + Sync {
    async fn send(
        &self,
        user: UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError>;
}
