//! Outbound surface the router needs beyond sending menus

use async_trait::async_trait;
use oracle_menu::{MenuTransport, TransportError};

#[async_trait]
pub trait BotTransport: MenuTransport {
    /// Acknowledge an opaque-button press so the client stops its spinner
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError>;
}
