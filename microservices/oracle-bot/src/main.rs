//! Oracle Bot
//!
//! Telegram bot for field engineers: a declarative button menu over
//! tasks, profile, statistics and admin tools, in English and Ukrainian.

use oracle_core::{MicroserviceRuntime, OracleError, Result};
use std::sync::Arc;
use tracing::info;

mod actions;
mod config;
mod error;
mod handlers;
mod i18n;
mod menus;
mod metrics;
mod router;
mod service;
mod telegram;
mod transport;
mod users;

#[cfg(test)]
mod tests;

pub use config::BotConfig;
pub use service::BotService;

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = oracle_telemetry::init("oracle-bot")
        .map_err(|e| OracleError::Internal(e.to_string()))?;

    info!("Starting Oracle bot");

    let config = BotConfig::from_env()?;
    let service = Arc::new(BotService::new(config)?);
    MicroserviceRuntime::run(service).await
}
