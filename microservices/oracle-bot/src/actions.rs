//! Action dispatch table
//!
//! Buttons name their action by id; ids are resolved once into [`BotAction`]
//! and each action maps to one handler.

use async_trait::async_trait;
use oracle_core::{RequestContext, UserId};
use oracle_menu::permission::evaluate;
use oracle_menu::{
    AccessPolicy, ActionId, CallbackToken, Element, Keyboard, Locale, Localizer, MenuBuilder,
    MenuRegistry, Permission, ScreenId, TransportError,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::i18n::Catalog;
use crate::menus;
use crate::metrics::BotMetrics;
use crate::transport::BotTransport;
use crate::users::UserDirectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BotAction {
    Logout,
    ActiveTasks,
    NearTasks,
    NearTasksLocation,
    AboutMe,
    CreateReport,
    StatisticToday,
    StatisticMonth,
    StatisticYear,
    Language,
    SetLanguage,
    ReportIssue,
    Broadcast,
    GeocodingIssues,
    GeocodingReset,
}

impl BotAction {
    pub const ALL: [BotAction; 15] = [
        Self::Logout,
        Self::ActiveTasks,
        Self::NearTasks,
        Self::NearTasksLocation,
        Self::AboutMe,
        Self::CreateReport,
        Self::StatisticToday,
        Self::StatisticMonth,
        Self::StatisticYear,
        Self::Language,
        Self::SetLanguage,
        Self::ReportIssue,
        Self::Broadcast,
        Self::GeocodingIssues,
        Self::GeocodingReset,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::ActiveTasks => "active_tasks",
            Self::NearTasks => "near_tasks",
            Self::NearTasksLocation => "near_tasks_location",
            Self::AboutMe => "info",
            Self::CreateReport => "report",
            Self::StatisticToday => "statistic_today",
            Self::StatisticMonth => "statistic_month",
            Self::StatisticYear => "statistic_year",
            Self::Language => "language",
            Self::SetLanguage => "set_language",
            Self::ReportIssue => "report_issue",
            Self::Broadcast => "broadcast_initiate",
            Self::GeocodingIssues => "geocoding_issues",
            Self::GeocodingReset => "geocoding_reset",
        }
    }

    pub fn id(self) -> ActionId {
        ActionId::from_static(self.as_str())
    }

    pub fn from_id(id: &ActionId) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == id.as_str())
    }
}

/// Everything a handler may touch while serving one event
#[derive(Clone)]
pub struct ActionContext<'a> {
    pub request: &'a RequestContext,
    pub locale: Locale,
    pub payload: Option<&'a str>,
    pub menus: &'a MenuBuilder,
    pub users: &'a UserDirectory,
    pub policy: &'a dyn AccessPolicy,
    pub catalog: &'a Catalog,
    pub transport: &'a dyn BotTransport,
    pub metrics: &'a BotMetrics,
}

impl ActionContext<'_> {
    pub fn user(&self) -> UserId {
        self.request.user_id
    }

    pub fn current_screen(&self) -> ScreenId {
        self.menus.navigation().current(self.user())
    }

    pub async fn show_menu(
        &self,
        screen: &ScreenId,
        message_key: Option<&str>,
        track_navigation: bool,
    ) -> Result<(), TransportError> {
        let menu = self
            .menus
            .show_menu_with_message(screen, self.user(), &self.locale, message_key, track_navigation)
            .await?;
        self.metrics
            .record_menu(&menu, self.menus.navigation().depth(self.user()));
        Ok(())
    }

    /// Send a plain text message built from `key`
    pub async fn say(&self, key: &str, args: &[(&str, &str)]) -> Result<(), TransportError> {
        let text = self.catalog.resolve_with(&self.locale, key, args);
        self.transport.send(self.user(), &text, None).await?;
        self.metrics.messages_sent.inc("text");
        Ok(())
    }

    pub async fn send_inline(&self, key: &str, keyboard: &Keyboard) -> Result<(), TransportError> {
        let text = self.catalog.resolve(&self.locale, key);
        self.transport.send(self.user(), &text, Some(keyboard)).await?;
        self.metrics.messages_sent.inc("inline");
        Ok(())
    }

    /// Admin check for actions reachable by typing a label the user never saw
    pub async fn is_admin(&self) -> bool {
        evaluate(self.policy, Permission::Admin, self.user(), &self.current_screen()).await
    }
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, ctx: &ActionContext<'_>) -> Result<(), TransportError>;
}

pub struct ActionTable {
    handlers: HashMap<BotAction, Arc<dyn ActionHandler>>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn with_builtin_handlers() -> Self {
        let mut table = Self::new();
        table.register(BotAction::Logout, LogoutHandler);
        table.register(BotAction::NearTasks, NearTasksHandler);
        table.register(BotAction::NearTasksLocation, LocationHandler);
        table.register(BotAction::Language, LanguageHandler);
        table.register(BotAction::SetLanguage, SetLanguageHandler);
        table.register(BotAction::ActiveTasks, NoticeHandler::new("notice.active_tasks"));
        table.register(BotAction::AboutMe, NoticeHandler::new("notice.about_me"));
        table.register(BotAction::CreateReport, NoticeHandler::new("notice.create_report"));
        table.register(BotAction::ReportIssue, NoticeHandler::new("notice.report_issue"));
        table.register(BotAction::StatisticToday, StatisticsHandler { period_key: "menu.today" });
        table.register(BotAction::StatisticMonth, StatisticsHandler { period_key: "menu.this_month" });
        table.register(BotAction::StatisticYear, StatisticsHandler { period_key: "menu.this_year" });
        table.register(BotAction::Broadcast, NoticeHandler::admin("notice.broadcast"));
        table.register(BotAction::GeocodingIssues, NoticeHandler::admin("notice.geocoding"));
        table.register(BotAction::GeocodingReset, NoticeHandler::admin("notice.geocoding"));
        table
    }

    pub fn register(&mut self, action: BotAction, handler: impl ActionHandler + 'static) {
        self.handlers.insert(action, Arc::new(handler));
    }

    pub fn resolve(&self, id: &ActionId) -> Option<(BotAction, Arc<dyn ActionHandler>)> {
        let action = BotAction::from_id(id)?;
        self.handlers
            .get(&action)
            .map(|handler| (action, handler.clone()))
    }

    /// Declared action ids with no handler behind them
    pub fn unhandled(&self, registry: &MenuRegistry) -> Vec<ActionId> {
        let missing: Vec<ActionId> = registry
            .actions()
            .into_iter()
            .filter(|id| self.resolve(id).is_none())
            .collect();

        for id in &missing {
            warn!(action = %id, "Declared action has no handler");
        }
        missing
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for ActionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop the navigation history and return to the root screen
struct LogoutHandler;

#[async_trait]
impl ActionHandler for LogoutHandler {
    async fn handle(&self, ctx: &ActionContext<'_>) -> Result<(), TransportError> {
        info!(user_id = %ctx.user(), "User logged out");
        ctx.menus.navigation().reset(ctx.user());
        let root = ctx.menus.registry().root().clone();
        ctx.show_menu(&root, Some("logout.done"), true).await
    }
}

struct NearTasksHandler;

#[async_trait]
impl ActionHandler for NearTasksHandler {
    async fn handle(&self, ctx: &ActionContext<'_>) -> Result<(), TransportError> {
        ctx.show_menu(&menus::NEAR_TASKS, Some("tasks.near.prompt"), true)
            .await
    }
}

/// Shared geolocation; payload is `latitude,longitude`
struct LocationHandler;

#[async_trait]
impl ActionHandler for LocationHandler {
    async fn handle(&self, ctx: &ActionContext<'_>) -> Result<(), TransportError> {
        let Some((latitude, longitude)) = ctx.payload.and_then(|p| p.split_once(',')) else {
            // Label typed instead of the location prompt being used
            return ctx.say("tasks.near.prompt", &[]).await;
        };

        info!(user_id = %ctx.user(), latitude, longitude, "User sent geolocation");
        ctx.say(
            "location.received",
            &[("latitude", latitude), ("longitude", longitude)],
        )
        .await
    }
}

/// Inline choice of every locale with a catalog
struct LanguageHandler;

#[async_trait]
impl ActionHandler for LanguageHandler {
    async fn handle(&self, ctx: &ActionContext<'_>) -> Result<(), TransportError> {
        let mut keyboard = Keyboard::default();
        for locale in ctx.catalog.locales() {
            let label = ctx
                .catalog
                .resolve(locale, &format!("language.button.{}", locale));
            let token = CallbackToken::with_payload(BotAction::SetLanguage.id(), locale.as_str());
            keyboard.push_row(vec![Element::callback(label, token)]);
        }
        ctx.send_inline("language.select", &keyboard).await
    }
}

/// Apply the chosen locale and redraw the current screen in it
struct SetLanguageHandler;

#[async_trait]
impl ActionHandler for SetLanguageHandler {
    async fn handle(&self, ctx: &ActionContext<'_>) -> Result<(), TransportError> {
        let chosen = ctx.payload.map(Locale::new);
        let Some(locale) = chosen.filter(|locale| ctx.catalog.supports(locale)) else {
            warn!(user_id = %ctx.user(), payload = ?ctx.payload, "Unknown language callback");
            return ctx.say("language.unknown", &[]).await;
        };

        ctx.users.set_locale(ctx.user(), locale.clone());
        let ctx = ActionContext {
            locale,
            ..ctx.clone()
        };
        let current = ctx.current_screen();
        ctx.show_menu(&current, Some("language.changed"), false).await
    }
}

/// Reply with a fixed notice for features served outside this bot
struct NoticeHandler {
    message_key: &'static str,
    admin_only: bool,
}

impl NoticeHandler {
    fn new(message_key: &'static str) -> Self {
        Self {
            message_key,
            admin_only: false,
        }
    }

    fn admin(message_key: &'static str) -> Self {
        Self {
            message_key,
            admin_only: true,
        }
    }
}

#[async_trait]
impl ActionHandler for NoticeHandler {
    async fn handle(&self, ctx: &ActionContext<'_>) -> Result<(), TransportError> {
        if self.admin_only && !ctx.is_admin().await {
            warn!(user_id = %ctx.user(), notice = self.message_key, "Admin action refused");
            return ctx.say("error.forbidden", &[]).await;
        }
        ctx.say(self.message_key, &[]).await
    }
}

struct StatisticsHandler {
    period_key: &'static str,
}

#[async_trait]
impl ActionHandler for StatisticsHandler {
    async fn handle(&self, ctx: &ActionContext<'_>) -> Result<(), TransportError> {
        let period = ctx.catalog.resolve(&ctx.locale, self.period_key);
        ctx.say("notice.statistics", &[("period", period.as_str())]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip() {
        for action in BotAction::ALL {
            assert_eq!(BotAction::from_id(&action.id()), Some(action));
        }
        assert_eq!(BotAction::from_id(&ActionId::new("unknown")), None);
    }

    #[test]
    fn test_builtin_table_covers_declared_actions() {
        let registry = menus::declare().unwrap();
        let table = ActionTable::with_builtin_handlers();

        assert!(table.unhandled(&registry).is_empty());
        assert_eq!(table.len(), BotAction::ALL.len());
    }

    #[test]
    fn test_missing_handler_reported() {
        let registry = menus::declare().unwrap();
        let mut table = ActionTable::new();
        table.register(BotAction::Logout, LogoutHandler);

        let missing = table.unhandled(&registry);
        assert!(missing.contains(&BotAction::Language.id()));
        assert!(!missing.contains(&BotAction::Logout.id()));
    }
}
