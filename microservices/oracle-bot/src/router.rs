//! Inbound event routing
//!
//! Commands, echoed button labels, opaque callbacks and shared locations all
//! end up as a menu operation or an action dispatch.

use oracle_core::{RequestContext, UserId};
use oracle_menu::permission::evaluate;
use oracle_menu::{
    AccessPolicy, ActionId, ButtonTarget, ButtonTextResolver, CallbackToken, MenuBuilder,
    Permission, Resolution, ScreenId, TransportError,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::actions::{ActionContext, ActionTable, BotAction};
use crate::i18n::Catalog;
use crate::menus;
use crate::metrics::BotMetrics;
use crate::transport::BotTransport;
use crate::users::UserDirectory;

/// Commands with a handler; anything else is counted as "unknown"
const KNOWN_COMMANDS: &[&str] = &["start", "language"];

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// `/name args`
    Command { name: String, args: String },
    Text(String),
    Callback { id: String, data: String },
    Location { latitude: f64, longitude: f64 },
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Command { .. } => "command",
            Self::Text(_) => "text",
            Self::Callback { .. } => "callback",
            Self::Location { .. } => "location",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub user: UserId,
    pub language_code: Option<String>,
    pub kind: EventKind,
}

impl InboundEvent {
    /// Text starting with `/` is a command
    pub fn from_text(user: UserId, language_code: Option<String>, text: &str) -> Self {
        let kind = match text.strip_prefix('/') {
            Some(command) => {
                let (name, args) = command.split_once(' ').unwrap_or((command, ""));
                // Group chats address commands as /name@bot
                let name = name.split('@').next().unwrap_or(name);
                EventKind::Command {
                    name: name.to_string(),
                    args: args.trim().to_string(),
                }
            }
            None => EventKind::Text(text.to_string()),
        };
        Self {
            user,
            language_code,
            kind,
        }
    }
}

pub struct Router {
    menus: MenuBuilder,
    resolver: Arc<ButtonTextResolver>,
    actions: Arc<ActionTable>,
    users: Arc<UserDirectory>,
    policy: Arc<dyn AccessPolicy>,
    catalog: Arc<Catalog>,
    transport: Arc<dyn BotTransport>,
    metrics: Arc<BotMetrics>,
    /// Screens reachable only through a permission-gated button
    gated: HashMap<ScreenId, Permission>,
}

impl Router {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        menus: MenuBuilder,
        resolver: Arc<ButtonTextResolver>,
        actions: Arc<ActionTable>,
        users: Arc<UserDirectory>,
        policy: Arc<dyn AccessPolicy>,
        catalog: Arc<Catalog>,
        transport: Arc<dyn BotTransport>,
        metrics: Arc<BotMetrics>,
    ) -> Self {
        let gated = menus
            .registry()
            .screens()
            .flat_map(|screen| screen.buttons.iter())
            .filter_map(|button| match (&button.target, button.permission) {
                (ButtonTarget::Screen(target), Some(permission)) => Some((target.clone(), permission)),
                _ => None,
            })
            .collect();

        Self {
            menus,
            resolver,
            actions,
            users,
            policy,
            catalog,
            transport,
            metrics,
            gated,
        }
    }

    pub fn menus(&self) -> &MenuBuilder {
        &self.menus
    }

    pub fn metrics(&self) -> &Arc<BotMetrics> {
        &self.metrics
    }

    pub fn users(&self) -> &Arc<UserDirectory> {
        &self.users
    }

    /// Serve one inbound event. Only send failures surface as errors.
    pub async fn handle(&self, event: InboundEvent) -> Result<(), TransportError> {
        let request = RequestContext::new(event.user);
        self.metrics.events.inc(event.kind.label());

        if self
            .users
            .observe(event.user, event.language_code.as_deref(), &self.catalog)
        {
            self.metrics.new_users.inc();
        }

        let ctx = ActionContext {
            request: &request,
            locale: self.users.locale(event.user),
            payload: None,
            menus: &self.menus,
            users: &self.users,
            policy: self.policy.as_ref(),
            catalog: &self.catalog,
            transport: self.transport.as_ref(),
            metrics: &self.metrics,
        };

        let result = match &event.kind {
            EventKind::Command { name, .. } => self.on_command(&ctx, name).await,
            EventKind::Text(text) => self.on_text(&ctx, text).await,
            EventKind::Callback { id, data } => self.on_callback(&ctx, id, data).await,
            EventKind::Location {
                latitude,
                longitude,
            } => self.on_location(&ctx, *latitude, *longitude).await,
        };

        self.metrics
            .tracked_users
            .set(self.menus.navigation().tracked_users() as u64);
        self.metrics
            .event_latency_ms
            .record(request.elapsed_ms() as f64);

        if let Err(e) = &result {
            self.metrics.send_failures.inc();
            warn!(
                request_id = %request.request_id,
                user_id = %event.user,
                kind = event.kind.label(),
                error = %e,
                "Failed to answer event"
            );
        }
        result
    }

    async fn on_command(&self, ctx: &ActionContext<'_>, name: &str) -> Result<(), TransportError> {
        let label = if KNOWN_COMMANDS.contains(&name) {
            name
        } else {
            "unknown"
        };
        self.metrics.commands.inc(label);

        match name {
            "start" => {
                info!(user_id = %ctx.user(), "User started the bot");
                self.menus.navigation().reset(ctx.user());
                let root = self.menus.registry().root().clone();
                ctx.show_menu(&root, Some("general.welcome"), true).await
            }
            "language" => self.dispatch(ctx, &BotAction::Language.id(), None).await,
            _ => {
                debug!(user_id = %ctx.user(), command = name, "Unknown command");
                self.remind(ctx).await
            }
        }
    }

    async fn on_text(&self, ctx: &ActionContext<'_>, text: &str) -> Result<(), TransportError> {
        let resolution = self.resolver.resolve(text, ctx.user()).await;
        match resolution {
            Some(_) => self.metrics.resolver_hits.inc(),
            None => self.metrics.resolver_misses.inc(),
        }

        match resolution {
            Some(Resolution::Screen(screen)) => {
                if !self.may_open(ctx.user(), &screen).await {
                    return self.remind(ctx).await;
                }
                ctx.show_menu(&screen, None, true).await
            }
            Some(Resolution::Action(action)) => self.dispatch(ctx, &action, None).await,
            Some(Resolution::Back) => {
                let menu = self.menus.navigate_back(ctx.user(), &ctx.locale).await?;
                self.metrics
                    .record_menu(&menu, self.menus.navigation().depth(ctx.user()));
                Ok(())
            }
            None => {
                debug!(user_id = %ctx.user(), "Free-form text");
                self.remind(ctx).await
            }
        }
    }

    async fn on_callback(
        &self,
        ctx: &ActionContext<'_>,
        callback_id: &str,
        data: &str,
    ) -> Result<(), TransportError> {
        if let Err(e) = self.transport.answer_callback(callback_id, None).await {
            warn!(user_id = %ctx.user(), error = %e, "Failed to acknowledge callback");
        }

        match CallbackToken::parse(data) {
            Some(token) => {
                self.dispatch(ctx, &token.action, token.payload.as_deref())
                    .await
            }
            None => {
                warn!(user_id = %ctx.user(), data, "Malformed callback data");
                Ok(())
            }
        }
    }

    async fn on_location(
        &self,
        ctx: &ActionContext<'_>,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), TransportError> {
        if ctx.current_screen() != menus::NEAR_TASKS {
            return ctx.say("location.unexpected", &[]).await;
        }

        let payload = format!("{},{}", latitude, longitude);
        self.dispatch(ctx, &BotAction::NearTasksLocation.id(), Some(&payload))
            .await
    }

    async fn dispatch(
        &self,
        ctx: &ActionContext<'_>,
        action: &ActionId,
        payload: Option<&str>,
    ) -> Result<(), TransportError> {
        let Some((bot_action, handler)) = self.actions.resolve(action) else {
            warn!(user_id = %ctx.user(), action = %action, "No handler for action");
            return ctx.say("error.unknown_action", &[]).await;
        };

        debug!(user_id = %ctx.user(), action = bot_action.as_str(), "Dispatching action");
        self.metrics.actions.inc(bot_action.as_str());

        let ctx = ActionContext {
            payload,
            ..ctx.clone()
        };
        handler.handle(&ctx).await
    }

    /// Redraw the current screen with a hint to use the keyboard
    async fn remind(&self, ctx: &ActionContext<'_>) -> Result<(), TransportError> {
        let current = ctx.current_screen();
        ctx.show_menu(&current, Some("general.use_buttons"), false)
            .await
    }

    async fn may_open(&self, user: UserId, screen: &ScreenId) -> bool {
        match self.gated.get(screen) {
            Some(&permission) => evaluate(self.policy.as_ref(), permission, user, screen).await,
            None => true,
        }
    }
}
