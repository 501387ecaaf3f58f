//! Service wiring: engine assembly, poller and HTTP server

use async_trait::async_trait;
use oracle_core::{HealthStatus, OracleError, OracleService, ReadinessStatus, Result};
use oracle_menu::{
    AccessPolicy, ButtonTextResolver, Localizer, MenuBuilder, NavigationStack,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::actions::ActionTable;
use crate::config::BotConfig;
use crate::handlers::{self, AppState, SERVICE_ID};
use crate::i18n::Catalog;
use crate::menus;
use crate::metrics::BotMetrics;
use crate::router::Router;
use crate::telegram::{Poller, TelegramTransport};
use crate::transport::BotTransport;
use crate::users::{TimedPolicy, UserDirectory};

/// Build the menu engine and router on top of `transport`
pub fn assemble<T: BotTransport + 'static>(config: &BotConfig, transport: Arc<T>) -> Result<Router> {
    let catalog = Arc::new(Catalog::embedded(&config.default_locale)?);
    let registry = Arc::new(
        menus::declare().map_err(|e| OracleError::Declaration(e.to_string()))?,
    );

    let users = Arc::new(UserDirectory::new(
        config.admin_ids.iter().copied(),
        catalog.default_locale().clone(),
    ));
    let policy: Arc<dyn AccessPolicy> =
        Arc::new(TimedPolicy::new(users.clone(), config.permission_timeout));
    let localizer: Arc<dyn Localizer> = catalog.clone();

    let navigation = Arc::new(
        NavigationStack::new(registry.root().clone())
            .with_deep_threshold(config.deep_navigation_threshold),
    );
    let menus = MenuBuilder::new(
        registry.clone(),
        navigation,
        localizer.clone(),
        policy.clone(),
        transport.clone(),
    );

    let resolver = Arc::new(ButtonTextResolver::new(
        registry.clone(),
        localizer,
        users.clone(),
    ));
    if !resolver.collisions().is_empty() {
        warn!(
            collisions = resolver.collisions().len(),
            "Some button labels are unreachable through text"
        );
    }

    let actions = Arc::new(ActionTable::with_builtin_handlers());
    let unhandled = actions.unhandled(&registry);

    info!(
        screens = registry.len(),
        handlers = actions.len(),
        unhandled = unhandled.len(),
        locales = catalog.locales().len(),
        "Menu engine assembled"
    );

    Ok(Router::new(
        menus,
        resolver,
        actions,
        users,
        policy,
        catalog,
        transport,
        Arc::new(BotMetrics::new()),
    ))
}

pub struct BotService {
    config: BotConfig,
    state: AppState,
    transport: Arc<TelegramTransport>,
    shutdown: watch::Sender<bool>,
}

impl BotService {
    pub fn new(config: BotConfig) -> Result<Self> {
        let transport = Arc::new(
            TelegramTransport::new(
                &config.telegram_api_url,
                config.telegram_token.clone(),
                config.poll_timeout_secs,
            )
            .map_err(|e| OracleError::Config(e.to_string()))?,
        );
        let router = Arc::new(assemble(&config, transport.clone())?);
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            state: AppState {
                router,
                telegram_connected: Arc::new(AtomicBool::new(false)),
                start_time: Instant::now(),
            },
            transport,
            shutdown,
        })
    }
}

#[async_trait]
impl OracleService for BotService {
    fn service_id(&self) -> &'static str {
        SERVICE_ID
    }

    async fn health(&self) -> HealthStatus {
        self.state.health()
    }

    async fn ready(&self) -> ReadinessStatus {
        self.state.readiness()
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Shutting down Oracle bot");
        let _ = self.shutdown.send(true);
        self.state.router.metrics().log_summary();
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let http_bind = self.config.service.http_bind();
        info!(http = %http_bind, "Starting Oracle bot servers");

        let poller = Poller::new(
            self.transport.clone(),
            self.state.router.clone(),
            self.config.poll_timeout_secs,
            self.state.telegram_connected.clone(),
        );
        tokio::spawn(poller.run(self.shutdown.subscribe()));

        let app = handlers::routes(self.state.clone());
        let listener = tokio::net::TcpListener::bind(&http_bind).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
