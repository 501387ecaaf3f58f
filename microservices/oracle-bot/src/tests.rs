use async_trait::async_trait;
use axum::extract::{Path, State};
use oracle_core::UserId;
use oracle_menu::{ElementKind, Keyboard, Locale, MenuTransport, TransportError};
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::config::BotConfig;
use crate::handlers::{self, AppState};
use crate::menus;
use crate::router::{EventKind, InboundEvent, Router};
use crate::service::assemble;
use crate::telegram::Dispatcher;
use crate::transport::BotTransport;

const ADMIN: UserId = UserId(1);
const WORKER: UserId = UserId(2);

#[derive(Debug, Clone)]
struct Sent {
    user: UserId,
    text: String,
    keyboard: Option<Keyboard>,
}

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    answered: Mutex<Vec<String>>,
}

impl RecordingTransport {
    fn last(&self) -> Sent {
        self.sent.lock().last().cloned().expect("nothing sent")
    }

    fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl MenuTransport for RecordingTransport {
    async fn send(
        &self,
        user: UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        self.sent.lock().push(Sent {
            user,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }
}

#[async_trait]
impl BotTransport for RecordingTransport {
    async fn answer_callback(
        &self,
        callback_id: &str,
        _text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.answered.lock().push(callback_id.to_string());
        Ok(())
    }
}

fn config() -> BotConfig {
    BotConfig::from_lookup(|key: &str| match key {
        "TELEGRAM_BOT_TOKEN" => Some("test-token".to_string()),
        "ADMIN_IDS" => Some("1".to_string()),
        _ => None,
    })
    .unwrap()
}

fn setup() -> (Router, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let router = assemble(&config(), transport.clone()).unwrap();
    (router, transport)
}

fn text(user: UserId, body: &str) -> InboundEvent {
    InboundEvent::from_text(user, None, body)
}

fn labels(sent: &Sent) -> Vec<Vec<String>> {
    sent.keyboard
        .as_ref()
        .map(|k| {
            k.labels()
                .into_iter()
                .map(|row| row.into_iter().map(str::to_string).collect())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_start_shows_root() {
    let (router, transport) = setup();

    router.handle(text(WORKER, "/start")).await.unwrap();

    let sent = transport.last();
    assert_eq!(sent.user, WORKER);
    assert_eq!(sent.text, "Welcome! Use the menu below to get started.");
    assert_eq!(
        labels(&sent),
        vec![
            vec!["📋 Tasks"],
            vec!["Profile"],
            vec!["More"],
            vec!["🚪 Log out"],
        ]
    );
    assert_eq!(router.menus().navigation().path(WORKER), vec![menus::MAIN]);
}

#[tokio::test]
async fn test_start_resets_history() {
    let (router, _) = setup();

    router.handle(text(WORKER, "/start")).await.unwrap();
    router.handle(text(WORKER, "Profile")).await.unwrap();
    router.handle(text(WORKER, "/start")).await.unwrap();

    assert_eq!(router.menus().navigation().path(WORKER), vec![menus::MAIN]);
}

#[tokio::test]
async fn test_drill_down_and_back() {
    let (router, transport) = setup();

    router.handle(text(WORKER, "/start")).await.unwrap();
    router.handle(text(WORKER, "Profile")).await.unwrap();
    router.handle(text(WORKER, "My statistics")).await.unwrap();
    assert_eq!(transport.last().text, "Pick a period");
    assert_eq!(
        router.menus().navigation().path(WORKER),
        vec![menus::MAIN, menus::PROFILE, menus::STATS]
    );

    router.handle(text(WORKER, "⬅️ Back")).await.unwrap();
    assert_eq!(transport.last().text, "Your profile");
    router.handle(text(WORKER, "⬅️ Back")).await.unwrap();
    assert_eq!(transport.last().text, "Welcome back!");
    assert_eq!(router.menus().navigation().path(WORKER), vec![menus::MAIN]);
}

#[tokio::test]
async fn test_admin_panel_visibility() {
    let (router, transport) = setup();

    for user in [ADMIN, WORKER] {
        router.handle(text(user, "/start")).await.unwrap();
        router.handle(text(user, "More")).await.unwrap();
    }

    let admin_more = transport
        .sent
        .lock()
        .iter()
        .filter(|s| s.user == ADMIN)
        .last()
        .cloned()
        .unwrap();
    assert_eq!(
        labels(&admin_more),
        vec![
            vec!["🌐 Language"],
            vec!["Report an issue"],
            vec!["Admin panel"],
            vec!["⬅️ Back"],
        ]
    );

    let worker_more = transport.last();
    assert_eq!(
        labels(&worker_more),
        vec![vec!["🌐 Language"], vec!["Report an issue"], vec!["⬅️ Back"]]
    );
}

#[tokio::test]
async fn test_typed_admin_label_refused_for_workers() {
    let (router, transport) = setup();

    router.handle(text(WORKER, "/start")).await.unwrap();
    router.handle(text(WORKER, "Admin panel")).await.unwrap();

    assert_eq!(transport.last().text, "Please use the buttons below.");
    assert_eq!(router.menus().navigation().path(WORKER), vec![menus::MAIN]);

    router.handle(text(WORKER, "Broadcast")).await.unwrap();
    assert_eq!(transport.last().text, "You do not have access to this option.");

    router.handle(text(ADMIN, "/start")).await.unwrap();
    router.handle(text(ADMIN, "Admin panel")).await.unwrap();
    assert_eq!(router.menus().navigation().current(ADMIN), menus::ADMIN);
    router.handle(text(ADMIN, "Broadcast")).await.unwrap();
    assert_eq!(transport.last().text, "Broadcasts are sent from the admin console.");
}

#[tokio::test]
async fn test_free_text_redraws_current_screen() {
    let (router, transport) = setup();

    router.handle(text(WORKER, "/start")).await.unwrap();
    router.handle(text(WORKER, "More")).await.unwrap();
    router.handle(text(WORKER, "hello?")).await.unwrap();

    let sent = transport.last();
    assert_eq!(sent.text, "Please use the buttons below.");
    assert_eq!(labels(&sent)[0], vec!["🌐 Language"]);
    assert_eq!(
        router.menus().navigation().path(WORKER),
        vec![menus::MAIN, menus::MORE]
    );
}

#[tokio::test]
async fn test_language_switch_via_callback() {
    let (router, transport) = setup();

    router.handle(text(WORKER, "/start")).await.unwrap();
    router.handle(text(WORKER, "More")).await.unwrap();
    router.handle(text(WORKER, "/language")).await.unwrap();

    let choice = transport.last();
    assert_eq!(choice.text, "Choose your language:");
    let tokens: Vec<String> = choice
        .keyboard
        .as_ref()
        .unwrap()
        .elements()
        .filter_map(|e| match &e.kind {
            ElementKind::Callback(token) => Some(token.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(tokens, vec!["set_language:en", "set_language:uk"]);

    router
        .handle(InboundEvent {
            user: WORKER,
            language_code: None,
            kind: EventKind::Callback {
                id: "cb-1".to_string(),
                data: "set_language:uk".to_string(),
            },
        })
        .await
        .unwrap();

    assert_eq!(*transport.answered.lock(), vec!["cb-1".to_string()]);
    assert_eq!(router.users().locale(WORKER), Locale::from_static("uk"));

    let redrawn = transport.last();
    assert_eq!(redrawn.text, "Мову змінено.");
    assert_eq!(labels(&redrawn)[0], vec!["🌐 Мова"]);
    // Still on the screen the language was changed from
    assert_eq!(router.menus().navigation().current(WORKER), menus::MORE);

    // Stale English keyboard keeps working
    router.handle(text(WORKER, "⬅️ Back")).await.unwrap();
    assert_eq!(router.menus().navigation().current(WORKER), menus::MAIN);
    assert_eq!(transport.last().text, "З поверненням!");
}

#[tokio::test]
async fn test_unknown_language_rejected() {
    let (router, transport) = setup();

    router
        .handle(InboundEvent {
            user: WORKER,
            language_code: None,
            kind: EventKind::Callback {
                id: "cb-2".to_string(),
                data: "set_language:fr".to_string(),
            },
        })
        .await
        .unwrap();

    assert_eq!(transport.last().text, "This language is not supported.");
    assert_eq!(router.users().locale(WORKER), Locale::from_static("en"));
}

#[tokio::test]
async fn test_locale_detected_on_first_contact() {
    let (router, transport) = setup();

    router
        .handle(InboundEvent::from_text(WORKER, Some("uk".to_string()), "/start"))
        .await
        .unwrap();

    let sent = transport.last();
    assert_eq!(sent.text, "Вітаємо! Скористайтеся меню нижче.");
    assert_eq!(labels(&sent)[0], vec!["📋 Завдання"]);
    assert_eq!(router.metrics().new_users.get(), 1);
}

#[tokio::test]
async fn test_location_only_on_near_tasks_screen() {
    let (router, transport) = setup();
    let location = InboundEvent {
        user: WORKER,
        language_code: None,
        kind: EventKind::Location {
            latitude: 50.45,
            longitude: 30.52,
        },
    };

    router.handle(text(WORKER, "/start")).await.unwrap();
    router.handle(location.clone()).await.unwrap();
    assert_eq!(
        transport.last().text,
        "Open \"Tasks near me\" before sending a location."
    );

    router.handle(text(WORKER, "📋 Tasks")).await.unwrap();
    router.handle(text(WORKER, "Tasks near me")).await.unwrap();
    let prompt = transport.last();
    assert_eq!(prompt.text, "Share your location and I will look for tasks nearby.");
    assert_eq!(
        prompt.keyboard.as_ref().unwrap().rows[0][0].kind,
        ElementKind::Location
    );

    router.handle(location).await.unwrap();
    assert_eq!(
        transport.last().text,
        "Location received (50.45, 30.52). Searching for tasks nearby."
    );
}

#[tokio::test]
async fn test_logout_returns_to_root() {
    let (router, transport) = setup();

    router.handle(text(WORKER, "/start")).await.unwrap();
    router.handle(text(WORKER, "Profile")).await.unwrap();
    router.handle(text(WORKER, "⬅️ Back")).await.unwrap();
    router.handle(text(WORKER, "🚪 Log out")).await.unwrap();

    assert_eq!(transport.last().text, "You have been logged out.");
    assert_eq!(router.menus().navigation().path(WORKER), vec![menus::MAIN]);
}

#[tokio::test]
async fn test_statistics_notice_uses_period_label() {
    let (router, transport) = setup();

    router.handle(text(WORKER, "This month")).await.unwrap();
    assert_eq!(
        transport.last().text,
        "Statistics for This month will be sent shortly."
    );
}

#[tokio::test]
async fn test_metrics_track_events() {
    let (router, transport) = setup();

    router.handle(text(WORKER, "/start")).await.unwrap();
    router.handle(text(WORKER, "Profile")).await.unwrap();
    router.handle(text(WORKER, "gibberish")).await.unwrap();

    let snapshot = router.metrics().snapshot();
    assert_eq!(snapshot.commands.get("start"), Some(&1));
    assert_eq!(snapshot.events.get("command"), Some(&1));
    assert_eq!(snapshot.events.get("text"), Some(&2));
    assert_eq!(snapshot.resolver_hits, 1);
    assert_eq!(snapshot.resolver_misses, 1);
    assert_eq!(snapshot.menus_rendered, 3);
    assert_eq!(snapshot.tracked_users, 1);
    assert_eq!(snapshot.new_users, 1);
    assert_eq!(transport.count(), 3);
}

#[tokio::test]
async fn test_readiness_follows_telegram() {
    let (router, _) = setup();
    let state = AppState {
        router: Arc::new(router),
        telegram_connected: Arc::new(AtomicBool::new(false)),
        start_time: Instant::now(),
    };

    assert!(!state.readiness().ready);
    state
        .telegram_connected
        .store(true, std::sync::atomic::Ordering::Relaxed);
    assert!(state.readiness().ready);
    assert_eq!(state.health().service_id, "oracle-bot");
}

#[tokio::test]
async fn test_unknown_commands_share_one_label() {
    let (router, _) = setup();

    router.handle(text(WORKER, "/start")).await.unwrap();
    router.handle(text(WORKER, "/language")).await.unwrap();
    for n in 0..100 {
        router.handle(text(WORKER, &format!("/junk{}", n))).await.unwrap();
    }

    let commands = router.metrics().snapshot().commands;
    assert_eq!(commands.len(), 3);
    assert_eq!(commands.get("start"), Some(&1));
    assert_eq!(commands.get("language"), Some(&1));
    assert_eq!(commands.get("unknown"), Some(&100));
}

#[tokio::test]
async fn test_navigation_view_reports_first_seen() {
    let (router, _) = setup();
    let state = AppState {
        router: Arc::new(router),
        telegram_connected: Arc::new(AtomicBool::new(true)),
        start_time: Instant::now(),
    };

    let view = handlers::get_navigation(State(state.clone()), Path("2".to_string()))
        .await
        .unwrap()
        .0;
    assert!(view.first_seen.is_none());

    state.router.handle(text(WORKER, "/start")).await.unwrap();
    let view = handlers::get_navigation(State(state.clone()), Path("2".to_string()))
        .await
        .unwrap()
        .0;
    assert!(view.first_seen.is_some());
    assert_eq!(view.depth, 1);
}

/// Holds every send to `stalled` until the gate is opened
struct StallingTransport {
    inner: RecordingTransport,
    stalled: UserId,
    gate: Semaphore,
}

#[async_trait]
impl MenuTransport for StallingTransport {
    async fn send(
        &self,
        user: UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        if user == self.stalled {
            self.gate.acquire().await.unwrap().forget();
        }
        self.inner.send(user, text, keyboard).await
    }
}

#[async_trait]
impl BotTransport for StallingTransport {
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.inner.answer_callback(callback_id, text).await
    }
}

fn sent_to(transport: &StallingTransport, user: UserId) -> Vec<String> {
    transport
        .inner
        .sent
        .lock()
        .iter()
        .filter(|sent| sent.user == user)
        .map(|sent| sent.text.clone())
        .collect()
}

async fn wait_for_sends(transport: &StallingTransport, user: UserId, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while sent_to(transport, user).len() < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("sends did not arrive");
}

#[tokio::test]
async fn test_slow_user_does_not_hold_up_others() {
    let transport = Arc::new(StallingTransport {
        inner: RecordingTransport::default(),
        stalled: ADMIN,
        gate: Semaphore::new(0),
    });
    let router = Arc::new(assemble(&config(), transport.clone()).unwrap());
    let mut dispatcher = Dispatcher::new(router.clone(), Duration::from_secs(60));

    for user in [ADMIN, WORKER] {
        dispatcher.dispatch(text(user, "/start"));
        dispatcher.dispatch(text(user, "Profile"));
    }
    assert_eq!(dispatcher.active(), 2);

    wait_for_sends(&transport, WORKER, 2).await;
    assert_eq!(
        router.menus().navigation().path(WORKER),
        vec![menus::MAIN, menus::PROFILE]
    );
    assert!(sent_to(&transport, ADMIN).is_empty());

    transport.gate.add_permits(10);
    wait_for_sends(&transport, ADMIN, 2).await;
    assert_eq!(
        sent_to(&transport, ADMIN),
        vec!["Welcome! Use the menu below to get started.", "Your profile"]
    );
}

#[tokio::test]
async fn test_idle_worker_replaced_on_next_event() {
    let transport = Arc::new(StallingTransport {
        inner: RecordingTransport::default(),
        stalled: ADMIN,
        gate: Semaphore::new(0),
    });
    let router = Arc::new(assemble(&config(), transport.clone()).unwrap());
    let mut dispatcher = Dispatcher::new(router.clone(), Duration::from_millis(10));

    dispatcher.dispatch(text(WORKER, "/start"));
    wait_for_sends(&transport, WORKER, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    dispatcher.prune();
    assert_eq!(dispatcher.active(), 0);

    dispatcher.dispatch(text(WORKER, "Profile"));
    wait_for_sends(&transport, WORKER, 2).await;
    assert_eq!(sent_to(&transport, WORKER)[1], "Your profile");
}
