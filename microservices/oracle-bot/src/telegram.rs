//! Telegram Bot API transport and long poller

use async_trait::async_trait;
use oracle_core::UserId;
use oracle_menu::{
    CallbackToken, Element, ElementAction, ElementKind, Keyboard, MenuTransport, TransportError,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::router::{EventKind, InboundEvent, Router};
use crate::transport::BotTransport;

/// Pause after a failed poll before asking again
const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Bot API limit on `callback_data`, in bytes
const CALLBACK_DATA_LIMIT: usize = 64;

/// A user's worker exits after this long without events
const WORKER_IDLE: Duration = Duration::from_secs(60);

pub struct TelegramTransport {
    api_url: String,
    bot_token: String,
    http_client: reqwest::Client,
}

impl TelegramTransport {
    pub fn new(api_url: &str, bot_token: String, poll_timeout_secs: u64) -> Result<Self, TransportError> {
        // Leave headroom over the long-poll timeout
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token,
            http_client,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.bot_token, method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> Result<T, TransportError> {
        let response = self
            .http_client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))?;

        match (body.ok, body.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TransportError::Rejected(
                body.description
                    .unwrap_or_else(|| format!("{} failed", method)),
            )),
        }
    }

    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, TransportError> {
        let payload = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        self.call("getUpdates", &payload).await
    }
}

#[async_trait]
impl MenuTransport for TelegramTransport {
    async fn send(
        &self,
        user: UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        let mut payload = json!({
            "chat_id": user.as_i64(),
            "text": text,
        });
        if let Some(keyboard) = keyboard.filter(|k| !k.is_empty()) {
            payload["reply_markup"] = to_reply_markup(keyboard);
        }

        let _: Value = self.call("sendMessage", &payload).await?;
        debug!(user_id = %user, "Message sent");
        Ok(())
    }
}

#[async_trait]
impl BotTransport for TelegramTransport {
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut payload = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            payload["text"] = json!(text);
        }
        let _: Value = self.call("answerCallbackQuery", &payload).await?;
        Ok(())
    }
}

/// Abstract keyboard to `reply_markup`: an inline keyboard when any element
/// is opaque, a persistent reply keyboard otherwise
pub fn to_reply_markup(keyboard: &Keyboard) -> Value {
    if keyboard.is_inline() {
        let rows: Vec<Vec<Value>> = keyboard
            .rows
            .iter()
            .map(|row| row.iter().filter_map(inline_button).collect::<Vec<_>>())
            .filter(|row| !row.is_empty())
            .collect();
        return json!({ "inline_keyboard": rows });
    }

    let rows: Vec<Vec<Value>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|element| match element.kind {
                    ElementKind::Location => {
                        json!({ "text": element.text, "request_location": true })
                    }
                    _ => json!({ "text": element.text }),
                })
                .collect()
        })
        .collect();
    json!({ "keyboard": rows, "resize_keyboard": true })
}

/// Inline buttons can only carry callback data. Action elements get a bare
/// token; navigation elements work by echoed text and are left out.
fn inline_button(element: &Element) -> Option<Value> {
    let data = match (&element.kind, &element.action) {
        (ElementKind::Callback(token), _) => token.clone(),
        (_, ElementAction::Action(action)) => CallbackToken::new(action.clone()).encode(),
        _ => {
            debug!(text = %element.text, "Navigation element dropped from inline keyboard");
            return None;
        }
    };

    if data.len() > CALLBACK_DATA_LIMIT {
        warn!(text = %element.text, bytes = data.len(), "Callback data too long, button dropped");
        return None;
    }
    Some(json!({ "text": element.text, "callback_data": data }))
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub from: Option<User>,
    pub text: Option<String>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Update {
    /// Events the bot does not serve (stickers, channel posts, ...) map to `None`
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(query) = self.callback_query {
            return Some(InboundEvent {
                user: UserId(query.from.id),
                language_code: query.from.language_code,
                kind: EventKind::Callback {
                    id: query.id,
                    data: query.data.unwrap_or_default(),
                },
            });
        }

        let message = self.message?;
        let from = message.from?;
        let user = UserId(from.id);

        if let Some(location) = message.location {
            return Some(InboundEvent {
                user,
                language_code: from.language_code,
                kind: EventKind::Location {
                    latitude: location.latitude,
                    longitude: location.longitude,
                },
            });
        }

        let text = message.text?;
        Some(InboundEvent::from_text(user, from.language_code, &text))
    }
}

/// Per-user ordered workers.
///
/// Each user with pending events has one task draining that user's queue in
/// arrival order, so a slow or failing send only delays the same user.
pub struct Dispatcher {
    router: Arc<Router>,
    idle: Duration,
    workers: HashMap<UserId, UserWorker>,
}

struct UserWorker {
    queue: mpsc::UnboundedSender<InboundEvent>,
    task: JoinHandle<()>,
}

impl Dispatcher {
    pub fn new(router: Arc<Router>, idle: Duration) -> Self {
        Self {
            router,
            idle,
            workers: HashMap::new(),
        }
    }

    /// Queue `event` behind the user's earlier events without waiting for them
    pub fn dispatch(&mut self, event: InboundEvent) {
        let user = event.user;
        let event = match self.workers.get(&user) {
            Some(worker) => match worker.queue.send(event) {
                Ok(()) => return,
                // Worker went idle and closed its queue
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        // A closing worker may still be draining; the successor waits for it
        let previous = self.workers.remove(&user).map(|worker| worker.task);
        let (queue, events) = mpsc::unbounded_channel();
        let _ = queue.send(event);
        let task = tokio::spawn(serve_user(self.router.clone(), events, previous, self.idle));

        debug!(user_id = %user, workers = self.workers.len() + 1, "Started user worker");
        self.workers.insert(user, UserWorker { queue, task });
    }

    /// Forget workers that have exited
    pub fn prune(&mut self) {
        self.workers.retain(|_, worker| !worker.task.is_finished());
    }

    pub fn active(&self) -> usize {
        self.workers.len()
    }
}

async fn serve_user(
    router: Arc<Router>,
    mut events: mpsc::UnboundedReceiver<InboundEvent>,
    previous: Option<JoinHandle<()>>,
    idle: Duration,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    // Failures are logged and counted by the router
    while let Ok(Some(event)) = tokio::time::timeout(idle, events.recv()).await {
        let _ = router.handle(event).await;
    }

    events.close();
    while let Ok(event) = events.try_recv() {
        let _ = router.handle(event).await;
    }
}

/// `getUpdates` loop. Events are handed to per-user workers and the next
/// poll starts right away.
pub struct Poller {
    transport: Arc<TelegramTransport>,
    dispatcher: Dispatcher,
    timeout_secs: u64,
    /// Outcome of the latest poll, reported on `/ready`
    connected: Arc<AtomicBool>,
}

impl Poller {
    pub fn new(
        transport: Arc<TelegramTransport>,
        router: Arc<Router>,
        timeout_secs: u64,
        connected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            dispatcher: Dispatcher::new(router, WORKER_IDLE),
            timeout_secs,
            connected,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(timeout_secs = self.timeout_secs, "Starting update poller");
        let mut offset = 0;

        loop {
            let updates = tokio::select! {
                _ = shutdown.changed() => break,
                updates = self.transport.get_updates(offset, self.timeout_secs) => updates,
            };

            self.connected.store(updates.is_ok(), Ordering::Relaxed);
            let updates = match updates {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "Polling failed, retrying");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            if let Some(last) = updates.iter().map(|u| u.update_id).max() {
                offset = last + 1;
            }

            self.dispatcher.prune();
            let events: Vec<InboundEvent> = updates.into_iter().filter_map(Update::into_event).collect();
            if events.is_empty() {
                continue;
            }
            debug!(events = events.len(), workers = self.dispatcher.active(), "Received updates");

            for event in events {
                self.dispatcher.dispatch(event);
            }
        }

        info!("Update poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_menu::{ActionId, ScreenId};

    #[test]
    fn test_reply_keyboard_markup() {
        let keyboard = Keyboard::new(vec![
            vec![Element::location(
                "📍 Send location",
                ElementAction::Action(ActionId::new("near_tasks_location")),
            )],
            vec![Element::text("⬅️ Back", ElementAction::Back)],
        ]);

        assert_eq!(
            to_reply_markup(&keyboard),
            json!({
                "keyboard": [
                    [{ "text": "📍 Send location", "request_location": true }],
                    [{ "text": "⬅️ Back" }],
                ],
                "resize_keyboard": true,
            })
        );
    }

    #[test]
    fn test_inline_keyboard_markup() {
        let keyboard = Keyboard::new(vec![
            vec![
                Element::callback(
                    "English",
                    CallbackToken::with_payload(ActionId::new("set_language"), "en"),
                ),
                Element::text("Today", ElementAction::Action(ActionId::new("statistic_today"))),
            ],
            vec![Element::text("Profile", ElementAction::Navigate(ScreenId::new("profile")))],
            vec![Element::text("⬅️ Back", ElementAction::Back)],
        ]);

        assert_eq!(
            to_reply_markup(&keyboard),
            json!({
                "inline_keyboard": [[
                    { "text": "English", "callback_data": "set_language:en" },
                    { "text": "Today", "callback_data": "statistic_today" },
                ]],
            })
        );
    }

    #[test]
    fn test_oversized_callback_data_dropped() {
        let keyboard = Keyboard::new(vec![vec![
            Element::callback("Short", CallbackToken::new(ActionId::new("language"))),
            Element::callback(
                "Long",
                CallbackToken::with_payload(ActionId::new("set_language"), "x".repeat(60)),
            ),
        ]]);

        assert_eq!(
            to_reply_markup(&keyboard),
            json!({ "inline_keyboard": [[{ "text": "Short", "callback_data": "language" }]] })
        );
    }

    #[test]
    fn test_updates_become_events() {
        let raw = json!([
            { "update_id": 1, "message": { "from": { "id": 7, "language_code": "uk" }, "text": "/start" } },
            { "update_id": 2, "message": { "from": { "id": 7 }, "text": "Профіль" } },
            { "update_id": 3, "callback_query": { "id": "cb1", "from": { "id": 8 }, "data": "set_language:en" } },
            { "update_id": 4, "message": { "from": { "id": 8 }, "location": { "latitude": 50.45, "longitude": 30.52 } } },
            { "update_id": 5, "message": { "from": { "id": 9 } } },
        ]);
        let updates: Vec<Update> = serde_json::from_value(raw).unwrap();
        let events: Vec<InboundEvent> = updates.into_iter().filter_map(Update::into_event).collect();

        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0].kind,
            EventKind::Command {
                name: "start".to_string(),
                args: String::new()
            }
        );
        assert_eq!(events[0].language_code.as_deref(), Some("uk"));
        assert_eq!(events[1].kind, EventKind::Text("Профіль".to_string()));
        assert_eq!(
            events[2].kind,
            EventKind::Callback {
                id: "cb1".to_string(),
                data: "set_language:en".to_string()
            }
        );
        assert_eq!(
            events[3].kind,
            EventKind::Location {
                latitude: 50.45,
                longitude: 30.52
            }
        );
    }

    #[test]
    fn test_command_with_bot_suffix() {
        let event = InboundEvent::from_text(UserId(1), None, "/language@oracle_bot now");
        assert_eq!(
            event.kind,
            EventKind::Command {
                name: "language".to_string(),
                args: "now".to_string()
            }
        );
    }
}
