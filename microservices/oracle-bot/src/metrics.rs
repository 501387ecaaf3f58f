//! Bot metrics exposed on `/metrics`

use oracle_menu::RenderedMenu;
use oracle_telemetry::{Counter, Gauge, Histogram, HistogramSnapshot, LabeledCounter};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

pub struct BotMetrics {
    pub commands: LabeledCounter,
    pub events: LabeledCounter,
    pub actions: LabeledCounter,
    pub messages_sent: LabeledCounter,
    pub menus_rendered: Counter,
    pub fallback_renders: Counter,
    pub resolver_hits: Counter,
    pub resolver_misses: Counter,
    pub new_users: Counter,
    pub send_failures: Counter,
    pub tracked_users: Gauge,
    pub navigation_depth: Histogram,
    pub event_latency_ms: Histogram,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub commands: BTreeMap<String, u64>,
    pub events: BTreeMap<String, u64>,
    pub actions: BTreeMap<String, u64>,
    pub messages_sent: BTreeMap<String, u64>,
    pub menus_rendered: u64,
    pub fallback_renders: u64,
    pub resolver_hits: u64,
    pub resolver_misses: u64,
    pub new_users: u64,
    pub send_failures: u64,
    pub tracked_users: u64,
    pub navigation_depth: HistogramSnapshot,
    pub event_latency_ms: HistogramSnapshot,
}

impl BotMetrics {
    pub fn new() -> Self {
        Self {
            commands: LabeledCounter::new("commands_received_total", "command"),
            events: LabeledCounter::new("events_total", "kind"),
            actions: LabeledCounter::new("actions_dispatched_total", "action"),
            messages_sent: LabeledCounter::new("messages_sent_total", "type"),
            menus_rendered: Counter::new("menus_rendered_total"),
            fallback_renders: Counter::new("fallback_renders_total"),
            resolver_hits: Counter::new("resolver_hits_total"),
            resolver_misses: Counter::new("resolver_misses_total"),
            new_users: Counter::new("new_users_total"),
            send_failures: Counter::new("send_failures_total"),
            tracked_users: Gauge::new("tracked_users"),
            navigation_depth: Histogram::with_capacity("navigation_depth", 4096),
            event_latency_ms: Histogram::with_capacity("event_latency_ms", 4096),
        }
    }

    /// Account for a menu that reached the transport
    pub fn record_menu(&self, menu: &RenderedMenu, depth: usize) {
        self.menus_rendered.inc();
        if menu.fallback {
            self.fallback_renders.inc();
        }
        self.messages_sent.inc("menu");
        self.navigation_depth.record(depth as f64);
    }

    /// Write final totals to the log, one line per metric
    pub fn log_summary(&self) {
        for labeled in [&self.commands, &self.events, &self.actions, &self.messages_sent] {
            info!(metric = labeled.name(), label = labeled.label(), values = ?labeled.snapshot(), "Metric totals");
        }
        for counter in [
            &self.menus_rendered,
            &self.fallback_renders,
            &self.resolver_hits,
            &self.resolver_misses,
            &self.new_users,
            &self.send_failures,
        ] {
            info!(metric = counter.name(), value = counter.get(), "Metric totals");
        }
        info!(metric = self.tracked_users.name(), value = self.tracked_users.get(), "Metric totals");
        for histogram in [&self.navigation_depth, &self.event_latency_ms] {
            let snap = histogram.snapshot();
            info!(metric = histogram.name(), count = snap.count, p50 = snap.p50, p95 = snap.p95, "Metric totals");
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands: self.commands.snapshot(),
            events: self.events.snapshot(),
            actions: self.actions.snapshot(),
            messages_sent: self.messages_sent.snapshot(),
            menus_rendered: self.menus_rendered.get(),
            fallback_renders: self.fallback_renders.get(),
            resolver_hits: self.resolver_hits.get(),
            resolver_misses: self.resolver_misses.get(),
            new_users: self.new_users.get(),
            send_failures: self.send_failures.get(),
            tracked_users: self.tracked_users.get(),
            navigation_depth: self.navigation_depth.snapshot(),
            event_latency_ms: self.event_latency_ms.snapshot(),
        }
    }
}

impl Default for BotMetrics {
    fn default() -> Self {
        Self::new()
    }
}
