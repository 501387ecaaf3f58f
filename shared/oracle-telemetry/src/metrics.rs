//! Metrics primitives

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic counter
#[derive(Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
    name: String,
}

impl Counter {
    pub fn new(name: &str) -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0)),
            name: name.to_string(),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Counter family partitioned by a single label value (e.g. command name)
#[derive(Clone, Default)]
pub struct LabeledCounter {
    values: Arc<Mutex<BTreeMap<String, u64>>>,
    name: String,
    label: String,
}

impl LabeledCounter {
    pub fn new(name: &str, label: &str) -> Self {
        Self {
            values: Arc::new(Mutex::new(BTreeMap::new())),
            name: name.to_string(),
            label: label.to_string(),
        }
    }

    pub fn inc(&self, label_value: &str) {
        let mut values = self.values.lock();
        *values.entry(label_value.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, label_value: &str) -> u64 {
        self.values.lock().get(label_value).copied().unwrap_or(0)
    }

    /// Copy of all label values seen so far, ordered by label
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.values.lock().clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Point-in-time gauge
#[derive(Clone, Default)]
pub struct Gauge {
    value: Arc<AtomicU64>,
    name: String,
}

impl Gauge {
    pub fn new(name: &str) -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0)),
            name: name.to_string(),
        }
    }

    pub fn set(&self, val: u64) {
        self.value.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Summary of the samples currently held by a [`Histogram`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    pub count: usize,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub max: f64,
}

/// Sliding-window histogram over the most recent samples
#[derive(Clone)]
pub struct Histogram {
    samples: Arc<Mutex<VecDeque<f64>>>,
    name: String,
    max_samples: usize,
}

impl Histogram {
    pub fn with_capacity(name: &str, max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(max_samples.min(1024)))),
            name: name.to_string(),
            max_samples,
        }
    }

    pub fn record(&self, value: f64) {
        let mut samples = self.samples.lock();
        if samples.len() >= self.max_samples {
            samples.pop_front();
        }
        samples.push_back(value);
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return HistogramSnapshot::default();
        }
        let ordered = sorted(&samples);
        HistogramSnapshot {
            count: ordered.len(),
            mean: ordered.iter().sum::<f64>() / ordered.len() as f64,
            p50: percentile_of(&ordered, 50.0),
            p95: percentile_of(&ordered, 95.0),
            max: ordered[ordered.len() - 1],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn sorted(samples: &VecDeque<f64>) -> Vec<f64> {
    let mut ordered: Vec<f64> = samples.iter().copied().collect();
    ordered.sort_by(|a, b| a.total_cmp(b));
    ordered
}

fn percentile_of(ordered: &[f64], p: f64) -> f64 {
    if ordered.is_empty() {
        return 0.0;
    }
    let idx = ((ordered.len() as f64) * p / 100.0) as usize;
    ordered[idx.min(ordered.len() - 1)]
}
