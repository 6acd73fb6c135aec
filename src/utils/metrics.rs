//! Run metrics for the audit pipeline
//! Author: kartik4091
//! Created: 2025-06-05

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::info;

pub const DOCUMENTS_AUDITED: &str = "documents_audited";
pub const DOCUMENTS_ERRORED: &str = "documents_errored";
pub const DOCUMENTS_TIMED_OUT: &str = "documents_timed_out";
pub const DOCUMENTS_SKIPPED: &str = "documents_skipped";
pub const PAGES_AUDITED: &str = "pages_audited";
pub const PAGES_FLAGGED: &str = "pages_flagged";
pub const CORPUS_TIMER: &str = "corpus";

/// Counters and timers shared by every worker of a run
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    counters: Arc<RwLock<HashMap<String, u64>>>,
    timers: Arc<RwLock<HashMap<String, Duration>>>,
    start_times: Arc<RwLock<HashMap<String, Instant>>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_counter(&self, name: &str) {
        self.add_to_counter(name, 1);
    }

    pub fn add_to_counter(&self, name: &str, amount: u64) {
        let mut counters = self.counters.write();
        *counters.entry(name.to_string()).or_insert(0) += amount;
    }

    pub fn start_timer(&self, name: &str) {
        self.start_times.write().insert(name.to_string(), Instant::now());
    }

    pub fn end_timer(&self, name: &str) {
        if let Some(start_time) = self.start_times.write().remove(name) {
            self.timers.write().insert(name.to_string(), start_time.elapsed());
        }
    }

    pub fn get_counter(&self, name: &str) -> u64 {
        self.counters.read().get(name).copied().unwrap_or(0)
    }

    pub fn get_timer(&self, name: &str) -> Option<Duration> {
        self.timers.read().get(name).copied()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.read().iter().map(|(k, v)| (k.clone(), *v)).collect(),
            timers: self.timers.read().iter().map(|(k, v)| (k.clone(), *v)).collect(),
        }
    }
}

/// Point-in-time copy, sorted by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub timers: BTreeMap<String, Duration>,
}

impl MetricsSnapshot {
    pub fn log(&self) {
        info!("📊 Run metrics:");
        for (name, value) in &self.counters {
            info!("   {}: {}", name, value);
        }
        for (name, elapsed) in &self.timers {
            info!("   {} time: {:.2?}", name, elapsed);
        }
    }
}
