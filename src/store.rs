use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::{Report, ReportPatch};
use crate::monitor::MonitorEvent;

/// Process-held monotonic run counter. Starting a new run or cancelling
/// bumps the counter, which invalidates every token captured earlier.
#[derive(Debug, Clone, Default)]
pub struct RunCounter {
    counter: Arc<AtomicU64>,
}

impl RunCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run: bump the counter and capture the new value.
    pub fn begin(&self) -> RunToken {
        let value = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        RunToken {
            counter: self.counter.clone(),
            value,
        }
    }

    /// Invalidate all outstanding tokens without starting a run.
    pub fn cancel(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Captured run identifier, compared against the live counter. Cancellation
/// is cooperative: the orchestrator polls between stages.
#[derive(Debug, Clone)]
pub struct RunToken {
    counter: Arc<AtomicU64>,
    value: u64,
}

impl RunToken {
    pub fn is_cancelled(&self) -> bool {
        self.counter.load(Ordering::SeqCst) != self.value
    }
}

/// In-memory report collection, at most one report per watchlist item.
/// Written only by applying orchestrator events; readers take snapshots.
#[derive(Debug, Clone, Default)]
pub struct ReportStore {
    reports: Arc<Mutex<Vec<Report>>>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, event: &MonitorEvent) {
        match event {
            MonitorEvent::Init(report) => self.upsert(report.clone()),
            MonitorEvent::Update { item_id, patch } => self.update(item_id, patch),
        }
    }

    /// Replace any previous report for the same watchlist item, keeping the
    /// newest report first.
    pub fn upsert(&self, report: Report) {
        let mut reports = self.reports.lock().unwrap();
        reports.retain(|r| r.watchlist_item_id != report.watchlist_item_id);
        reports.insert(0, report);
    }

    /// Merge a patch into the item's report. No-op when the item has no
    /// report yet (e.g. a cancelled item that never started).
    pub fn update(&self, item_id: &str, patch: &ReportPatch) {
        let mut reports = self.reports.lock().unwrap();
        if let Some(report) = reports.iter_mut().find(|r| r.watchlist_item_id == item_id) {
            report.apply(patch);
        }
    }

    pub fn get(&self, item_id: &str) -> Option<Report> {
        self.reports.lock().unwrap().iter().find(|r| r.watchlist_item_id == item_id).cloned()
    }

    pub fn all(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }
}
