//! Per-instance sync counters.
//! Shared between the scheduler task and its handles; reads never block the scheduler.
use std::sync::atomic::{AtomicU64, Ordering};

use crate::sync::FetchKind;

#[derive(Debug, Default)]
pub struct SyncMetrics {
    ticks: AtomicU64,
    status_polls: AtomicU64,
    node_fetches: AtomicU64,
    link_fetches: AtomicU64,
    neighbor_fetches: AtomicU64,
    link_refetches: AtomicU64,
    fetches_skipped: AtomicU64,
    failures: AtomicU64,
    stale_discarded: AtomicU64,
    commands_sent: AtomicU64,
    commands_rejected: AtomicU64,
}

impl SyncMetrics {
    pub fn inc_ticks(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request(&self, kind: FetchKind) {
        let counter = match kind {
            FetchKind::Status => &self.status_polls,
            FetchKind::Nodes => &self.node_fetches,
            FetchKind::Links => &self.link_fetches,
            FetchKind::Neighbors => &self.neighbor_fetches,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Extra link fetch triggered by a node-set change.
    pub fn inc_link_refetches(&self) {
        self.link_refetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Tick left a kind alone because its previous request is outstanding.
    pub fn inc_fetches_skipped(&self) {
        self.fetches_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stale_discarded(&self) {
        self.stale_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_commands_sent(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_commands_rejected(&self) {
        self.commands_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            status_polls: self.status_polls.load(Ordering::Relaxed),
            node_fetches: self.node_fetches.load(Ordering::Relaxed),
            link_fetches: self.link_fetches.load(Ordering::Relaxed),
            neighbor_fetches: self.neighbor_fetches.load(Ordering::Relaxed),
            link_refetches: self.link_refetches.load(Ordering::Relaxed),
            fetches_skipped: self.fetches_skipped.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            commands_rejected: self.commands_rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub ticks: u64,
    pub status_polls: u64,
    pub node_fetches: u64,
    /// Includes refetches triggered by node-set changes.
    pub link_fetches: u64,
    pub neighbor_fetches: u64,
    pub link_refetches: u64,
    pub fetches_skipped: u64,
    pub failures: u64,
    pub stale_discarded: u64,
    pub commands_sent: u64,
    pub commands_rejected: u64,
}

impl Snapshot {
    pub fn requests_total(&self) -> u64 {
        self.status_polls + self.node_fetches + self.link_fetches + self.neighbor_fetches
    }
}
