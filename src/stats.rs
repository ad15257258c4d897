use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-wide counters for the bet flow, shared across dialogs.
#[derive(Default)]
pub struct Stats {
    start_ms: AtomicU64,

    quotes_issued: AtomicU64,
    quotes_rejected: AtomicU64,
    quotes_expired: AtomicU64,
    bets_confirmed: AtomicU64,

    polls: AtomicU64,
    poll_errors: AtomicU64,
    settlements: AtomicU64,
    anomalies: AtomicU64,
}

impl Stats {
    pub fn new(now_ms: u64) -> Arc<Self> {
        let s = Arc::new(Self::default());
        s.start_ms.store(now_ms, Ordering::Relaxed);
        s
    }

    pub fn inc_quote_issued(&self) {
        self.quotes_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_quote_rejected(&self) {
        self.quotes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_quote_expired(&self) {
        self.quotes_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bet_confirmed(&self) {
        self.bets_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_poll_error(&self) {
        self.poll_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_settlement(&self) {
        self.settlements.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_anomaly(&self) {
        self.anomalies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, now_ms: u64) -> StatsSnapshot {
        let start = self.start_ms.load(Ordering::Relaxed);
        StatsSnapshot {
            now_ms,
            up_sec: now_ms.saturating_sub(start) / 1000,
            quotes_issued: self.quotes_issued.load(Ordering::Relaxed),
            quotes_rejected: self.quotes_rejected.load(Ordering::Relaxed),
            quotes_expired: self.quotes_expired.load(Ordering::Relaxed),
            bets_confirmed: self.bets_confirmed.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            settlements: self.settlements.load(Ordering::Relaxed),
            anomalies: self.anomalies.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub now_ms: u64,
    pub up_sec: u64,
    pub quotes_issued: u64,
    pub quotes_rejected: u64,
    pub quotes_expired: u64,
    pub bets_confirmed: u64,
    pub polls: u64,
    pub poll_errors: u64,
    pub settlements: u64,
    pub anomalies: u64,
}
