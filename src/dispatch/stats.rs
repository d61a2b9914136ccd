//! Dispatch counters exposed on `/stats`

use crate::dispatch::pipeline::TransferOutcome;
use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Snapshot of relay activity since startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchStats {
    pub started_at: DateTime<Utc>,
    /// Webhook deliveries that passed signature checks
    pub events_received: u64,
    /// Setup pings acknowledged without processing
    pub test_events: u64,
    pub transfers_seen: u64,
    pub dispatched: u64,
    /// Broadcast sweeps whose receipt was never seen
    pub pending: u64,
    pub failed: u64,
    /// Skips grouped by reason
    pub skipped: BTreeMap<String, u64>,
    /// Sum of swept amounts across tokens, in base units
    pub total_saved: U256,
    pub last_dispatch_at: Option<DateTime<Utc>>,
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            events_received: 0,
            test_events: 0,
            transfers_seen: 0,
            dispatched: 0,
            pending: 0,
            failed: 0,
            skipped: BTreeMap::new(),
            total_saved: U256::ZERO,
            last_dispatch_at: None,
        }
    }
}

impl DispatchStats {
    /// Share of seen transfers that produced a sweep (%)
    pub fn dispatch_rate(&self) -> f64 {
        if self.transfers_seen == 0 {
            return 0.0;
        }
        self.dispatched as f64 / self.transfers_seen as f64 * 100.0
    }
}

/// `/stats` response body
#[derive(Debug, Clone, Serialize)]
pub struct StatsView {
    #[serde(flatten)]
    pub stats: DispatchStats,
    pub dispatch_rate: f64,
}

impl From<DispatchStats> for StatsView {
    fn from(stats: DispatchStats) -> Self {
        let dispatch_rate = stats.dispatch_rate();
        Self {
            stats,
            dispatch_rate,
        }
    }
}

/// Thread-safe accumulator
#[derive(Default)]
pub struct StatsRecorder {
    inner: Mutex<DispatchStats>,
}

impl StatsRecorder {
    pub fn event(&self, is_test: bool) {
        let mut s = self.lock();
        s.events_received += 1;
        if is_test {
            s.test_events += 1;
        }
    }

    pub fn outcome(&self, outcome: &TransferOutcome) {
        let mut s = self.lock();
        s.transfers_seen += 1;
        match outcome {
            TransferOutcome::Dispatched { savings, .. } => {
                s.dispatched += 1;
                s.total_saved = s.total_saved.saturating_add(*savings);
                s.last_dispatch_at = Some(Utc::now());
            }
            TransferOutcome::Pending { .. } => s.pending += 1,
            TransferOutcome::Skipped { reason, .. } => {
                *s.skipped.entry(reason.to_string()).or_default() += 1;
            }
            TransferOutcome::Failed { .. } => s.failed += 1,
        }
    }

    pub fn snapshot(&self) -> DispatchStats {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DispatchStats> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
