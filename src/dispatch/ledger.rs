//! Dispatch ledger
//!
//! Remembers which transfers already produced a savings transaction so a
//! redelivered webhook never sweeps twice. A sweep is recorded as soon as it
//! is broadcast, before its receipt is known.

use crate::error::RelayResult;
use alloy::primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// Identity of a transfer log across deliveries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferKey {
    pub chain_id: u64,
    pub tx_hash: B256,
    pub log_index: u64,
}

impl std::fmt::Display for TransferKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}#{}", self.chain_id, self.tx_hash, self.log_index)
    }
}

/// Where a broadcast sweep stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    /// Broadcast, receipt not seen yet
    Pending,
    Confirmed,
}

/// A broadcast sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub key: TransferKey,
    pub user: Address,
    pub token: Address,
    pub amount: U256,
    pub savings_tx: B256,
    pub status: DispatchStatus,
    pub dispatched_at: DateTime<Utc>,
}

/// Outcome of trying to reserve a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    Claimed,
    AlreadyClaimed,
    /// A sweep for this transfer was already broadcast
    AlreadySent,
}

#[derive(Default)]
struct LedgerState {
    in_flight: HashSet<TransferKey>,
    sent: HashMap<TransferKey, DispatchRecord>,
    /// Savings txs the relay sent; their own Transfer logs are not purchases
    own_txs: HashSet<B256>,
}

pub struct DispatchLedger {
    state: Mutex<LedgerState>,
    path: Option<PathBuf>,
}

impl DispatchLedger {
    /// Ledger that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            path: None,
        }
    }

    /// Ledger backed by a JSON file, loading prior records if it exists
    pub fn open(path: impl AsRef<Path>) -> RelayResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state = LedgerState::default();

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let records: Vec<DispatchRecord> = if contents.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&contents)?
            };
            for record in records {
                state.own_txs.insert(record.savings_tx);
                state.sent.insert(record.key, record);
            }
            info!("Loaded {} dispatch records from {}", state.sent.len(), path.display());
        }

        Ok(Self {
            state: Mutex::new(state),
            path: Some(path),
        })
    }

    /// Reserve `key` for dispatch
    pub fn claim(&self, key: TransferKey) -> Claim {
        let mut state = self.lock();
        if state.sent.contains_key(&key) {
            Claim::AlreadySent
        } else if !state.in_flight.insert(key) {
            Claim::AlreadyClaimed
        } else {
            Claim::Claimed
        }
    }

    /// Drop a reservation when nothing was broadcast
    pub fn release(&self, key: &TransferKey) {
        self.lock().in_flight.remove(key);
    }

    /// Record a sweep the moment it is broadcast; the key stays taken from here on
    pub fn record_broadcast(&self, record: DispatchRecord) -> RelayResult<()> {
        let mut state = self.lock();
        state.in_flight.remove(&record.key);
        state.own_txs.insert(record.savings_tx);
        state.sent.insert(record.key, record);
        self.persist(&state)
    }

    /// Mark a broadcast sweep as mined successfully
    pub fn confirm(&self, key: &TransferKey) -> RelayResult<()> {
        let mut state = self.lock();
        if let Some(record) = state.sent.get_mut(key) {
            record.status = DispatchStatus::Confirmed;
        }
        self.persist(&state)
    }

    /// Forget a sweep whose transaction reverted so the transfer can be retried.
    /// The tx hash stays in `own_txs`.
    pub fn revert(&self, key: &TransferKey) -> RelayResult<()> {
        let mut state = self.lock();
        state.sent.remove(key);
        state.in_flight.remove(key);
        self.persist(&state)
    }

    /// True if `tx_hash` is a savings transaction this relay submitted
    pub fn is_own_tx(&self, tx_hash: &B256) -> bool {
        self.lock().own_txs.contains(tx_hash)
    }

    pub fn record(&self, key: &TransferKey) -> Option<DispatchRecord> {
        self.lock().sent.get(key).cloned()
    }

    pub fn sent_count(&self) -> usize {
        self.lock().sent.len()
    }

    fn persist(&self, state: &LedgerState) -> RelayResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut records: Vec<&DispatchRecord> = state.sent.values().collect();
        records.sort_by_key(|r| r.dispatched_at);
        write_atomic(path, &serde_json::to_vec_pretty(&records)?)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        // every mutation is a single insert/remove, a poisoned lock is still consistent
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> RelayResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
