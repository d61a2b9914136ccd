//! Savings Pipeline
//!
//! Turns a verified stream event into savings transactions:
//! filter -> claim -> savings config -> round-up -> allowance -> broadcast
//! -> confirm. Failures are logged and reported, never retried here.
//!
//! A claim is released only when nothing reached the chain: a skip, an error
//! before broadcast, or a confirmed revert. Once a sweep is broadcast its
//! transfer stays taken even if the receipt is never seen.

use crate::chain::{SavingsChain, SavingsConfig};
use crate::dispatch::ledger::{Claim, DispatchLedger, DispatchRecord, DispatchStatus, TransferKey};
use crate::dispatch::stats::StatsRecorder;
use crate::error::RelayError;
use crate::utils::roundup::{display_units, round_up, RoundUp};
use crate::webhook::{Erc20Transfer, StreamEvent};
use alloy::primitives::{Address, B256, U256};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Filters applied before touching the chain
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chain_id: u64,
    pub watched_tokens: HashSet<Address>,
    /// Only act on the provider's confirmed delivery
    pub require_confirmed: bool,
}

/// Why a transfer did not produce a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unconfirmed,
    WrongChain,
    UnwatchedToken,
    /// Transfer is part of a sweep the relay submitted
    OwnSavingsTx,
    /// Funds moving into the savings contract, i.e. a sweep or deposit
    SavingsContract,
    /// Relayer is sender or recipient
    RelayerTransfer,
    Duplicate,
    Inactive,
    /// Funds moving into the user's own savings destination
    SavingsDestination,
    NotDelegate,
    InvalidIncrement,
    NothingToRoundUp,
    InsufficientAllowance,
    InsufficientBalance,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Unconfirmed => "unconfirmed",
            SkipReason::WrongChain => "wrong_chain",
            SkipReason::UnwatchedToken => "unwatched_token",
            SkipReason::OwnSavingsTx => "own_savings_tx",
            SkipReason::SavingsContract => "savings_contract",
            SkipReason::RelayerTransfer => "relayer_transfer",
            SkipReason::Duplicate => "duplicate",
            SkipReason::Inactive => "inactive",
            SkipReason::SavingsDestination => "savings_destination",
            SkipReason::NotDelegate => "not_delegate",
            SkipReason::InvalidIncrement => "invalid_increment",
            SkipReason::NothingToRoundUp => "nothing_to_round_up",
            SkipReason::InsufficientAllowance => "insufficient_allowance",
            SkipReason::InsufficientBalance => "insufficient_balance",
        };
        f.write_str(s)
    }
}

/// Result for one transfer in an event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    Dispatched {
        key: TransferKey,
        savings: U256,
        savings_tx: B256,
    },
    /// Broadcast, but the receipt could not be obtained
    Pending {
        key: TransferKey,
        savings: U256,
        savings_tx: B256,
        error: String,
    },
    Skipped {
        key: TransferKey,
        reason: SkipReason,
    },
    Failed {
        key: TransferKey,
        error: String,
    },
}

impl TransferOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, TransferOutcome::Dispatched { .. })
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            TransferOutcome::Skipped { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Response body for a processed delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventReport {
    pub stream_id: String,
    pub chain_id: Option<u64>,
    pub confirmed: bool,
    pub block: u64,
    pub outcomes: Vec<TransferOutcome>,
}

impl EventReport {
    pub fn dispatched(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_dispatched()).count()
    }
}

/// Internal result of the pre-broadcast checks
enum Step {
    Ready(RoundUp),
    Skip(SkipReason),
}

pub struct SavingsPipeline {
    chain: Arc<dyn SavingsChain>,
    ledger: Arc<DispatchLedger>,
    stats: Arc<StatsRecorder>,
    settings: PipelineSettings,
}

impl SavingsPipeline {
    pub fn new(
        chain: Arc<dyn SavingsChain>,
        ledger: Arc<DispatchLedger>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            chain,
            ledger,
            stats: Arc::new(StatsRecorder::default()),
            settings,
        }
    }

    pub fn stats(&self) -> &StatsRecorder {
        &self.stats
    }

    pub fn ledger(&self) -> &DispatchLedger {
        &self.ledger
    }

    /// Process every transfer in a verified delivery
    pub async fn handle_event(&self, event: &StreamEvent) -> EventReport {
        let chain_id = event.chain_id();
        self.stats.event(false);

        info!(
            "Stream event: {} transfer(s), block {}, confirmed={}",
            event.erc20_transfers.len(),
            event.block.number,
            event.confirmed
        );

        let mut outcomes = Vec::with_capacity(event.erc20_transfers.len());
        for transfer in &event.erc20_transfers {
            let key = TransferKey {
                chain_id: chain_id.unwrap_or_default(),
                tx_hash: transfer.transaction_hash,
                log_index: transfer.log_index,
            };
            let outcome = self.handle_transfer(event, chain_id, key, transfer).await;
            self.stats.outcome(&outcome);
            outcomes.push(outcome);
        }

        EventReport {
            stream_id: event.stream_id.clone(),
            chain_id,
            confirmed: event.confirmed,
            block: event.block.number,
            outcomes,
        }
    }

    /// Acknowledge a setup ping
    pub fn record_test_event(&self) {
        self.stats.event(true);
    }

    async fn handle_transfer(
        &self,
        event: &StreamEvent,
        chain_id: Option<u64>,
        key: TransferKey,
        transfer: &Erc20Transfer,
    ) -> TransferOutcome {
        if let Some(reason) = self.prefilter(event, chain_id, transfer) {
            debug!("Skipping {}: {}", key, reason);
            return TransferOutcome::Skipped { key, reason };
        }

        match self.ledger.claim(key) {
            Claim::Claimed => {}
            Claim::AlreadyClaimed | Claim::AlreadySent => {
                debug!("Skipping {}: already handled", key);
                return TransferOutcome::Skipped {
                    key,
                    reason: SkipReason::Duplicate,
                };
            }
        }

        let roundup = match self.check(transfer).await {
            Ok(Step::Ready(roundup)) => roundup,
            Ok(Step::Skip(reason)) => {
                self.ledger.release(&key);
                return TransferOutcome::Skipped { key, reason };
            }
            Err(e) => {
                self.ledger.release(&key);
                error!("Savings checks for {} failed: {}", key, e);
                return TransferOutcome::Failed {
                    key,
                    error: e.to_string(),
                };
            }
        };
        let savings = roundup.savings;

        let savings_tx = match self
            .chain
            .broadcast_savings(transfer.from, transfer.contract, savings)
            .await
        {
            Ok(tx) => tx,
            Err(e) => {
                self.ledger.release(&key);
                error!("Savings broadcast for {} failed: {}", key, e);
                return TransferOutcome::Failed {
                    key,
                    error: e.to_string(),
                };
            }
        };

        let record = DispatchRecord {
            key,
            user: transfer.from,
            token: transfer.contract,
            amount: savings,
            savings_tx,
            status: DispatchStatus::Pending,
            dispatched_at: Utc::now(),
        };
        if let Err(e) = self.ledger.record_broadcast(record) {
            // in-memory state is updated; only the file write failed
            error!("Failed to persist broadcast of {}: {}", key, e);
        }

        match self.chain.confirm_savings(savings_tx).await {
            Ok(()) => {
                if let Err(e) = self.ledger.confirm(&key) {
                    error!("Failed to persist confirmation of {}: {}", key, e);
                }
                info!(
                    "Saved {} {} for {} in tx {}",
                    display_units(savings, transfer.token_decimals),
                    transfer.token_symbol,
                    transfer.from,
                    savings_tx
                );
                TransferOutcome::Dispatched {
                    key,
                    savings,
                    savings_tx,
                }
            }
            Err(RelayError::Reverted(tx)) => {
                if let Err(e) = self.ledger.revert(&key) {
                    error!("Failed to persist revert of {}: {}", key, e);
                }
                error!("Savings tx {} for {} reverted", tx, key);
                TransferOutcome::Failed {
                    key,
                    error: RelayError::Reverted(tx).to_string(),
                }
            }
            Err(e) => {
                warn!("Savings tx {} for {} unconfirmed: {}", savings_tx, key, e);
                TransferOutcome::Pending {
                    key,
                    savings,
                    savings_tx,
                    error: e.to_string(),
                }
            }
        }
    }

    fn prefilter(
        &self,
        event: &StreamEvent,
        chain_id: Option<u64>,
        transfer: &Erc20Transfer,
    ) -> Option<SkipReason> {
        if self.settings.require_confirmed && !event.confirmed {
            return Some(SkipReason::Unconfirmed);
        }
        if chain_id != Some(self.settings.chain_id) {
            return Some(SkipReason::WrongChain);
        }
        if !self.settings.watched_tokens.contains(&transfer.contract) {
            return Some(SkipReason::UnwatchedToken);
        }
        if self.ledger.is_own_tx(&transfer.transaction_hash) {
            return Some(SkipReason::OwnSavingsTx);
        }
        // sweep logs pass through the contract even when the ledger never saw them
        if transfer.to == self.chain.savings_contract() {
            return Some(SkipReason::SavingsContract);
        }
        let relayer = self.chain.relayer_address();
        if transfer.from == relayer || transfer.to == relayer {
            return Some(SkipReason::RelayerTransfer);
        }
        None
    }

    async fn check(&self, transfer: &Erc20Transfer) -> Result<Step, RelayError> {
        let user = transfer.from;
        let token = transfer.contract;

        let config = self.chain.savings_config(user, token).await?;
        if let Some(reason) = self.check_config(&config, transfer) {
            return Ok(Step::Skip(reason));
        }

        let roundup = match round_up(transfer.value, config.round_up) {
            Ok(r) => r,
            Err(RelayError::InvalidIncrement) => {
                warn!("User {} has an active savings config with a zero increment", user);
                return Ok(Step::Skip(SkipReason::InvalidIncrement));
            }
            Err(e) => return Err(e),
        };
        if roundup.is_zero() {
            return Ok(Step::Skip(SkipReason::NothingToRoundUp));
        }

        let spender = self.chain.savings_contract();
        let allowance = self.chain.allowance(token, user, spender).await?;
        if allowance < roundup.savings {
            warn!(
                "Allowance {} below round-up {} for {}",
                allowance, roundup.savings, user
            );
            return Ok(Step::Skip(SkipReason::InsufficientAllowance));
        }

        let balance = self.chain.balance_of(token, user).await?;
        if balance < roundup.savings {
            debug!("Balance {} below round-up {} for {}", balance, roundup.savings, user);
            return Ok(Step::Skip(SkipReason::InsufficientBalance));
        }

        Ok(Step::Ready(roundup))
    }

    fn check_config(&self, config: &SavingsConfig, transfer: &Erc20Transfer) -> Option<SkipReason> {
        if !config.active {
            return Some(SkipReason::Inactive);
        }
        if transfer.to == config.to_address {
            return Some(SkipReason::SavingsDestination);
        }
        if config.delegate != self.chain.relayer_address() {
            warn!(
                "Relayer {} is not the delegate ({}) for {}",
                self.chain.relayer_address(),
                config.delegate,
                transfer.from
            );
            return Some(SkipReason::NotDelegate);
        }
        None
    }
}
