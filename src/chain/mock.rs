//! In-memory `SavingsChain` for tests

use crate::chain::client::{SavingsChain, SavingsConfig};
use crate::error::{RelayError, RelayResult};
use alloy::primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct MockState {
    configs: HashMap<(Address, Address), SavingsConfig>,
    allowances: HashMap<(Address, Address), U256>,
    balances: HashMap<(Address, Address), U256>,
    submitted: Vec<(Address, Address, U256)>,
    fail_submit: bool,
    confirm_failure: Option<ConfirmFailure>,
}

/// How `confirm_savings` should fail
#[derive(Debug, Clone, Copy)]
pub enum ConfirmFailure {
    /// Receipt never arrives; the sweep may or may not land
    Timeout,
    Revert,
}

pub struct MockChain {
    relayer: Address,
    contract: Address,
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new(relayer: Address, contract: Address) -> Self {
        Self {
            relayer,
            contract,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn set_config(&self, user: Address, token: Address, config: SavingsConfig) {
        self.state.lock().unwrap().configs.insert((user, token), config);
    }

    pub fn set_allowance(&self, user: Address, token: Address, amount: U256) {
        self.state.lock().unwrap().allowances.insert((user, token), amount);
    }

    pub fn set_balance(&self, user: Address, token: Address, amount: U256) {
        self.state.lock().unwrap().balances.insert((user, token), amount);
    }

    pub fn fail_submissions(&self, fail: bool) {
        self.state.lock().unwrap().fail_submit = fail;
    }

    pub fn fail_confirmations(&self, failure: Option<ConfirmFailure>) {
        self.state.lock().unwrap().confirm_failure = failure;
    }

    pub fn submitted(&self) -> Vec<(Address, Address, U256)> {
        self.state.lock().unwrap().submitted.clone()
    }
}

#[async_trait]
impl SavingsChain for MockChain {
    fn relayer_address(&self) -> Address {
        self.relayer
    }

    fn savings_contract(&self) -> Address {
        self.contract
    }

    async fn savings_config(&self, user: Address, token: Address) -> RelayResult<SavingsConfig> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .configs
            .get(&(user, token))
            .cloned()
            .unwrap_or(SavingsConfig {
                to_address: Address::ZERO,
                delegate: Address::ZERO,
                round_up: U256::ZERO,
                active: false,
                deposit_yield: false,
            }))
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> RelayResult<U256> {
        assert_eq!(spender, self.contract);
        Ok(self
            .state
            .lock()
            .unwrap()
            .allowances
            .get(&(owner, token))
            .copied()
            .unwrap_or_default())
    }

    async fn balance_of(&self, token: Address, owner: Address) -> RelayResult<U256> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .balances
            .get(&(owner, token))
            .copied()
            .unwrap_or_default())
    }

    async fn broadcast_savings(&self, user: Address, token: Address, amount: U256) -> RelayResult<B256> {
        let mut state = self.state.lock().unwrap();
        if state.fail_submit {
            return Err(RelayError::Chain("nonce too low".to_string()));
        }
        state.submitted.push((user, token, amount));
        let n = state.submitted.len() as u64;
        Ok(keccak256(n.to_be_bytes()))
    }

    async fn confirm_savings(&self, tx_hash: B256) -> RelayResult<()> {
        match self.state.lock().unwrap().confirm_failure {
            None => Ok(()),
            Some(ConfirmFailure::Timeout) => Err(RelayError::Chain("receipt poll timed out".to_string())),
            Some(ConfirmFailure::Revert) => Err(RelayError::Reverted(tx_hash.to_string())),
        }
    }
}
