//! EVM client for the savings contract
//!
//! Reads savings configs and allowances over RPC and submits
//! `executeSavings` from the relayer key.

use crate::chain::contracts::{IAutoHodl, IERC20};
use crate::error::{RelayError, RelayResult};
use alloy::{
    primitives::{Address, B256, U256},
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// On-chain savings record for a (user, token) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsConfig {
    /// Where swept funds land
    pub to_address: Address,
    /// Address allowed to trigger sweeps for the user
    pub delegate: Address,
    /// Round-up increment in token base units
    pub round_up: U256,
    pub active: bool,
    /// Route swept funds into the yield position instead of a plain transfer
    pub deposit_yield: bool,
}

/// Everything the dispatch pipeline needs from the chain
#[async_trait]
pub trait SavingsChain: Send + Sync {
    /// Address the relayer signs with
    fn relayer_address(&self) -> Address;

    /// Savings contract users approve as spender
    fn savings_contract(&self) -> Address;

    async fn savings_config(&self, user: Address, token: Address) -> RelayResult<SavingsConfig>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> RelayResult<U256>;

    async fn balance_of(&self, token: Address, owner: Address) -> RelayResult<U256>;

    /// Send the sweep and return its hash without waiting for inclusion
    async fn broadcast_savings(&self, user: Address, token: Address, amount: U256) -> RelayResult<B256>;

    /// Wait for the receipt of a broadcast sweep.
    ///
    /// `Reverted` means the sweep definitely moved nothing; any other error
    /// leaves the outcome unknown.
    async fn confirm_savings(&self, tx_hash: B256) -> RelayResult<()>;
}

/// How long to poll for a sweep's receipt
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// `SavingsChain` backed by an HTTP JSON-RPC endpoint
pub struct EvmChain {
    provider: DynProvider,
    savings_contract: Address,
    relayer: Address,
}

impl EvmChain {
    /// Build a wallet-enabled provider for `rpc_url`
    pub fn connect(rpc_url: &str, relayer_key: &str, savings_contract: Address) -> RelayResult<Self> {
        let signer: PrivateKeySigner = relayer_key
            .trim()
            .parse()
            .map_err(|e| RelayError::InvalidConfig(format!("relayer key: {e}")))?;
        let relayer = signer.address();

        let url = rpc_url
            .parse()
            .map_err(|e| RelayError::InvalidConfig(format!("rpc url {rpc_url:?}: {e}")))?;

        let provider = ProviderBuilder::new()
            .wallet(signer)
            .connect_http(url)
            .erased();

        info!("Relayer {} connected to {}", relayer, rpc_url);

        Ok(Self {
            provider,
            savings_contract,
            relayer,
        })
    }

    /// Chain id reported by the node
    pub async fn chain_id(&self) -> RelayResult<u64> {
        self.provider.get_chain_id().await.map_err(chain_err)
    }
}

fn chain_err(e: impl std::fmt::Display) -> RelayError {
    RelayError::Chain(e.to_string())
}

#[async_trait]
impl SavingsChain for EvmChain {
    fn relayer_address(&self) -> Address {
        self.relayer
    }

    fn savings_contract(&self) -> Address {
        self.savings_contract
    }

    async fn savings_config(&self, user: Address, token: Address) -> RelayResult<SavingsConfig> {
        let contract = IAutoHodl::new(self.savings_contract, &self.provider);
        let s = contract
            .getSavings(user, token)
            .call()
            .await
            .map_err(chain_err)?;

        Ok(SavingsConfig {
            to_address: s.toAddress,
            delegate: s.delegate,
            round_up: s.roundUp,
            active: s.active,
            deposit_yield: s.depositYield,
        })
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> RelayResult<U256> {
        IERC20::new(token, &self.provider)
            .allowance(owner, spender)
            .call()
            .await
            .map_err(chain_err)
    }

    async fn balance_of(&self, token: Address, owner: Address) -> RelayResult<U256> {
        IERC20::new(token, &self.provider)
            .balanceOf(owner)
            .call()
            .await
            .map_err(chain_err)
    }

    async fn broadcast_savings(&self, user: Address, token: Address, amount: U256) -> RelayResult<B256> {
        let contract = IAutoHodl::new(self.savings_contract, &self.provider);
        let pending = contract
            .executeSavings(user, token, amount)
            .send()
            .await
            .map_err(chain_err)?;

        debug!("Savings tx {} broadcast", pending.tx_hash());
        Ok(*pending.tx_hash())
    }

    async fn confirm_savings(&self, tx_hash: B256) -> RelayResult<()> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(chain_err)?;

        if !receipt.status() {
            return Err(RelayError::Reverted(tx_hash.to_string()));
        }
        Ok(())
    }
}
