//! Relay configuration

use crate::dispatch::PipelineSettings;
use crate::error::{RelayError, RelayResult};
use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Env var overriding `webhook_secret`
pub const ENV_WEBHOOK_SECRET: &str = "AUTOHODL_WEBHOOK_SECRET";
/// Env var overriding `relayer_key`
pub const ENV_RELAYER_KEY: &str = "AUTOHODL_RELAYER_KEY";

/// Linea mainnet
pub const LINEA_CHAIN_ID: u64 = 59144;

/// Main relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the webhook server binds to
    pub listen_addr: SocketAddr,

    /// JSON-RPC endpoint
    pub rpc_url: String,

    /// Chain the savings contract lives on; events for other chains are skipped
    pub chain_id: u64,

    /// autoHODL savings contract (also the ERC-20 spender users approve)
    pub savings_contract: Address,

    /// Token contracts whose transfers count as spending
    pub watched_tokens: Vec<Address>,

    /// Wait for the provider's confirmed delivery before sweeping
    pub require_confirmed: bool,

    /// JSON file for the dispatch ledger; in-memory when unset
    pub ledger_path: Option<String>,

    /// Maximum webhook body size
    pub body_limit_bytes: usize,

    /// Stream secret used to sign deliveries
    #[serde(skip_serializing)]
    pub webhook_secret: String,

    /// Hex private key of the delegate that submits sweeps
    #[serde(skip_serializing)]
    pub relayer_key: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            rpc_url: "https://rpc.linea.build".to_string(),
            chain_id: LINEA_CHAIN_ID,
            savings_contract: Address::ZERO,
            // USDC on Linea
            watched_tokens: vec![address!("176211869cA2b568f2A7D4EE941E073a821EE1ff")],
            require_confirmed: true,
            ledger_path: Some("data/ledger.json".to_string()),
            body_limit_bytes: 256 * 1024,
            webhook_secret: String::new(),
            relayer_key: String::new(),
        }
    }
}

impl RelayConfig {
    /// Config for a local anvil node
    pub fn local() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: 31337,
            ledger_path: None,
            ..Default::default()
        }
    }

    /// Load from a TOML file, then apply env overrides and validate
    pub fn from_path(path: impl AsRef<Path>) -> RelayResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RelayError::InvalidConfig(format!("{}: {e}", path.display())))?;
        let mut config = Self::from_toml(&contents)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> RelayResult<Self> {
        toml::from_str(contents).map_err(|e| RelayError::InvalidConfig(e.to_string()))
    }

    /// Secrets from the environment win over the file
    pub fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var(ENV_WEBHOOK_SECRET) {
            self.webhook_secret = secret;
        }
        if let Ok(key) = std::env::var(ENV_RELAYER_KEY) {
            self.relayer_key = key;
        }
    }

    pub fn validate(&self) -> RelayResult<()> {
        if self.webhook_secret.trim().is_empty() {
            return Err(RelayError::InvalidConfig(format!(
                "webhook secret is empty (set {ENV_WEBHOOK_SECRET})"
            )));
        }
        if self.relayer_key.trim().is_empty() {
            return Err(RelayError::InvalidConfig(format!(
                "relayer key is empty (set {ENV_RELAYER_KEY})"
            )));
        }
        if self.savings_contract == Address::ZERO {
            return Err(RelayError::InvalidConfig("savings_contract is not set".to_string()));
        }
        if self.watched_tokens.is_empty() {
            return Err(RelayError::InvalidConfig("watched_tokens is empty".to_string()));
        }
        if self.body_limit_bytes == 0 {
            return Err(RelayError::InvalidConfig("body_limit_bytes must be positive".to_string()));
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            chain_id: self.chain_id,
            watched_tokens: self.watched_tokens.iter().copied().collect(),
            require_confirmed: self.require_confirmed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        listen_addr = "127.0.0.1:9000"
        rpc_url = "http://127.0.0.1:8545"
        chain_id = 31337
        savings_contract = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        watched_tokens = ["0x176211869cA2b568f2A7D4EE941E073a821EE1ff"]
        require_confirmed = false
        webhook_secret = "file-secret"
        relayer_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
    "#;

    #[test]
    fn test_parse_and_validate() {
        let config = RelayConfig::from_toml(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.chain_id, 31337);
        assert!(!config.require_confirmed);
        assert_eq!(config.listen_addr.port(), 9000);
        // unspecified fields keep defaults
        assert_eq!(config.body_limit_bytes, 256 * 1024);

        let settings = config.pipeline_settings();
        assert_eq!(settings.watched_tokens.len(), 1);
    }

    #[test]
    fn test_defaults_need_secrets() {
        let err = RelayConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("webhook secret"));
    }

    #[test]
    fn test_zero_contract_rejected() {
        let config = RelayConfig {
            webhook_secret: "s".to_string(),
            relayer_key: "k".to_string(),
            ..RelayConfig::local()
        };
        assert!(config.validate().unwrap_err().to_string().contains("savings_contract"));
    }

    #[test]
    fn test_secrets_not_serialized() {
        let config = RelayConfig::from_toml(SAMPLE).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("file-secret"));
        assert!(!json.contains("ac0974"));
    }

    #[test]
    fn test_env_overrides_file_secrets() {
        let mut config = RelayConfig::from_toml(SAMPLE).unwrap();
        std::env::set_var(ENV_WEBHOOK_SECRET, "env-secret");
        std::env::set_var(ENV_RELAYER_KEY, "0xenv-key");
        config.apply_env();
        std::env::remove_var(ENV_WEBHOOK_SECRET);
        std::env::remove_var(ENV_RELAYER_KEY);

        assert_eq!(config.webhook_secret, "env-secret");
        assert_eq!(config.relayer_key, "0xenv-key");
    }

    #[test]
    fn test_empty_watched_tokens_rejected() {
        let mut config = RelayConfig::from_toml(SAMPLE).unwrap();
        config.watched_tokens.clear();
        assert!(config.validate().unwrap_err().to_string().contains("watched_tokens"));
    }

    #[test]
    fn test_zero_body_limit_rejected() {
        let mut config = RelayConfig::from_toml(SAMPLE).unwrap();
        config.body_limit_bytes = 0;
        assert!(config.validate().unwrap_err().to_string().contains("body_limit_bytes"));
    }

    #[test]
    fn test_bad_toml() {
        assert!(RelayConfig::from_toml("chain_id = \"abc\"").is_err());
    }
}
