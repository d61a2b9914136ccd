//! Stream event payloads
//!
//! Mirrors the JSON pushed by the transfer stream. Numbers arrive as decimal
//! strings, the chain id as a hex string.

use crate::error::{RelayError, RelayResult};
use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// One webhook delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    /// `false` on the first (mempool/latest) delivery, `true` once confirmed
    #[serde(default)]
    pub confirmed: bool,
    /// Hex chain id, e.g. `0xe708`; empty on the setup ping
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub stream_id: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub block: BlockInfo,
    #[serde(default)]
    pub erc20_transfers: Vec<Erc20Transfer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockInfo {
    #[serde(default, deserialize_with = "de_u64_lenient")]
    pub number: u64,
    #[serde(default)]
    pub hash: String,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    pub timestamp: u64,
}

/// A single ERC-20 `Transfer` log matched by the stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Erc20Transfer {
    pub transaction_hash: B256,
    #[serde(deserialize_with = "de_u64_lenient")]
    pub log_index: u64,
    /// Token contract
    pub contract: Address,
    pub from: Address,
    pub to: Address,
    /// Raw amount in base units
    #[serde(deserialize_with = "de_u256_decimal")]
    pub value: U256,
    #[serde(default, deserialize_with = "de_u8_lenient")]
    pub token_decimals: u8,
    #[serde(default)]
    pub token_symbol: String,
    #[serde(default)]
    pub token_name: String,
}

impl StreamEvent {
    /// Parse a raw request body
    pub fn from_slice(body: &[u8]) -> RelayResult<Self> {
        serde_json::from_slice(body).map_err(|e| RelayError::InvalidPayload(e.to_string()))
    }

    /// Numeric chain id, if present
    pub fn chain_id(&self) -> Option<u64> {
        let trimmed = self.chain_id.trim();
        let digits = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X"))?;
        u64::from_str_radix(digits, 16).ok()
    }

    /// The provider pings a new stream with an empty event before real traffic
    pub fn is_test_event(&self) -> bool {
        self.chain_id.trim().is_empty() || self.block.number == 0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrString {
    Num(u64),
    Str(String),
}

fn de_u64_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    match NumOrString::deserialize(d)? {
        NumOrString::Num(n) => Ok(n),
        NumOrString::Str(s) if s.is_empty() => Ok(0),
        NumOrString::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn de_u8_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    let n = de_u64_lenient(d)?;
    u8::try_from(n).map_err(serde::de::Error::custom)
}

fn de_u256_decimal<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
    let s = String::deserialize(d)?;
    U256::from_str(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "confirmed": true,
        "chainId": "0xe708",
        "abi": [],
        "streamId": "c28d9e2e-1ea0-4a8c-bd4c-31f3b4bd8a5e",
        "tag": "card-spend",
        "retries": 0,
        "block": { "number": "21034567", "hash": "0xabc", "timestamp": "1729152000" },
        "logs": [],
        "txs": [],
        "erc20Transfers": [{
            "transactionHash": "0x1f0b7cd2e6b1e0b1c0e4a1f5f0c9d2b8a7e6d5c4b3a2918070605040302010ff",
            "logIndex": "7",
            "contract": "0x176211869ca2b568f2a7d4ee941e073a821ee1ff",
            "from": "0x1111111111111111111111111111111111111111",
            "to": "0x2222222222222222222222222222222222222222",
            "value": "4300000",
            "tokenName": "USD Coin",
            "tokenSymbol": "USDC",
            "tokenDecimals": "6",
            "valueWithDecimals": "4.3",
            "possibleSpam": false
        }]
    }"#;

    #[test]
    fn test_parse_sample_event() {
        let event = StreamEvent::from_slice(SAMPLE.as_bytes()).unwrap();
        assert!(event.confirmed);
        assert_eq!(event.chain_id(), Some(59144));
        assert_eq!(event.block.number, 21_034_567);
        assert!(!event.is_test_event());

        let t = &event.erc20_transfers[0];
        assert_eq!(t.log_index, 7);
        assert_eq!(t.value, U256::from(4_300_000u64));
        assert_eq!(t.token_decimals, 6);
        assert_eq!(t.token_symbol, "USDC");
    }

    #[test]
    fn test_setup_ping_is_test_event() {
        let ping = r#"{"abi":[],"block":{"hash":"","number":"","timestamp":""},"chainId":"","confirmed":true,"erc20Approvals":[],"erc20Transfers":[],"logs":[],"retries":0,"streamId":"","tag":"","txs":[]}"#;
        let event = StreamEvent::from_slice(ping.as_bytes()).unwrap();
        assert!(event.is_test_event());
        assert_eq!(event.chain_id(), None);
        assert!(event.erc20_transfers.is_empty());
    }

    #[test]
    fn test_numeric_log_index_accepted() {
        let body = SAMPLE.replace(r#""logIndex": "7""#, r#""logIndex": 7"#);
        let event = StreamEvent::from_slice(body.as_bytes()).unwrap();
        assert_eq!(event.erc20_transfers[0].log_index, 7);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            StreamEvent::from_slice(b"not json"),
            Err(RelayError::InvalidPayload(_))
        ));
    }
}
