//! Error types for the relay

use alloy::primitives::U256;
use thiserror::Error;

/// Errors surfaced by the relay library
#[derive(Debug, Error)]
pub enum RelayError {
    /// Webhook arrived without an `x-signature` header
    #[error("Missing signature header.")]
    MissingSignature,

    /// Signature header is not 32 bytes of hex
    #[error("Malformed signature header: {0}")]
    MalformedSignature(String),

    /// Signature does not match keccak256(body || secret)
    #[error("Signature mismatch. Body was not signed with the configured secret.")]
    SignatureMismatch,

    /// Webhook body is not a valid stream event
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    /// Round-up increment of zero
    #[error("Round-up increment must be greater than zero.")]
    InvalidIncrement,

    /// Arithmetic overflowed U256
    #[error("Math overflow rounding {amount} to increment {increment}.")]
    MathOverflow { amount: U256, increment: U256 },

    /// Contract call or transaction submission failed
    #[error("Chain error: {0}")]
    Chain(String),

    /// Savings transaction was mined but reverted
    #[error("Savings transaction {0} reverted.")]
    Reverted(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading or writing the dispatch ledger failed
    #[error("Ledger IO error: {0}")]
    Ledger(#[from] std::io::Error),

    /// Ledger file could not be (de)serialized
    #[error("Ledger format error: {0}")]
    LedgerFormat(#[from] serde_json::Error),
}

pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    /// Whether the error came from signature verification
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            RelayError::MissingSignature
                | RelayError::MalformedSignature(_)
                | RelayError::SignatureMismatch
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_errors_are_auth() {
        assert!(RelayError::MissingSignature.is_auth());
        assert!(RelayError::MalformedSignature("zz".to_string()).is_auth());
        assert!(RelayError::SignatureMismatch.is_auth());
        assert!(!RelayError::InvalidPayload("eof".to_string()).is_auth());
        assert!(!RelayError::Chain("timeout".to_string()).is_auth());
    }
}
