//! autoHODL round-up relay
//!
//! Receives signed ERC-20 transfer webhooks, rounds each purchase up to the
//! user's configured increment and sweeps the spare change into savings
//! through the autoHODL contract.

pub mod chain;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod server;
pub mod utils;
pub mod webhook;

pub use config::RelayConfig;
pub use dispatch::SavingsPipeline;
pub use error::{RelayError, RelayResult};
