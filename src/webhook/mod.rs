//! Inbound transfer webhooks

pub mod payload;
pub mod signature;

pub use payload::{Erc20Transfer, StreamEvent};
pub use signature::{sign, verify, SIGNATURE_HEADER};
