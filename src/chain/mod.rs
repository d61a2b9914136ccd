//! On-chain access

pub mod client;
pub mod contracts;
#[cfg(test)]
pub mod mock;

pub use client::{EvmChain, SavingsChain, SavingsConfig};
