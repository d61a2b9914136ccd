//! Utility modules

pub mod roundup;

pub use roundup::{display_units, increment_from_units, round_up, RoundUp};
