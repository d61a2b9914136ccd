//! Savings dispatch

pub mod ledger;
pub mod pipeline;
pub mod stats;

pub use ledger::{Claim, DispatchLedger, DispatchRecord, DispatchStatus, TransferKey};
pub use pipeline::{EventReport, PipelineSettings, SavingsPipeline, SkipReason, TransferOutcome};
pub use stats::{DispatchStats, StatsRecorder, StatsView};
