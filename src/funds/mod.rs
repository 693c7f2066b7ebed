//! Fund movement: transfers, airdrops, and batch redistribution

pub mod airdrop;
pub mod redistribute;
pub mod transfer;

pub use airdrop::{run_airdrop, AirdropOutcome, AirdropRequest};
pub use redistribute::{
    ConsolidateReport, MixPolicy, MixReport, MixStrategy, RedistributionEngine,
};
pub use transfer::{SecretInput, TransferEngine};
