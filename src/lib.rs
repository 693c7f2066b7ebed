//! Solfleet Library
//!
//! Multi-wallet SOL custody: signed transfers with preflight, faucet
//! airdrops with confirmation, batch redistribution (mix / consolidate),
//! and crash-safe project persistence with mandatory pre-destruction
//! backups.

pub mod amount;
pub mod cli;
pub mod config;
pub mod error;
pub mod funds;
pub mod model;
pub mod resolver;
pub mod rpc;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use funds::TransferEngine;
pub use model::{Project, WalletExport};
pub use store::ProjectStore;
