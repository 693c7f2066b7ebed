//! Error types for the fund movement engine

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Key material and address errors
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // Transfer preflight errors
    #[error("Sender and recipient are the same address")]
    SelfTransferRejected,

    #[error(
        "Insufficient funds: {available_sol}SOL available, {required_sol}SOL required (fee ~{fee_sol}SOL)"
    )]
    InsufficientFunds {
        available_sol: f64,
        required_sol: f64,
        fee_sol: f64,
    },

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC unavailable: {0}")]
    RpcUnavailable(String),

    #[error("RPC timeout: {0}")]
    RpcTimeout(String),

    #[error("Rate limited by node: {0}")]
    RateLimited(String),

    // Transaction errors
    #[error("Transaction build failed: {0}")]
    TransactionBuild(String),

    #[error("Transaction send failed: {0}")]
    TransactionSend(String),

    // Airdrop errors
    #[error("Airdrop not allowed: {0}")]
    AirdropNotAllowed(String),

    // Resolution errors
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    // Persistence errors
    #[error("Backup failed: {0}")]
    BackupFailed(String),

    #[error("Persist write failed: {0}")]
    PersistWriteFailed(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_) | Error::RpcUnavailable(_) | Error::RpcTimeout(_)
        )
    }

    /// Check if this error is detected before any network broadcast
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Error::InvalidKeyMaterial(_)
                | Error::InvalidAddress(_)
                | Error::InvalidAmount(_)
                | Error::SelfTransferRejected
                | Error::InsufficientFunds { .. }
        )
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        crate::rpc::classify_client_error(&e)
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
