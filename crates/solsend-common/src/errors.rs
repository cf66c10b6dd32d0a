//! Error types for the solsend transfer tool

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File I/O error: {0}")]
    FileIo(#[from] std::io::Error),

    #[error("Invalid key format: {0}")]
    KeyFormat(String),

    #[error("Invalid recipient address: {0}")]
    AddressFormat(String),

    #[error("Failed to fetch blockhash: {0}")]
    BlockhashFetch(String),

    #[error("Failed to fetch balance: {0}")]
    BalanceFetch(String),

    #[error(
        "Insufficient funds: required {:.9} SOL, available {:.9} SOL",
        sol(.required),
        sol(.available)
    )]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Failed to sign transaction: {0}")]
    Signing(String),

    #[error("Failed to submit transaction: {0}")]
    Submission(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Timed out after {0:?} waiting for transaction confirmation")]
    ConfirmationTimeout(Duration),

    #[error("Notification channel closed before confirmation")]
    ConnectionClosed,

    #[error("Signature subscription error: {0}")]
    Subscription(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn sol(lamports: &u64) -> f64 {
    crate::utils::lamports_to_sol(*lamports)
}

pub type Result<T> = std::result::Result<T, Error>;
