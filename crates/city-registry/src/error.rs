//! Registry error types.

use thiserror::Error;

/// Errors from registry, wallet and reputation operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(u32),

    #[error("Agent {0} is dead")]
    AgentDead(u32),

    #[error("Agent {0} is still alive")]
    AgentAlive(u32),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Insufficient balance at {address}: has {available}, needs {requested}")]
    InsufficientBalance {
        address: String,
        available: u64,
        requested: u64,
    },

    #[error("Transfer amount must be positive")]
    ZeroAmount,

    #[error("Nothing to withdraw for agent {0}")]
    NothingToWithdraw(u32),

    #[error("Registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
