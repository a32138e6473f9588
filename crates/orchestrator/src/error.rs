//! Error types for the orchestrator service and its providers

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Transaction {hash} reverted in block {block}")]
    Reverted { hash: String, block: u64 },

    #[error("Call reverted: {0}")]
    CallReverted(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timed out after {seconds}s waiting for {what}")]
    Timeout { what: String, seconds: u64 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Orchestrator service stopped")]
    ServiceStopped,
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

impl From<std::io::Error> for OrchestratorError {
    fn from(err: std::io::Error) -> Self {
        OrchestratorError::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        OrchestratorError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for OrchestratorError {
    fn from(err: toml::de::Error) -> Self {
        OrchestratorError::InvalidConfig(err.to_string())
    }
}

impl From<toml::ser::Error> for OrchestratorError {
    fn from(err: toml::ser::Error) -> Self {
        OrchestratorError::SerializationError(err.to_string())
    }
}

impl From<ureq::Error> for OrchestratorError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, response) => OrchestratorError::Rpc {
                code: i64::from(code),
                message: response.status_text().to_string(),
            },
            ureq::Error::Transport(transport) => OrchestratorError::NetworkError(transport.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for OrchestratorError {
    fn from(err: tokio::task::JoinError) -> Self {
        OrchestratorError::NetworkError(err.to_string())
    }
}

impl From<alloy_sol_types::Error> for OrchestratorError {
    fn from(err: alloy_sol_types::Error) -> Self {
        OrchestratorError::InvalidResponse(err.to_string())
    }
}
