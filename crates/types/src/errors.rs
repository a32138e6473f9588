use thiserror::Error;

use crate::phase::Phase;

// ============================================================================
// Validation Errors
// ============================================================================

/// Precondition failures detected before any transaction is sent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please connect your wallet first")]
    WalletNotConnected,

    #[error("Please select both tokens")]
    MissingToken,

    #[error("Invalid token address: {0}")]
    InvalidAddress(String),

    #[error("Token A and Token B must be different")]
    IdenticalTokens,

    #[error("Token details for {token} are not loaded: {reason}")]
    MetadataUnavailable { token: String, reason: String },

    #[error("Please enter positive amounts for both tokens")]
    NonPositiveAmount,

    #[error("Please enter valid numeric amounts for both tokens (got '{0}')")]
    InvalidAmount(String),

    #[error("Amount {amount} has more than {decimals} decimal places for {symbol}")]
    ExcessPrecision { amount: String, symbol: String, decimals: u8 },

    #[error("Amount {amount} {symbol} does not fit in 256 bits")]
    AmountOverflow { amount: String, symbol: String },

    #[error("Please enter both lower and upper tick values")]
    MissingTicks,

    #[error("Please enter valid integer tick values (got '{0}')")]
    InvalidTick(String),

    #[error("Tick range invalid: lower tick {lower} must be below upper tick {upper}")]
    TickRangeInvalid { lower: i32, upper: i32 },

    #[error("Tick {tick} is outside the supported range [{min}, {max}]")]
    TickOutOfBounds { tick: i32, min: i32, max: i32 },

    #[error("Tick {tick} is not a multiple of the tick spacing {spacing}")]
    TickNotAligned { tick: i32, spacing: i32 },

    #[error("Insufficient {symbol} balance: need {required}, have {available}")]
    InsufficientBalance { symbol: String, required: String, available: String },
}

// ============================================================================
// Launch Errors
// ============================================================================

/// Everything that can end (or annotate) a launch run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    /// Precondition failed; nothing was sent
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Wallet refused or failed to submit; nothing reached the chain
    #[error("Submission failed while {phase}: {message}")]
    Submission { phase: Phase, message: String },

    /// Transaction was broadcast but reverted or could not be confirmed
    #[error("Confirmation failed while {phase}: {message}")]
    Confirmation { phase: Phase, message: String },

    /// Metadata, balance or allowance query failed
    #[error("Chain read failed while {phase}: {message}")]
    Read { phase: Phase, message: String },

    /// Mint succeeded but its position id could not be recovered from the logs
    #[error("Could not read position id from mint receipt: {0}")]
    LogParsing(String),
}

impl LaunchError {
    pub fn submission(phase: Phase, message: impl Into<String>) -> Self {
        Self::Submission { phase, message: message.into() }
    }

    pub fn confirmation(phase: Phase, message: impl Into<String>) -> Self {
        Self::Confirmation { phase, message: message.into() }
    }

    pub fn read(phase: Phase, message: impl Into<String>) -> Self {
        Self::Read { phase, message: message.into() }
    }

    /// True if the error happened before anything was broadcast.
    ///
    /// A failed submission leaves nothing on chain only when it was the pool
    /// initialization, the first transaction of a run.
    pub fn is_pre_submission(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Submission { phase, .. } => *phase <= Phase::InitializingPool,
            Self::Read { phase, .. } => *phase <= Phase::Validating,
            Self::Confirmation { .. } | Self::LogParsing(_) => false,
        }
    }
}
