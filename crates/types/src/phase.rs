/// Orchestration phases and the values a run produces

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a launch run, in the order a successful run visits them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    Idle,
    Validating,
    InitializingPool,
    CheckingApprovals,
    ApprovingToken0,
    ApprovingToken1,
    MintingPosition,
    Completed,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }

    /// Phases in which the orchestrator is waiting on the wallet or the chain
    pub fn is_busy(&self) -> bool {
        !matches!(self, Phase::Idle | Phase::Completed | Phase::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Validating => "validating",
            Phase::InitializingPool => "initializing pool",
            Phase::CheckingApprovals => "checking approvals",
            Phase::ApprovingToken0 => "approving token0",
            Phase::ApprovingToken1 => "approving token1",
            Phase::MintingPosition => "minting position",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tokens still need a position-manager allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApprovalState {
    pub token0_needs_approval: bool,
    pub token1_needs_approval: bool,
}

impl ApprovalState {
    /// Compare current allowances with the amounts the mint will pull
    pub fn from_allowances(
        allowance0: U256,
        allowance1: U256,
        required0: U256,
        required1: U256,
    ) -> Self {
        Self {
            token0_needs_approval: allowance0 < required0,
            token1_needs_approval: allowance1 < required1,
        }
    }

    pub fn approvals_needed(&self) -> usize {
        usize::from(self.token0_needs_approval) + usize::from(self.token1_needs_approval)
    }
}

/// Identifier of the minted liquidity position NFT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionId {
    Known(U256),
    /// Mint confirmed but no position event was found in the receipt
    Unknown,
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionId::Known(id) => write!(f, "{}", id),
            PositionId::Unknown => f.write_str("unknown (verify manually)"),
        }
    }
}
