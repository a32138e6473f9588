//! Launch state machine
//!
//! [`transition`] is the single dispatcher: it takes the current state and an
//! event and returns the next state plus at most one effect for the driver to
//! run. It performs no I/O. Events that do not belong to the current state are
//! logged and dropped.

use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use launchpad_types::{
    ApprovalState, LaunchError, LaunchRequest, Phase, PositionId, DEFAULT_MINT_DEADLINE_SECS,
    DEFAULT_POSITION_MANAGER, DEFAULT_SQRT_PRICE_X96,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::abi::{self, position_id_from_logs, INonfungiblePositionManager::MintParams, LaunchCall};
use crate::error::OrchestratorError;
use crate::provider::{TxKind, TxReceipt, TxRequest};
use crate::validation::{validate, Preflight, ValidatedLaunch};

/// Fixed parameters of every launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchSettings {
    pub position_manager: Address,
    pub initial_sqrt_price_x96: U256,
    pub mint_deadline_secs: u64,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            position_manager: DEFAULT_POSITION_MANAGER,
            initial_sqrt_price_x96: DEFAULT_SQRT_PRICE_X96,
            mint_deadline_secs: DEFAULT_MINT_DEADLINE_SECS,
        }
    }
}

/// Inputs to a transition besides the state and the event
#[derive(Debug, Clone, Copy)]
pub struct StepContext {
    pub settings: LaunchSettings,
    /// Wall-clock seconds, used for the mint deadline
    pub now_unix: u64,
}

impl StepContext {
    pub fn new(settings: LaunchSettings) -> Self {
        Self {
            settings,
            now_unix: u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LaunchState {
    Idle,
    InitializingPool {
        launch: Arc<ValidatedLaunch>,
        pending: Option<B256>,
    },
    CheckingApprovals {
        launch: Arc<ValidatedLaunch>,
    },
    ApprovingToken0 {
        launch: Arc<ValidatedLaunch>,
        approvals: ApprovalState,
        pending: Option<B256>,
    },
    ApprovingToken1 {
        launch: Arc<ValidatedLaunch>,
        pending: Option<B256>,
    },
    MintingPosition {
        launch: Arc<ValidatedLaunch>,
        pending: Option<B256>,
    },
    Completed {
        launch: Arc<ValidatedLaunch>,
        position: PositionId,
        /// Set when the position id could not be recovered
        warning: Option<LaunchError>,
        hash: B256,
    },
    Failed {
        at: Phase,
        error: LaunchError,
    },
}

#[derive(Debug, Clone)]
pub enum LaunchEvent {
    /// User submission, with everything read ahead of validation
    Start {
        request: LaunchRequest,
        preflight: Preflight,
    },
    Submitted {
        kind: TxKind,
        hash: B256,
    },
    SubmissionFailed {
        kind: TxKind,
        message: String,
    },
    Confirmed(TxReceipt),
    ConfirmationFailed {
        hash: B256,
        message: String,
    },
    AllowancesRead {
        token0: Address,
        token1: Address,
        allowance0: U256,
        allowance1: U256,
    },
    ReadFailed {
        message: String,
    },
    Reset,
}

impl LaunchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LaunchEvent::Start { .. } => "start",
            LaunchEvent::Submitted { .. } => "submitted",
            LaunchEvent::SubmissionFailed { .. } => "submission_failed",
            LaunchEvent::Confirmed(_) => "confirmed",
            LaunchEvent::ConfirmationFailed { .. } => "confirmation_failed",
            LaunchEvent::AllowancesRead { .. } => "allowances_read",
            LaunchEvent::ReadFailed { .. } => "read_failed",
            LaunchEvent::Reset => "reset",
        }
    }
}

/// Work the driver performs on behalf of the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Submit(TxRequest),
    AwaitConfirmation(B256),
    ReadAllowances {
        owner: Address,
        spender: Address,
        token0: Address,
        token1: Address,
    },
}

impl LaunchState {
    pub fn phase(&self) -> Phase {
        match self {
            LaunchState::Idle => Phase::Idle,
            LaunchState::InitializingPool { .. } => Phase::InitializingPool,
            LaunchState::CheckingApprovals { .. } => Phase::CheckingApprovals,
            LaunchState::ApprovingToken0 { .. } => Phase::ApprovingToken0,
            LaunchState::ApprovingToken1 { .. } => Phase::ApprovingToken1,
            LaunchState::MintingPosition { .. } => Phase::MintingPosition,
            LaunchState::Completed { .. } => Phase::Completed,
            LaunchState::Failed { .. } => Phase::Failed,
        }
    }

    pub fn launch(&self) -> Option<&Arc<ValidatedLaunch>> {
        match self {
            LaunchState::InitializingPool { launch, .. }
            | LaunchState::CheckingApprovals { launch }
            | LaunchState::ApprovingToken0 { launch, .. }
            | LaunchState::ApprovingToken1 { launch, .. }
            | LaunchState::MintingPosition { launch, .. }
            | LaunchState::Completed { launch, .. } => Some(launch),
            LaunchState::Idle | LaunchState::Failed { .. } => None,
        }
    }

    /// Hash of the transaction this state is waiting on
    pub fn pending(&self) -> Option<B256> {
        match self {
            LaunchState::InitializingPool { pending, .. }
            | LaunchState::ApprovingToken0 { pending, .. }
            | LaunchState::ApprovingToken1 { pending, .. }
            | LaunchState::MintingPosition { pending, .. } => *pending,
            _ => None,
        }
    }

    /// Transaction kind this state is waiting for the wallet to broadcast
    pub fn awaiting_submission(&self) -> Option<TxKind> {
        match self {
            LaunchState::InitializingPool { pending: None, .. } => Some(TxKind::InitializePool),
            LaunchState::ApprovingToken0 { pending: None, .. } => Some(TxKind::ApproveToken0),
            LaunchState::ApprovingToken1 { pending: None, .. } => Some(TxKind::ApproveToken1),
            LaunchState::MintingPosition { pending: None, .. } => Some(TxKind::MintPosition),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&LaunchError> {
        match self {
            LaunchState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn warning(&self) -> Option<&LaunchError> {
        match self {
            LaunchState::Completed { warning, .. } => warning.as_ref(),
            _ => None,
        }
    }

    /// Progress message for whoever presents the run
    pub fn message(&self) -> String {
        let symbols = |launch: &ValidatedLaunch| {
            let (token0, token1) = launch.ordered_tokens();
            (token0.symbol.clone(), token1.symbol.clone())
        };
        match self {
            LaunchState::Idle => String::new(),
            LaunchState::Failed { error, .. } => format!("Failed: {}", error),
            LaunchState::InitializingPool { pending: None, .. } => "Preparing to initialize pool...".to_string(),
            LaunchState::InitializingPool { pending: Some(_), .. } => {
                "Initializing pool, waiting for confirmation...".to_string()
            }
            LaunchState::CheckingApprovals { .. } => "Checking token approvals...".to_string(),
            LaunchState::ApprovingToken0 { launch, pending, .. } => approving_message(&symbols(launch).0, pending),
            LaunchState::ApprovingToken1 { launch, pending } => approving_message(&symbols(launch).1, pending),
            LaunchState::MintingPosition { pending: None, .. } => {
                "Now creating liquidity position. Please approve the transaction...".to_string()
            }
            LaunchState::MintingPosition { pending: Some(_), .. } => {
                "Creating position, waiting for confirmation...".to_string()
            }
            LaunchState::Completed { .. } => "Position created successfully!".to_string(),
        }
    }

    fn with_pending(self, hash: B256) -> Self {
        match self {
            LaunchState::InitializingPool { launch, .. } => LaunchState::InitializingPool { launch, pending: Some(hash) },
            LaunchState::ApprovingToken0 { launch, approvals, .. } => {
                LaunchState::ApprovingToken0 { launch, approvals, pending: Some(hash) }
            }
            LaunchState::ApprovingToken1 { launch, .. } => LaunchState::ApprovingToken1 { launch, pending: Some(hash) },
            LaunchState::MintingPosition { launch, .. } => LaunchState::MintingPosition { launch, pending: Some(hash) },
            other => other,
        }
    }
}

fn approving_message(symbol: &str, pending: &Option<B256>) -> String {
    match pending {
        None => format!("Approving {}. Please approve the transaction...", symbol),
        Some(_) => format!("Approving {}, waiting for confirmation...", symbol),
    }
}

/// Advance the state machine by one event
pub fn transition(state: LaunchState, event: LaunchEvent, ctx: &StepContext) -> (LaunchState, Option<Effect>) {
    let from = state.phase();
    let event_name = event.name();
    let (next, effect) = step(state, event, ctx);

    if next.phase() != from {
        info!(from = %from, to = %next.phase(), event = event_name, "Launch transition");
    } else {
        debug!(phase = %from, event = event_name, "Launch state updated");
    }
    (next, effect)
}

fn step(state: LaunchState, event: LaunchEvent, ctx: &StepContext) -> (LaunchState, Option<Effect>) {
    match event {
        LaunchEvent::Reset => (LaunchState::Idle, None),

        LaunchEvent::Start { request, preflight } => {
            if state.phase().is_busy() {
                warn!(phase = %state.phase(), "Launch already in progress, ignoring start");
                return (state, None);
            }
            match validate(&request, &preflight) {
                Ok(launch) => begin(Arc::new(launch), ctx),
                Err(error) => fail(Phase::Validating, error),
            }
        }

        LaunchEvent::Submitted { kind, hash } => {
            if state.awaiting_submission() != Some(kind) {
                return ignore(state, "submitted");
            }
            info!(kind = %kind, hash = %hash, "Transaction submitted");
            (state.with_pending(hash), Some(Effect::AwaitConfirmation(hash)))
        }

        LaunchEvent::SubmissionFailed { kind, message } => {
            if state.awaiting_submission() != Some(kind) {
                return ignore(state, "submission_failed");
            }
            let phase = state.phase();
            fail(phase, LaunchError::submission(phase, message))
        }

        LaunchEvent::Confirmed(receipt) => {
            if state.pending() != Some(receipt.hash) {
                return ignore(state, "confirmed");
            }
            if !receipt.success {
                let phase = state.phase();
                let message = format!("transaction {} reverted in block {}", receipt.hash, receipt.block_number);
                return fail(phase, LaunchError::confirmation(phase, message));
            }
            on_confirmed(state, receipt, ctx)
        }

        LaunchEvent::ConfirmationFailed { hash, message } => {
            if state.pending() != Some(hash) {
                return ignore(state, "confirmation_failed");
            }
            let phase = state.phase();
            fail(phase, LaunchError::confirmation(phase, message))
        }

        LaunchEvent::AllowancesRead { token0, token1, allowance0, allowance1 } => match state {
            LaunchState::CheckingApprovals { launch } => {
                let pair = launch.pair();
                if (pair.token0, pair.token1) != (token0, token1) {
                    return ignore(LaunchState::CheckingApprovals { launch }, "allowances_read");
                }
                on_allowances(launch, allowance0, allowance1, ctx)
            }
            other => ignore(other, "allowances_read"),
        },

        LaunchEvent::ReadFailed { message } => match state {
            LaunchState::CheckingApprovals { .. } => {
                fail(Phase::CheckingApprovals, LaunchError::read(Phase::CheckingApprovals, message))
            }
            other => ignore(other, "read_failed"),
        },
    }
}

fn begin(launch: Arc<ValidatedLaunch>, ctx: &StepContext) -> (LaunchState, Option<Effect>) {
    let pair = launch.pair();
    info!(
        token0 = %pair.token0,
        token1 = %pair.token1,
        fee = %launch.fee_tier.label(),
        "Launch validated, initializing pool"
    );
    let call = match LaunchCall::create_and_initialize_pool(
        pair.token0,
        pair.token1,
        launch.fee_tier.value(),
        ctx.settings.initial_sqrt_price_x96,
    ) {
        Ok(call) => call,
        Err(err) => {
            return fail(Phase::InitializingPool, LaunchError::submission(Phase::InitializingPool, err.to_string()))
        }
    };
    let tx = TxRequest {
        kind: TxKind::InitializePool,
        to: ctx.settings.position_manager,
        data: call.encode(),
        value: U256::ZERO,
    };
    (LaunchState::InitializingPool { launch, pending: None }, Some(Effect::Submit(tx)))
}

fn on_confirmed(state: LaunchState, receipt: TxReceipt, ctx: &StepContext) -> (LaunchState, Option<Effect>) {
    match state {
        LaunchState::InitializingPool { launch, .. } => {
            let pair = launch.pair();
            let effect = Effect::ReadAllowances {
                owner: launch.owner,
                spender: ctx.settings.position_manager,
                token0: pair.token0,
                token1: pair.token1,
            };
            (LaunchState::CheckingApprovals { launch }, Some(effect))
        }
        LaunchState::ApprovingToken0 { launch, approvals, .. } => {
            if approvals.token1_needs_approval {
                approve(launch, TxKind::ApproveToken1, approvals, ctx)
            } else {
                mint(launch, ctx)
            }
        }
        LaunchState::ApprovingToken1 { launch, .. } => mint(launch, ctx),
        LaunchState::MintingPosition { launch, .. } => {
            let (position, warning) = match position_id_from_logs(&receipt.logs, ctx.settings.position_manager) {
                Ok(id) => {
                    info!(position_id = %id, "Position minted");
                    (PositionId::Known(id), None)
                }
                Err(reason) => {
                    warn!(hash = %receipt.hash, "Mint confirmed without a position event: {}", reason);
                    (PositionId::Unknown, Some(LaunchError::LogParsing(reason)))
                }
            };
            (LaunchState::Completed { launch, position, warning, hash: receipt.hash }, None)
        }
        other => ignore(other, "confirmed"),
    }
}

fn on_allowances(
    launch: Arc<ValidatedLaunch>,
    allowance0: U256,
    allowance1: U256,
    ctx: &StepContext,
) -> (LaunchState, Option<Effect>) {
    let (required0, required1) = match launch.ordered_amounts() {
        Ok(amounts) => amounts,
        Err(err) => return fail(Phase::CheckingApprovals, err.into()),
    };
    let approvals = ApprovalState::from_allowances(allowance0, allowance1, required0, required1);
    info!(
        token0_needs_approval = approvals.token0_needs_approval,
        token1_needs_approval = approvals.token1_needs_approval,
        approvals = approvals.approvals_needed(),
        "Allowances checked"
    );

    if approvals.token0_needs_approval {
        approve(launch, TxKind::ApproveToken0, approvals, ctx)
    } else if approvals.token1_needs_approval {
        approve(launch, TxKind::ApproveToken1, approvals, ctx)
    } else {
        mint(launch, ctx)
    }
}

fn approve(
    launch: Arc<ValidatedLaunch>,
    kind: TxKind,
    approvals: ApprovalState,
    ctx: &StepContext,
) -> (LaunchState, Option<Effect>) {
    let pair = launch.pair();
    let token = if kind == TxKind::ApproveToken0 { pair.token0 } else { pair.token1 };
    let tx = TxRequest {
        kind,
        to: token,
        data: LaunchCall::approve(ctx.settings.position_manager, U256::MAX).encode(),
        value: U256::ZERO,
    };
    let next = if kind == TxKind::ApproveToken0 {
        LaunchState::ApprovingToken0 { launch, approvals, pending: None }
    } else {
        LaunchState::ApprovingToken1 { launch, pending: None }
    };
    (next, Some(Effect::Submit(tx)))
}

fn mint(launch: Arc<ValidatedLaunch>, ctx: &StepContext) -> (LaunchState, Option<Effect>) {
    let params = match mint_params(&launch, ctx) {
        Ok(params) => params,
        Err(err) => return fail(Phase::MintingPosition, err),
    };
    let tx = TxRequest {
        kind: TxKind::MintPosition,
        to: ctx.settings.position_manager,
        data: LaunchCall::mint(params).encode(),
        value: U256::ZERO,
    };
    (LaunchState::MintingPosition { launch, pending: None }, Some(Effect::Submit(tx)))
}

fn mint_params(launch: &ValidatedLaunch, ctx: &StepContext) -> Result<MintParams, LaunchError> {
    let pair = launch.pair();
    let (amount0_desired, amount1_desired) = launch.ordered_amounts()?;
    let encoding = |err: OrchestratorError| LaunchError::submission(Phase::MintingPosition, err.to_string());
    Ok(MintParams {
        token0: pair.token0,
        token1: pair.token1,
        fee: abi::uint24(launch.fee_tier.value()).map_err(encoding)?,
        tickLower: abi::int24(launch.tick_lower).map_err(encoding)?,
        tickUpper: abi::int24(launch.tick_upper).map_err(encoding)?,
        amount0Desired: amount0_desired,
        amount1Desired: amount1_desired,
        amount0Min: U256::ZERO,
        amount1Min: U256::ZERO,
        recipient: launch.owner,
        deadline: U256::from(ctx.now_unix.saturating_add(ctx.settings.mint_deadline_secs)),
    })
}

fn fail(at: Phase, error: LaunchError) -> (LaunchState, Option<Effect>) {
    if error.is_pre_submission() {
        warn!(phase = %at, "Launch failed before anything was broadcast: {}", error);
    } else {
        warn!(phase = %at, "Launch failed, confirmed transactions stay on chain: {}", error);
    }
    (LaunchState::Failed { at, error }, None)
}

fn ignore(state: LaunchState, event: &'static str) -> (LaunchState, Option<Effect>) {
    warn!(phase = %state.phase(), event, "Ignoring event that does not match the current state");
    (state, None)
}

/// A transaction broadcast during the current run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedTx {
    pub kind: TxKind,
    pub hash: B256,
}

/// Read-only view of the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LaunchSnapshot {
    pub phase: Phase,
    pub loading: bool,
    pub message: String,
    pub error: Option<String>,
    pub warning: Option<String>,
    /// Phase the run was in when it failed
    pub failed_at: Option<Phase>,
    pub last_tx_hash: Option<B256>,
    pub transactions: Vec<SubmittedTx>,
    pub position_id: Option<PositionId>,
    /// `token0-token1-fee`, set once the run completes
    pub pool: Option<String>,
}

impl LaunchSnapshot {
    pub fn of(state: &LaunchState, transactions: &[SubmittedTx]) -> Self {
        let (position_id, pool) = match state {
            LaunchState::Completed { launch, position, .. } => {
                (Some(*position), Some(launch.pair().pool_key(launch.fee_tier)))
            }
            _ => (None, None),
        };
        Self {
            phase: state.phase(),
            loading: state.phase().is_busy(),
            message: state.message(),
            error: state.error().map(ToString::to_string),
            warning: state.warning().map(ToString::to_string),
            failed_at: match state {
                LaunchState::Failed { at, .. } => Some(*at),
                _ => None,
            },
            last_tx_hash: transactions.last().map(|tx| tx.hash),
            transactions: transactions.to_vec(),
            position_id,
            pool,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }
}
