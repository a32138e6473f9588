//! Async driver for the launch state machine
//!
//! The orchestrator owns the state and runs each effect the state machine asks
//! for against the providers, one at a time, feeding the outcome back as the
//! next event.

use alloy_primitives::Address;
use launchpad_types::{parse_address, LaunchRequest, Phase, TokenMetadata};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorResult;
use crate::metadata::TokenMetadataCache;
use crate::provider::{ChainReader, WalletProvider};
use crate::state::{transition, Effect, LaunchEvent, LaunchSettings, LaunchSnapshot, LaunchState, StepContext, SubmittedTx};
use crate::validation::Preflight;

pub struct LaunchOrchestrator<W, R> {
    wallet: W,
    reader: R,
    settings: LaunchSettings,
    check_balances: bool,
    state: LaunchState,
    metadata: TokenMetadataCache,
    /// Transactions broadcast during the current run
    transactions: Vec<SubmittedTx>,
    /// Phases visited during the current run
    trail: Vec<Phase>,
    observer: Option<watch::Sender<LaunchSnapshot>>,
}

impl<W: WalletProvider, R: ChainReader> LaunchOrchestrator<W, R> {
    pub fn new(wallet: W, reader: R, config: &OrchestratorConfig) -> Self {
        Self::with_settings(wallet, reader, config.launch_settings(), config.check_balances)
    }

    pub fn with_settings(wallet: W, reader: R, settings: LaunchSettings, check_balances: bool) -> Self {
        Self {
            wallet,
            reader,
            settings,
            check_balances,
            state: LaunchState::Idle,
            metadata: TokenMetadataCache::new(),
            transactions: Vec::new(),
            trail: Vec::new(),
            observer: None,
        }
    }

    /// Publish a snapshot to `observer` after every state change
    pub fn observe(&mut self, observer: watch::Sender<LaunchSnapshot>) {
        observer.send_replace(self.snapshot());
        self.observer = Some(observer);
    }

    pub fn state(&self) -> &LaunchState {
        &self.state
    }

    pub fn snapshot(&self) -> LaunchSnapshot {
        LaunchSnapshot::of(&self.state, &self.transactions)
    }

    pub fn phase_trail(&self) -> &[Phase] {
        &self.trail
    }

    pub fn settings(&self) -> &LaunchSettings {
        &self.settings
    }

    /// Look up decimals and symbol for a token, through the cache
    pub async fn resolve_token(&mut self, token: Address) -> OrchestratorResult<TokenMetadata> {
        self.metadata.resolve(&self.reader, token).await
    }

    /// Forget cached metadata for a token address the user replaced
    pub fn invalidate_token(&mut self, token: &Address) {
        if self.metadata.invalidate(token) {
            info!(token = %token, "Token metadata invalidated");
        }
    }

    /// Run a launch to completion or failure
    pub async fn run(&mut self, request: LaunchRequest) -> LaunchSnapshot {
        let preflight = self.preflight(&request).await;
        let mut effect = self.start(request, preflight);
        while let Some(current) = effect {
            let event = self.execute(current).await;
            effect = self.apply(event);
        }

        let snapshot = self.snapshot();
        match snapshot.phase {
            Phase::Completed => info!(
                position_id = ?snapshot.position_id,
                transactions = snapshot.transactions.len(),
                "Launch completed"
            ),
            Phase::Failed => warn!(
                failed_at = ?snapshot.failed_at,
                transactions = snapshot.transactions.len(),
                "Launch failed"
            ),
            _ => {}
        }
        snapshot
    }

    /// Read what validation needs: the account, token metadata and, when
    /// enabled, balances. Skips anything validation would reject first.
    pub async fn preflight(&mut self, request: &LaunchRequest) -> Preflight {
        let owner = self.wallet.account();
        let mut preflight = Preflight { owner, ..Default::default() };
        let Some(owner) = owner else {
            return preflight;
        };
        let (Ok(token_a), Ok(token_b)) = (parse_address(&request.token_a), parse_address(&request.token_b)) else {
            return preflight;
        };
        if token_a == token_b {
            return preflight;
        }

        preflight.token_a = Some(self.resolve_token(token_a).await.map_err(|e| e.to_string()));
        preflight.token_b = Some(self.resolve_token(token_b).await.map_err(|e| e.to_string()));

        if self.check_balances {
            let (balance_a, balance_b) =
                tokio::join!(self.reader.balance_of(token_a, owner), self.reader.balance_of(token_b, owner));
            preflight.balance_a = Some(balance_a.map_err(|e| e.to_string()));
            preflight.balance_b = Some(balance_b.map_err(|e| e.to_string()));
        }
        preflight
    }

    /// Dispatch `Start`, clearing the previous run's record
    pub fn start(&mut self, request: LaunchRequest, preflight: Preflight) -> Option<Effect> {
        if self.state.phase().is_busy() {
            warn!(phase = %self.state.phase(), "Launch already in progress, ignoring start");
            return None;
        }
        info!(token_a = %request.token_a, token_b = %request.token_b, fee = %request.fee_tier, "Starting launch");
        self.transactions.clear();
        self.trail.clear();
        self.trail.push(Phase::Validating);
        self.apply(LaunchEvent::Start { request, preflight })
    }

    /// Perform one effect. Never mutates orchestrator state; the outcome is
    /// returned as the event to apply.
    pub async fn execute(&self, effect: Effect) -> LaunchEvent {
        match effect {
            Effect::Submit(tx) => match self.wallet.submit(&tx).await {
                Ok(hash) => LaunchEvent::Submitted { kind: tx.kind, hash },
                Err(e) => LaunchEvent::SubmissionFailed { kind: tx.kind, message: e.to_string() },
            },
            Effect::AwaitConfirmation(hash) => match self.wallet.await_confirmation(hash).await {
                Ok(receipt) => LaunchEvent::Confirmed(receipt),
                Err(e) => LaunchEvent::ConfirmationFailed { hash, message: e.to_string() },
            },
            Effect::ReadAllowances { owner, spender, token0, token1 } => {
                let reads = tokio::try_join!(
                    self.reader.allowance(token0, owner, spender),
                    self.reader.allowance(token1, owner, spender),
                );
                match reads {
                    Ok((allowance0, allowance1)) => LaunchEvent::AllowancesRead { token0, token1, allowance0, allowance1 },
                    Err(e) => LaunchEvent::ReadFailed { message: e.to_string() },
                }
            }
        }
    }

    /// Feed one event through the state machine
    pub fn apply(&mut self, event: LaunchEvent) -> Option<Effect> {
        if let LaunchEvent::Submitted { kind, hash } = &event {
            if self.state.awaiting_submission() == Some(*kind) {
                self.transactions.push(SubmittedTx { kind: *kind, hash: *hash });
            }
        }

        let ctx = StepContext::new(self.settings);
        let state = std::mem::replace(&mut self.state, LaunchState::Idle);
        let (next, effect) = transition(state, event, &ctx);
        self.state = next;

        let phase = self.state.phase();
        if phase != Phase::Idle && self.trail.last() != Some(&phase) {
            self.trail.push(phase);
        }
        self.publish();
        effect
    }

    /// Back to idle; cached token metadata is kept
    pub fn reset(&mut self) {
        info!(phase = %self.state.phase(), "Resetting launch");
        self.transactions.clear();
        self.trail.clear();
        self.apply(LaunchEvent::Reset);
    }

    fn publish(&self) {
        if let Some(observer) = &self.observer {
            observer.send_replace(self.snapshot());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryChain;
    use alloy_primitives::U256;
    use launchpad_types::FeeTier;
    use std::sync::Arc;

    fn owner() -> Address {
        Address::repeat_byte(0x01)
    }

    fn chain() -> Arc<InMemoryChain> {
        let (a, b) = (Address::repeat_byte(0xAA), Address::repeat_byte(0xBB));
        Arc::new(
            InMemoryChain::new(owner())
                .with_token(a, 18, "TKA")
                .with_token(b, 18, "TKB")
                .with_balance(a, owner(), U256::MAX)
                .with_balance(b, owner(), U256::MAX),
        )
    }

    fn request() -> LaunchRequest {
        LaunchRequest::new(
            Address::repeat_byte(0xAA).to_string(),
            Address::repeat_byte(0xBB).to_string(),
            FeeTier::MEDIUM,
        )
    }

    #[tokio::test]
    async fn test_preflight_skips_reads_without_wallet() {
        let chain = Arc::new(InMemoryChain::new(owner()).disconnected());
        let mut orchestrator = LaunchOrchestrator::with_settings(chain.clone(), chain.clone(), LaunchSettings::default(), true);
        let preflight = orchestrator.preflight(&request()).await;
        assert!(preflight.owner.is_none());
        assert!(preflight.token_a.is_none());
        assert_eq!(chain.metadata_reads(), 0);
    }

    #[tokio::test]
    async fn test_observer_sees_final_snapshot() {
        let chain = chain();
        let mut orchestrator = LaunchOrchestrator::with_settings(chain.clone(), chain.clone(), LaunchSettings::default(), true);
        let (tx, rx) = watch::channel(LaunchSnapshot::default());
        orchestrator.observe(tx);

        let snapshot = orchestrator.run(request()).await;
        assert_eq!(snapshot.phase, Phase::Completed);
        assert_eq!(*rx.borrow(), snapshot);
        assert_eq!(
            orchestrator.phase_trail(),
            &[
                Phase::Validating,
                Phase::InitializingPool,
                Phase::CheckingApprovals,
                Phase::ApprovingToken0,
                Phase::ApprovingToken1,
                Phase::MintingPosition,
                Phase::Completed,
            ]
        );

        orchestrator.reset();
        assert_eq!(*rx.borrow(), LaunchSnapshot::default());
        assert!(orchestrator.phase_trail().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_cache_survives_reset() {
        let chain = chain();
        let mut orchestrator = LaunchOrchestrator::with_settings(chain.clone(), chain.clone(), LaunchSettings::default(), false);
        orchestrator.run(request()).await;
        let reads = chain.metadata_reads();
        orchestrator.reset();
        orchestrator.run(request()).await;
        assert_eq!(chain.metadata_reads(), reads);

        orchestrator.invalidate_token(&Address::repeat_byte(0xAA));
        orchestrator.resolve_token(Address::repeat_byte(0xAA)).await.unwrap();
        assert_eq!(chain.metadata_reads(), reads + 2);
    }
}
