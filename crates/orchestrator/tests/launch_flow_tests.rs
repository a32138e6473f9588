//! End-to-end launch runs against the in-memory chain

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use anyhow::Result;
use launchpad_orchestrator::{InMemoryChain, LaunchOrchestrator, LaunchSettings, LaunchSnapshot, TxKind};
use launchpad_types::{FeeTier, LaunchRequest, Phase, PositionId, DEFAULT_POSITION_MANAGER};

const TOKEN_A: &str = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
const TOKEN_B: &str = "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";

fn owner() -> Address {
    Address::repeat_byte(0x01)
}

fn token_a() -> Address {
    Address::repeat_byte(0xAA)
}

fn token_b() -> Address {
    Address::repeat_byte(0xBB)
}

/// Two 18-decimal tokens, fully funded, nothing approved
fn funded_chain() -> InMemoryChain {
    InMemoryChain::new(owner())
        .with_token(token_a(), 18, "TKA")
        .with_token(token_b(), 18, "TKB")
        .with_balance(token_a(), owner(), U256::MAX)
        .with_balance(token_b(), owner(), U256::MAX)
}

fn orchestrator(chain: &Arc<InMemoryChain>) -> LaunchOrchestrator<Arc<InMemoryChain>, Arc<InMemoryChain>> {
    LaunchOrchestrator::with_settings(chain.clone(), chain.clone(), LaunchSettings::default(), true)
}

fn request() -> LaunchRequest {
    LaunchRequest::new(TOKEN_A, TOKEN_B, FeeTier::MEDIUM).with_amounts("10", "10")
}

async fn run(chain: InMemoryChain, request: LaunchRequest) -> (Arc<InMemoryChain>, LaunchSnapshot) {
    let chain = Arc::new(chain);
    let snapshot = orchestrator(&chain).run(request).await;
    (chain, snapshot)
}

fn kinds(snapshot: &LaunchSnapshot) -> Vec<TxKind> {
    snapshot.transactions.iter().map(|tx| tx.kind).collect()
}

#[tokio::test]
async fn test_full_launch_with_two_approvals() -> Result<()> {
    let (chain, snapshot) = run(funded_chain(), request()).await;

    assert_eq!(snapshot.phase, Phase::Completed);
    assert_eq!(
        kinds(&snapshot),
        vec![TxKind::InitializePool, TxKind::ApproveToken0, TxKind::ApproveToken1, TxKind::MintPosition]
    );
    assert_eq!(chain.submitted_kinds(), kinds(&snapshot));
    assert_eq!(snapshot.position_id, Some(PositionId::Known(U256::from(1u64))));
    assert!(snapshot.warning.is_none());
    assert!(!snapshot.loading);
    assert_eq!(snapshot.last_tx_hash, snapshot.transactions.last().map(|tx| tx.hash));

    let pool = snapshot.pool.expect("pool key");
    assert!(pool.to_lowercase().starts_with("0xaaaa"));
    assert!(pool.ends_with("-3000"));
    assert!(chain.pool_exists(token_a(), token_b(), 3000));

    // 10 tokens at 18 decimals pulled from each balance, allowance stays unlimited
    let deposit = U256::from(10u64).pow(U256::from(19u64));
    assert_eq!(chain.balance(token_a(), owner()), U256::MAX - deposit);
    assert_eq!(chain.balance(token_b(), owner()), U256::MAX - deposit);
    assert_eq!(chain.allowance_of(token_a(), owner(), DEFAULT_POSITION_MANAGER), U256::MAX);
    Ok(())
}

#[tokio::test]
async fn test_token0_already_approved_skips_first_approval() -> Result<()> {
    let chain = funded_chain().with_allowance(token_a(), owner(), DEFAULT_POSITION_MANAGER, U256::MAX);
    let chain = Arc::new(chain);
    let mut orchestrator = orchestrator(&chain);
    let snapshot = orchestrator.run(request()).await;

    assert_eq!(snapshot.phase, Phase::Completed);
    assert_eq!(kinds(&snapshot), vec![TxKind::InitializePool, TxKind::ApproveToken1, TxKind::MintPosition]);
    assert_eq!(
        orchestrator.phase_trail(),
        &[
            Phase::Validating,
            Phase::InitializingPool,
            Phase::CheckingApprovals,
            Phase::ApprovingToken1,
            Phase::MintingPosition,
            Phase::Completed,
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_token0_short_token1_approved() -> Result<()> {
    let chain = Arc::new(funded_chain().with_allowance(token_b(), owner(), DEFAULT_POSITION_MANAGER, U256::MAX));
    let mut orchestrator = orchestrator(&chain);
    let snapshot = orchestrator.run(request()).await;

    assert_eq!(kinds(&snapshot), vec![TxKind::InitializePool, TxKind::ApproveToken0, TxKind::MintPosition]);
    assert!(orchestrator.phase_trail().windows(2).any(|w| w == [Phase::ApprovingToken0, Phase::MintingPosition]));
    Ok(())
}

#[tokio::test]
async fn test_both_approved_mints_directly() -> Result<()> {
    let chain = funded_chain()
        .with_allowance(token_a(), owner(), DEFAULT_POSITION_MANAGER, U256::MAX)
        .with_allowance(token_b(), owner(), DEFAULT_POSITION_MANAGER, U256::from(10u64).pow(U256::from(19u64)));
    let chain = Arc::new(chain);
    let mut orchestrator = orchestrator(&chain);
    let snapshot = orchestrator.run(request()).await;

    assert_eq!(snapshot.phase, Phase::Completed);
    assert_eq!(kinds(&snapshot), vec![TxKind::InitializePool, TxKind::MintPosition]);
    assert!(orchestrator.phase_trail().windows(2).any(|w| w == [Phase::CheckingApprovals, Phase::MintingPosition]));
    Ok(())
}

#[tokio::test]
async fn test_reversed_input_order_uses_same_pool() -> Result<()> {
    let reversed = LaunchRequest::new(TOKEN_B, TOKEN_A, FeeTier::MEDIUM).with_amounts("5", "7");
    let (chain, snapshot) = run(funded_chain(), reversed).await;

    assert_eq!(snapshot.phase, Phase::Completed);
    assert!(chain.pool_exists(token_a(), token_b(), 3000));
    let submitted = chain.submitted();
    assert_eq!(submitted[1].kind, TxKind::ApproveToken0);
    assert_eq!(submitted[1].to, token_a());

    // Amount entered for token B (5) is deposited as amount1
    let scale = U256::from(10u64).pow(U256::from(18u64));
    assert_eq!(chain.balance(token_b(), owner()), U256::MAX - U256::from(5u64) * scale);
    assert_eq!(chain.balance(token_a(), owner()), U256::MAX - U256::from(7u64) * scale);
    Ok(())
}

#[tokio::test]
async fn test_inverted_ticks_fail_validation_without_transactions() -> Result<()> {
    let (chain, snapshot) = run(funded_chain(), request().with_ticks(6000, -6000)).await;

    assert_eq!(snapshot.phase, Phase::Failed);
    assert_eq!(snapshot.failed_at, Some(Phase::Validating));
    assert!(snapshot.error.unwrap_or_default().to_lowercase().contains("tick range invalid"));
    assert!(snapshot.transactions.is_empty());
    assert!(chain.submitted().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_position_event_completes_with_unknown_id() -> Result<()> {
    let (chain, snapshot) = run(funded_chain().omit_position_events(), request()).await;

    assert_eq!(snapshot.phase, Phase::Completed);
    assert_eq!(snapshot.position_id, Some(PositionId::Unknown));
    assert!(snapshot.warning.is_some());
    assert!(snapshot.error.is_none());
    assert_eq!(chain.positions_minted(), 1);
    Ok(())
}

#[tokio::test]
async fn test_second_run_on_existing_pool_succeeds() -> Result<()> {
    let chain = Arc::new(funded_chain());
    let mut orchestrator = orchestrator(&chain);

    let first = orchestrator.run(request()).await;
    let second = orchestrator.run(request()).await;

    assert_eq!(first.phase, Phase::Completed);
    assert_eq!(second.phase, Phase::Completed);
    assert_eq!(chain.pool_count(), 1);
    // Approvals from the first run are still in place
    assert_eq!(kinds(&second), vec![TxKind::InitializePool, TxKind::MintPosition]);
    assert_eq!(second.position_id, Some(PositionId::Known(U256::from(2u64))));
    Ok(())
}

#[tokio::test]
async fn test_rejected_approval_keeps_earlier_transactions() -> Result<()> {
    let (chain, snapshot) = run(funded_chain().reject(TxKind::ApproveToken1), request()).await;

    assert_eq!(snapshot.phase, Phase::Failed);
    assert_eq!(snapshot.failed_at, Some(Phase::ApprovingToken1));
    assert!(snapshot.error.clone().unwrap_or_default().contains("Submission failed"));
    assert_eq!(kinds(&snapshot), vec![TxKind::InitializePool, TxKind::ApproveToken0]);
    // Confirmed steps are not rolled back
    assert!(chain.pool_exists(token_a(), token_b(), 3000));
    assert_eq!(chain.allowance_of(token_a(), owner(), DEFAULT_POSITION_MANAGER), U256::MAX);
    Ok(())
}

#[tokio::test]
async fn test_rejected_mint_reports_failure_after_three_broadcasts() -> Result<()> {
    let chain = Arc::new(funded_chain().reject(TxKind::MintPosition));
    let mut orchestrator = orchestrator(&chain);
    let snapshot = orchestrator.run(request()).await;

    assert_eq!(snapshot.phase, Phase::Failed);
    assert_eq!(snapshot.failed_at, Some(Phase::MintingPosition));
    assert_eq!(snapshot.transactions.len(), 3);
    assert!(snapshot.message.starts_with("Failed: Submission failed"));

    let error = orchestrator.state().error().expect("failed state carries its error");
    assert!(!error.is_pre_submission());
    assert_eq!(chain.positions_minted(), 0);
    Ok(())
}

#[tokio::test]
async fn test_reverted_mint_fails_with_confirmation_error() -> Result<()> {
    let (_, snapshot) = run(funded_chain().revert(TxKind::MintPosition), request()).await;

    assert_eq!(snapshot.failed_at, Some(Phase::MintingPosition));
    assert!(snapshot.error.unwrap_or_default().contains("Confirmation failed"));
    assert_eq!(snapshot.transactions.len(), 4);
    assert!(snapshot.position_id.is_none());
    Ok(())
}

#[tokio::test]
async fn test_lost_confirmation_fails() -> Result<()> {
    let (_, snapshot) = run(funded_chain().lose_confirmation(TxKind::InitializePool), request()).await;

    assert_eq!(snapshot.failed_at, Some(Phase::InitializingPool));
    assert!(snapshot.error.unwrap_or_default().contains("Timed out"));
    Ok(())
}

#[tokio::test]
async fn test_allowance_read_failure_fails_at_checking_approvals() -> Result<()> {
    let (chain, snapshot) = run(funded_chain().fail_allowance_reads(), request()).await;

    assert_eq!(snapshot.failed_at, Some(Phase::CheckingApprovals));
    assert!(snapshot.error.unwrap_or_default().contains("Chain read failed"));
    assert_eq!(chain.submitted_kinds(), vec![TxKind::InitializePool]);
    Ok(())
}

#[tokio::test]
async fn test_metadata_read_failure_fails_validation() -> Result<()> {
    let (chain, snapshot) = run(funded_chain().fail_metadata_for(token_b()), request()).await;

    assert_eq!(snapshot.failed_at, Some(Phase::Validating));
    assert!(snapshot.error.unwrap_or_default().contains("Chain read failed"));
    assert!(chain.submitted().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_insufficient_balance_fails_validation() -> Result<()> {
    let chain = InMemoryChain::new(owner())
        .with_token(token_a(), 18, "TKA")
        .with_token(token_b(), 18, "TKB")
        .with_balance(token_a(), owner(), U256::MAX)
        .with_balance(token_b(), owner(), U256::from(10u64).pow(U256::from(18u64)));
    let (chain, snapshot) = run(chain, request()).await;

    assert_eq!(snapshot.failed_at, Some(Phase::Validating));
    let error = snapshot.error.unwrap_or_default();
    assert!(error.contains("Insufficient TKB balance"));
    assert!(error.contains("need 10"));
    assert!(chain.submitted().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_disconnected_wallet_fails_validation() -> Result<()> {
    let (_, snapshot) = run(funded_chain().disconnected(), request()).await;

    assert_eq!(snapshot.failed_at, Some(Phase::Validating));
    assert!(snapshot.error.unwrap_or_default().contains("connect your wallet"));
    Ok(())
}

#[tokio::test]
async fn test_excess_precision_fails_validation() -> Result<()> {
    let chain = InMemoryChain::new(owner())
        .with_token(token_a(), 6, "USDC")
        .with_token(token_b(), 18, "TKB")
        .with_balance(token_a(), owner(), U256::MAX)
        .with_balance(token_b(), owner(), U256::MAX);
    let (_, snapshot) = run(chain, request().with_amounts("1.1234567", "1")).await;

    assert_eq!(snapshot.failed_at, Some(Phase::Validating));
    assert!(snapshot.error.unwrap_or_default().contains("decimal places"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_fee_tier_uses_fallback_spacing() -> Result<()> {
    let (chain, snapshot) = run(funded_chain(), LaunchRequest::new(TOKEN_A, TOKEN_B, FeeTier(2500))).await;

    assert_eq!(snapshot.phase, Phase::Completed);
    assert!(chain.pool_exists(token_a(), token_b(), 2500));
    Ok(())
}

#[tokio::test]
async fn test_reset_after_failure_returns_to_idle() -> Result<()> {
    let chain = Arc::new(funded_chain());
    let mut orchestrator = orchestrator(&chain);

    let failed = orchestrator.run(request().with_ticks(60, -60)).await;
    assert_eq!(failed.phase, Phase::Failed);

    orchestrator.reset();
    assert_eq!(orchestrator.snapshot(), LaunchSnapshot::default());

    let retried = orchestrator.run(request()).await;
    assert_eq!(retried.phase, Phase::Completed);
    Ok(())
}
