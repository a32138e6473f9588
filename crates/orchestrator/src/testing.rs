//! Deterministic in-process chain for tests and the `simulate` command
//!
//! [`InMemoryChain`] implements both provider traits against a small model of
//! a position manager and a set of ERC-20 tokens. Faults can be injected per
//! transaction kind.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use alloy_primitives::aliases::I24;
use alloy_primitives::{keccak256, Address, B256, U256};
use launchpad_types::{tick_spacing, DEFAULT_POSITION_MANAGER, MAX_TICK, MIN_TICK};
use tracing::debug;

use crate::abi::{increase_liquidity_log, mint_transfer_log, INonfungiblePositionManager::MintParams, LaunchCall};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::provider::{ChainReader, Log, TxKind, TxReceipt, TxRequest, WalletProvider};

#[derive(Debug, Clone)]
struct TokenInfo {
    decimals: u8,
    symbol: String,
}

#[derive(Debug, Default)]
struct ChainState {
    tokens: HashMap<Address, TokenInfo>,
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    pools: HashMap<(Address, Address, u32), U256>,
    receipts: HashMap<B256, TxReceipt>,
    submitted: Vec<TxRequest>,
    next_position_id: u64,
    block_number: u64,
    nonce: u64,
    metadata_reads: usize,
}

#[derive(Debug, Default)]
struct Faults {
    reject: HashSet<TxKind>,
    revert: HashSet<TxKind>,
    lose_confirmation: HashSet<TxKind>,
    lost_hashes: HashSet<B256>,
    failing_metadata: HashSet<Address>,
    fail_allowance_reads: bool,
    fail_balance_reads: bool,
    omit_position_events: bool,
}

/// In-memory position manager plus ERC-20 tokens
#[derive(Debug)]
pub struct InMemoryChain {
    account: Option<Address>,
    position_manager: Address,
    confirmation_delay: Option<Duration>,
    state: Mutex<ChainState>,
    faults: Mutex<Faults>,
}

impl InMemoryChain {
    pub fn new(account: Address) -> Self {
        Self {
            account: Some(account),
            position_manager: DEFAULT_POSITION_MANAGER,
            confirmation_delay: None,
            state: Mutex::new(ChainState { next_position_id: 1, block_number: 1, ..Default::default() }),
            faults: Mutex::new(Faults::default()),
        }
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    pub fn with_position_manager(mut self, position_manager: Address) -> Self {
        self.position_manager = position_manager;
        self
    }

    pub fn disconnected(mut self) -> Self {
        self.account = None;
        self
    }

    /// Hold every confirmation for `delay` before answering
    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = Some(delay);
        self
    }

    pub fn with_token(self, token: Address, decimals: u8, symbol: &str) -> Self {
        self.lock_state().tokens.insert(token, TokenInfo { decimals, symbol: symbol.to_string() });
        self
    }

    pub fn with_balance(self, token: Address, owner: Address, amount: U256) -> Self {
        self.lock_state().balances.insert((token, owner), amount);
        self
    }

    pub fn with_allowance(self, token: Address, owner: Address, spender: Address, amount: U256) -> Self {
        self.lock_state().allowances.insert((token, owner, spender), amount);
        self
    }

    pub fn reject(self, kind: TxKind) -> Self {
        self.lock_faults().reject.insert(kind);
        self
    }

    pub fn revert(self, kind: TxKind) -> Self {
        self.lock_faults().revert.insert(kind);
        self
    }

    /// Broadcast succeeds but the receipt never arrives
    pub fn lose_confirmation(self, kind: TxKind) -> Self {
        self.lock_faults().lose_confirmation.insert(kind);
        self
    }

    pub fn fail_metadata_for(self, token: Address) -> Self {
        self.lock_faults().failing_metadata.insert(token);
        self
    }

    pub fn fail_allowance_reads(self) -> Self {
        self.lock_faults().fail_allowance_reads = true;
        self
    }

    pub fn fail_balance_reads(self) -> Self {
        self.lock_faults().fail_balance_reads = true;
        self
    }

    /// Mint without emitting `Transfer` or `IncreaseLiquidity`
    pub fn omit_position_events(self) -> Self {
        self.lock_faults().omit_position_events = true;
        self
    }

    /// Clear every injected fault
    pub fn heal(&self) {
        *self.lock_faults() = Faults::default();
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn position_manager(&self) -> Address {
        self.position_manager
    }

    pub fn submitted(&self) -> Vec<TxRequest> {
        self.lock_state().submitted.clone()
    }

    pub fn submitted_kinds(&self) -> Vec<TxKind> {
        self.lock_state().submitted.iter().map(|tx| tx.kind).collect()
    }

    pub fn allowance_of(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.lock_state().allowances.get(&(token, owner, spender)).copied().unwrap_or_default()
    }

    pub fn balance(&self, token: Address, owner: Address) -> U256 {
        self.lock_state().balances.get(&(token, owner)).copied().unwrap_or_default()
    }

    pub fn pool_exists(&self, token0: Address, token1: Address, fee: u32) -> bool {
        self.lock_state().pools.contains_key(&(token0, token1, fee))
    }

    pub fn pool_count(&self) -> usize {
        self.lock_state().pools.len()
    }

    pub fn positions_minted(&self) -> u64 {
        self.lock_state().next_position_id - 1
    }

    /// Number of `decimals()` and `symbol()` calls served
    pub fn metadata_reads(&self) -> usize {
        self.lock_state().metadata_reads
    }

    fn lock_state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Record and execute a transaction in its own block
    fn mine(&self, from: Address, tx: &TxRequest, revert: bool, emit_events: bool) -> B256 {
        let mut state = self.lock_state();
        state.nonce += 1;
        state.block_number += 1;
        let hash = keccak256(state.nonce.to_be_bytes());
        state.submitted.push(tx.clone());

        let outcome = if revert {
            Err("execution reverted".to_string())
        } else {
            self.execute(&mut state, from, tx, emit_events)
        };
        let (success, logs) = match outcome {
            Ok(logs) => (true, logs),
            Err(reason) => {
                debug!(kind = %tx.kind, reason = %reason, "Simulated transaction reverted");
                (false, vec![])
            }
        };
        let block_number = state.block_number;
        state.receipts.insert(hash, TxReceipt { hash, success, block_number, logs });
        hash
    }

    fn execute(
        &self,
        state: &mut ChainState,
        from: Address,
        tx: &TxRequest,
        emit_events: bool,
    ) -> Result<Vec<Log>, String> {
        let call = LaunchCall::decode(&tx.data).map_err(|e| e.to_string())?;
        match call {
            LaunchCall::CreateAndInitializePool(call) => {
                if tx.to != self.position_manager {
                    return Err(format!("{} is not the position manager", tx.to));
                }
                if call.token0 >= call.token1 {
                    return Err("token0 must sort below token1".into());
                }
                if call.sqrtPriceX96.is_zero() {
                    return Err("zero initial price".into());
                }
                let key = (call.token0, call.token1, call.fee.to::<u32>());
                state.pools.entry(key).or_insert_with(|| U256::from(call.sqrtPriceX96));
                Ok(vec![])
            }
            LaunchCall::Approve(call) => {
                if !state.tokens.contains_key(&tx.to) {
                    return Err(format!("no token deployed at {}", tx.to));
                }
                state.allowances.insert((tx.to, from, call.spender), call.amount);
                Ok(vec![])
            }
            LaunchCall::Mint(call) => {
                if tx.to != self.position_manager {
                    return Err(format!("{} is not the position manager", tx.to));
                }
                self.mint(state, from, &call.params, emit_events)
            }
        }
    }

    fn mint(
        &self,
        state: &mut ChainState,
        from: Address,
        params: &MintParams,
        emit_events: bool,
    ) -> Result<Vec<Log>, String> {
        let fee = params.fee.to::<u32>();
        if !state.pools.contains_key(&(params.token0, params.token1, fee)) {
            return Err("pool not initialized".into());
        }
        let tick = |value: I24| i32::try_from(value).map_err(|_| "tick out of range".to_string());
        let (tick_lower, tick_upper) = (tick(params.tickLower)?, tick(params.tickUpper)?);
        if tick_lower >= tick_upper {
            return Err("TLU".into());
        }
        if tick_lower < MIN_TICK || tick_upper > MAX_TICK {
            return Err("tick out of range".into());
        }
        let spacing = tick_spacing(fee);
        if tick_lower % spacing != 0 || tick_upper % spacing != 0 {
            return Err("tick not aligned to spacing".into());
        }
        let now = U256::from(u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default());
        if params.deadline < now {
            return Err("Transaction too old".into());
        }

        for (token, amount) in [(params.token0, params.amount0Desired), (params.token1, params.amount1Desired)] {
            let allowance = state.allowances.get(&(token, from, self.position_manager)).copied().unwrap_or_default();
            if allowance < amount {
                return Err("STF: insufficient allowance".into());
            }
            let balance = state.balances.get(&(token, from)).copied().unwrap_or_default();
            if balance < amount {
                return Err("STF: insufficient balance".into());
            }
        }

        for (token, amount) in [(params.token0, params.amount0Desired), (params.token1, params.amount1Desired)] {
            if let Some(balance) = state.balances.get_mut(&(token, from)) {
                *balance -= amount;
            }
            if let Some(allowance) = state.allowances.get_mut(&(token, from, self.position_manager)) {
                if *allowance != U256::MAX {
                    *allowance -= amount;
                }
            }
        }

        let token_id = U256::from(state.next_position_id);
        state.next_position_id += 1;

        if !emit_events {
            return Ok(vec![]);
        }
        let liquidity = params.amount0Desired.min(params.amount1Desired).saturating_to::<u128>();
        Ok(vec![
            mint_transfer_log(self.position_manager, params.recipient, token_id),
            increase_liquidity_log(
                self.position_manager,
                token_id,
                liquidity,
                params.amount0Desired,
                params.amount1Desired,
            ),
        ])
    }
}

#[async_trait::async_trait]
impl WalletProvider for InMemoryChain {
    fn account(&self) -> Option<Address> {
        self.account
    }

    async fn submit(&self, tx: &TxRequest) -> OrchestratorResult<B256> {
        let from = self.account.ok_or(OrchestratorError::WalletNotConnected)?;
        let (reject, revert, lose, emit_events) = {
            let faults = self.lock_faults();
            (
                faults.reject.contains(&tx.kind),
                faults.revert.contains(&tx.kind),
                faults.lose_confirmation.contains(&tx.kind),
                !faults.omit_position_events,
            )
        };
        if reject {
            return Err(OrchestratorError::Rejected("User rejected the request.".into()));
        }

        let hash = self.mine(from, tx, revert, emit_events);
        if lose {
            self.lock_faults().lost_hashes.insert(hash);
        }
        Ok(hash)
    }

    async fn await_confirmation(&self, hash: B256) -> OrchestratorResult<TxReceipt> {
        if let Some(delay) = self.confirmation_delay {
            tokio::time::sleep(delay).await;
        }
        if self.lock_faults().lost_hashes.contains(&hash) {
            return Err(OrchestratorError::Timeout { what: format!("receipt of {}", hash), seconds: 0 });
        }
        self.lock_state()
            .receipts
            .get(&hash)
            .cloned()
            .ok_or_else(|| OrchestratorError::InvalidResponse(format!("unknown transaction {}", hash)))
    }
}

#[async_trait::async_trait]
impl ChainReader for InMemoryChain {
    async fn decimals(&self, token: Address) -> OrchestratorResult<u8> {
        self.token_info(token).map(|info| info.decimals)
    }

    async fn symbol(&self, token: Address) -> OrchestratorResult<String> {
        self.token_info(token).map(|info| info.symbol)
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> OrchestratorResult<U256> {
        if self.lock_faults().fail_allowance_reads {
            return Err(OrchestratorError::NetworkError("connection reset while reading allowance".into()));
        }
        Ok(self.allowance_of(token, owner, spender))
    }

    async fn balance_of(&self, token: Address, owner: Address) -> OrchestratorResult<U256> {
        if self.lock_faults().fail_balance_reads {
            return Err(OrchestratorError::NetworkError("connection reset while reading balance".into()));
        }
        Ok(self.balance(token, owner))
    }
}

impl InMemoryChain {
    fn token_info(&self, token: Address) -> OrchestratorResult<TokenInfo> {
        if self.lock_faults().failing_metadata.contains(&token) {
            return Err(OrchestratorError::CallReverted(format!("token {} reverted", token)));
        }
        let mut state = self.lock_state();
        state.metadata_reads += 1;
        state
            .tokens
            .get(&token)
            .cloned()
            .ok_or_else(|| OrchestratorError::CallReverted(format!("no contract code at {}", token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::repeat_byte(0x01)
    }

    #[tokio::test]
    async fn test_pool_initialization_is_idempotent() {
        let chain = InMemoryChain::new(owner());
        let (token0, token1) = (Address::repeat_byte(0x0A), Address::repeat_byte(0x0B));
        let tx = TxRequest {
            kind: TxKind::InitializePool,
            to: chain.position_manager(),
            data: LaunchCall::create_and_initialize_pool(token0, token1, 3000, U256::from(1u64)).unwrap().encode(),
            value: U256::ZERO,
        };

        for _ in 0..2 {
            let hash = chain.submit(&tx).await.unwrap();
            assert!(chain.await_confirmation(hash).await.unwrap().success);
        }
        assert_eq!(chain.pool_count(), 1);
        assert!(chain.pool_exists(token0, token1, 3000));
    }

    #[tokio::test]
    async fn test_unsorted_pool_reverts() {
        let chain = InMemoryChain::new(owner());
        let tx = TxRequest {
            kind: TxKind::InitializePool,
            to: chain.position_manager(),
            data: LaunchCall::create_and_initialize_pool(
                Address::repeat_byte(0x0B),
                Address::repeat_byte(0x0A),
                3000,
                U256::from(1u64),
            )
            .unwrap()
            .encode(),
            value: U256::ZERO,
        };
        let hash = chain.submit(&tx).await.unwrap();
        assert!(!chain.await_confirmation(hash).await.unwrap().success);
        assert_eq!(chain.pool_count(), 0);
    }

    #[tokio::test]
    async fn test_faults() {
        let token = Address::repeat_byte(0x0A);
        let chain = InMemoryChain::new(owner())
            .with_token(token, 18, "TKA")
            .reject(TxKind::ApproveToken0)
            .fail_allowance_reads();
        let tx = TxRequest {
            kind: TxKind::ApproveToken0,
            to: token,
            data: LaunchCall::approve(chain.position_manager(), U256::MAX).encode(),
            value: U256::ZERO,
        };
        assert!(matches!(chain.submit(&tx).await, Err(OrchestratorError::Rejected(_))));
        assert!(chain.allowance(token, owner(), chain.position_manager()).await.is_err());

        chain.heal();
        let hash = chain.submit(&tx).await.unwrap();
        assert!(chain.await_confirmation(hash).await.unwrap().success);
        assert_eq!(chain.allowance(token, owner(), chain.position_manager()).await.unwrap(), U256::MAX);
    }

    #[tokio::test]
    async fn test_disconnected_wallet_cannot_submit() {
        let chain = InMemoryChain::new(owner()).disconnected();
        assert!(chain.account().is_none());
        let tx = TxRequest {
            kind: TxKind::InitializePool,
            to: chain.position_manager(),
            data: Default::default(),
            value: U256::ZERO,
        };
        assert_eq!(chain.submit(&tx).await, Err(OrchestratorError::WalletNotConnected));
    }
}
