//! Wallet and chain-read seams the orchestrator drives

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorResult;

/// Which step of a launch a transaction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    InitializePool,
    ApproveToken0,
    ApproveToken1,
    MintPosition,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::InitializePool => "initialize pool",
            TxKind::ApproveToken0 => "approve token0",
            TxKind::ApproveToken1 => "approve token1",
            TxKind::MintPosition => "mint position",
        }
    }
}

impl std::fmt::Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract call to be signed and broadcast by the wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub kind: TxKind,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// Event log emitted by a confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub hash: B256,
    /// False when the transaction reverted
    pub success: bool,
    pub block_number: u64,
    pub logs: Vec<Log>,
}

/// Transaction-signing side of a wallet
#[async_trait::async_trait]
pub trait WalletProvider: Send + Sync {
    /// Connected account, if any
    fn account(&self) -> Option<Address>;

    /// Sign and broadcast; resolves once the wallet hands back a hash
    async fn submit(&self, tx: &TxRequest) -> OrchestratorResult<B256>;

    /// Wait until the transaction is mined
    async fn await_confirmation(&self, hash: B256) -> OrchestratorResult<TxReceipt>;
}

/// Read-only ERC-20 calls
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    async fn decimals(&self, token: Address) -> OrchestratorResult<u8>;

    async fn symbol(&self, token: Address) -> OrchestratorResult<String>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> OrchestratorResult<U256>;

    async fn balance_of(&self, token: Address, owner: Address) -> OrchestratorResult<U256>;
}

#[async_trait::async_trait]
impl<T: WalletProvider + ?Sized> WalletProvider for Arc<T> {
    fn account(&self) -> Option<Address> {
        (**self).account()
    }

    async fn submit(&self, tx: &TxRequest) -> OrchestratorResult<B256> {
        (**self).submit(tx).await
    }

    async fn await_confirmation(&self, hash: B256) -> OrchestratorResult<TxReceipt> {
        (**self).await_confirmation(hash).await
    }
}

#[async_trait::async_trait]
impl<T: ChainReader + ?Sized> ChainReader for Arc<T> {
    async fn decimals(&self, token: Address) -> OrchestratorResult<u8> {
        (**self).decimals(token).await
    }

    async fn symbol(&self, token: Address) -> OrchestratorResult<String> {
        (**self).symbol(token).await
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> OrchestratorResult<U256> {
        (**self).allowance(token, owner, spender).await
    }

    async fn balance_of(&self, token: Address, owner: Address) -> OrchestratorResult<U256> {
        (**self).balance_of(token, owner).await
    }
}
