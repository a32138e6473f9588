//! Contract bindings for the position manager and the ERC-20s it pulls from
//!
//! [`LaunchCall`] wraps the three state-changing calls a launch sends. The
//! read helpers build `eth_call` payloads and decode their return data.

use alloy_primitives::aliases::{I24, U160, U24};
use alloy_primitives::{hex, Address, Bytes, LogData, B256, U256};
use alloy_sol_types::{sol, SolCall, SolEvent};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::provider::Log;

use INonfungiblePositionManager::{createAndInitializePoolIfNecessaryCall, mintCall, IncreaseLiquidity, MintParams};
use IERC20::approveCall;
use IERC721::Transfer;

sol! {
    /// Uniswap V3 `NonfungiblePositionManager`, the parts a launch touches
    interface INonfungiblePositionManager {
        #[derive(Debug, PartialEq, Eq)]
        struct MintParams {
            address token0;
            address token1;
            uint24 fee;
            int24 tickLower;
            int24 tickUpper;
            uint256 amount0Desired;
            uint256 amount1Desired;
            uint256 amount0Min;
            uint256 amount1Min;
            address recipient;
            uint256 deadline;
        }

        event IncreaseLiquidity(uint256 indexed tokenId, uint128 liquidity, uint256 amount0, uint256 amount1);

        #[derive(Debug, PartialEq, Eq)]
        function createAndInitializePoolIfNecessary(
            address token0,
            address token1,
            uint24 fee,
            uint160 sqrtPriceX96
        ) external payable returns (address pool);

        #[derive(Debug, PartialEq, Eq)]
        function mint(MintParams calldata params)
            external
            payable
            returns (uint256 tokenId, uint128 liquidity, uint256 amount0, uint256 amount1);
    }

    interface IERC20 {
        #[derive(Debug, PartialEq, Eq)]
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }

    /// Tokens such as MKR that return `symbol()` as `bytes32`
    interface IERC20Bytes32 {
        function symbol() external view returns (bytes32);
    }

    interface IERC721 {
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
    }
}

// ============================================================================
// Launch Calls
// ============================================================================

/// A state-changing call the launch flow sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchCall {
    CreateAndInitializePool(createAndInitializePoolIfNecessaryCall),
    Approve(approveCall),
    Mint(mintCall),
}

impl LaunchCall {
    pub fn create_and_initialize_pool(
        token0: Address,
        token1: Address,
        fee: u32,
        sqrt_price_x96: U256,
    ) -> OrchestratorResult<Self> {
        let sqrt_price_x96 = U160::checked_from_uint(sqrt_price_x96).ok_or_else(|| {
            OrchestratorError::InvalidConfig(format!("sqrtPriceX96 {} does not fit in uint160", sqrt_price_x96))
        })?;
        Ok(LaunchCall::CreateAndInitializePool(createAndInitializePoolIfNecessaryCall {
            token0,
            token1,
            fee: uint24(fee)?,
            sqrtPriceX96: sqrt_price_x96,
        }))
    }

    pub fn approve(spender: Address, amount: U256) -> Self {
        LaunchCall::Approve(approveCall { spender, amount })
    }

    pub fn mint(params: MintParams) -> Self {
        LaunchCall::Mint(mintCall { params })
    }

    pub fn encode(&self) -> Bytes {
        match self {
            LaunchCall::CreateAndInitializePool(call) => call.abi_encode().into(),
            LaunchCall::Approve(call) => call.abi_encode().into(),
            LaunchCall::Mint(call) => call.abi_encode().into(),
        }
    }

    /// Decode calldata produced by [`LaunchCall::encode`]
    pub fn decode(data: &[u8]) -> OrchestratorResult<Self> {
        let selector = data
            .get(..4)
            .ok_or_else(|| OrchestratorError::InvalidResponse("calldata shorter than a selector".into()))?;

        if selector == createAndInitializePoolIfNecessaryCall::SELECTOR {
            Ok(LaunchCall::CreateAndInitializePool(createAndInitializePoolIfNecessaryCall::abi_decode(data, true)?))
        } else if selector == approveCall::SELECTOR {
            Ok(LaunchCall::Approve(approveCall::abi_decode(data, true)?))
        } else if selector == mintCall::SELECTOR {
            Ok(LaunchCall::Mint(mintCall::abi_decode(data, true)?))
        } else {
            Err(OrchestratorError::InvalidResponse(format!("unknown selector 0x{}", hex::encode(selector))))
        }
    }
}

pub fn uint24(value: u32) -> OrchestratorResult<U24> {
    U24::try_from(value).ok()
        .ok_or_else(|| OrchestratorError::InvalidResponse(format!("{} does not fit in uint24", value)))
}

pub fn int24(value: i32) -> OrchestratorResult<I24> {
    I24::try_from(value).map_err(|_| OrchestratorError::InvalidResponse(format!("{} does not fit in int24", value)))
}

// ============================================================================
// Read Calls
// ============================================================================

pub fn encode_decimals() -> Bytes {
    IERC20::decimalsCall {}.abi_encode().into()
}

pub fn encode_symbol() -> Bytes {
    IERC20::symbolCall {}.abi_encode().into()
}

pub fn encode_allowance(owner: Address, spender: Address) -> Bytes {
    IERC20::allowanceCall { owner, spender }.abi_encode().into()
}

pub fn encode_balance_of(owner: Address) -> Bytes {
    IERC20::balanceOfCall { owner }.abi_encode().into()
}

pub fn decode_decimals(data: &[u8]) -> OrchestratorResult<u8> {
    Ok(IERC20::decimalsCall::abi_decode_returns(data, true)?._0)
}

pub fn decode_allowance(data: &[u8]) -> OrchestratorResult<U256> {
    Ok(IERC20::allowanceCall::abi_decode_returns(data, true)?._0)
}

pub fn decode_balance_of(data: &[u8]) -> OrchestratorResult<U256> {
    Ok(IERC20::balanceOfCall::abi_decode_returns(data, true)?._0)
}

/// Decode `symbol()`, accepting both `string` and legacy `bytes32` returns
pub fn decode_symbol(data: &[u8]) -> OrchestratorResult<String> {
    if let Ok(symbol) = IERC20::symbolCall::abi_decode_returns(data, true) {
        return Ok(symbol._0);
    }
    let raw = IERC20Bytes32::symbolCall::abi_decode_returns(data, true)?._0;
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

// ============================================================================
// Logs
// ============================================================================

/// Build the `IncreaseLiquidity` log the position manager emits on mint
pub fn increase_liquidity_log(position_manager: Address, token_id: U256, liquidity: u128, amount0: U256, amount1: U256) -> Log {
    let event = IncreaseLiquidity { tokenId: token_id, liquidity, amount0, amount1 };
    into_log(position_manager, event.encode_log_data())
}

/// Build the ERC-721 `Transfer` log for a freshly minted token
pub fn mint_transfer_log(position_manager: Address, recipient: Address, token_id: U256) -> Log {
    let event = Transfer { from: Address::ZERO, to: recipient, tokenId: token_id };
    into_log(position_manager, event.encode_log_data())
}

fn into_log(address: Address, data: LogData) -> Log {
    Log { address, topics: data.topics().to_vec(), data: data.data }
}

fn has_signature(log: &Log, signature: B256) -> bool {
    log.topics.first() == Some(&signature)
}

/// Find the id of the position minted by `position_manager`.
///
/// Prefers `IncreaseLiquidity`; falls back to the NFT mint `Transfer`. The
/// error carries a description for the non-fatal warning.
pub fn position_id_from_logs(logs: &[Log], position_manager: Address) -> Result<U256, String> {
    let from_manager = || logs.iter().filter(move |log| log.address == position_manager);

    let increase = from_manager()
        .filter(|log| has_signature(log, IncreaseLiquidity::SIGNATURE_HASH))
        .find_map(|log| IncreaseLiquidity::decode_raw_log(log.topics.iter().copied(), &log.data, true).ok())
        .map(|event| event.tokenId);
    if let Some(id) = increase {
        return Ok(id);
    }

    // ERC-20 transfers share the signature but index only two topics
    let minted = from_manager()
        .filter(|log| log.topics.len() == 4 && has_signature(log, Transfer::SIGNATURE_HASH))
        .filter_map(|log| Transfer::decode_raw_log(log.topics.iter().copied(), &log.data, true).ok())
        .find(|event| event.from == Address::ZERO)
        .map(|event| event.tokenId);

    minted.ok_or_else(|| {
        format!(
            "no IncreaseLiquidity or mint Transfer event from {} among {} logs",
            position_manager,
            logs.len()
        )
    })
}
