/// Constants shared by the launchpad orchestrator and its consumers

use alloy_primitives::{address, Address, U256};

// ============================================================================
// Price Constants
// ============================================================================

/// Q64.96 fixed-point scale: 2^96
pub const Q96: U256 = U256::from_limbs([0, 1 << 32, 0, 0]);

/// sqrtPriceX96 encoding a 1:1 price between token0 and token1
pub const DEFAULT_SQRT_PRICE_X96: U256 = Q96;

// ============================================================================
// Tick Constants
// ============================================================================

/// Minimum tick accepted by the pool contract
pub const MIN_TICK: i32 = -887_272;

/// Maximum tick accepted by the pool contract
pub const MAX_TICK: i32 = 887_272;

/// Default range half-width, in multiples of the tick spacing
pub const DEFAULT_TICK_RANGE_MULTIPLIER: i32 = 100;

/// Tick spacing used for fee tiers the lookup does not know
pub const FALLBACK_TICK_SPACING: i32 = 60;

// ============================================================================
// Fee Tier Constants (hundredths of a basis point)
// ============================================================================

/// 0.01%
pub const FEE_TIER_LOWEST: u32 = 100;

/// 0.05%
pub const FEE_TIER_LOW: u32 = 500;

/// 0.3%
pub const FEE_TIER_MEDIUM: u32 = 3_000;

/// 1%
pub const FEE_TIER_HIGH: u32 = 10_000;

// ============================================================================
// Contract Constants
// ============================================================================

/// Uniswap V3 NonfungiblePositionManager on Sepolia
pub const DEFAULT_POSITION_MANAGER: Address = address!("1238536071E1c677A632429e3655c799b22cDA52");

/// Seconds a mint transaction stays valid after it is built (20 minutes)
pub const DEFAULT_MINT_DEADLINE_SECS: u64 = 20 * 60;
