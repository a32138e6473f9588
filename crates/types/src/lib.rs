/// Shared types for the launchpad liquidity orchestrator
///
/// This crate provides the data model used by the orchestrator and by
/// whatever presents it: token pairs, fee tiers, launch requests, phases and
/// the launch error taxonomy.

pub mod constants;
pub mod errors;
pub mod fee;
pub mod pair;
pub mod phase;
pub mod request;

// Re-export all public types
pub use constants::*;
pub use errors::*;
pub use fee::*;
pub use pair::*;
pub use phase::*;
pub use request::*;

pub use alloy_primitives::{Address, Bytes, B256, U256};

/// Result type alias using the launch error type
pub type LaunchResult<T> = std::result::Result<T, LaunchError>;
