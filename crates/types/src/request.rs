/// User launch intent, token metadata and input parsing

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::ValidationError;
use crate::fee::FeeTier;

/// Amount pre-filled in a fresh form, per token
pub const DEFAULT_DEPOSIT_AMOUNT: &str = "10";

/// What the user asked for, as entered.
///
/// Fields stay strings until validation so that half-typed input can be held
/// without losing what the user wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub token_a: String,
    pub token_b: String,
    pub fee_tier: FeeTier,
    pub amount_a: String,
    pub amount_b: String,
    pub tick_lower: String,
    pub tick_upper: String,
}

impl LaunchRequest {
    /// Request with default amounts and the fee tier's default tick range
    pub fn new(token_a: impl Into<String>, token_b: impl Into<String>, fee_tier: FeeTier) -> Self {
        let (lower, upper) = fee_tier.default_tick_range();
        Self {
            token_a: token_a.into(),
            token_b: token_b.into(),
            fee_tier,
            amount_a: DEFAULT_DEPOSIT_AMOUNT.to_string(),
            amount_b: DEFAULT_DEPOSIT_AMOUNT.to_string(),
            tick_lower: lower.to_string(),
            tick_upper: upper.to_string(),
        }
    }

    pub fn with_amounts(mut self, amount_a: impl Into<String>, amount_b: impl Into<String>) -> Self {
        self.amount_a = amount_a.into();
        self.amount_b = amount_b.into();
        self
    }

    pub fn with_ticks(mut self, tick_lower: impl ToString, tick_upper: impl ToString) -> Self {
        self.tick_lower = tick_lower.to_string();
        self.tick_upper = tick_upper.to_string();
        self
    }
}

/// ERC-20 details needed to convert amounts and label the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
}

/// Parse a token address the way wallets accept them: optional `0x`, 40 hex
/// digits, and a valid EIP-55 checksum whenever the casing is mixed.
pub fn parse_address(input: &str) -> Result<Address, ValidationError> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidAddress(input.to_string()));
    }

    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let parsed = if has_upper && has_lower {
        Address::parse_checksummed(format!("0x{}", digits), None).ok()
    } else {
        Address::from_str(digits).ok()
    };

    parsed.ok_or_else(|| ValidationError::InvalidAddress(input.to_string()))
}

/// Parse a tick bound; blank input is reported as missing
pub fn parse_tick(input: &str) -> Result<i32, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingTicks);
    }
    trimmed
        .parse::<i32>()
        .map_err(|_| ValidationError::InvalidTick(input.to_string()))
}

/// Non-negative decimal amount as typed, e.g. "10", "0.5", ".25"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalAmount {
    integer: String,
    fraction: String,
}

impl DecimalAmount {
    pub fn is_zero(&self) -> bool {
        self.integer.chars().chain(self.fraction.chars()).all(|c| c == '0')
    }

    /// Scale to the token's smallest unit.
    ///
    /// Exact: fails instead of rounding when the amount has more fractional
    /// digits than the token supports.
    pub fn to_base_units(&self, decimals: u8, symbol: &str) -> Result<U256, ValidationError> {
        let fraction = self.fraction.trim_end_matches('0');
        if fraction.len() > decimals as usize {
            return Err(ValidationError::ExcessPrecision {
                amount: self.to_string(),
                symbol: symbol.to_string(),
                decimals,
            });
        }

        let mut digits = String::with_capacity(self.integer.len() + decimals as usize);
        digits.push_str(&self.integer);
        digits.push_str(fraction);
        digits.extend(std::iter::repeat('0').take(decimals as usize - fraction.len()));

        let digits = digits.trim_start_matches('0');
        if digits.is_empty() {
            return Ok(U256::ZERO);
        }

        U256::from_str_radix(digits, 10).map_err(|_| ValidationError::AmountOverflow {
            amount: self.to_string(),
            symbol: symbol.to_string(),
        })
    }
}

impl FromStr for DecimalAmount {
    type Err = ValidationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::NonPositiveAmount);
        }

        // A well-formed negative number is numeric, just not positive
        if let Some(rest) = trimmed.strip_prefix('-') {
            return match rest.parse::<DecimalAmount>() {
                Ok(_) => Err(ValidationError::NonPositiveAmount),
                Err(_) => Err(ValidationError::InvalidAmount(input.to_string())),
            };
        }

        let (integer, fraction) = match trimmed.split_once('.') {
            Some((integer, fraction)) => (integer, fraction),
            None => (trimmed, ""),
        };

        let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (integer.is_empty() && fraction.is_empty()) || !all_digits(integer) || !all_digits(fraction) {
            return Err(ValidationError::InvalidAmount(input.to_string()));
        }

        Ok(Self {
            integer: integer.to_string(),
            fraction: fraction.to_string(),
        })
    }
}

impl std::fmt::Display for DecimalAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let integer = if self.integer.is_empty() { "0" } else { &self.integer };
        if self.fraction.is_empty() {
            write!(f, "{}", integer)
        } else {
            write!(f, "{}.{}", integer, self.fraction)
        }
    }
}

/// Render a base-unit amount as a decimal string, e.g. 1500000 @ 6 -> "1.5"
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (integer, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        integer.to_string()
    } else {
        format!("{}.{}", integer, fraction)
    }
}
