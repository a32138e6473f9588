//! Synchronous precondition checks run on submission

use alloy_primitives::{Address, U256};
use launchpad_types::{
    canonicalize, format_units, parse_address, parse_tick, CanonicalPair, DecimalAmount, FeeTier,
    LaunchError, LaunchRequest, Phase, TokenMetadata, ValidationError, MAX_TICK, MIN_TICK,
};

/// Everything read from the wallet and the chain before validation runs.
///
/// A `None` lookup means the value was never loaded; `Some(Err(_))` carries
/// the message of a read that failed.
#[derive(Debug, Clone, Default)]
pub struct Preflight {
    pub owner: Option<Address>,
    pub token_a: Option<Result<TokenMetadata, String>>,
    pub token_b: Option<Result<TokenMetadata, String>>,
    pub balance_a: Option<Result<U256, String>>,
    pub balance_b: Option<Result<U256, String>>,
}

/// A request that passed every check, with the metadata it was checked against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLaunch {
    pub owner: Address,
    pub token_a: TokenMetadata,
    pub token_b: TokenMetadata,
    pub fee_tier: FeeTier,
    pub amount_a: DecimalAmount,
    pub amount_b: DecimalAmount,
    pub tick_lower: i32,
    pub tick_upper: i32,
}

impl ValidatedLaunch {
    /// Pool ordering of the two tokens, recomputed on every call
    pub fn pair(&self) -> CanonicalPair {
        canonicalize(self.token_a.address, self.token_b.address)
    }

    /// Metadata in pool order
    pub fn ordered_tokens(&self) -> (&TokenMetadata, &TokenMetadata) {
        self.pair().order(&self.token_a, &self.token_b)
    }

    /// Deposit amounts in base units, in pool order
    pub fn ordered_amounts(&self) -> Result<(U256, U256), ValidationError> {
        let amount_a = self.amount_a.to_base_units(self.token_a.decimals, &self.token_a.symbol)?;
        let amount_b = self.amount_b.to_base_units(self.token_b.decimals, &self.token_b.symbol)?;
        Ok(self.pair().order(amount_a, amount_b))
    }
}

/// Check a request, short-circuiting on the first failure.
///
/// Order: wallet, token presence and syntax, distinct tokens, metadata,
/// amounts, tick range. The precision, bounds, alignment and balance checks
/// run after those so earlier problems are reported first.
pub fn validate(request: &LaunchRequest, preflight: &Preflight) -> Result<ValidatedLaunch, LaunchError> {
    let owner = preflight.owner.ok_or(ValidationError::WalletNotConnected)?;

    if request.token_a.trim().is_empty() || request.token_b.trim().is_empty() {
        return Err(ValidationError::MissingToken.into());
    }
    let address_a = parse_address(&request.token_a)?;
    let address_b = parse_address(&request.token_b)?;

    if address_a == address_b {
        return Err(ValidationError::IdenticalTokens.into());
    }

    let token_a = resolved_metadata(&request.token_a, address_a, preflight.token_a.as_ref())?;
    let token_b = resolved_metadata(&request.token_b, address_b, preflight.token_b.as_ref())?;

    if request.amount_a.trim().is_empty() || request.amount_b.trim().is_empty() {
        return Err(ValidationError::NonPositiveAmount.into());
    }
    let amount_a: DecimalAmount = request.amount_a.parse()?;
    let amount_b: DecimalAmount = request.amount_b.parse()?;
    if amount_a.is_zero() || amount_b.is_zero() {
        return Err(ValidationError::NonPositiveAmount.into());
    }

    let tick_lower = parse_tick(&request.tick_lower)?;
    let tick_upper = parse_tick(&request.tick_upper)?;
    if tick_lower >= tick_upper {
        return Err(ValidationError::TickRangeInvalid { lower: tick_lower, upper: tick_upper }.into());
    }

    let required_a = amount_a.to_base_units(token_a.decimals, &token_a.symbol)?;
    let required_b = amount_b.to_base_units(token_b.decimals, &token_b.symbol)?;

    for tick in [tick_lower, tick_upper] {
        if !(MIN_TICK..=MAX_TICK).contains(&tick) {
            return Err(ValidationError::TickOutOfBounds { tick, min: MIN_TICK, max: MAX_TICK }.into());
        }
    }

    let spacing = request.fee_tier.tick_spacing();
    for tick in [tick_lower, tick_upper] {
        if tick % spacing != 0 {
            return Err(ValidationError::TickNotAligned { tick, spacing }.into());
        }
    }

    check_balance(&token_a, required_a, preflight.balance_a.as_ref())?;
    check_balance(&token_b, required_b, preflight.balance_b.as_ref())?;

    Ok(ValidatedLaunch {
        owner,
        token_a,
        token_b,
        fee_tier: request.fee_tier,
        amount_a,
        amount_b,
        tick_lower,
        tick_upper,
    })
}

fn resolved_metadata(
    input: &str,
    address: Address,
    lookup: Option<&Result<TokenMetadata, String>>,
) -> Result<TokenMetadata, LaunchError> {
    match lookup {
        Some(Ok(metadata)) if metadata.address == address => Ok(metadata.clone()),
        Some(Ok(metadata)) => Err(ValidationError::MetadataUnavailable {
            token: input.to_string(),
            reason: format!("loaded details belong to {}", metadata.address),
        }
        .into()),
        Some(Err(message)) => Err(LaunchError::read(
            Phase::Validating,
            format!("failed to load token details for {}: {}", input, message),
        )),
        None => Err(ValidationError::MetadataUnavailable {
            token: input.to_string(),
            reason: "details are still loading".to_string(),
        }
        .into()),
    }
}

fn check_balance(
    token: &TokenMetadata,
    required: U256,
    lookup: Option<&Result<U256, String>>,
) -> Result<(), LaunchError> {
    match lookup {
        None => Ok(()),
        Some(Err(message)) => Err(LaunchError::read(
            Phase::Validating,
            format!("failed to read {} balance: {}", token.symbol, message),
        )),
        Some(Ok(balance)) if *balance >= required => Ok(()),
        Some(Ok(balance)) => Err(ValidationError::InsufficientBalance {
            symbol: token.symbol.clone(),
            required: format_units(required, token.decimals),
            available: format_units(*balance, token.decimals),
        }
        .into()),
    }
}
