/// Fee tiers and the tick spacing each one implies

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::constants::*;

/// Pool fee tier, in hundredths of a basis point (3000 = 0.3%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeTier(pub u32);

impl FeeTier {
    pub const LOWEST: FeeTier = FeeTier(FEE_TIER_LOWEST);
    pub const LOW: FeeTier = FeeTier(FEE_TIER_LOW);
    pub const MEDIUM: FeeTier = FeeTier(FEE_TIER_MEDIUM);
    pub const HIGH: FeeTier = FeeTier(FEE_TIER_HIGH);

    /// Raw fee value as passed to the contracts (uint24)
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Tick spacing for this tier. See [`tick_spacing`].
    pub fn tick_spacing(&self) -> i32 {
        tick_spacing(self.0)
    }

    /// Default `(tick_lower, tick_upper)` when the user has not set a range
    pub fn default_tick_range(&self) -> (i32, i32) {
        let width = self.tick_spacing() * DEFAULT_TICK_RANGE_MULTIPLIER;
        (-width, width)
    }

    /// Human-readable percentage, e.g. "0.3%"
    pub fn label(&self) -> String {
        let whole = self.0 / 10_000;
        let frac = self.0 % 10_000;
        if frac == 0 {
            return format!("{}%", whole);
        }
        let digits = format!("{:04}", frac);
        format!("{}.{}%", whole, digits.trim_end_matches('0'))
    }
}

impl Default for FeeTier {
    fn default() -> Self {
        Self::MEDIUM
    }
}

impl fmt::Display for FeeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FeeTier {
    fn from(value: u32) -> Self {
        FeeTier(value)
    }
}

/// Map a fee tier to its tick spacing.
///
/// Unknown tiers fall back to a spacing of 60, the 0.3% tier's spacing, and
/// log a warning.
pub fn tick_spacing(fee: u32) -> i32 {
    match fee {
        FEE_TIER_LOWEST => 1,
        FEE_TIER_LOW => 10,
        FEE_TIER_MEDIUM => 60,
        FEE_TIER_HIGH => 200,
        other => {
            warn!("Unknown fee tier {}, defaulting tick spacing to {}", other, FALLBACK_TICK_SPACING);
            FALLBACK_TICK_SPACING
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_standard_tick_spacings() {
        assert_eq!(tick_spacing(100), 1);
        assert_eq!(tick_spacing(500), 10);
        assert_eq!(tick_spacing(3000), 60);
        assert_eq!(tick_spacing(10000), 200);
    }

    #[test]
    fn test_default_tick_range() {
        assert_eq!(FeeTier::MEDIUM.default_tick_range(), (-6000, 6000));
        assert_eq!(FeeTier::LOWEST.default_tick_range(), (-100, 100));
        assert_eq!(FeeTier::HIGH.default_tick_range(), (-20000, 20000));
        // Unknown tier uses the fallback spacing
        assert_eq!(FeeTier(2500).default_tick_range(), (-6000, 6000));
    }

    #[test]
    fn test_labels() {
        assert_eq!(FeeTier::LOWEST.label(), "0.01%");
        assert_eq!(FeeTier::LOW.label(), "0.05%");
        assert_eq!(FeeTier::MEDIUM.label(), "0.3%");
        assert_eq!(FeeTier::HIGH.label(), "1%");
    }

    proptest! {
        #[test]
        fn prop_unknown_tiers_fall_back_to_60(fee in any::<u32>()) {
            prop_assume!(![100u32, 500, 3000, 10000].contains(&fee));
            prop_assert_eq!(tick_spacing(fee), 60);
        }
    }
}
