/// Canonical (token0, token1) ordering required by the pool contract

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::fee::FeeTier;

/// Token pair in pool order: `token0 < token1` by address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalPair {
    pub token0: Address,
    pub token1: Address,
    /// True when token B of the request became token0
    pub flipped: bool,
}

/// Order two addresses the way the pool contract expects.
///
/// Byte order of the 20-byte addresses is the same as lexicographic order of
/// their lowercase hex strings, so checksum casing never affects the result.
pub fn canonicalize(token_a: Address, token_b: Address) -> CanonicalPair {
    if token_a <= token_b {
        CanonicalPair { token0: token_a, token1: token_b, flipped: false }
    } else {
        CanonicalPair { token0: token_b, token1: token_a, flipped: true }
    }
}

impl CanonicalPair {
    /// Rearrange per-request values (A, B) into pool order (0, 1)
    pub fn order<T>(&self, for_a: T, for_b: T) -> (T, T) {
        if self.flipped {
            (for_b, for_a)
        } else {
            (for_a, for_b)
        }
    }

    /// Identifier shown once a pool exists: `token0-token1-fee`
    pub fn pool_key(&self, fee: FeeTier) -> String {
        format!("{}-{}-{}", self.token0, self.token1, fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn test_orders_lower_address_first() {
        let pair = canonicalize(addr(0xbb), addr(0xaa));
        assert_eq!(pair.token0, addr(0xaa));
        assert_eq!(pair.token1, addr(0xbb));
        assert!(pair.flipped);

        let pair = canonicalize(addr(0xaa), addr(0xbb));
        assert!(!pair.flipped);
    }

    #[test]
    fn test_order_follows_flip() {
        let pair = canonicalize(addr(0x02), addr(0x01));
        assert_eq!(pair.order("a", "b"), ("b", "a"));

        let pair = canonicalize(addr(0x01), addr(0x02));
        assert_eq!(pair.order("a", "b"), ("a", "b"));
    }

    #[test]
    fn test_matches_lowercase_string_order() {
        let a: Address = "0x00000000000000000000000000000000000000Ff".parse().unwrap();
        let b: Address = "0x0000000000000000000000000000000000000100".parse().unwrap();
        let pair = canonicalize(b, a);
        assert!(format!("{:x}", pair.token0) < format!("{:x}", pair.token1));
        assert_eq!(pair.token0, a);
    }

    proptest! {
        #[test]
        fn prop_canonicalize_is_symmetric(a in any::<[u8; 20]>(), b in any::<[u8; 20]>()) {
            prop_assume!(a != b);
            let (a, b) = (Address::from(a), Address::from(b));
            let ab = canonicalize(a, b);
            let ba = canonicalize(b, a);
            prop_assert_eq!(ab.token0, ba.token0);
            prop_assert_eq!(ab.token1, ba.token1);
            prop_assert!(ab.token0 < ab.token1);
            prop_assert_eq!(canonicalize(a, b), ab);
        }
    }
}
