//! Per-address cache of token decimals and symbols

use std::collections::HashMap;

use alloy_primitives::Address;
use launchpad_types::TokenMetadata;
use tracing::debug;

use crate::error::OrchestratorResult;
use crate::provider::ChainReader;

#[derive(Debug, Default)]
pub struct TokenMetadataCache {
    entries: HashMap<Address, TokenMetadata>,
}

impl TokenMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached metadata, fetching decimals and symbol concurrently on a miss
    pub async fn resolve<R: ChainReader + ?Sized>(
        &mut self,
        reader: &R,
        token: Address,
    ) -> OrchestratorResult<TokenMetadata> {
        if let Some(cached) = self.entries.get(&token) {
            return Ok(cached.clone());
        }

        let (decimals, symbol) = tokio::try_join!(reader.decimals(token), reader.symbol(token))?;
        debug!(token = %token, decimals, symbol = %symbol, "Loaded token metadata");

        let metadata = TokenMetadata { address: token, decimals, symbol };
        self.entries.insert(token, metadata.clone());
        Ok(metadata)
    }

    /// Drop the entry for an address the user moved away from
    pub fn invalidate(&mut self, token: &Address) -> bool {
        self.entries.remove(token).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryChain;

    #[tokio::test]
    async fn test_resolve_caches_until_invalidated() {
        let token = Address::repeat_byte(0xAA);
        let chain = InMemoryChain::new(Address::repeat_byte(0x01)).with_token(token, 6, "USDC");
        let mut cache = TokenMetadataCache::new();

        let first = cache.resolve(&chain, token).await.unwrap();
        assert_eq!(first.decimals, 6);
        assert_eq!(first.symbol, "USDC");
        assert_eq!(chain.metadata_reads(), 2);

        cache.resolve(&chain, token).await.unwrap();
        assert_eq!(chain.metadata_reads(), 2);

        assert!(cache.invalidate(&token));
        cache.resolve(&chain, token).await.unwrap();
        assert_eq!(chain.metadata_reads(), 4);
    }

    #[tokio::test]
    async fn test_failed_read_is_not_cached() {
        let token = Address::repeat_byte(0xAA);
        let chain = InMemoryChain::new(Address::repeat_byte(0x01))
            .with_token(token, 18, "TKA")
            .fail_metadata_for(token);
        let mut cache = TokenMetadataCache::new();

        assert!(cache.resolve(&chain, token).await.is_err());
        assert!(!cache.invalidate(&token));
    }
}
