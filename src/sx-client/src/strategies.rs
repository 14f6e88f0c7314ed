//! Voting strategy parameter hooks.
//!
//! Voting power itself is computed on-chain; off-chain each strategy only supplies the
//! user parameters (proofs, hints) its contract expects next to a propose or vote.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::U256;
use async_trait::async_trait;
use sx_types::{ChainAddress, StrategyConfig};

use crate::calldata::IndexedParams;
use crate::errors::{Result, SxError};
use crate::network::{NetworkConfig, VotingStrategyKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyCall {
    Propose,
    Vote,
}

#[async_trait]
pub trait VotingStrategy: Send + Sync {
    async fn get_params(
        &self,
        call: StrategyCall,
        voter: ChainAddress,
        strategy: &StrategyConfig,
    ) -> Result<Vec<U256>>;
}

/// Every account has a voting power of one.
pub struct VanillaStrategy;

#[async_trait]
impl VotingStrategy for VanillaStrategy {
    async fn get_params(&self, _: StrategyCall, _: ChainAddress, _: &StrategyConfig) -> Result<Vec<U256>> {
        Ok(Vec::new())
    }
}

/// Delegated token balance read from the governance chain's votes token.
pub struct Erc20VotesStrategy;

#[async_trait]
impl VotingStrategy for Erc20VotesStrategy {
    async fn get_params(
        &self,
        _: StrategyCall,
        voter: ChainAddress,
        _: &StrategyConfig,
    ) -> Result<Vec<U256>> {
        if voter.is_ethereum() {
            return Err(SxError::UnsupportedAddressSpace(
                "Not supported for Ethereum addresses".to_string(),
            ));
        }
        Ok(Vec::new())
    }
}

/// Strategy hooks by kind, overridable per kind.
#[derive(Clone)]
pub struct StrategyRegistry {
    hooks: HashMap<VotingStrategyKind, Arc<dyn VotingStrategy>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut hooks: HashMap<VotingStrategyKind, Arc<dyn VotingStrategy>> = HashMap::new();
        hooks.insert(VotingStrategyKind::Vanilla, Arc::new(VanillaStrategy));
        hooks.insert(VotingStrategyKind::Erc20Votes, Arc::new(Erc20VotesStrategy));
        StrategyRegistry { hooks }
    }
}

impl StrategyRegistry {
    pub fn with_hook(mut self, kind: VotingStrategyKind, hook: Arc<dyn VotingStrategy>) -> Self {
        self.hooks.insert(kind, hook);
        self
    }

    /// Collect the user parameters of every strategy, in the order given.
    pub async fn indexed_params(
        &self,
        network: &NetworkConfig,
        call: StrategyCall,
        voter: ChainAddress,
        strategies: &[StrategyConfig],
    ) -> Result<Vec<IndexedParams>> {
        let mut out = Vec::with_capacity(strategies.len());
        for strategy in strategies {
            let kind = network.voting_strategy_kind(strategy.address)?;
            let hook = self.hooks.get(&kind).ok_or_else(|| {
                SxError::Configuration(format!("no parameter hook for {kind:?}"))
            })?;
            let params = hook.get_params(call, voter, strategy).await?;
            out.push(IndexedParams { index: strategy.index, params });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes};
    use sx_types::NativeAddress;

    fn config() -> StrategyConfig {
        StrategyConfig {
            index: 0,
            address: NativeAddress::from_u64(0x51),
            params: Bytes::new(),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_erc20_votes_rejects_ethereum_voters() {
        let eth = ChainAddress::Ethereum(Address::repeat_byte(1));
        let err = Erc20VotesStrategy
            .get_params(StrategyCall::Vote, eth, &config())
            .await
            .unwrap_err();
        assert!(matches!(err, SxError::UnsupportedAddressSpace(ref msg) if msg == "Not supported for Ethereum addresses"));

        let native = ChainAddress::Native(NativeAddress::from_u64(1));
        assert!(Erc20VotesStrategy
            .get_params(StrategyCall::Vote, native, &config())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_vanilla_has_no_params() {
        let eth = ChainAddress::Ethereum(Address::repeat_byte(1));
        assert!(VanillaStrategy
            .get_params(StrategyCall::Propose, eth, &config())
            .await
            .unwrap()
            .is_empty());
    }
}
