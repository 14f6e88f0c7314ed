use std::sync::Arc;

use alloy_primitives::U256;
use alloy_sol_types::SolCall;
use sx_types::{
    ActionPayload, ChainAddress, Envelope, ProposeAction, SignatureData, UpdateProposalAction,
    VoteAction,
};
use tracing::info;

use super::{action_body, expect_authenticator, Committed};
use crate::abi::ICommit;
use crate::calldata::{commitment, transaction_calldata};
use crate::errors::{Result, SxError};
use crate::network::{AuthenticatorKind, NetworkConfig};
use crate::provider::EvmTransaction;
use crate::signer::EthWallet;
use crate::strategies::StrategyRegistry;

/// Commit-then-confirm from an ethereum account.
///
/// The commitment goes through the L1 commit contract and only reaches the authenticator once
/// the messaging layer delivers it; the second step fails until then.
pub struct EthTxAuthenticator {
    network: Arc<NetworkConfig>,
    strategies: StrategyRegistry,
}

impl EthTxAuthenticator {
    pub fn new(network: Arc<NetworkConfig>) -> Self {
        EthTxAuthenticator { network, strategies: StrategyRegistry::default() }
    }

    pub fn with_strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = strategies;
        self
    }

    pub async fn initialize_propose(&self, wallet: &EthWallet, action: ProposeAction) -> Result<Committed> {
        self.commit(wallet, ActionPayload::Propose(action)).await
    }

    pub async fn initialize_vote(&self, wallet: &EthWallet, action: VoteAction) -> Result<Committed> {
        self.commit(wallet, ActionPayload::Vote(action)).await
    }

    pub async fn initialize_update_proposal(
        &self,
        wallet: &EthWallet,
        action: UpdateProposalAction,
    ) -> Result<Committed> {
        self.commit(wallet, ActionPayload::UpdateProposal(action)).await
    }

    pub async fn commit(&self, wallet: &EthWallet, action: ActionPayload) -> Result<Committed> {
        let authenticator = expect_authenticator(&self.network, &action, AuthenticatorKind::EthTx)?;
        let chain_id = wallet.chain_id().await?;
        if chain_id != self.network.l1.chain_id {
            return Err(SxError::Configuration(format!(
                "wallet is connected to chain {chain_id}, commits go to chain {}",
                self.network.l1.chain_id
            )));
        }

        let author = ChainAddress::Ethereum(wallet.address());
        let body = action_body(&self.network, &self.strategies, author, &action).await?;
        let calldata = transaction_calldata(action.space(), author, &body);
        let commitment = commitment(body.authenticator_entrypoint(), &calldata);

        let call = ICommit::commitCall {
            authenticator: authenticator.word(),
            space: action.space().word(),
            proposalKey: body.proposal_key(),
            commitment,
        };
        let tx = EvmTransaction { to: self.network.l1.commit, data: call.abi_encode().into(), value: U256::ZERO };
        let receipt = wallet.provider()?.send_transaction(wallet, tx).await?;
        info!(
            space = %action.space(),
            %author,
            action = %action.kind(),
            tx = %receipt.transaction_hash,
            "committed action on L1"
        );

        Ok(Committed {
            receipt,
            envelope: Envelope::new(SignatureData::address_only(author), action),
        })
    }
}
