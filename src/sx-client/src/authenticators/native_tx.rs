use std::sync::Arc;

use sx_types::{
    ActionPayload, ChainAddress, Envelope, ProposeAction, SignatureData, UpdateProposalAction,
    VoteAction,
};
use tracing::info;

use super::{action_body, expect_authenticator, Committed};
use crate::calldata::{commitment, transaction_calldata, NativeCall};
use crate::errors::Result;
use crate::network::{AuthenticatorKind, NetworkConfig};
use crate::provider::NativeProvider;
use crate::signer::NativeAccount;
use crate::strategies::StrategyRegistry;

/// Commit-then-confirm from a governance chain account.
pub struct NativeTxAuthenticator {
    network: Arc<NetworkConfig>,
    provider: Arc<dyn NativeProvider>,
    strategies: StrategyRegistry,
}

impl NativeTxAuthenticator {
    pub fn new(network: Arc<NetworkConfig>, provider: Arc<dyn NativeProvider>) -> Self {
        NativeTxAuthenticator { network, provider, strategies: StrategyRegistry::default() }
    }

    pub fn with_strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = strategies;
        self
    }

    pub async fn initialize_propose(
        &self,
        account: &dyn NativeAccount,
        action: ProposeAction,
    ) -> Result<Committed> {
        self.commit(account, ActionPayload::Propose(action)).await
    }

    pub async fn initialize_vote(&self, account: &dyn NativeAccount, action: VoteAction) -> Result<Committed> {
        self.commit(account, ActionPayload::Vote(action)).await
    }

    pub async fn initialize_update_proposal(
        &self,
        account: &dyn NativeAccount,
        action: UpdateProposalAction,
    ) -> Result<Committed> {
        self.commit(account, ActionPayload::UpdateProposal(action)).await
    }

    /// Send the commitment for `action` from `account`; returns the envelope for the second step.
    pub async fn commit(&self, account: &dyn NativeAccount, action: ActionPayload) -> Result<Committed> {
        let authenticator = expect_authenticator(&self.network, &action, AuthenticatorKind::NativeTx)?;
        let author = ChainAddress::Native(account.address());
        let body = action_body(&self.network, &self.strategies, author, &action).await?;
        let calldata = transaction_calldata(action.space(), author, &body);
        let commitment = commitment(body.authenticator_entrypoint(), &calldata);

        let call = NativeCall::new(
            authenticator,
            "commit",
            vec![action.space().word(), body.proposal_key(), commitment],
        );
        let receipt = self.provider.invoke(account, call).await?;
        info!(
            space = %action.space(),
            %author,
            action = %action.kind(),
            tx = %receipt.transaction_hash,
            "committed action"
        );

        Ok(Committed {
            receipt,
            envelope: Envelope::new(SignatureData::address_only(author), action),
        })
    }
}
