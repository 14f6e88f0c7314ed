//! Dispatch client.
//!
//! Purpose:
//! - resolve an envelope to the one on-chain entry point that accepts it;
//! - build that call and submit it as a single transaction.
//!
//! Resolution is an exhaustive match over (action, authenticator kind). An unmapped pair is an
//! error, never a fallback.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use sx_types::{
    ActionKind, ActionPayload, CancelAction, ChainAddress, Envelope, NativeAddress, SettingAction,
    SpaceSetting,
};
use tracing::info;

use crate::abi::IL1TimelockExecutionStrategy;
use crate::authenticators::{action_body, vanilla_envelope, NativeSigAuthenticator, SaltSource};
use crate::calldata::{
    signature_calldata, transaction_calldata, vanilla_calldata, CalldataBuilder, NativeCall,
};
use crate::errors::{Result, SxError};
use crate::network::{AuthenticatorKind, NetworkConfig};
use crate::provider::{EvmTransaction, NativeProvider, Receipt};
use crate::signer::{EthWallet, NativeAccount};
use crate::strategies::StrategyRegistry;

/// Contract that receives a dispatched call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Authenticator(AuthenticatorKind),
    Space,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntryPoint {
    pub target: Target,
    pub entrypoint: &'static str,
}

impl EntryPoint {
    const fn authenticator(kind: AuthenticatorKind, entrypoint: &'static str) -> Self {
        EntryPoint { target: Target::Authenticator(kind), entrypoint }
    }

    const fn space(entrypoint: &'static str) -> Self {
        EntryPoint { target: Target::Space, entrypoint }
    }
}

fn setting_entrypoint(setting: &SpaceSetting) -> &'static str {
    match setting {
        SpaceSetting::MinVotingDuration(_) => "set_min_voting_duration",
        SpaceSetting::MaxVotingDuration(_) => "set_max_voting_duration",
        SpaceSetting::VotingDelay(_) => "set_voting_delay",
        SpaceSetting::MetadataUri(_) => "set_metadata_uri",
        SpaceSetting::Owner(_) => "transfer_ownership",
    }
}

/// Entry point for `payload` sent through an authenticator of kind `authenticator`
/// (`None` for calls made directly on the space).
pub fn resolve(payload: &ActionPayload, authenticator: Option<AuthenticatorKind>) -> Result<EntryPoint> {
    use ActionPayload::*;
    use AuthenticatorKind::*;

    match (payload, authenticator) {
        (Propose(_) | Vote(_) | UpdateProposal(_), Some(Vanilla)) => {
            Ok(EntryPoint::authenticator(Vanilla, "authenticate"))
        }
        (Propose(_), Some(kind @ (EthSig | EthTx | NativeSig | NativeTx))) => {
            Ok(EntryPoint::authenticator(kind, "authenticate_propose"))
        }
        (Vote(_), Some(kind @ (EthSig | EthTx | NativeSig | NativeTx))) => {
            Ok(EntryPoint::authenticator(kind, "authenticate_vote"))
        }
        (UpdateProposal(_), Some(kind @ (EthSig | EthTx | NativeSig | NativeTx))) => {
            Ok(EntryPoint::authenticator(kind, "authenticate_update_proposal"))
        }
        (Cancel(_), None) => Ok(EntryPoint::space("cancel_proposal")),
        (AdminSetting(action), None) => Ok(EntryPoint::space(setting_entrypoint(&action.setting))),
        (Propose(_) | Vote(_) | UpdateProposal(_), None)
        | (Cancel(_) | AdminSetting(_), Some(_)) => Err(SxError::UnsupportedAuthenticator {
            action: payload.kind(),
            authenticator: authenticator.map_or_else(|| "none".to_string(), |k| k.to_string()),
        }),
    }
}

/// Either an envelope ready to dispatch or a raw action for the client to authenticate.
#[derive(Clone, Debug)]
pub enum Submission {
    Envelope(Envelope),
    Action(ActionPayload),
}

impl Submission {
    fn kind(&self) -> ActionKind {
        match self {
            Submission::Envelope(envelope) => envelope.data.kind(),
            Submission::Action(action) => action.kind(),
        }
    }
}

impl From<Envelope> for Submission {
    fn from(envelope: Envelope) -> Self {
        Submission::Envelope(envelope)
    }
}

impl From<ActionPayload> for Submission {
    fn from(action: ActionPayload) -> Self {
        Submission::Action(action)
    }
}

/// Uniform action surface of one network's spaces.
#[derive(Clone)]
pub struct SpaceClient {
    network: Arc<NetworkConfig>,
    provider: Arc<dyn NativeProvider>,
    strategies: StrategyRegistry,
    salt: SaltSource,
}

impl SpaceClient {
    pub fn new(network: Arc<NetworkConfig>, provider: Arc<dyn NativeProvider>) -> Self {
        SpaceClient {
            network,
            provider,
            strategies: StrategyRegistry::default(),
            salt: SaltSource::Random,
        }
    }

    pub fn with_strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_salt(mut self, salt: SaltSource) -> Self {
        self.salt = salt;
        self
    }

    pub fn network(&self) -> &Arc<NetworkConfig> {
        &self.network
    }

    pub fn provider(&self) -> &Arc<dyn NativeProvider> {
        &self.provider
    }

    pub fn entry_point(&self, envelope: &Envelope) -> Result<EntryPoint> {
        let kind = match envelope.data.authenticator() {
            Some(authenticator) => Some(self.network.authenticator_kind(authenticator)?),
            None => None,
        };
        resolve(&envelope.data, kind)
    }

    /// Build the call that dispatches `envelope`.
    pub async fn build_call(&self, envelope: &Envelope) -> Result<NativeCall> {
        let entry = self.entry_point(envelope)?;
        let space = envelope.data.space();
        let kind = match entry.target {
            Target::Space => return Ok(owner_call(&envelope.data, entry.entrypoint)),
            Target::Authenticator(kind) => kind,
        };
        let authenticator = envelope.data.authenticator().ok_or_else(|| {
            SxError::Configuration(format!("{} has no authenticator", envelope.data.kind()))
        })?;
        let author = envelope
            .signer()
            .ok_or_else(|| SxError::Configuration("envelope carries no signer".to_string()))?;
        let body = action_body(&self.network, &self.strategies, author, &envelope.data).await?;

        let calldata = match kind {
            AuthenticatorKind::Vanilla => vanilla_calldata(space, author, &body),
            AuthenticatorKind::EthSig | AuthenticatorKind::NativeSig => {
                expect_address_space(kind, author)?;
                let signed = envelope
                    .signature_data
                    .as_ref()
                    .and_then(|sig| sig.signed.as_ref())
                    .ok_or_else(|| SxError::Configuration(format!("{kind} envelope is not signed")))?;
                signature_calldata(&signed.signature, space, author, &body, signed.salt)
            }
            AuthenticatorKind::EthTx | AuthenticatorKind::NativeTx => {
                expect_address_space(kind, author)?;
                transaction_calldata(space, author, &body)
            }
        };
        Ok(NativeCall::new(authenticator, entry.entrypoint, calldata))
    }

    /// Dispatch an envelope. Submits exactly one transaction.
    pub async fn send(&self, account: &dyn NativeAccount, envelope: &Envelope) -> Result<Receipt> {
        let call = self.build_call(envelope).await?;
        let entrypoint = call.entrypoint.clone();
        let target = call.contract_address;
        let receipt = self.provider.invoke(account, call).await?;
        info!(
            space = %envelope.data.space(),
            action = %envelope.data.kind(),
            %target,
            entrypoint,
            tx = %receipt.transaction_hash,
            "dispatched envelope"
        );
        Ok(receipt)
    }

    /// Authenticate a raw action for `account`, then dispatch it.
    ///
    /// Ethereum-authenticated actions must be signed or committed with an ethereum wallet
    /// first; transaction-commit envelopes assume the commitment already exists.
    pub async fn send_action(&self, account: &dyn NativeAccount, action: ActionPayload) -> Result<Receipt> {
        let envelope = self.authenticate(account, action).await?;
        self.send(account, &envelope).await
    }

    async fn authenticate(&self, account: &dyn NativeAccount, action: ActionPayload) -> Result<Envelope> {
        let kind = match action.authenticator() {
            Some(authenticator) => Some(self.network.authenticator_kind(authenticator)?),
            None => None,
        };
        let author = ChainAddress::Native(account.address());
        match kind {
            None => Ok(Envelope::unattributed(action)),
            Some(AuthenticatorKind::Vanilla | AuthenticatorKind::NativeTx) => {
                Ok(vanilla_envelope(author, action))
            }
            Some(AuthenticatorKind::NativeSig) => {
                NativeSigAuthenticator::new(self.network.clone())
                    .with_strategies(self.strategies.clone())
                    .with_salt(self.salt)
                    .sign(account, action)
                    .await
            }
            Some(kind @ (AuthenticatorKind::EthSig | AuthenticatorKind::EthTx)) => {
                Err(SxError::Configuration(format!(
                    "{kind} actions must be authenticated with an ethereum wallet before dispatch"
                )))
            }
        }
    }

    async fn submit(
        &self,
        account: &dyn NativeAccount,
        expected: ActionKind,
        input: Submission,
    ) -> Result<Receipt> {
        if input.kind() != expected {
            return Err(SxError::Configuration(format!(
                "expected a {expected} action, got {}",
                input.kind()
            )));
        }
        match input {
            Submission::Envelope(envelope) => self.send(account, &envelope).await,
            Submission::Action(action) => self.send_action(account, action).await,
        }
    }

    pub async fn propose(&self, account: &dyn NativeAccount, input: impl Into<Submission>) -> Result<Receipt> {
        self.submit(account, ActionKind::Propose, input.into()).await
    }

    pub async fn update_proposal(
        &self,
        account: &dyn NativeAccount,
        input: impl Into<Submission>,
    ) -> Result<Receipt> {
        self.submit(account, ActionKind::UpdateProposal, input.into()).await
    }

    pub async fn vote(&self, account: &dyn NativeAccount, input: impl Into<Submission>) -> Result<Receipt> {
        self.submit(account, ActionKind::Vote, input.into()).await
    }

    pub async fn cancel_proposal(
        &self,
        account: &dyn NativeAccount,
        space: NativeAddress,
        proposal: u64,
    ) -> Result<Receipt> {
        let action = ActionPayload::Cancel(CancelAction { space, proposal });
        self.send(account, &Envelope::unattributed(action)).await
    }

    async fn update_setting(
        &self,
        account: &dyn NativeAccount,
        space: NativeAddress,
        setting: SpaceSetting,
    ) -> Result<Receipt> {
        let action = ActionPayload::AdminSetting(SettingAction { space, setting });
        self.send(account, &Envelope::unattributed(action)).await
    }

    pub async fn set_min_voting_duration(
        &self,
        account: &dyn NativeAccount,
        space: NativeAddress,
        duration: u64,
    ) -> Result<Receipt> {
        self.update_setting(account, space, SpaceSetting::MinVotingDuration(duration)).await
    }

    pub async fn set_max_voting_duration(
        &self,
        account: &dyn NativeAccount,
        space: NativeAddress,
        duration: u64,
    ) -> Result<Receipt> {
        self.update_setting(account, space, SpaceSetting::MaxVotingDuration(duration)).await
    }

    pub async fn set_voting_delay(
        &self,
        account: &dyn NativeAccount,
        space: NativeAddress,
        delay: u64,
    ) -> Result<Receipt> {
        self.update_setting(account, space, SpaceSetting::VotingDelay(delay)).await
    }

    pub async fn set_metadata_uri(
        &self,
        account: &dyn NativeAccount,
        space: NativeAddress,
        metadata_uri: &str,
    ) -> Result<Receipt> {
        self.update_setting(account, space, SpaceSetting::MetadataUri(metadata_uri.to_string()))
            .await
    }

    pub async fn transfer_ownership(
        &self,
        account: &dyn NativeAccount,
        space: NativeAddress,
        owner: NativeAddress,
    ) -> Result<Receipt> {
        self.update_setting(account, space, SpaceSetting::Owner(owner)).await
    }

    /// Finalize a proposal: tally it and hand the payload to its execution strategy.
    pub async fn execute(
        &self,
        account: &dyn NativeAccount,
        space: NativeAddress,
        proposal: u64,
        execution_params: &[Bytes],
    ) -> Result<Receipt> {
        let calldata = CalldataBuilder::new()
            .push_u64(proposal)
            .push_bytes_array(execution_params)
            .finish();
        let receipt = self
            .provider
            .invoke(account, NativeCall::new(space, "execute", calldata))
            .await?;
        info!(%space, proposal, tx = %receipt.transaction_hash, "executed proposal");
        Ok(receipt)
    }

    /// Execute a proposal queued on an L1 timelock once its delay has passed.
    ///
    /// `execution_params` are the timelock strategy params the proposal was created with.
    pub async fn execute_queued_proposal(
        &self,
        wallet: &EthWallet,
        timelock: Address,
        execution_params: &[Bytes],
    ) -> Result<Receipt> {
        let [payload] = execution_params else {
            return Err(SxError::Configuration(format!(
                "timelock execution expects one payload, got {}",
                execution_params.len()
            )));
        };
        let call = IL1TimelockExecutionStrategy::executeQueuedProposalCall { payload: payload.clone() };
        let tx = EvmTransaction { to: timelock, data: call.abi_encode().into(), value: U256::ZERO };
        let receipt = wallet.provider()?.send_transaction(wallet, tx).await?;
        info!(%timelock, tx = %receipt.transaction_hash, "executed queued proposal");
        Ok(receipt)
    }
}

fn expect_address_space(kind: AuthenticatorKind, author: ChainAddress) -> Result<()> {
    let ethereum = matches!(kind, AuthenticatorKind::EthSig | AuthenticatorKind::EthTx);
    if ethereum == author.is_ethereum() {
        return Ok(());
    }
    Err(SxError::UnsupportedAddressSpace(format!("{author} cannot authenticate through {kind}")))
}

fn owner_call(payload: &ActionPayload, entrypoint: &'static str) -> NativeCall {
    let mut b = CalldataBuilder::new();
    match payload {
        ActionPayload::Cancel(action) => {
            b.push_u64(action.proposal);
        }
        ActionPayload::AdminSetting(action) => match &action.setting {
            SpaceSetting::MinVotingDuration(v)
            | SpaceSetting::MaxVotingDuration(v)
            | SpaceSetting::VotingDelay(v) => {
                b.push_u64(*v);
            }
            SpaceSetting::MetadataUri(uri) => {
                b.push_string(uri);
            }
            SpaceSetting::Owner(owner) => {
                b.push_address(*owner);
            }
        },
        ActionPayload::Propose(_) | ActionPayload::Vote(_) | ActionPayload::UpdateProposal(_) => {}
    }
    NativeCall::new(payload.space(), entrypoint, b.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sx_types::{
        Choice, ExecutionStrategyInput, ProposeAction, UpdateProposalAction, VoteAction,
    };

    fn payloads() -> Vec<ActionPayload> {
        let space = NativeAddress::from_u64(1);
        let authenticator = NativeAddress::from_u64(2);
        let strategy = ExecutionStrategyInput { addr: NativeAddress::from_u64(3), params: vec![] };
        vec![
            ActionPayload::Propose(ProposeAction {
                space,
                authenticator,
                strategies: vec![],
                execution_strategy: strategy.clone(),
                metadata_uri: String::new(),
            }),
            ActionPayload::UpdateProposal(UpdateProposalAction {
                space,
                authenticator,
                proposal: 1,
                execution_strategy: strategy,
                metadata_uri: String::new(),
            }),
            ActionPayload::Vote(VoteAction {
                space,
                authenticator,
                strategies: vec![],
                proposal: 1,
                choice: Choice::For,
                metadata_uri: String::new(),
            }),
            ActionPayload::Cancel(CancelAction { space, proposal: 1 }),
            ActionPayload::AdminSetting(SettingAction {
                space,
                setting: SpaceSetting::VotingDelay(10),
            }),
        ]
    }

    fn kinds() -> Vec<Option<AuthenticatorKind>> {
        std::iter::once(None)
            .chain(AuthenticatorKind::ALL.into_iter().map(Some))
            .collect()
    }

    #[test]
    fn test_resolution_is_total_and_deterministic() {
        let mut mapped = 0;
        for payload in payloads() {
            for kind in kinds() {
                let first = resolve(&payload, kind);
                let second = resolve(&payload, kind);
                match (first, second) {
                    (Ok(a), Ok(b)) => {
                        assert_eq!(a, b);
                        mapped += 1;
                    }
                    (Err(SxError::UnsupportedAuthenticator { action, .. }), Err(_)) => {
                        assert_eq!(action, payload.kind());
                    }
                    other => panic!("unexpected resolution {other:?}"),
                }
            }
        }
        // three authenticated actions through five kinds, plus two direct owner calls
        assert_eq!(mapped, 3 * 5 + 2);
    }

    #[test]
    fn test_authenticated_entry_points() {
        let p = payloads();
        assert_eq!(
            resolve(&p[0], Some(AuthenticatorKind::EthSig)).unwrap(),
            EntryPoint::authenticator(AuthenticatorKind::EthSig, "authenticate_propose")
        );
        assert_eq!(
            resolve(&p[2], Some(AuthenticatorKind::EthTx)).unwrap().entrypoint,
            "authenticate_vote"
        );
        assert_eq!(
            resolve(&p[1], Some(AuthenticatorKind::NativeSig)).unwrap().entrypoint,
            "authenticate_update_proposal"
        );
        assert_eq!(resolve(&p[2], Some(AuthenticatorKind::Vanilla)).unwrap().entrypoint, "authenticate");
    }

    #[test]
    fn test_owner_entry_points() {
        let space = NativeAddress::from_u64(1);
        let cases = [
            (SpaceSetting::MinVotingDuration(1), "set_min_voting_duration"),
            (SpaceSetting::MaxVotingDuration(1), "set_max_voting_duration"),
            (SpaceSetting::VotingDelay(1), "set_voting_delay"),
            (SpaceSetting::MetadataUri("ipfs://x".into()), "set_metadata_uri"),
            (SpaceSetting::Owner(NativeAddress::from_u64(9)), "transfer_ownership"),
        ];
        for (setting, expected) in cases {
            let payload = ActionPayload::AdminSetting(SettingAction { space, setting });
            let entry = resolve(&payload, None).unwrap();
            assert_eq!(entry, EntryPoint::space(expected));
            assert!(resolve(&payload, Some(AuthenticatorKind::Vanilla)).is_err());
        }
    }

    #[test]
    fn test_owner_calldata() {
        let payload = ActionPayload::AdminSetting(SettingAction {
            space: NativeAddress::from_u64(1),
            setting: SpaceSetting::Owner(NativeAddress::from_u64(9)),
        });
        let call = owner_call(&payload, "transfer_ownership");
        assert_eq!(call.contract_address, NativeAddress::from_u64(1));
        assert_eq!(call.calldata, vec![U256::from(9u8)]);
    }

    #[test]
    fn test_address_space_checked_per_kind() {
        let eth = ChainAddress::Ethereum(Address::repeat_byte(1));
        let native = ChainAddress::Native(NativeAddress::from_u64(1));
        assert!(expect_address_space(AuthenticatorKind::EthSig, eth).is_ok());
        assert!(expect_address_space(AuthenticatorKind::NativeTx, native).is_ok());
        assert!(matches!(
            expect_address_space(AuthenticatorKind::EthTx, native),
            Err(SxError::UnsupportedAddressSpace(_))
        ));
    }
}
