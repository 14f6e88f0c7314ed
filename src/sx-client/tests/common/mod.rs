#![allow(dead_code)]

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use sx_client::authenticators::SaltSource;
use sx_client::devnet::{Deployment, Devnet};
use sx_client::{NetworkConfig, SpaceClient};
use sx_types::{
    Choice, ExecutionStrategyInput, MetaTransaction, NativeAddress, Operation, ProposeAction,
    StrategyConfig, VoteAction,
};

pub struct Fixture {
    pub devnet: Devnet,
    pub deployment: Deployment,
    pub network: Arc<NetworkConfig>,
    pub client: SpaceClient,
}

pub fn setup() -> Fixture {
    let (devnet, deployment) = Devnet::bootstrap();
    let network = Arc::new(deployment.network.clone());
    let client = SpaceClient::new(network.clone(), devnet.native_provider())
        .with_salt(SaltSource::Pinned(U256::from(0x5a17_u64)));
    Fixture { devnet, deployment, network, client }
}

pub fn strategy(index: u8, address: NativeAddress) -> StrategyConfig {
    StrategyConfig { index, address, params: Bytes::new(), metadata: None }
}

pub fn vanilla_execution(d: &Deployment) -> ExecutionStrategyInput {
    ExecutionStrategyInput { addr: d.vanilla_execution, params: vec![Bytes::from_static(&[0])] }
}

pub fn propose(
    d: &Deployment,
    authenticator: NativeAddress,
    execution_strategy: ExecutionStrategyInput,
    metadata_uri: &str,
) -> ProposeAction {
    ProposeAction {
        space: d.space,
        authenticator,
        strategies: vec![strategy(0, d.vanilla_strategy)],
        execution_strategy,
        metadata_uri: metadata_uri.to_string(),
    }
}

pub fn vote(d: &Deployment, authenticator: NativeAddress, proposal: u64, choice: Choice) -> VoteAction {
    VoteAction {
        space: d.space,
        authenticator,
        strategies: vec![strategy(0, d.vanilla_strategy)],
        proposal,
        choice,
        metadata_uri: String::new(),
    }
}

pub fn transactions(salt: u64) -> Vec<MetaTransaction> {
    vec![
        MetaTransaction {
            to: Address::repeat_byte(0x42),
            value: U256::from(1_000u64),
            data: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
            operation: Operation::Call,
            salt: U256::from(salt),
        },
        MetaTransaction {
            to: Address::repeat_byte(0x43),
            value: U256::ZERO,
            data: Bytes::new(),
            operation: Operation::DelegateCall,
            salt: U256::from(salt),
        },
    ]
}
