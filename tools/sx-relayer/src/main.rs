use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sx_client::devnet::Devnet;
use sx_client::{transport, EvmProvider};
use sx_relayer::config::{Cli, LogFormat};
use sx_relayer::rpc::{run_json_rpc_server, RpcState};
use sx_relayer::{RelayService, SignerDerivation, SponsorClient};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let master = cli.master_secret()?;
    let (devnet, deployment) = Devnet::bootstrap();
    let network = deployment.network.clone();
    let l1: Arc<dyn EvmProvider> = match cli.l1_rpc_url.as_deref() {
        Some(url) => {
            warn!(l1 = %url, "governance chain is an in-process devnet; its state is lost on restart");
            transport::evm_provider(network.l1.chain_id, url).with_context(|| format!("connecting to L1 at {url}"))?
        }
        None => Arc::new(devnet.clone()),
    };

    let chain_id = network.chain_id;
    let mut service = RelayService::new(SignerDerivation::new(master, cli.signer_cache)).with_network(
        network,
        devnet.native_provider(),
        l1,
    );
    match cli.sponsor_url.as_deref() {
        Some(url) => service = service.with_sponsor(SponsorClient::new(url, cli.max_fee_per_gas.clone())),
        None => warn!("no sponsorship service configured, finalizeProposal is disabled"),
    }

    let listener = TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("binding {}", cli.listen))?;
    info!(listen = %cli.listen, chain_id, space = %deployment.space, "sx-relayer starting");
    run_json_rpc_server(listener, Arc::new(RpcState::new(service)), cli.body_limit, shutdown_signal())
        .await
        .context("json-rpc server terminated")?;
    info!("sx-relayer stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
