use std::net::SocketAddr;

use clap::{Parser, ValueEnum};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Relay governance envelopes and executions with per-space derived signers.
///
/// Every flag can also be set from the environment (or a `.env` file).
///
/// The governance chain is an in-process devnet bootstrapped fresh on every start, with a new
/// random owner. Nothing submitted to it survives a restart, even when `--l1-rpc-url` points L1
/// executions at a real chain.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Address the JSON-RPC server listens on.
    #[arg(long, env = "SX_RELAYER_LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// Master secret (hex, 0x...) every per-space signer is derived from.
    #[arg(long, env = "SX_RELAYER_MASTER_SECRET", hide_env_values = true)]
    pub master_secret: String,

    /// Sponsorship service called by `finalizeProposal`. Finalization is refused without it.
    #[arg(long, env = "SX_RELAYER_SPONSOR_URL")]
    pub sponsor_url: Option<String>,

    /// L1 JSON-RPC endpoint for L1 submissions only; the governance devnet is still reset on every start. Without it, L1 submissions go to the in-process devnet.
    #[arg(long, env = "SX_RELAYER_L1_RPC_URL")]
    pub l1_rpc_url: Option<String>,

    /// Maximum number of derived signers kept in memory.
    #[arg(long, env = "SX_RELAYER_SIGNER_CACHE", default_value_t = 1024)]
    pub signer_cache: usize,

    /// Maximum request body size in bytes.
    #[arg(long, env = "SX_RELAYER_BODY_LIMIT", default_value_t = 1024 * 1024)]
    pub body_limit: usize,

    /// Max fee per gas (wei) sent to the sponsorship service.
    #[arg(long, env = "SX_RELAYER_MAX_FEE_PER_GAS", default_value = "50000000000")]
    pub max_fee_per_gas: String,

    #[arg(long, env = "SX_RELAYER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Decoded master secret; at least 32 bytes.
    pub fn master_secret(&self) -> anyhow::Result<Vec<u8>> {
        let raw = self.master_secret.trim_start_matches("0x");
        let secret = hex::decode(raw).map_err(|e| anyhow::anyhow!("master secret is not hex: {e}"))?;
        if secret.len() < 32 {
            anyhow::bail!("master secret must be at least 32 bytes, got {}", secret.len());
        }
        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["sx-relayer", "--master-secret", &"11".repeat(32)]);
        assert_eq!(cli.listen, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(cli.signer_cache, 1024);
        assert_eq!(cli.log_format, LogFormat::Text);
        assert_eq!(cli.master_secret().unwrap(), vec![0x11; 32]);
    }

    #[test]
    fn test_l1_endpoint_documents_devnet_reset() {
        let cli = Cli::parse_from(["sx-relayer", "--master-secret", &"11".repeat(32)]);
        assert_eq!(cli.l1_rpc_url, None);

        let command = Cli::command();
        let help = command
            .get_arguments()
            .find(|arg| arg.get_id() == "l1_rpc_url")
            .and_then(|arg| arg.get_help())
            .map(|help| help.to_string())
            .unwrap();
        assert!(help.contains("reset on every start"), "{help}");
    }

    #[test]
    fn test_short_secret_rejected() {
        let cli = Cli::parse_from(["sx-relayer", "--master-secret", "0xdead"]);
        assert!(cli.master_secret().is_err());
    }
}
