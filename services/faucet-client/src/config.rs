use clap::builder::FalseyValueParser;
use clap::{Parser, Subcommand};
use fd_chain_http::DEFAULT_RPC_URL;
use fd_core::FaucetConfig;
use fd_types::{Address, NetworkId};
use std::time::Duration;

const DEFAULT_POLL_MS: u64 = 2_000;

#[derive(Debug, Parser)]
#[command(name = "faucet-client")]
#[command(about = "Drive the Faucet contract from the command line")]
#[command(version)]
pub(crate) struct Cli {
    /// JSON-RPC endpoint of the node
    #[arg(long, env = "FAUCET_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,

    /// Faucet contract address
    #[arg(long, env = "FAUCET_CONTRACT_ADDRESS")]
    contract: Option<Address>,

    /// Network id the contract is deployed on
    #[arg(long, env = "FAUCET_NETWORK_ID")]
    network_id: Option<u64>,

    /// Wallet event polling interval in milliseconds
    #[arg(long, env = "FAUCET_POLL_MS", default_value_t = DEFAULT_POLL_MS)]
    poll_ms: u64,

    /// Run against an in-process simulated chain
    #[arg(long, env = "FAUCET_SIMULATE", value_parser = FalseyValueParser::new())]
    simulate: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub(crate) enum Command {
    /// Print the current session and account view
    Status,
    /// Ask the wallet to expose its accounts
    Connect,
    /// Send 0.1 ether to the faucet
    Donate,
    /// Withdraw 0.1 ether from the faucet
    Withdraw,
    /// Follow wallet notifications until ctrl-c
    Watch,
}

impl Cli {
    pub(crate) fn subcommand(&self) -> Command {
        self.command.unwrap_or(Command::Status)
    }

    pub(crate) fn driver_config(&self) -> DriverConfig {
        let mut faucet = FaucetConfig::default();
        if let Some(contract) = self.contract {
            faucet.contract_address = contract;
        }
        if let Some(id) = self.network_id {
            faucet.expected_network_id = NetworkId(id);
        }
        DriverConfig {
            rpc_url: self.rpc_url.clone(),
            simulate: self.simulate,
            poll_interval: Duration::from_millis(self.poll_ms.max(1)),
            faucet,
        }
    }
}

/// Driver settings, read once at start-up.
#[derive(Debug, Clone)]
pub(crate) struct DriverConfig {
    pub(crate) rpc_url: String,
    pub(crate) simulate: bool,
    pub(crate) poll_interval: Duration,
    pub(crate) faucet: FaucetConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("faucet-client").chain(args.iter().copied()))
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_without_arguments() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.subcommand(), Command::Status);
        let config = cli.driver_config();
        assert_eq!(config.rpc_url, "http://127.0.0.1:7545");
        assert!(!config.simulate);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.faucet, FaucetConfig::default());
    }

    #[test]
    fn overrides_from_flags() {
        let cli = parse(&[
            "--rpc-url",
            "http://node:8545",
            "--network-id",
            "1337",
            "--poll-ms",
            "250",
            "--simulate",
            "--contract",
            "0x1111111111111111111111111111111111111111",
            "watch",
        ])
        .unwrap();
        assert_eq!(cli.subcommand(), Command::Watch);
        let config = cli.driver_config();
        assert_eq!(config.rpc_url, "http://node:8545");
        assert!(config.simulate);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.faucet.expected_network_id, NetworkId(1337));
        assert_eq!(config.faucet.contract_address, Address::repeat_byte(0x11));
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let config = parse(&["--poll-ms", "0"]).unwrap().driver_config();
        assert_eq!(config.poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(parse(&["--network-id", "ganache"]).is_err());
        assert!(parse(&["--contract", "0x12"]).is_err());
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse(&["donate"]).unwrap().subcommand(), Command::Donate);
        assert_eq!(parse(&["withdraw"]).unwrap().subcommand(), Command::Withdraw);
        assert!(parse(&["mint"]).is_err());
        assert!(parse(&["donate", "now"]).is_err());
    }
}
