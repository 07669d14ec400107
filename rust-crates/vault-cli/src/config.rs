use clap::{
    Args,
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use ledger_rpc::{
    DEFAULT_POLL_INTERVAL,
    DEFAULT_REQUEST_TIMEOUT,
    LedgerRpcConfig,
};
use std::{
    path::PathBuf,
    time::Duration,
};
use url::Url;
use vault_sync::{
    Address,
    ExecutorConfig,
    SyncConfig,
    sync::DEFAULT_READ_TIMEOUT,
};

pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";
pub const DEFAULT_STATE_FILE: &str = "~/.basevault/state.json";

#[derive(Parser, Debug)]
#[command(
    name = "basevault",
    about = "Savings vault client: watch the vault or submit a single transaction",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct Config {
    /// JSON-RPC endpoint of the node
    #[arg(long, env = "BASEVAULT_RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: String,

    /// Address of the vault contract
    #[arg(long = "contract", env = "BASEVAULT_CONTRACT_ADDRESS")]
    pub contract: Address,

    /// Node-managed account to read as and sign with
    #[arg(long, env = "BASEVAULT_ACCOUNT")]
    pub account: Option<Address>,

    /// Where client state such as the referral code is kept
    #[arg(long, env = "BASEVAULT_STATE_FILE", default_value = DEFAULT_STATE_FILE)]
    pub state_file: String,

    /// Link the client was opened from; a `ref` parameter is remembered as referrer
    #[arg(long)]
    pub entry_url: Option<Url>,

    /// Public address of the app, used to build your referral link
    #[arg(long, env = "BASEVAULT_APP_URL")]
    pub app_url: Option<String>,

    /// Seconds between background refreshes
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_secs: u64,

    /// Seconds to wait for a transaction to be confirmed
    #[arg(long, default_value_t = 120, value_parser = clap::value_parser!(u64).range(1..))]
    pub confirmation_timeout_secs: u64,

    /// Seconds before a single HTTP request to the node is abandoned
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    pub request_timeout_secs: u64,

    /// Seconds before a contract view read counts as failed
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    pub read_timeout_secs: u64,

    /// Write a daily rolling log file into this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Keep the vault state fresh and print it until Ctrl-C
    Watch,
    /// Fetch everything once and print it
    Status,
    #[command(flatten)]
    Write(WriteCommand),
}

/// Commands that submit exactly one transaction and print its outcome as JSON.
#[derive(Subcommand, Debug, Clone)]
pub enum WriteCommand {
    /// Deposit native funds, optionally crediting a referrer
    Deposit {
        amount: String,
        #[arg(long)]
        referrer: Option<String>,
    },
    /// Withdraw part of your deposit
    Withdraw { amount: String },
    ClaimRewards,
    /// Close the current lottery round once it has ended
    FinalizeLottery,
    CreateCircle {
        name: String,
        target_amount: String,
        #[arg(long, default_value_t = 30)]
        duration_days: u64,
        #[arg(long, default_value_t = 10)]
        max_members: u64,
    },
    JoinCircle { circle_id: u64 },
    ContributeToCircle { circle_id: u64, amount: String },
    WithdrawFromCircle { circle_id: u64 },
}

impl Config {
    pub fn state_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.state_file)
            .map_err(|e| eyre!("expanding state file path {}: {e}", self.state_file))?;
        Ok(PathBuf::from(expanded.into_owned()))
    }

    pub fn ledger_config(&self) -> LedgerRpcConfig {
        LedgerRpcConfig {
            rpc_url: self.rpc_url.clone(),
            contract: self.contract,
            account: self.account,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            refresh_interval: Duration::from_secs(self.refresh_secs),
            ..SyncConfig::default()
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    const CONTRACT: &str = "0x00000000000000000000000000000000000000c0";

    #[test]
    fn parse__minimal_flags__applies_defaults() {
        let cli = Cli::try_parse_from(["basevault", "--contract", CONTRACT, "status"]).unwrap();

        assert_eq!(cli.config.contract, CONTRACT.parse::<Address>().unwrap());
        assert_eq!(cli.config.sync_config().refresh_interval, Duration::from_secs(30));
        assert_eq!(
            cli.config.executor_config().confirmation_timeout,
            Duration::from_secs(120)
        );
        assert_eq!(cli.config.read_timeout(), Duration::from_secs(20));
        assert_eq!(
            cli.config.ledger_config().request_timeout,
            Duration::from_secs(15)
        );
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn parse__deposit_with_referrer__keeps_referrer_text() {
        let cli = Cli::try_parse_from([
            "basevault",
            "--contract",
            CONTRACT,
            "deposit",
            "0.5",
            "--referrer",
            "0xABC",
        ])
        .unwrap();

        match cli.command {
            Command::Write(WriteCommand::Deposit { amount, referrer }) => {
                assert_eq!(amount, "0.5");
                assert_eq!(referrer.as_deref(), Some("0xABC"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse__bad_contract_address__is_rejected() {
        let res = Cli::try_parse_from(["basevault", "--contract", "0x12", "status"]);

        assert!(res.is_err());
    }

    #[test]
    fn parse__zero_refresh_interval__is_rejected() {
        let res = Cli::try_parse_from([
            "basevault",
            "--contract",
            CONTRACT,
            "--refresh-secs",
            "0",
            "watch",
        ]);

        assert!(res.is_err());
    }
}
