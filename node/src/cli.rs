//! # CLI Interface
//!
//! Defines the command-line argument structure for `haven-node` using
//! `clap` derive. Supports four subcommands: `run`, `init`, `status`,
//! and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// HAVEN custody node.
///
/// Runs the vault and staking ledgers behind a REST API: accepts deposits,
/// redeems validator-signed withdrawal authorizations under the configured
/// rate limit, manages term-locked stakes, and checkpoints ledger state to
/// disk. Exposes Prometheus metrics on a separate port.
#[derive(Parser, Debug)]
#[command(
    name = "haven-node",
    about = "HAVEN custody node",
    version,
    propagate_version = true
)]
pub struct HavenNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the HAVEN node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the custody node.
    Run(RunArgs),
    /// Initialize a new node — creates the data directory and generates
    /// a fresh validator keypair.
    Init(InitArgs),
    /// Query the status of a running node via its RPC endpoint.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node data directory where keys and checkpoints are stored.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "HAVEN_DATA_DIR", default_value = "~/.haven")]
    pub data_dir: PathBuf,

    /// Port for the REST API.
    #[arg(long, env = "HAVEN_RPC_PORT", default_value_t = haven_ledger::config::DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "HAVEN_METRICS_PORT", default_value_t = haven_ledger::config::DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Chain to anchor to: mainnet, testnet, or devnet.
    #[arg(long, env = "HAVEN_CHAIN", default_value = "devnet")]
    pub chain: String,

    /// Hex-encoded Ed25519 public key of the withdrawal validator.
    ///
    /// If not provided, the node reads `validator.key` from the data
    /// directory and uses its public half.
    #[arg(long, env = "HAVEN_VALIDATOR_PUBKEY")]
    pub validator_pubkey: Option<String>,

    /// Per-window withdrawal cap in basis points of the vault balance.
    #[arg(long, env = "HAVEN_WITHDRAWAL_LIMIT_BPS", default_value_t = 5_000)]
    pub withdrawal_limit_bps: u32,

    /// Rate-limit window duration in seconds.
    #[arg(long, env = "HAVEN_WINDOW_SECS", default_value_t = haven_ledger::config::DEFAULT_WINDOW_DURATION_SECS)]
    pub window_secs: u64,

    /// Hex address of the staking token ("native" for the native currency).
    #[arg(long, env = "HAVEN_STAKING_TOKEN", default_value = "native")]
    pub staking_token: String,

    /// Seconds between automatic checkpoints of ledger state.
    #[arg(long, env = "HAVEN_CHECKPOINT_SECS", default_value_t = 60)]
    pub checkpoint_secs: u64,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "HAVEN_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "HAVEN_DATA_DIR", default_value = "~/.haven")]
    pub data_dir: PathBuf,

    /// Chain to configure for: mainnet, testnet, or devnet.
    #[arg(long, default_value = "devnet")]
    pub chain: String,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// RPC endpoint of the running node.
    #[arg(long, default_value = "http://127.0.0.1:8560")]
    pub rpc_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        HavenNodeCli::command().debug_assert();
    }

    #[test]
    fn run_defaults_match_protocol_constants() {
        let cli = HavenNodeCli::parse_from(["haven-node", "run"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.rpc_port, haven_ledger::config::DEFAULT_RPC_PORT);
        assert_eq!(args.window_secs, haven_ledger::config::DEFAULT_WINDOW_DURATION_SECS);
        assert_eq!(args.chain, "devnet");
    }
}
