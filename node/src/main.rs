// Copyright (c) 2026 Haven Systems. MIT License.
// See LICENSE for details.

//! # HAVEN Custody Node
//!
//! Entry point for the `haven-node` binary. Parses CLI arguments, initializes
//! logging and metrics, restores ledger state from the latest checkpoint, and
//! serves the REST API.
//!
//! The binary supports four subcommands:
//!
//! - `run`     — start the custody node
//! - `init`    — initialize data directory and generate keys
//! - `status`  — query a running node's status endpoint
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::RwLock;

use haven_ledger::clock::SystemClock;
use haven_ledger::config::{CHAIN_ID_DEVNET, CHAIN_ID_MAINNET, CHAIN_ID_TESTNET};
use haven_ledger::crypto::blake3_hash;
use haven_ledger::snapshot::Checkpoint;
use haven_ledger::{
    AccountId, AssetId, Ed25519Verifier, HavenKeypair, HavenPublicKey, InMemoryCustody,
    StakeLedger, VaultConfig, VaultLedger,
};

use api::{AppState, NodeStakes, NodeVault};
use cli::{Commands, HavenNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

/// File name of the ledger checkpoint inside the data directory.
const CHECKPOINT_FILE: &str = "haven.checkpoint.json";

/// File name of the node key inside the data directory.
const KEY_FILE: &str = "validator.key";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = HavenNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full custody node: API server, metrics endpoint, and the
/// periodic checkpoint loop.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "haven_node=info,haven_ledger=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        chain = %args.chain,
        data_dir = %args.data_dir.display(),
        "starting haven-node"
    );

    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!("failed to create data directory: {}", args.data_dir.display())
    })?;

    let chain_id = parse_chain(&args.chain)?;
    let validator = resolve_validator_key(&args)?;
    let staking_token: AssetId = args
        .staking_token
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid staking token: {e}"))?;

    // The node process acts with owner authority, under the account of its
    // own key. Vault custody is held under a fixed derived account.
    let owner = node_owner_account(&args.data_dir)?;
    let vault_account = AccountId::from_bytes(blake3_hash(b"HAVEN-VAULT-CUSTODY"));

    // --- Ledgers: restore from checkpoint, or start fresh ---
    let checkpoint_path = args.data_dir.join(CHECKPOINT_FILE);
    let (vault, stakes) = if checkpoint_path.exists() {
        let checkpoint = Checkpoint::<InMemoryCustody>::load_json(&checkpoint_path)
            .with_context(|| format!("failed to load checkpoint {}", checkpoint_path.display()))?;
        let vault = VaultLedger::from_state(checkpoint.vault, checkpoint.vault_custody, Ed25519Verifier)
            .context("checkpoint holds an invalid vault configuration")?;
        let stakes = StakeLedger::from_state(checkpoint.stake, checkpoint.stake_custody);
        tracing::info!(taken_at = checkpoint.taken_at, "ledger state restored from checkpoint");
        (vault, stakes)
    } else {
        let config = VaultConfig {
            chain_id,
            validator,
            withdrawal_limit_bps: args.withdrawal_limit_bps,
            window_duration_secs: args.window_secs,
        };
        let vault = VaultLedger::new(
            owner,
            vault_account,
            config,
            InMemoryCustody::new(vault_account),
        )
        .context("invalid vault configuration")?;
        let stakes = StakeLedger::new(staking_token, InMemoryCustody::new(vault_account));
        tracing::info!("no checkpoint found, starting with fresh ledgers");
        (vault, stakes)
    };

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());
    node_metrics
        .active_stakes
        .set(stakes.state().stakes.len() as i64);

    // --- Application state ---
    let vault: Arc<RwLock<NodeVault>> = Arc::new(RwLock::new(vault));
    let stakes: Arc<RwLock<NodeStakes>> = Arc::new(RwLock::new(stakes));
    let app_state = AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        chain: args.chain.clone(),
        owner,
        vault: Arc::clone(&vault),
        stakes: Arc::clone(&stakes),
        clock: Arc::new(SystemClock),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Checkpoint loop ---
    let ckpt_vault = Arc::clone(&vault);
    let ckpt_stakes = Arc::clone(&stakes);
    let ckpt_metrics = Arc::clone(&node_metrics);
    let ckpt_path = checkpoint_path.clone();
    let checkpoint_loop = tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(args.checkpoint_secs));
        // The first tick fires immediately; skip it so startup doesn't
        // overwrite a checkpoint we just restored from.
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) =
                write_checkpoint(&ckpt_vault, &ckpt_stakes, &ckpt_path, &ckpt_metrics).await
            {
                tracing::error!("checkpoint write failed: {e:#}");
            }
        }
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    checkpoint_loop.abort();
    // One final checkpoint so nothing accepted since the last tick is lost.
    write_checkpoint(&vault, &stakes, &checkpoint_path, &node_metrics)
        .await
        .context("final checkpoint failed")?;
    tracing::info!("haven-node stopped");
    Ok(())
}

/// Snapshots both ledgers and writes them to `path` atomically.
async fn write_checkpoint(
    vault: &Arc<RwLock<NodeVault>>,
    stakes: &Arc<RwLock<NodeStakes>>,
    path: &std::path::Path,
    metrics: &Arc<NodeMetrics>,
) -> Result<()> {
    let (vault_state, vault_custody) = {
        let v = vault.read().await;
        (v.state(), v.custody().clone())
    };
    let (stake_state, stake_custody) = {
        let s = stakes.read().await;
        (s.state(), s.custody().clone())
    };
    let checkpoint = Checkpoint::new(
        chrono::Utc::now().timestamp(),
        vault_state,
        vault_custody,
        stake_state,
        stake_custody,
    );
    checkpoint.save_json(path)?;
    metrics.checkpoints_written_total.inc();
    Ok(())
}

/// Maps a chain name to its chain ID. Numeric strings are accepted for
/// custom deployments.
fn parse_chain(chain: &str) -> Result<u64> {
    match chain {
        "mainnet" => Ok(CHAIN_ID_MAINNET),
        "testnet" => Ok(CHAIN_ID_TESTNET),
        "devnet" => Ok(CHAIN_ID_DEVNET),
        other => match other.parse::<u64>() {
            Ok(id) => Ok(id),
            Err(_) => bail!("unknown chain {other:?}: expected mainnet, testnet, devnet, or a numeric chain ID"),
        },
    }
}

/// Resolves the withdrawal validator's public key: the explicit flag wins,
/// otherwise the public half of the key file in the data directory.
fn resolve_validator_key(args: &cli::RunArgs) -> Result<HavenPublicKey> {
    if let Some(hex_key) = &args.validator_pubkey {
        return HavenPublicKey::from_hex(hex_key.trim())
            .map_err(|_| anyhow::anyhow!("invalid validator public key hex"));
    }
    let keypair = load_node_key(&args.data_dir)?;
    Ok(keypair.public_key())
}

/// Loads the node keypair from the data directory.
fn load_node_key(data_dir: &std::path::Path) -> Result<HavenKeypair> {
    let key_path = data_dir.join(KEY_FILE);
    let hex_key = std::fs::read_to_string(&key_path).with_context(|| {
        format!(
            "failed to read node key {} (run `haven-node init` first)",
            key_path.display()
        )
    })?;
    HavenKeypair::from_hex(&hex_key).map_err(|_| {
        anyhow::anyhow!("node key file {} is not valid key hex", key_path.display())
    })
}

/// The account under which this node exercises owner authority.
fn node_owner_account(data_dir: &std::path::Path) -> Result<AccountId> {
    let keypair = load_node_key(data_dir)?;
    Ok(AccountId::from(&keypair.public_key()))
}

/// Initializes a new node data directory and generates a node keypair.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("haven_node=info", LogFormat::Pretty);

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), chain = %args.chain, "initializing node");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let keypair = HavenKeypair::generate();
    let pubkey_hex = keypair.public_key().to_hex();

    // Write the secret key to a file inside the data directory.
    let key_path = data_dir.join(KEY_FILE);
    std::fs::write(&key_path, hex::encode(keypair.secret_key_bytes()))
        .with_context(|| format!("failed to write node key to {}", key_path.display()))?;

    // Restrict permissions on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(
        public_key = %pubkey_hex,
        key_path = %key_path.display(),
        "node keypair generated"
    );

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Chain          : {}", args.chain);
    println!("  Node key       : {}", key_path.display());
    println!("  Public key     : {}", pubkey_hex);

    Ok(())
}

/// Queries a running node's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.rpc_url.trim_end_matches('/'));
    let body = http_get(&url).await?;
    println!("{}", body);
    Ok(())
}

/// Minimal HTTP GET over raw TCP, enough for the status subcommand without
/// pulling in a full HTTP client dependency.
async fn http_get(url: &str) -> Result<String> {
    let parsed: url::Url = url
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid URL: {}", e))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("missing host in URL"))?;
    let port = parsed.port().unwrap_or(80);
    let path = parsed.path();

    let addr = format!("{}:{}", host, port);
    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, host,
    );

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    // Everything after the first blank line is the body.
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());

    Ok(body)
}

/// Prints version information to stdout.
fn print_version() {
    println!("haven-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc      {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Minimal URL parser — just enough to extract host/port/path for the
/// status subcommand's single GET.
mod url {
    pub struct Url {
        host: String,
        port: Option<u16>,
        path: String,
    }

    impl Url {
        pub fn host_str(&self) -> Option<&str> {
            Some(&self.host)
        }

        pub fn port(&self) -> Option<u16> {
            self.port
        }

        pub fn path(&self) -> &str {
            &self.path
        }
    }

    impl std::str::FromStr for Url {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            // Strip scheme.
            let rest = s
                .strip_prefix("http://")
                .or_else(|| s.strip_prefix("https://"))
                .unwrap_or(s);

            let (authority, path) = match rest.find('/') {
                Some(i) => (&rest[..i], &rest[i..]),
                None => (rest, "/"),
            };

            let (host, port) = match authority.rfind(':') {
                Some(i) => {
                    let p = authority[i + 1..]
                        .parse::<u16>()
                        .map_err(|e| format!("bad port: {}", e))?;
                    (authority[..i].to_string(), Some(p))
                }
                None => (authority.to_string(), None),
            };

            Ok(Url {
                host,
                port,
                path: path.to_string(),
            })
        }
    }
}
