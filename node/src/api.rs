//! # REST API
//!
//! Builds the axum router that exposes the custody node's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                        |
//! |--------|-------------------------------|------------------------------------|
//! | GET    | `/health`                     | Liveness probe                     |
//! | GET    | `/status`                     | Node configuration summary         |
//! | POST   | `/deposit`                    | Move funds into vault custody      |
//! | POST   | `/withdraw`                   | Redeem a signed authorization      |
//! | POST   | `/stake`                      | Open a term-locked stake           |
//! | POST   | `/stake/withdraw`             | Release a matured stake            |
//! | GET    | `/stakes/:account`            | Active stake for an account        |
//! | GET    | `/vault/windows/:asset`       | Current rate-limit window          |
//! | GET    | `/vault/balances/:asset`      | Vault custody balance              |
//! | POST   | `/admin/whitelist`            | Admit an asset (node owner)        |
//! | POST   | `/faucet`                     | Mint test funds (devnet only)      |
//!
//! Ledger rejections map onto HTTP statuses: bad input is 400, a failed
//! signature is 401, replay and custody conflicts are 409, and a drained
//! rate-limit window is 429 so clients can back off until the next roll.

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use haven_ledger::clock::Clock;
use haven_ledger::stake::{StakeError, StakeLedger};
use haven_ledger::vault::{VaultError, VaultLedger};
use haven_ledger::{
    AccountId, AssetId, HavenSignature, InMemoryCustody, WithdrawalAuthorization,
    WithdrawalWindow,
};

use crate::metrics::SharedMetrics;

/// The vault as wired by this binary: in-memory custody, real Ed25519.
pub type NodeVault = VaultLedger<InMemoryCustody>;

/// The stake ledger as wired by this binary.
pub type NodeStakes = StakeLedger<InMemoryCustody>;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Chain name (e.g., "devnet", "testnet", "mainnet").
    pub chain: String,
    /// The account with administrative authority over the vault.
    pub owner: AccountId,
    /// The vault ledger.
    pub vault: Arc<RwLock<NodeVault>>,
    /// The stake ledger.
    pub stakes: Arc<RwLock<NodeStakes>>,
    /// Timestamp source for ledger operations.
    pub clock: Arc<dyn Clock>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
///
/// The returned router is ready to be served on the configured RPC port.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/deposit", post(deposit_handler))
        .route("/withdraw", post(withdraw_handler))
        .route("/stake", post(stake_handler))
        .route("/stake/withdraw", post(stake_withdraw_handler))
        .route("/stakes/:account", get(stake_of_handler))
        .route("/vault/windows/:asset", get(window_handler))
        .route("/vault/balances/:asset", get(vault_balance_handler))
        .route("/admin/whitelist", post(whitelist_handler))
        .route("/faucet", post(faucet_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Chain name.
    pub chain: String,
    /// Hex-encoded validator public key.
    pub validator: String,
    /// Per-window withdrawal cap in basis points.
    pub withdrawal_limit_bps: u32,
    /// Rate-limit window length in seconds.
    pub window_duration_secs: u64,
    /// The token the stake ledger locks.
    pub staking_token: AssetId,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Request body for `POST /deposit`. `requested_out` names the asset the
/// depositor wants paid out; the off-chain matcher reads it from the receipt.
#[derive(Debug, Serialize, Deserialize)]
pub struct DepositRequest {
    pub account: AccountId,
    pub asset: AssetId,
    pub requested_out: AssetId,
    pub amount: u64,
}

/// Request body for `POST /withdraw`: the authorization tuple plus the
/// validator's signature over it, hex-encoded.
#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub user: AccountId,
    pub token_in: AssetId,
    pub token_out: AssetId,
    pub amount_out: u64,
    pub nonce: u128,
    pub signature: String,
}

/// Request body for `POST /stake`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StakeRequest {
    pub account: AccountId,
    pub amount: u64,
    pub term_months: u32,
}

/// Request body for `POST /stake/withdraw`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StakeWithdrawRequest {
    pub account: AccountId,
}

/// Response payload for `GET /stakes/:account`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StakeStatusResponse {
    pub amount: u64,
    pub term_months: u32,
    pub started_at: i64,
    pub matures_at: i64,
}

/// Response payload for `GET /vault/balances/:asset`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub asset: AssetId,
    pub balance: u64,
}

/// Request body for `POST /admin/whitelist`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WhitelistRequest {
    pub asset: AssetId,
}

/// Request body for `POST /faucet`. Devnet fixture; `ledger` selects which
/// custody bank receives the mint ("vault" or "stake").
#[derive(Debug, Serialize, Deserialize)]
pub struct FaucetRequest {
    pub account: AccountId,
    pub asset: AssetId,
    pub amount: u64,
    #[serde(default = "default_faucet_ledger")]
    pub ledger: String,
}

fn default_faucet_ledger() -> String {
    "vault".to_string()
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_body(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Maps vault rejections onto HTTP statuses.
fn vault_error(e: VaultError) -> axum::response::Response {
    let status = match &e {
        VaultError::InvalidValidator
        | VaultError::InvalidLimit { .. }
        | VaultError::NotWhitelisted { .. }
        | VaultError::ZeroAmount => StatusCode::BAD_REQUEST,
        VaultError::NotOwner { .. } => StatusCode::FORBIDDEN,
        VaultError::InvalidAuthorization => StatusCode::UNAUTHORIZED,
        VaultError::AuthorizationReused { .. } | VaultError::Custody(_) => StatusCode::CONFLICT,
        VaultError::OverWithdrawalLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
    };
    error_body(status, e.to_string())
}

/// Maps stake rejections onto HTTP statuses.
fn stake_error(e: StakeError) -> axum::response::Response {
    let status = match &e {
        StakeError::InvalidTerm { .. } | StakeError::ZeroAmount => StatusCode::BAD_REQUEST,
        StakeError::NoActiveStake => StatusCode::NOT_FOUND,
        StakeError::NotMatured { .. } | StakeError::Custody(_) => StatusCode::CONFLICT,
    };
    error_body(status, e.to_string())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
///
/// This is the liveness probe for orchestrators (k8s, systemd, etc.).
/// It intentionally does not check internal subsystem health — that
/// belongs in `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — returns the node's configuration summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let vault = state.vault.read().await;
    let stakes = state.stakes.read().await;
    let config = vault.config();

    Json(StatusResponse {
        version: state.version.clone(),
        chain: state.chain.clone(),
        validator: config.validator.to_hex(),
        withdrawal_limit_bps: config.withdrawal_limit_bps,
        window_duration_secs: config.window_duration_secs,
        staking_token: stakes.staking_token(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /deposit` — moves funds from the caller into vault custody.
async fn deposit_handler(
    State(state): State<AppState>,
    Json(req): Json<DepositRequest>,
) -> impl IntoResponse {
    let now = state.clock.now();
    let mut vault = state.vault.write().await;
    match vault.deposit(&req.account, req.asset, req.requested_out, req.amount, now) {
        Ok(receipt) => {
            state.metrics.deposits_total.inc();
            (StatusCode::OK, Json(receipt)).into_response()
        }
        Err(e) => vault_error(e),
    }
}

/// `POST /withdraw` — redeems a validator-signed withdrawal authorization.
async fn withdraw_handler(
    State(state): State<AppState>,
    Json(req): Json<WithdrawRequest>,
) -> impl IntoResponse {
    let Ok(signature) = HavenSignature::from_hex(&req.signature) else {
        return error_body(StatusCode::BAD_REQUEST, "malformed signature hex");
    };
    let auth = WithdrawalAuthorization {
        user: req.user,
        token_in: req.token_in,
        token_out: req.token_out,
        amount_out: req.amount_out,
        nonce: req.nonce,
    };

    let now = state.clock.now();
    let mut vault = state.vault.write().await;
    match vault.withdraw(&req.user, &auth, &signature, now) {
        Ok(receipt) => {
            state.metrics.withdrawals_total.inc();
            state.metrics.withdrawal_amount.observe(receipt.amount as f64);
            (StatusCode::OK, Json(receipt)).into_response()
        }
        Err(e) => {
            state.metrics.withdrawals_rejected_total.inc();
            vault_error(e)
        }
    }
}

/// `POST /stake` — opens a term-locked stake.
async fn stake_handler(
    State(state): State<AppState>,
    Json(req): Json<StakeRequest>,
) -> impl IntoResponse {
    let now = state.clock.now();
    let mut stakes = state.stakes.write().await;
    let had_stake = stakes.stake_of(&req.account).is_some();
    match stakes.stake(&req.account, req.amount, req.term_months, now) {
        Ok(receipt) => {
            state.metrics.stakes_opened_total.inc();
            if !had_stake {
                state.metrics.active_stakes.inc();
            }
            (StatusCode::OK, Json(receipt)).into_response()
        }
        Err(e) => stake_error(e),
    }
}

/// `POST /stake/withdraw` — releases a matured stake.
async fn stake_withdraw_handler(
    State(state): State<AppState>,
    Json(req): Json<StakeWithdrawRequest>,
) -> impl IntoResponse {
    let now = state.clock.now();
    let mut stakes = state.stakes.write().await;
    match stakes.withdraw_stake(&req.account, now) {
        Ok(receipt) => {
            state.metrics.stakes_released_total.inc();
            state.metrics.active_stakes.dec();
            (StatusCode::OK, Json(receipt)).into_response()
        }
        Err(e) => stake_error(e),
    }
}

/// `GET /stakes/:account` — returns the account's active stake, 404 if none.
async fn stake_of_handler(
    Path(account): Path<AccountId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let stakes = state.stakes.read().await;
    match stakes.stake_of(&account) {
        Some(record) => (
            StatusCode::OK,
            Json(StakeStatusResponse {
                amount: record.amount,
                term_months: record.term_months,
                started_at: record.started_at,
                matures_at: record.matures_at(),
            }),
        )
            .into_response(),
        None => error_body(StatusCode::NOT_FOUND, "account has no active stake"),
    }
}

/// `GET /vault/windows/:asset` — the stored rate-limit window for an asset.
///
/// 404 until the first withdrawal of that asset opens a window.
async fn window_handler(
    Path(asset): Path<AssetId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let vault = state.vault.read().await;
    match vault.window_of(asset) {
        Some(window) => (StatusCode::OK, Json::<WithdrawalWindow>(window)).into_response(),
        None => error_body(StatusCode::NOT_FOUND, "no window opened for this asset"),
    }
}

/// `GET /vault/balances/:asset` — the vault's custody balance of an asset.
async fn vault_balance_handler(
    Path(asset): Path<AssetId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let vault = state.vault.read().await;
    Json(BalanceResponse {
        asset,
        balance: vault.vault_balance(asset),
    })
}

/// `POST /admin/whitelist` — admits an asset to the vault.
///
/// The node process holds the owner account, so this endpoint acts with
/// owner authority. Deployments front it with their own access control.
async fn whitelist_handler(
    State(state): State<AppState>,
    Json(req): Json<WhitelistRequest>,
) -> impl IntoResponse {
    let owner = state.owner;
    let mut vault = state.vault.write().await;
    match vault.add_to_whitelist(&owner, req.asset) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "whitelisted": req.asset })))
            .into_response(),
        Err(e) => vault_error(e),
    }
}

/// `POST /faucet` — mints test funds. Refused off devnet.
async fn faucet_handler(
    State(state): State<AppState>,
    Json(req): Json<FaucetRequest>,
) -> impl IntoResponse {
    if state.chain != "devnet" {
        return error_body(StatusCode::FORBIDDEN, "faucet is devnet-only");
    }

    let result = match req.ledger.as_str() {
        "vault" => {
            let mut vault = state.vault.write().await;
            vault.custody_mut().mint(req.asset, &req.account, req.amount)
        }
        "stake" => {
            let mut stakes = state.stakes.write().await;
            stakes.custody_mut().mint(req.asset, &req.account, req.amount)
        }
        other => {
            return error_body(
                StatusCode::BAD_REQUEST,
                format!("unknown ledger {other:?}: expected \"vault\" or \"stake\""),
            )
        }
    };

    match result {
        Ok(balance) => (
            StatusCode::OK,
            Json(BalanceResponse {
                asset: req.asset,
                balance,
            }),
        )
            .into_response(),
        Err(e) => error_body(StatusCode::CONFLICT, e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
