//! # Protocol Configuration & Constants
//!
//! Every magic number in HAVEN lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong.
//!
//! Most of these are consensus-relevant for anyone replaying the ledger's
//! decisions: the basis-point denominator, the allowed stake terms, and the
//! authorization domain tag are all part of the observable behavior.

// ---------------------------------------------------------------------------
// Rate Limiting
// ---------------------------------------------------------------------------

/// Basis-point denominator. 10_000 bps = 100%.
///
/// The per-window withdrawal cap is `limit_bps * vault_balance / BPS_DENOMINATOR`.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// The largest accepted withdrawal limit: 100% of the vault balance per window.
pub const MAX_WITHDRAWAL_LIMIT_BPS: u32 = 10_000;

/// Default rate-limit window length when none is configured explicitly.
/// One hour mirrors the platform's production deployment config.
pub const DEFAULT_WINDOW_DURATION_SECS: u64 = 3_600;

// ---------------------------------------------------------------------------
// Staking
// ---------------------------------------------------------------------------

/// The only lock terms (in whole months) a stake may be opened with.
///
/// Anything else — including 1 month — is rejected with `InvalidTerm`.
pub const ALLOWED_STAKE_TERMS: [u32; 3] = [6, 12, 24];

/// Returns `true` if `term_months` is an accepted lock duration.
pub fn is_allowed_term(term_months: u32) -> bool {
    ALLOWED_STAKE_TERMS.contains(&term_months)
}

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 secret keys are 32 bytes.
pub const SIGNING_KEY_LENGTH: usize = 32;

/// Ed25519 public (verifying) keys are 32 bytes.
pub const VERIFYING_KEY_LENGTH: usize = 32;

/// Ed25519 signatures are 64 bytes. Always.
pub const SIGNATURE_LENGTH: usize = 64;

/// Domain separation tag prefixed to every withdrawal authorization message
/// before hashing. Binds signatures to this protocol and message version —
/// a validator signature can never be replayed as some other kind of
/// attestation. Part of the wire format; never change after launch.
pub const AUTHORIZATION_DOMAIN_TAG: &[u8] = b"HAVEN-WITHDRAW-V1";

/// Hash output length in bytes. BLAKE3 produces 32-byte digests.
pub const HASH_OUTPUT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Chain the production vault is anchored to.
pub const CHAIN_ID_MAINNET: u64 = 1;

/// Chain used by the staging deployment and the test suite.
pub const CHAIN_ID_TESTNET: u64 = 11_155_111;

/// Local development chain.
pub const CHAIN_ID_DEVNET: u64 = 31_337;

/// Returns a friendly name for a chain ID, mainly for logging.
pub fn chain_name(chain_id: u64) -> String {
    match chain_id {
        CHAIN_ID_MAINNET => "mainnet".to_string(),
        CHAIN_ID_TESTNET => "testnet".to_string(),
        CHAIN_ID_DEVNET => "devnet".to_string(),
        other => format!("unknown({})", other),
    }
}

// ---------------------------------------------------------------------------
// Service Defaults
// ---------------------------------------------------------------------------

/// Default REST API port for the haven-node binary.
pub const DEFAULT_RPC_PORT: u16 = 8560;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 8561;
