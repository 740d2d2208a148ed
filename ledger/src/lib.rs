// Copyright (c) 2026 Haven Systems. MIT License.
// See LICENSE for details.

//! # HAVEN Ledger — Core Library
//!
//! HAVEN is the custody point for a token bridge: users deposit assets into
//! the vault, an off-chain matching service decides the payout, and the
//! user redeems that payout with a signature from the platform validator.
//! A companion ledger lets holders lock tokens for a fixed calendar term.
//!
//! Two aggregates, sharing no state:
//!
//! - [`vault::VaultLedger`] — deposit acceptance, whitelist enforcement,
//!   validator-signed withdrawals, per-user nonce replay protection, and a
//!   self-resetting percentage-of-balance rate limit per outgoing asset.
//! - [`stake::StakeLedger`] — a single lock slot per account with
//!   month-granularity, leap-year-aware maturity.
//!
//! ## Architecture
//!
//! ```text
//! asset.rs          — asset identifiers: token addresses + native sentinel
//! custody.rs        — asset movement collaborator (trait + in-memory bank)
//! crypto/           — Ed25519 keys/signatures, BLAKE3 hashing
//! authorization.rs  — canonical withdrawal message, signing, verification
//! vault.rs          — VaultLedger: deposits, authorized withdrawals, limits
//! stake.rs          — StakeLedger: term locks and maturity release
//! calendar.rs       — pure integer calendar arithmetic (no date-lib math)
//! clock.rs          — time capability for callers that need "now"
//! snapshot.rs       — durable state surface: checkpoint save/load
//! config.rs         — every protocol constant, in one place
//! ```
//!
//! ## Design Principles
//!
//! 1. **All amounts are `u64` in smallest-unit denomination.** No floating
//!    point anywhere; the rate limit is basis-point integer arithmetic.
//!
//! 2. **Every operation is atomic.** A rejected precondition leaves the
//!    ledger byte-for-byte unchanged — a failed limit check never touches
//!    the window, a failed signature never consumes the nonce.
//!
//! 3. **Time is an input, not an ambient.** Ledger operations take the
//!    transaction timestamp explicitly so tests control the clock exactly.
//!
//! 4. **Serializable state.** Everything the storage layer must checkpoint
//!    derives `Serialize`/`Deserialize` (see [`snapshot`]).

pub mod asset;
pub mod authorization;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod custody;
pub mod snapshot;
pub mod stake;
pub mod vault;

pub use asset::{AccountId, AssetId};
pub use authorization::{Ed25519Verifier, SignatureVerifier, WithdrawalAuthorization};
pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::{HavenKeypair, HavenPublicKey, HavenSignature};
pub use custody::{AssetCustody, CustodyError, InMemoryCustody};
pub use snapshot::{Checkpoint, SnapshotError};
pub use stake::{StakeError, StakeLedger, StakeRecord, StakeState};
pub use vault::{
    DepositReceipt, VaultConfig, VaultError, VaultLedger, VaultState, WithdrawalReceipt,
    WithdrawalWindow,
};
